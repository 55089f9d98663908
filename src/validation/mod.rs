//! Configuration validation.
//!
//! [`ConfigurationValidator`] cross-checks a populated [`LabConfig`](crate::config::LabConfig)
//! and reports errors and warnings without ever failing itself.

pub mod formats;
mod rules;
mod validator;

pub use validator::*;
