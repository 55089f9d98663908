//! Manifest synthesis.
//!
//! [`ManifestBuilder`] walks the enabled services in dependency order and asks
//! a [`FragmentSynthesizer`] for each one: [`SchemaDriven`] when the schema
//! carries a usable compose template, [`LegacyFallback`] otherwise.

mod builder;
mod duration;
mod environment;
mod labels;
mod legacy;
mod manifest;
mod synthesizer;
mod template;

pub use builder::*;
pub use duration::*;
pub use environment::*;
pub use labels::*;
pub use legacy::*;
pub use manifest::*;
pub use synthesizer::*;
pub use template::*;
