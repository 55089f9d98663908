//! Configuration model and document handling.
//!
//! - `value` - typed field values (`FieldValue`)
//! - `profile` - deployment profiles (`Profile`)
//! - `types` - `LabConfig`, `ServiceConfig`, `CoreConfig`
//! - `parser` - YAML load/save
//! - `validation` - structural self-check

mod parser;
mod profile;
mod types;
mod validation;
mod value;

pub use parser::*;
pub use profile::*;
pub use types::*;
pub use value::*;
