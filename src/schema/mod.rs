//! Service schemas.
//!
//! - `types` - `ServiceSchema`, `FieldSchema`, `FieldType`, `Maturity`
//! - `compose` - compose-fragment templates and environment rules
//! - `expression` - condition language for `show_if`/`hidden_if`/`condition`
//! - `store` - directory loader and the `SchemaStore` cache
//! - `validation` - structural and advisory schema checks

mod compose;
mod expression;
mod store;
mod types;
mod validation;

pub use compose::*;
pub use expression::*;
pub use store::*;
pub use types::*;
pub use validation::*;
