//! # labctl
//!
//! Schema-driven generator for self-hosted service stacks.
//!
//! ## Features
//!
//! - **Service Schemas**: each service is described by a YAML document (fields, dependencies, compose template)
//! - **Dependency Resolution**: selection expansion, deterministic topological ordering, cycle and missing-dependency detection
//! - **Manifest Synthesis**: schema + configuration → compose fragments with template substitution, generated secrets and reverse-proxy labels
//! - **Graceful Degradation**: a broken optional part of one service is omitted and reported, never aborting the manifest
//! - **Validation**: structural and cross-service checks reported as errors and warnings
//!
//! ## Quick Start
//!
//! ```no_run
//! use labctl::{ConfigurationValidator, ManifestBuilder, Parser, SchemaStore};
//!
//! # fn example() -> Result<(), labctl::Error> {
//! let store = SchemaStore::new();
//! let schemas = store.load("config/services", false)?;
//!
//! let config = Parser::new().load_config("config/config.yaml")?;
//! let report = ConfigurationValidator::with_schemas(&schemas).validate(&config);
//! for warning in &report.warnings {
//!     eprintln!("warning: {}", warning);
//! }
//!
//! let output = ManifestBuilder::new(&schemas).build(&config)?;
//! output.manifest.write_to("docker-compose.yml".as_ref())?;
//! # Ok(())
//! # }
//! ```

pub mod compose;
pub mod config;
pub mod dependency;
pub mod deploy;
pub mod envfile;
pub mod error;
pub mod schema;
pub mod secret;
pub mod validation;

// Re-export commonly used types
pub use compose::{Manifest, ManifestBuilder, ManifestFragment, ManifestOutput, SynthesisDegradation};
pub use config::{LabConfig, Parser, Profile, ServiceConfig};
pub use dependency::DependencyGraph;
pub use error::{Error, Result};
pub use schema::{SchemaSet, SchemaStore, ServiceSchema};
pub use validation::{ConfigurationValidator, ValidationReport};
