// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Filesystem error: {0}")]
    #[diagnostic(code(labctl::filesystem::error))]
    Filesystem(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to load service schemas from '{}':\n{}",
        .directory.display(),
        .issues.iter().map(|i| format!("  - {}", i)).collect::<Vec<_>>().join("\n")
    )]
    #[diagnostic(
        code(labctl::schema::load),
        help("Fix every listed schema document; each entry names the offending file")
    )]
    SchemaLoad {
        directory: PathBuf,
        issues: Vec<String>,
    },

    #[error("Service '{service}' requires missing dependencies: {}", .missing.join(", "))]
    #[diagnostic(
        code(labctl::dependency::missing),
        help("List available services with `labctl services`")
    )]
    MissingDependency {
        service: String,
        missing: Vec<String>,
    },

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    #[diagnostic(
        code(labctl::dependency::circular),
        help("Services cannot depend on each other in a cycle. Review the `dependencies` lists")
    )]
    CircularDependency(Vec<String>),

    #[error("Configuration has {} validation error(s):\n{}",
        .errors.len(),
        .errors.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n")
    )]
    #[diagnostic(
        code(labctl::config::validation),
        help("Run `labctl validate` for the full list of errors and warnings")
    )]
    ConfigurationValidation { errors: Vec<String> },

    #[error("Service not found: {0}")]
    #[diagnostic(
        code(labctl::service::not_found),
        help("List available services with `labctl services`")
    )]
    ServiceNotFound(String),

    #[error("Secret generation failed: {0}")]
    Secret(String),

    #[error("Deployment failed: {0}")]
    #[diagnostic(
        code(labctl::deploy::failed),
        help("Verify Docker is running with `docker ps` and check the generated docker-compose.yml")
    )]
    Deploy(String),

    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::SchemaLoad { directory, .. } => Some(format!(
                "Check the YAML documents in {} (each must declare a boolean 'enabled' field and a unique id)",
                directory.display()
            )),
            Error::MissingDependency { service, missing } if service == "selection" => Some(format!(
                "Unknown service(s) selected: {}. Run `labctl services` to list what is available.",
                missing.join(", ")
            )),
            Error::MissingDependency { service, missing } => Some(format!(
                "Add schema documents for {} or remove them from the dependencies of '{}'.",
                missing.join(", "),
                service
            )),
            Error::CircularDependency(path) => Some(format!(
                "Services cannot depend on each other in a cycle. Review the dependencies of: {}",
                path.join(", ")
            )),
            Error::ServiceNotFound(name) => Some(format!(
                "'{}' has no schema document. Run `labctl services` to list what is available.",
                name
            )),
            Error::Config(msg) if msg.contains("Failed to read") => Some(
                "Pass the configuration path with --config or set LABCTL_CONFIG".to_string(),
            ),
            Error::Config(_) | Error::ConfigurationValidation { .. } => {
                Some("Validate your config with: labctl validate".to_string())
            }
            Error::Deploy(_) => Some("Check that Docker is running: docker ps".to_string()),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_dependency_renders_chain() {
        let err = Error::CircularDependency(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> c -> a");
    }

    #[test]
    fn schema_load_lists_every_issue() {
        let err = Error::SchemaLoad {
            directory: PathBuf::from("/tmp/services"),
            issues: vec!["a.yaml: bad".to_string(), "b.yaml: worse".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("a.yaml: bad"));
        assert!(text.contains("b.yaml: worse"));
    }

    #[test]
    fn missing_dependency_mentions_missing_ids() {
        let err = Error::MissingDependency {
            service: "x".to_string(),
            missing: vec!["y".to_string()],
        };
        assert_eq!(err.to_string(), "Service 'x' requires missing dependencies: y");
        assert!(err.with_suggestion().contains("Hint:"));
    }

    #[test]
    fn selection_errors_get_a_listing_hint() {
        let err = Error::MissingDependency {
            service: "selection".to_string(),
            missing: vec!["nope".to_string()],
        };
        let hint = err.suggestion().unwrap();
        assert!(hint.contains("labctl services"), "got: {}", hint);
    }
}
