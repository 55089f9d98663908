use super::{LabConfig, CONFIG_VERSION};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_CANDIDATES: &[&str] = &["config/config.yaml", "labctl.yaml", "labctl.yml"];

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Find config file starting from current directory
    pub fn find_config_file(&self) -> Result<PathBuf> {
        let current_dir = std::env::current_dir()?;
        Self::find_config_in_dir(&current_dir)
    }

    pub fn find_config_in_dir(dir: &Path) -> Result<PathBuf> {
        for candidate in CONFIG_CANDIDATES {
            let path = dir.join(candidate);
            if path.is_file() {
                return Ok(path);
            }
        }

        // Try parent directory
        if let Some(parent) = dir.parent() {
            return Self::find_config_in_dir(parent);
        }

        Err(Error::Config(format!(
            "Could not find {} in current directory or any parent",
            CONFIG_CANDIDATES.join(", ")
        )))
    }

    /// Load config from file path
    pub fn load_config<P: AsRef<Path>>(&self, path: P) -> Result<LabConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        self.parse_config(&content).map_err(|e| match e {
            Error::Parse(msg) => Error::Parse(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse config from YAML string
    pub fn parse_config(&self, content: &str) -> Result<LabConfig> {
        let config: LabConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::Parse(format!("Failed to parse YAML config: {}", e)))?;

        if config.version > CONFIG_VERSION {
            return Err(Error::Config(format!(
                "Config version {} is not supported (newest known version is {})",
                config.version, CONFIG_VERSION
            )));
        }
        if config.version < CONFIG_VERSION {
            tracing::warn!(
                "Config version {} is older than {}; re-save it to upgrade",
                config.version,
                CONFIG_VERSION
            );
        }

        Ok(config)
    }

    /// Write `config` as YAML, creating parent directories as needed.
    pub fn save_config<P: AsRef<Path>>(&self, config: &LabConfig, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Filesystem(format!("Failed to create '{}': {}", parent.display(), e))
            })?;
        }

        let mut upgraded = config.clone();
        upgraded.version = CONFIG_VERSION;
        let text = serde_yaml::to_string(&upgraded)?;
        fs::write(path, text).map_err(|e| {
            Error::Filesystem(format!("Failed to write config file '{}': {}", path.display(), e))
        })?;
        tracing::debug!("Saved configuration to {}", path.display());
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
