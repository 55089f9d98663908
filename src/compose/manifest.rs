//! Manifest document model.

use crate::error::{Error, Result};
use crate::schema::{CommandSpec, DependsOnCondition, RestartPolicy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    pub condition: DependsOnCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Healthcheck {
    pub test: Vec<String>,
    pub interval: String,
    pub timeout: String,
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_period: Option<String>,
}

/// Runtime definition of one service in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFragment {
    pub image: String,
    pub container_name: String,
    pub restart: RestartPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub depends_on: IndexMap<String, DependsOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
}

impl ManifestFragment {
    /// Fragment with only the mandatory parts set.
    pub fn new(image: String, container_name: String, restart: RestartPolicy, network: &str) -> Self {
        Self {
            image,
            container_name,
            restart,
            command: None,
            entrypoint: None,
            environment: Vec::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            labels: Vec::new(),
            networks: vec![network.to_string()],
            depends_on: IndexMap::new(),
            healthcheck: None,
            privileged: None,
            cap_add: Vec::new(),
            dns: Vec::new(),
            devices: Vec::new(),
        }
    }

    /// Value of environment entry `key`, `Some("")` for a bare `KEY` entry.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment.iter().find_map(|entry| match entry.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            None if entry == key => Some(""),
            _ => None,
        })
    }

    pub fn named_volumes(&self) -> impl Iterator<Item = &str> {
        self.volumes.iter().filter_map(|spec| named_volume(spec))
    }
}

/// Volume name of a `name:path[:mode]` spec whose source is not a host path.
pub fn named_volume(spec: &str) -> Option<&str> {
    let (source, _) = spec.split_once(':')?;
    let is_path = source.is_empty()
        || source.starts_with("./")
        || source.starts_with("../")
        || source.starts_with('/')
        || source.starts_with('~')
        || source == "."
        || source.contains("${");
    (!is_path).then_some(source)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDef {
    pub driver: String,
}

impl Default for NetworkDef {
    fn default() -> Self {
        Self {
            driver: "bridge".to_string(),
        }
    }
}

/// Extra settings for a named volume; every volume this crate registers
/// uses the defaults and serializes as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

/// The aggregated manifest document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub services: IndexMap<String, ManifestFragment>,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkDef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, Option<VolumeDef>>,
}

impl Manifest {
    pub fn new(network: &str) -> Self {
        let mut manifest = Self::default();
        manifest.networks.insert(network.to_string(), NetworkDef::default());
        manifest
    }

    /// Add `fragment` under `id`, registering its named volumes and networks.
    pub fn add_fragment(&mut self, id: &str, fragment: ManifestFragment) {
        for volume in fragment.named_volumes() {
            self.volumes.entry(volume.to_string()).or_insert(None);
        }
        for network in &fragment.networks {
            self.networks.entry(network.clone()).or_default();
        }
        self.services.insert(id.to_string(), fragment);
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let text = self.to_yaml()?;
        std::fs::write(path, text)
            .map_err(|e| Error::Filesystem(format!("Failed to write manifest '{}': {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(volumes: &[&str]) -> ManifestFragment {
        let mut f = ManifestFragment::new(
            "redis:7-alpine".to_string(),
            "redis".to_string(),
            RestartPolicy::UnlessStopped,
            "homelab",
        );
        f.volumes = volumes.iter().map(|v| v.to_string()).collect();
        f
    }

    #[test]
    fn named_volume_detection() {
        assert_eq!(named_volume("redis-data:/data"), Some("redis-data"));
        assert_eq!(named_volume("certs:/certs:ro"), Some("certs"));
        assert_eq!(named_volume("./config:/config"), None);
        assert_eq!(named_volume("../shared:/shared"), None);
        assert_eq!(named_volume("/var/run/docker.sock:/var/run/docker.sock"), None);
        assert_eq!(named_volume("~/media:/media"), None);
        assert_eq!(named_volume("/anonymous"), None);
    }

    #[test]
    fn volumes_are_registered_once() {
        let mut manifest = Manifest::new("homelab");
        manifest.add_fragment("a", fragment(&["shared:/data", "./local:/local"]));
        manifest.add_fragment("b", fragment(&["shared:/other"]));
        assert_eq!(manifest.volumes.len(), 1);
        assert!(manifest.volumes.contains_key("shared"));
    }

    #[test]
    fn yaml_shape() {
        let mut manifest = Manifest::new("homelab");
        manifest.add_fragment("redis", fragment(&["redis-data:/data"]));
        let yaml = manifest.to_yaml().unwrap();
        assert!(yaml.contains("redis-data: null"), "{}", yaml);
        assert!(yaml.contains("driver: bridge"));
        assert!(yaml.contains("restart: unless-stopped"));
        assert!(!yaml.contains("healthcheck"));

        let parsed: Manifest = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn env_lookup() {
        let mut f = fragment(&[]);
        f.environment = vec!["A=1".to_string(), "BARE".to_string()];
        assert_eq!(f.env("A"), Some("1"));
        assert_eq!(f.env("BARE"), Some(""));
        assert_eq!(f.env("MISSING"), None);
    }
}
