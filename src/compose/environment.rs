use std::collections::BTreeMap;

/// Environment values visible to synthesis.
///
/// `known` holds values that already exist outside the manifest (config
/// `env_vars`, an existing `.env`); `generated` collects values produced or
/// exported during this build that still need to be persisted.
#[derive(Debug, Clone, Default)]
pub struct EnvTable {
    known: BTreeMap<String, String>,
    generated: BTreeMap<String, String>,
}

impl EnvTable {
    pub fn new(known: BTreeMap<String, String>) -> Self {
        Self {
            known,
            generated: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.known
            .get(key)
            .or_else(|| self.generated.get(key))
            .map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Record `value` under `key` unless the key already has a value.
    /// Returns whether anything was recorded.
    pub fn export(&mut self, key: &str, value: &str) -> bool {
        if self.contains(key) {
            return false;
        }
        self.generated.insert(key.to_string(), value.to_string());
        true
    }

    /// Existing value for `key`, or a fresh one from `generate`.
    pub fn get_or_generate(&mut self, key: &str, generate: impl FnOnce() -> String) -> &str {
        if !self.contains(key) {
            let value = generate();
            tracing::debug!("Generated value for {}", key);
            self.generated.insert(key.to_string(), value);
        }
        self.get(key).unwrap_or_default()
    }

    pub fn generated(&self) -> &BTreeMap<String, String> {
        &self.generated
    }

    pub fn into_generated(self) -> BTreeMap<String, String> {
        self.generated
    }
}

/// Name of the env-table entry holding `field` of `service`.
pub fn env_key(service: &str, field: &str) -> String {
    format!("{}_{}", service, field)
        .to_ascii_uppercase()
        .replace(['-', '.'], "_")
}
