//! Configuration model.
//!
//! The in-memory [`LabConfig`] groups everything about one service in a
//! [`ServiceConfig`]; the on-disk document keeps `custom_env` as a separate
//! top-level table. Conversion between the two happens in serde via
//! [`ConfigDocument`].

use super::{FieldValue, FieldValues, Profile};
use crate::schema::{ConditionContext, SchemaSet, ServiceSchema};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CONFIG_VERSION: u32 = 2;

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Global settings shared by every service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            email: String::new(),
            timezone: default_timezone(),
        }
    }
}

/// One service's configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceConfig {
    pub enabled: bool,
    pub values: FieldValues,
    /// Extra environment entries; these win over schema-derived ones.
    pub custom_env: IndexMap<String, String>,
    /// Per-profile field overrides, applied over `values` when that profile
    /// is active.
    pub overrides: BTreeMap<Profile, FieldValues>,
}

impl ServiceConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_value(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn with_custom_env(mut self, key: &str, value: &str) -> Self {
        self.custom_env.insert(key.to_string(), value.to_string());
        self
    }

    /// Build a config for `schema`: field defaults, then profile defaults,
    /// then `supplied` values (which always win). An `enabled` entry in
    /// `supplied` sets the flag; otherwise the service is enabled.
    pub fn populate(schema: &ServiceSchema, profile: Profile, supplied: FieldValues) -> Self {
        let mut values = schema.default_values(profile);
        values.remove("enabled");
        values.extend(supplied);
        let enabled = values
            .remove("enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Self {
            enabled,
            values,
            ..Default::default()
        }
    }

    /// Values in effect under `profile`, including `enabled`.
    pub fn effective_values(&self, profile: Profile) -> FieldValues {
        let mut values = self.values.clone();
        if let Some(overrides) = self.overrides.get(&profile) {
            for (key, value) in overrides {
                values.insert(key.clone(), value.clone());
            }
        }
        values.insert("enabled".to_string(), FieldValue::Bool(self.enabled));
        values
    }

    pub fn value(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }
}

/// The user's complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigDocument", into = "ConfigDocument")]
pub struct LabConfig {
    pub version: u32,
    pub profile: Profile,
    pub core: CoreConfig,
    pub services: IndexMap<String, ServiceConfig>,
    /// Known environment values (e.g. secrets loaded from `.env`).
    pub env_vars: BTreeMap<String, String>,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self::new(Profile::default(), CoreConfig::default())
    }
}

impl LabConfig {
    pub fn new(profile: Profile, core: CoreConfig) -> Self {
        Self {
            version: CONFIG_VERSION,
            profile,
            core,
            services: IndexMap::new(),
            env_vars: BTreeMap::new(),
        }
    }

    pub fn service(&self, id: &str) -> Option<&ServiceConfig> {
        self.services.get(id)
    }

    pub fn set_service(&mut self, id: &str, service: ServiceConfig) {
        self.services.insert(id.to_string(), service);
    }

    /// Populate and store the config for `schema` under the active profile.
    pub fn populate_service(&mut self, schema: &ServiceSchema, supplied: FieldValues) -> &ServiceConfig {
        let service = ServiceConfig::populate(schema, self.profile, supplied);
        self.services.insert(schema.id.clone(), service);
        &self.services[&schema.id]
    }

    /// Fill values missing from configured services with their schema's
    /// defaults for the active profile. Supplied values, overrides and the
    /// `enabled` flag are left alone.
    pub fn apply_schema_defaults(&mut self, schemas: &SchemaSet) {
        for (id, service) in self.services.iter_mut() {
            let Some(schema) = schemas.get(id) else {
                continue;
            };
            for (key, value) in schema.default_values(self.profile) {
                if key != "enabled" && !service.values.contains_key(&key) {
                    service.values.insert(key, value);
                }
            }
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.services.get(id).is_some_and(|s| s.enabled)
    }

    pub fn get_enabled_services(&self) -> IndexMap<&str, &ServiceConfig> {
        self.services
            .iter()
            .filter(|(_, s)| s.enabled)
            .map(|(id, s)| (id.as_str(), s))
            .collect()
    }

    pub fn enabled_ids(&self) -> Vec<String> {
        self.services
            .iter()
            .filter(|(_, s)| s.enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Effective field values of `id` under the active profile.
    pub fn effective_values(&self, id: &str) -> FieldValues {
        self.services
            .get(id)
            .map(|s| s.effective_values(self.profile))
            .unwrap_or_default()
    }

    /// One `https://` URL per enabled service: its own `domain` field when
    /// set, otherwise `{id}.{core.domain}`.
    pub fn get_service_urls(&self) -> IndexMap<String, String> {
        self.get_enabled_services()
            .into_iter()
            .map(|(id, service)| (id.to_string(), format!("https://{}", self.service_host(id, service))))
            .collect()
    }

    pub(crate) fn service_host(&self, id: &str, service: &ServiceConfig) -> String {
        match service.effective_values(self.profile).get("domain") {
            Some(FieldValue::String(domain)) if !domain.trim().is_empty() => domain.trim().to_string(),
            _ => format!("{}.{}", id, self.core.domain),
        }
    }

    /// Context for evaluating conditions of service `id`: global settings,
    /// every configured service's values as `other.key`, then the service's
    /// own values by bare key. Only configured values are visible; see
    /// [`condition_context_with_schemas`](Self::condition_context_with_schemas).
    pub fn condition_context(&self, id: &str) -> ConditionContext {
        self.build_condition_context(id, None)
    }

    /// [`condition_context`](Self::condition_context) with each service's
    /// schema defaults for the active profile layered under its configured
    /// values, so a condition on an unset field sees the field's default.
    pub fn condition_context_with_schemas(&self, id: &str, schemas: &SchemaSet) -> ConditionContext {
        self.build_condition_context(id, Some(schemas))
    }

    fn build_condition_context(&self, id: &str, schemas: Option<&SchemaSet>) -> ConditionContext {
        let mut ctx = ConditionContext::new();
        ctx.insert("domain".to_string(), FieldValue::from(self.core.domain.as_str()));
        ctx.insert("email".to_string(), FieldValue::from(self.core.email.as_str()));
        ctx.insert("timezone".to_string(), FieldValue::from(self.core.timezone.as_str()));
        ctx.insert("profile".to_string(), FieldValue::from(self.profile.as_str()));

        let layered = |service_id: &str, service: &ServiceConfig| -> FieldValues {
            let mut values = schemas
                .and_then(|set| set.get(service_id))
                .map(|schema| schema.default_values(self.profile))
                .unwrap_or_default();
            values.extend(service.effective_values(self.profile));
            values
        };

        for (other, service) in &self.services {
            for (key, value) in layered(other.as_str(), service) {
                ctx.insert(format!("{}.{}", other, key), value);
            }
        }

        if let Some(service) = self.services.get(id) {
            for (key, value) in layered(id, service) {
                ctx.insert(key, value);
            }
        }
        ctx
    }
}

/// Document form of [`LabConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    profile: Profile,
    #[serde(default)]
    core: CoreConfig,
    #[serde(default)]
    services: IndexMap<String, ServiceDocument>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    custom_env: IndexMap<String, IndexMap<String, FieldValue>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    env_vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServiceDocument {
    #[serde(default)]
    enabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    overrides: BTreeMap<Profile, FieldValues>,
    #[serde(flatten)]
    values: FieldValues,
}

impl From<ConfigDocument> for LabConfig {
    fn from(doc: ConfigDocument) -> Self {
        let mut custom_env = doc.custom_env;
        let mut services: IndexMap<String, ServiceConfig> = doc
            .services
            .into_iter()
            .map(|(id, service)| {
                let env = custom_env
                    .shift_remove(&id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_string()))
                    .collect();
                let config = ServiceConfig {
                    enabled: service.enabled,
                    values: service.values,
                    custom_env: env,
                    overrides: service.overrides,
                };
                (id, config)
            })
            .collect();

        // custom_env for a service that has no `services` entry
        for (id, env) in custom_env {
            services.insert(
                id,
                ServiceConfig {
                    custom_env: env.into_iter().map(|(k, v)| (k, v.to_string())).collect(),
                    ..Default::default()
                },
            );
        }

        LabConfig {
            version: doc.version,
            profile: doc.profile,
            core: doc.core,
            services,
            env_vars: doc.env_vars,
        }
    }
}

impl From<LabConfig> for ConfigDocument {
    fn from(config: LabConfig) -> Self {
        let mut custom_env = IndexMap::new();
        let services = config
            .services
            .into_iter()
            .map(|(id, service)| {
                if !service.custom_env.is_empty() {
                    custom_env.insert(
                        id.clone(),
                        service
                            .custom_env
                            .into_iter()
                            .map(|(k, v)| (k, FieldValue::String(v)))
                            .collect(),
                    );
                }
                let doc = ServiceDocument {
                    enabled: service.enabled,
                    overrides: service.overrides,
                    values: service.values,
                };
                (id, doc)
            })
            .collect();

        ConfigDocument {
            version: config.version,
            profile: config.profile,
            core: config.core,
            services,
            custom_env,
            env_vars: config.env_vars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
version: 2
profile: prod
core:
  domain: example.com
  email: admin@example.com
services:
  grafana:
    enabled: true
    admin_user: admin
    overrides:
      dev:
        admin_user: dev
  postgresql:
    enabled: false
    port: 5432
custom_env:
  grafana:
    GF_LOG_LEVEL: debug
    GF_WORKERS: 4
"#;

    #[test]
    fn parses_document_and_moves_custom_env() {
        let config: LabConfig = serde_yaml::from_str(DOCUMENT).unwrap();
        assert_eq!(config.profile, Profile::Prod);
        assert_eq!(config.core.timezone, "UTC");

        let grafana = config.service("grafana").unwrap();
        assert!(grafana.enabled);
        assert_eq!(grafana.values["admin_user"], FieldValue::from("admin"));
        assert!(!grafana.values.contains_key("enabled"));
        assert_eq!(grafana.custom_env["GF_LOG_LEVEL"], "debug");
        assert_eq!(grafana.custom_env["GF_WORKERS"], "4");

        assert_eq!(
            config.service("postgresql").unwrap().values["port"],
            FieldValue::Integer(5432)
        );
    }

    #[test]
    fn document_round_trips() {
        let config: LabConfig = serde_yaml::from_str(DOCUMENT).unwrap();
        let text = serde_yaml::to_string(&config).unwrap();
        assert!(text.contains("custom_env"));
        let again: LabConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn profile_overrides_apply_only_to_their_profile() {
        let mut config: LabConfig = serde_yaml::from_str(DOCUMENT).unwrap();
        assert_eq!(
            config.effective_values("grafana")["admin_user"],
            FieldValue::from("admin")
        );
        config.profile = Profile::Dev;
        assert_eq!(
            config.effective_values("grafana")["admin_user"],
            FieldValue::from("dev")
        );
    }

    #[test]
    fn enabled_services_filter() {
        let config: LabConfig = serde_yaml::from_str(DOCUMENT).unwrap();
        let enabled = config.get_enabled_services();
        assert_eq!(enabled.keys().copied().collect::<Vec<_>>(), vec!["grafana"]);
        assert!(config.is_enabled("grafana"));
        assert!(!config.is_enabled("postgresql"));
        assert!(!config.is_enabled("unknown"));
    }

    #[test]
    fn service_urls() {
        let mut config = LabConfig::new(
            Profile::Dev,
            CoreConfig {
                domain: "example.com".to_string(),
                ..Default::default()
            },
        );
        config.set_service("grafana", ServiceConfig::enabled());
        config.set_service(
            "nextcloud",
            ServiceConfig::enabled().with_value("domain", "cloud.example.org"),
        );
        config.set_service("redis", ServiceConfig::default());

        let urls = config.get_service_urls();
        assert_eq!(urls["grafana"], "https://grafana.example.com");
        assert_eq!(urls["nextcloud"], "https://cloud.example.org");
        assert!(!urls.contains_key("redis"));
    }

    #[test]
    fn condition_context_contains_globals_and_other_services() {
        let config: LabConfig = serde_yaml::from_str(DOCUMENT).unwrap();
        let ctx = config.condition_context("grafana");
        assert_eq!(ctx["profile"], FieldValue::from("prod"));
        assert_eq!(ctx["domain"], FieldValue::from("example.com"));
        assert_eq!(ctx["postgresql.enabled"], FieldValue::Bool(false));
        assert_eq!(ctx["postgresql.port"], FieldValue::Integer(5432));
        assert_eq!(ctx["admin_user"], FieldValue::from("admin"));
        assert_eq!(ctx["enabled"], FieldValue::Bool(true));
    }

    #[test]
    fn populate_layers_defaults_under_supplied_values() {
        let schema: ServiceSchema = serde_yaml::from_str(
            r#"
id: postgresql
name: PostgreSQL
fields:
  - key: enabled
    type: boolean
    default: false
  - key: max_connections
    type: integer
    default: 100
  - key: shared_buffers
    type: string
    default: 128MB
defaults:
  prod:
    max_connections: 200
    shared_buffers: 1GB
"#,
        )
        .unwrap();

        let mut supplied = FieldValues::new();
        supplied.insert("shared_buffers".into(), FieldValue::from("2GB"));
        let service = ServiceConfig::populate(&schema, Profile::Prod, supplied);

        assert!(service.enabled, "populated services are enabled unless told otherwise");
        assert_eq!(service.values["max_connections"], FieldValue::Integer(200));
        assert_eq!(service.values["shared_buffers"], FieldValue::from("2GB"));

        let dev = ServiceConfig::populate(&schema, Profile::Dev, FieldValues::new());
        assert_eq!(dev.values["max_connections"], FieldValue::Integer(100));
    }

    #[test]
    fn schema_defaults_fill_gaps_only() {
        let schema: ServiceSchema = serde_yaml::from_str(
            r#"
id: redis
name: Redis
fields:
  - key: enabled
    type: boolean
    default: false
  - key: port
    type: integer
    default: 6379
  - key: persistence
    type: choice
    choices: [rdb, aof]
    default: rdb
"#,
        )
        .unwrap();
        let mut schemas = SchemaSet::new();
        schemas.insert("redis".to_string(), schema);

        let mut config = LabConfig::default();
        config.set_service("redis", ServiceConfig::enabled().with_value("persistence", "aof"));
        config.apply_schema_defaults(&schemas);

        let redis = config.service("redis").unwrap();
        assert!(redis.enabled);
        assert_eq!(redis.values["port"], FieldValue::Integer(6379));
        assert_eq!(redis.values["persistence"], FieldValue::from("aof"));
    }

    #[test]
    fn condition_context_with_schemas_sees_profile_defaults() {
        let schema: ServiceSchema = serde_yaml::from_str(
            r#"
id: gitlab
name: GitLab
fields:
  - key: enabled
    type: boolean
    default: false
  - key: ldap_enabled
    type: boolean
    default: false
  - key: ldap_host
    type: string
    show_if: ldap_enabled
defaults:
  prod:
    ldap_enabled: true
"#,
        )
        .unwrap();
        let mut schemas = SchemaSet::new();
        schemas.insert("gitlab".to_string(), schema);

        let mut config = LabConfig::default();
        config.profile = Profile::Prod;
        config.set_service("gitlab", ServiceConfig::enabled());

        let bare = config.condition_context("gitlab");
        assert!(!bare.contains_key("ldap_enabled"));

        let ctx = config.condition_context_with_schemas("gitlab", &schemas);
        assert_eq!(ctx["ldap_enabled"], FieldValue::Bool(true));
        assert_eq!(ctx["gitlab.ldap_enabled"], FieldValue::Bool(true));
        assert_eq!(ctx["enabled"], FieldValue::Bool(true), "configured enablement wins over the default");

        let ldap_host = &schemas["gitlab"].fields[2];
        assert!(ldap_host.is_visible(&ctx));

        config.set_service("gitlab", ServiceConfig::enabled().with_value("ldap_enabled", false));
        let ctx = config.condition_context_with_schemas("gitlab", &schemas);
        assert!(!ldap_host.is_visible(&ctx), "configured values win over defaults");
    }
}
