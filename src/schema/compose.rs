//! Compose-fragment templates carried by service schemas.

use super::Condition;
use crate::config::FieldValue;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

static ENV_KEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn env_key_regex() -> &'static Regex {
    ENV_KEY_REGEX.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("static regex pattern is valid"))
}

/// Restart policy written into each manifest fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    Always,
    OnFailure,
    #[default]
    UnlessStopped,
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestartPolicy::No => "no",
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::UnlessStopped => "unless-stopped",
        })
    }
}

/// Condition attached to a `depends_on` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependsOnCondition {
    #[default]
    ServiceStarted,
    ServiceHealthy,
    ServiceCompletedSuccessfully,
}

/// A `depends_on` entry: either the bare condition or `{condition: ...}`.
///
/// ```yaml
/// depends_on:
///   postgresql: service_healthy
///   redis:
///     condition: service_started
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOnEntry {
    Condition(DependsOnCondition),
    Detailed {
        #[serde(default)]
        condition: DependsOnCondition,
    },
}

impl DependsOnEntry {
    pub fn condition(&self) -> DependsOnCondition {
        match self {
            DependsOnEntry::Condition(c) => *c,
            DependsOnEntry::Detailed { condition } => *condition,
        }
    }
}

/// Shell-form or exec-form command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Shell(String),
    Exec(Vec<String>),
}

fn default_interval() -> String {
    "30s".to_string()
}

fn default_timeout() -> String {
    "5s".to_string()
}

fn default_retries() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthcheckSpec {
    pub test: Vec<String>,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_period: Option<String>,
}

/// Reverse-proxy exposure. When the proxy service is enabled, synthesis
/// attaches routing labels for `port` under `subdomain` (default: service id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExposeSpec {
    pub port: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

/// Kind of value produced by the `generate` environment strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateKind {
    /// Mixed character classes.
    Password,
    /// Alphanumeric.
    Token,
    /// Lowercase hex.
    Hex,
}

/// How an environment entry obtains its value.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvStrategy {
    Literal(String),
    FromField(String),
    FromService { service: String, field: String },
    Template(String),
    ValueMap {
        field: String,
        map: BTreeMap<String, String>,
    },
    Generate { kind: GenerateKind, length: usize },
}

impl EnvStrategy {
    /// Own-schema field this strategy reads, if any.
    pub fn own_field(&self) -> Option<&str> {
        match self {
            EnvStrategy::FromField(field) | EnvStrategy::ValueMap { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// One environment variable rule in a compose template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvSource", into = "RawEnvSource")]
pub struct ComposeEnvSource {
    pub key: String,
    pub strategy: EnvStrategy,
    pub condition: Option<Condition>,
}

/// Document form of [`ComposeEnvSource`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEnvSource {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value_map: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generate: Option<GenerateKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<Condition>,
}

const DEFAULT_GENERATED_LENGTH: usize = 32;

impl RawEnvSource {
    /// Strategy keys present on this entry, with `from_field` only counted
    /// when it stands alone.
    fn strategy_names(&self) -> Vec<&'static str> {
        let selector_only = self.from_service.is_some() || self.value_map.is_some();
        [
            ("value", self.value.is_some()),
            ("from_field", self.from_field.is_some() && !selector_only),
            ("from_service", self.from_service.is_some()),
            ("template", self.template.is_some()),
            ("value_map", self.value_map.is_some()),
            ("generate", self.generate.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

impl TryFrom<RawEnvSource> for ComposeEnvSource {
    type Error = String;

    // `from_field` doubles as the selector for `from_service` and `value_map`;
    // any other combination of strategies is rejected.
    fn try_from(raw: RawEnvSource) -> Result<Self, Self::Error> {
        if !env_key_regex().is_match(&raw.key) {
            return Err(format!(
                "environment variable '{}' must be uppercase alphanumeric with underscores",
                raw.key
            ));
        }

        let strategies = raw.strategy_names();
        if strategies.len() > 1 {
            return Err(format!(
                "environment variable '{}' sets more than one of value, from_field, from_service, template, value_map or generate: {}",
                raw.key,
                strategies.join(", ")
            ));
        }

        let strategy = if let Some(value) = raw.value {
            EnvStrategy::Literal(value.to_string())
        } else if let (Some(field), None, None) =
            (raw.from_field.clone(), &raw.from_service, &raw.value_map)
        {
            EnvStrategy::FromField(field)
        } else if let Some(service) = raw.from_service {
            let field = raw
                .from_field
                .unwrap_or_else(|| raw.key.to_ascii_lowercase());
            EnvStrategy::FromService { service, field }
        } else if let Some(template) = raw.template {
            EnvStrategy::Template(template)
        } else if let Some(map) = raw.value_map {
            let field = raw.from_field.ok_or_else(|| {
                format!(
                    "environment variable '{}' uses value_map without from_field",
                    raw.key
                )
            })?;
            EnvStrategy::ValueMap { field, map }
        } else if let Some(kind) = raw.generate {
            EnvStrategy::Generate {
                kind,
                length: raw.length.unwrap_or(DEFAULT_GENERATED_LENGTH),
            }
        } else {
            return Err(format!(
                "environment variable '{}' must define one of value, from_field, from_service, template, value_map or generate",
                raw.key
            ));
        };

        Ok(ComposeEnvSource {
            key: raw.key,
            strategy,
            condition: raw.condition,
        })
    }
}

impl From<ComposeEnvSource> for RawEnvSource {
    fn from(source: ComposeEnvSource) -> Self {
        let mut raw = RawEnvSource {
            key: source.key,
            condition: source.condition,
            ..Default::default()
        };
        match source.strategy {
            EnvStrategy::Literal(value) => raw.value = Some(FieldValue::String(value)),
            EnvStrategy::FromField(field) => raw.from_field = Some(field),
            EnvStrategy::FromService { service, field } => {
                raw.from_service = Some(service);
                raw.from_field = Some(field);
            }
            EnvStrategy::Template(template) => raw.template = Some(template),
            EnvStrategy::ValueMap { field, map } => {
                raw.from_field = Some(field);
                raw.value_map = Some(map);
            }
            EnvStrategy::Generate { kind, length } => {
                raw.generate = Some(kind);
                raw.length = Some(length);
            }
        }
        raw
    }
}

/// A container label template, optionally gated on a condition.
///
/// Documents write either a bare string or `{ label, condition }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawComposeLabel", into = "RawComposeLabel")]
pub struct ComposeLabel {
    pub text: String,
    pub condition: Option<Condition>,
}

impl ComposeLabel {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            condition: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawComposeLabel {
    Plain(String),
    Conditional { label: String, condition: Condition },
}

impl From<RawComposeLabel> for ComposeLabel {
    fn from(raw: RawComposeLabel) -> Self {
        match raw {
            RawComposeLabel::Plain(text) => ComposeLabel::new(text),
            RawComposeLabel::Conditional { label, condition } => ComposeLabel {
                text: label,
                condition: Some(condition),
            },
        }
    }
}

impl From<ComposeLabel> for RawComposeLabel {
    fn from(label: ComposeLabel) -> Self {
        match label.condition {
            None => RawComposeLabel::Plain(label.text),
            Some(condition) => RawComposeLabel::Conditional {
                label: label.text,
                condition,
            },
        }
    }
}

/// The `compose` section of a schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComposeTemplate {
    pub image: String,
    /// Template for the container name; defaults to the service id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default)]
    pub restart: RestartPolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<ComposeEnvSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<ComposeLabel>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub depends_on: IndexMap<String, DependsOnEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthcheckSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose: Option<ExposeSpec>,
}

impl ComposeTemplate {
    /// A template is usable when it names an image.
    pub fn is_usable(&self) -> bool {
        !self.image.trim().is_empty()
    }
}
