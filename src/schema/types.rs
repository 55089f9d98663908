//! Service schema model.

use super::{ComposeTemplate, Condition, ConditionContext};
use crate::config::{FieldValue, FieldValues, Profile};
use indexmap::IndexSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Password,
    Boolean,
    Integer,
    Choice,
    Multiselect,
    Textarea,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldType::String => "string",
            FieldType::Password => "password",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Choice => "choice",
            FieldType::Multiselect => "multiselect",
            FieldType::Textarea => "textarea",
        })
    }
}

/// Service maturity. Ordered from least to most mature.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Maturity {
    Alpha,
    Beta,
    #[default]
    Stable,
}

impl fmt::Display for Maturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Maturity::Alpha => "alpha",
            Maturity::Beta => "beta",
            Maturity::Stable => "stable",
        })
    }
}

impl std::str::FromStr for Maturity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alpha" => Ok(Maturity::Alpha),
            "beta" => Ok(Maturity::Beta),
            "stable" => Ok(Maturity::Stable),
            other => Err(format!("unknown maturity '{}'", other)),
        }
    }
}

/// One configurable field of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSchema {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    // string / password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_regex: Option<String>,

    // integer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,

    // choice / multiselect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,

    // password
    #[serde(default)]
    pub generate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_if: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl FieldSchema {
    /// Whether the field should be offered given the current context.
    pub fn is_visible(&self, ctx: &ConditionContext) -> bool {
        let shown = self.show_if.as_ref().map_or(true, |c| c.evaluate(ctx));
        let hidden = self.hidden_if.as_ref().is_some_and(|c| c.evaluate(ctx));
        shown && !hidden
    }

    /// Check a configured value against this field's constraints.
    pub fn check_value(&self, value: &FieldValue) -> Result<(), String> {
        if value.is_empty() {
            if self.required && !(self.field_type == FieldType::Password && self.generate) {
                return Err(format!("'{}' is required", self.key));
            }
            return Ok(());
        }

        match self.field_type {
            FieldType::Boolean => {
                value
                    .as_bool()
                    .ok_or_else(|| format!("'{}' must be true or false", self.key))?;
            }
            FieldType::Integer => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| format!("'{}' must be an integer, got '{}'", self.key, value))?;
                if let Some(min) = self.min {
                    if n < min {
                        return Err(format!("'{}' must be at least {}, got {}", self.key, min, n));
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        return Err(format!("'{}' must be at most {}, got {}", self.key, max, n));
                    }
                }
            }
            FieldType::String | FieldType::Password | FieldType::Textarea => {
                let text = value.to_string();
                let len = text.chars().count();
                if let Some(min) = self.min_length {
                    if len < min {
                        return Err(format!("'{}' must be at least {} characters", self.key, min));
                    }
                }
                if let Some(max) = self.max_length {
                    if len > max {
                        return Err(format!("'{}' must be at most {} characters", self.key, max));
                    }
                }
                if let Some(pattern) = &self.validate_regex {
                    let re = Regex::new(pattern)
                        .map_err(|e| format!("'{}' has an invalid pattern: {}", self.key, e))?;
                    if !re.is_match(&text) {
                        return Err(format!("'{}' does not match pattern {}", self.key, pattern));
                    }
                }
            }
            FieldType::Choice => {
                let text = value.to_string();
                let choices = self.choices.as_deref().unwrap_or_default();
                if !choices.iter().any(|c| *c == text) {
                    return Err(format!(
                        "'{}' must be one of: {} (got '{}')",
                        self.key,
                        choices.join(", "),
                        text
                    ));
                }
            }
            FieldType::Multiselect => {
                let selected: Vec<String> = match value {
                    FieldValue::List(items) => items.clone(),
                    other => other
                        .to_string()
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                };
                let choices = self.choices.as_deref().unwrap_or_default();
                if let Some(bad) = selected.iter().find(|s| !choices.contains(s)) {
                    return Err(format!("'{}' has unknown selection '{}'", self.key, bad));
                }
                if let Some(min) = self.min_selections {
                    if selected.len() < min {
                        return Err(format!("'{}' needs at least {} selections", self.key, min));
                    }
                }
                if let Some(max) = self.max_selections {
                    if selected.len() > max {
                        return Err(format!("'{}' allows at most {} selections", self.key, max));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Per-profile default field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDefaults {
    #[serde(default, skip_serializing_if = "FieldValues::is_empty")]
    pub dev: FieldValues,
    #[serde(default, skip_serializing_if = "FieldValues::is_empty")]
    pub prod: FieldValues,
}

impl ServiceDefaults {
    pub fn for_profile(&self, profile: Profile) -> &FieldValues {
        match profile {
            Profile::Dev => &self.dev,
            Profile::Prod => &self.prod,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dev.is_empty() && self.prod.is_empty()
    }
}

fn default_category() -> String {
    "Other".to_string()
}

/// Immutable definition of one service, loaded from a schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSchema {
    pub id: String,
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub maturity: Maturity,
    #[serde(default)]
    pub dependencies: IndexSet<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<ComposeTemplate>,
    #[serde(default, skip_serializing_if = "ServiceDefaults::is_empty")]
    pub defaults: ServiceDefaults,
}

impl ServiceSchema {
    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// The compose template, if present and naming an image.
    pub fn usable_compose(&self) -> Option<&ComposeTemplate> {
        self.compose.as_ref().filter(|c| c.is_usable())
    }

    /// Defaults for `profile`, layered over each field's own default.
    pub fn default_values(&self, profile: Profile) -> FieldValues {
        let mut values: FieldValues = self
            .fields
            .iter()
            .filter_map(|f| f.default.clone().map(|d| (f.key.clone(), d)))
            .collect();
        for (key, value) in self.defaults.for_profile(profile) {
            values.insert(key.clone(), value.clone());
        }
        values
    }
}
