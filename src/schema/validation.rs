//! Schema checks.
//!
//! [`check_model`] returns the problems that make a document unusable and is
//! run by the loader; [`validate_service_schema`] is the advisory reference
//! check callers may run over an already loaded set.

use super::{EnvStrategy, FieldSchema, FieldType, Maturity, ServiceSchema};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

static SERVICE_ID_REGEX: OnceLock<Regex> = OnceLock::new();
static FIELD_KEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn service_id_regex() -> &'static Regex {
    SERVICE_ID_REGEX
        .get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static regex pattern is valid"))
}

fn field_key_regex() -> &'static Regex {
    FIELD_KEY_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("static regex pattern is valid")
    })
}

/// Identifiers every condition can see without declaring them.
pub const GLOBAL_CONTEXT_KEYS: &[&str] = &["domain", "email", "timezone", "profile"];

pub fn is_valid_service_id(id: &str) -> bool {
    service_id_regex().is_match(id)
}

/// Structural problems that make a schema document unusable.
pub fn check_model(schema: &ServiceSchema) -> Vec<String> {
    let mut issues = Vec::new();

    if !is_valid_service_id(&schema.id) {
        issues.push(format!(
            "service id '{}' must be lowercase alphanumeric with underscores, starting with a letter",
            schema.id
        ));
    }

    let enabled: Vec<&FieldSchema> = schema.fields.iter().filter(|f| f.key == "enabled").collect();
    match enabled.as_slice() {
        [] => issues.push("missing required 'enabled' field".to_string()),
        [field] if field.field_type != FieldType::Boolean => issues.push(format!(
            "'enabled' field must be boolean, found {}",
            field.field_type
        )),
        [_] => {}
        _ => {} // reported as a duplicate key below
    }

    let mut seen = HashSet::new();
    for field in &schema.fields {
        if !seen.insert(field.key.as_str()) {
            issues.push(format!("duplicate field key '{}'", field.key));
        }
        issues.extend(check_field(field));
    }

    for field in &schema.fields {
        for dep in &field.depends_on {
            if !schema.has_field(dep) {
                issues.push(format!(
                    "field '{}' depends_on unknown field '{}'",
                    field.key, dep
                ));
            }
        }
    }

    if let Some(compose) = &schema.compose {
        for env in &compose.environment {
            if let Some(field) = env.strategy.own_field() {
                if !schema.has_field(field) {
                    issues.push(format!(
                        "environment variable '{}' references unknown field '{}'",
                        env.key, field
                    ));
                }
            }
        }
    }

    for dep in &schema.dependencies {
        if !is_valid_service_id(dep) {
            issues.push(format!("invalid dependency name '{}'", dep));
        } else if *dep == schema.id {
            issues.push(format!("service '{}' cannot depend on itself", dep));
        }
    }

    issues
}

fn check_field(field: &FieldSchema) -> Vec<String> {
    let mut issues = Vec::new();
    let key = &field.key;

    if !field_key_regex().is_match(key) {
        issues.push(format!(
            "field key '{}' must start with a letter and contain only letters, digits and underscores",
            key
        ));
    }

    if let Some(pattern) = &field.validate_regex {
        if let Err(e) = Regex::new(pattern) {
            issues.push(format!("field '{}' has invalid validate_regex: {}", key, e));
        }
    }

    let is_selection = matches!(field.field_type, FieldType::Choice | FieldType::Multiselect);
    if is_selection && field.choices.as_ref().map_or(true, |c| c.is_empty()) {
        issues.push(format!(
            "field '{}' of type {} requires non-empty choices",
            key, field.field_type
        ));
    }

    if field.field_type != FieldType::Integer && (field.min.is_some() || field.max.is_some()) {
        issues.push(format!("field '{}': min/max only apply to integer fields", key));
    }

    if field.field_type != FieldType::Multiselect
        && (field.min_selections.is_some() || field.max_selections.is_some())
    {
        issues.push(format!(
            "field '{}': min_selections/max_selections only apply to multiselect fields",
            key
        ));
    }

    if let (Some(min), Some(max)) = (field.min, field.max) {
        if min > max {
            issues.push(format!("field '{}': min {} exceeds max {}", key, min, max));
        }
    }

    issues
}

/// Advisory reference check. Empty result means the schema is consistent.
pub fn validate_service_schema(schema: &ServiceSchema) -> Vec<String> {
    let mut issues = Vec::new();

    for field in &schema.fields {
        for (label, condition) in [("show_if", &field.show_if), ("hidden_if", &field.hidden_if)] {
            let Some(condition) = condition else { continue };
            if !condition.is_parsed() {
                issues.push(format!(
                    "Field '{}' has an unparseable {} expression '{}' (treated as always true)",
                    field.key, label, condition
                ));
                continue;
            }
            for ident in condition.identifiers() {
                if is_local_reference(ident) && !schema.has_field(ident) {
                    issues.push(format!(
                        "Field '{}' {} references unknown field '{}'",
                        field.key, label, ident
                    ));
                }
            }
        }

        for dep in &field.depends_on {
            if !schema.has_field(dep) {
                issues.push(format!(
                    "Field '{}' depends_on unknown field '{}'",
                    field.key, dep
                ));
            }
        }
    }

    if let Some(compose) = &schema.compose {
        for env in &compose.environment {
            if let EnvStrategy::FromField(field) | EnvStrategy::ValueMap { field, .. } = &env.strategy {
                if !schema.has_field(field) {
                    issues.push(format!(
                        "Environment variable '{}' references unknown field '{}'",
                        env.key, field
                    ));
                }
            }
            if let Some(condition) = &env.condition {
                for ident in condition.identifiers() {
                    if is_local_reference(ident) && !schema.has_field(ident) {
                        issues.push(format!(
                            "Environment variable '{}' condition references unknown field '{}'",
                            env.key, ident
                        ));
                    }
                }
            }
        }
        for label in &compose.labels {
            let Some(condition) = &label.condition else { continue };
            for ident in condition.identifiers() {
                if is_local_reference(ident) && !schema.has_field(ident) {
                    issues.push(format!(
                        "Label '{}' condition references unknown field '{}'",
                        label.text, ident
                    ));
                }
            }
        }
    }

    for dep in &schema.dependencies {
        if !is_valid_service_id(dep) {
            issues.push(format!("Invalid dependency name: '{}'", dep));
        }
    }

    issues
}

/// Undotted identifiers that are not global context keys must be fields.
fn is_local_reference(ident: &str) -> bool {
    !ident.contains('.') && !GLOBAL_CONTEXT_KEYS.contains(&ident)
}

/// Group service ids by category.
pub fn service_categories(schemas: &IndexMap<String, ServiceSchema>) -> BTreeMap<String, Vec<String>> {
    let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (id, schema) in schemas {
        categories
            .entry(schema.category.clone())
            .or_default()
            .push(id.clone());
    }
    for ids in categories.values_mut() {
        ids.sort();
    }
    categories
}

/// Keep schemas at or above `minimum` maturity.
pub fn filter_by_maturity(
    schemas: &IndexMap<String, ServiceSchema>,
    minimum: Maturity,
) -> IndexMap<String, ServiceSchema> {
    schemas
        .iter()
        .filter(|(_, s)| s.maturity >= minimum)
        .map(|(id, s)| (id.clone(), s.clone()))
        .collect()
}
