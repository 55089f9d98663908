use super::{FieldValue, LabConfig, CONFIG_VERSION};
use crate::error::{Error, Result};
use crate::schema::SchemaSet;
use crate::validation::formats::{is_valid_domain, is_valid_email};
use crate::validation::port_collisions;

impl LabConfig {
    /// Structural self-check: required core settings and host port uniqueness.
    ///
    /// Returns every problem found; an empty list means the configuration is
    /// usable for synthesis.
    pub fn validate_configuration(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.version > CONFIG_VERSION {
            errors.push(format!(
                "Config version {} is newer than supported version {}",
                self.version, CONFIG_VERSION
            ));
        }

        if self.core.domain.is_empty() {
            errors.push("core.domain is required".to_string());
        } else if !is_valid_domain(&self.core.domain) {
            errors.push(format!("core.domain '{}' is not a valid domain", self.core.domain));
        }

        if self.core.email.is_empty() {
            errors.push("core.email is required".to_string());
        } else if !is_valid_email(&self.core.email) {
            errors.push(format!("core.email '{}' is not a valid email address", self.core.email));
        }

        for (port, services) in port_collisions(self) {
            errors.push(format!(
                "Port {} conflict: used by services {}",
                port,
                services.join(", ")
            ));
        }

        errors
    }

    /// Check enabled services' visible field values against their schemas'
    /// constraints. Services without a schema are skipped.
    pub fn validate_against_schemas(&self, schemas: &SchemaSet) -> Vec<String> {
        let mut errors = Vec::new();
        for (id, service) in self.get_enabled_services() {
            let Some(schema) = schemas.get(id) else {
                continue;
            };
            let values = service.effective_values(self.profile);
            let ctx = self.condition_context_with_schemas(id, schemas);
            for field in schema.fields.iter().filter(|f| f.key != "enabled" && f.is_visible(&ctx)) {
                let value = values.get(&field.key).cloned().unwrap_or(FieldValue::Null);
                if let Err(message) = field.check_value(&value) {
                    errors.push(format!("{}.{}: {}", id, field.key, message));
                }
            }
        }
        errors
    }

    /// [`validate_configuration`](Self::validate_configuration) as a `Result`.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate_configuration();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigurationValidation { errors })
        }
    }
}
