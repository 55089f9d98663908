//! `${...}` placeholder substitution for compose templates.
//!
//! Recognised forms:
//!
//! | Placeholder | Replacement |
//! |---|---|
//! | `${service}`, `${SERVICE_ID}` | service id |
//! | `${DOMAIN}`, `${EMAIL}`, `${TZ}`, `${TIMEZONE}` | core settings |
//! | `${ENV:VAR}` | `${VAR}`, resolved by the compose runner |
//! | `${from_field:name}` | field value, or a deferred `${SERVICE_NAME}` reference |
//! | `${generate:htpasswd:user_field:pass_field}` | basic-auth entry with `$` doubled |
//! | `${field}` | the service's own field value |
//!
//! Anything else is left untouched.

use super::environment::{env_key, EnvTable};
use crate::config::{CoreConfig, FieldValues};
use crate::schema::{FieldType, ServiceSchema};
use crate::secret::{htpasswd_entry, SecretGenerator};
use regex::{Captures, Regex};
use std::sync::OnceLock;

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex pattern is valid"))
}

const DEFAULT_SECRET_LENGTH: usize = 32;

/// Everything a substitution pass may read or record.
pub struct TemplateContext<'a> {
    pub service_id: &'a str,
    pub values: &'a FieldValues,
    pub core: &'a CoreConfig,
    pub schema: Option<&'a ServiceSchema>,
    pub env: &'a mut EnvTable,
    pub secrets: &'a dyn SecretGenerator,
}

impl TemplateContext<'_> {
    /// Rewrite every recognised placeholder in `template`.
    pub fn substitute(&mut self, template: &str) -> String {
        placeholder_regex()
            .replace_all(template, |caps: &Captures<'_>| {
                let whole = caps[0].to_string();
                self.resolve(&caps[1]).unwrap_or(whole)
            })
            .into_owned()
    }

    fn resolve(&mut self, name: &str) -> Option<String> {
        match name {
            "service" | "SERVICE_ID" => return Some(self.service_id.to_string()),
            "DOMAIN" => return Some(self.core.domain.clone()),
            "EMAIL" => return Some(self.core.email.clone()),
            "TZ" | "TIMEZONE" => return Some(self.core.timezone.clone()),
            _ => {}
        }

        if let Some(var) = name.strip_prefix("ENV:") {
            return Some(format!("${{{}}}", var));
        }
        if let Some(field) = name.strip_prefix("from_field:") {
            return Some(self.field_or_reference(field));
        }
        if let Some(spec) = name.strip_prefix("generate:htpasswd:") {
            return self.htpasswd(spec);
        }

        self.field_value(name)
    }

    fn field_value(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    }

    /// The field's own value, else a `${...}` reference to where the value
    /// lives in the environment. A generated password field without a value
    /// gets its secret created here.
    pub fn field_or_reference(&mut self, field: &str) -> String {
        if let Some(value) = self.field_value(field) {
            return value;
        }

        let global = field.to_ascii_uppercase();
        if self.env.contains(&global) {
            return format!("${{{}}}", global);
        }

        let key = env_key(self.service_id, field);
        if let Some(schema_field) = self
            .schema
            .and_then(|s| s.field(field))
            .filter(|f| f.field_type == FieldType::Password && f.generate)
        {
            let length = schema_field.length.unwrap_or(DEFAULT_SECRET_LENGTH);
            let secrets = self.secrets;
            self.env.get_or_generate(&key, || secrets.generate(length, true));
        }
        format!("${{{}}}", key)
    }

    fn htpasswd(&mut self, spec: &str) -> Option<String> {
        let (user_field, pass_field) = spec.split_once(':')?;
        let user = self
            .field_value(user_field)
            .unwrap_or_else(|| user_field.to_string());
        let password = match self.field_value(pass_field) {
            Some(password) => password,
            None => {
                let key = env_key(self.service_id, pass_field);
                let length = self
                    .schema
                    .and_then(|s| s.field(pass_field))
                    .and_then(|f| f.length)
                    .unwrap_or(DEFAULT_SECRET_LENGTH);
                let secrets = self.secrets;
                self.env
                    .get_or_generate(&key, || secrets.generate(length, true))
                    .to_string()
            }
        };
        match htpasswd_entry(self.secrets, &user, &password) {
            Ok(entry) => Some(entry.replace('$', "$$")),
            Err(e) => {
                tracing::warn!("Service '{}': cannot hash {}: {}", self.service_id, pass_field, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldValue;

    struct FixedSecrets;

    impl SecretGenerator for FixedSecrets {
        fn generate(&self, length: usize, _complexity: bool) -> String {
            "x".repeat(length)
        }

        fn generate_hex(&self, length: usize) -> String {
            "a".repeat(length)
        }
    }

    fn core() -> CoreConfig {
        CoreConfig {
            domain: "example.com".to_string(),
            email: "ops@example.com".to_string(),
            timezone: "Europe/Paris".to_string(),
        }
    }

    fn run(template: &str, values: &FieldValues, env: &mut EnvTable) -> String {
        let core = core();
        let mut ctx = TemplateContext {
            service_id: "grafana",
            values,
            core: &core,
            schema: None,
            env,
            secrets: &FixedSecrets,
        };
        ctx.substitute(template)
    }

    #[test]
    fn reserved_placeholders() {
        let mut env = EnvTable::default();
        let out = run(
            "${service}.${DOMAIN} ${SERVICE_ID} ${EMAIL} ${TZ}",
            &FieldValues::new(),
            &mut env,
        );
        assert_eq!(out, "grafana.example.com grafana ops@example.com Europe/Paris");
    }

    #[test]
    fn field_values_and_unknowns() {
        let mut values = FieldValues::new();
        values.insert("port".to_string(), FieldValue::Integer(3000));
        let mut env = EnvTable::default();
        let out = run("${port}:3000 ${UNKNOWN} ${ENV:GF_SECRET}", &values, &mut env);
        assert_eq!(out, "3000:3000 ${UNKNOWN} ${GF_SECRET}");
    }

    #[test]
    fn from_field_falls_back_to_reference() {
        let mut values = FieldValues::new();
        values.insert("admin_user".to_string(), FieldValue::from("root"));
        let mut env = EnvTable::default();
        let out = run("${from_field:admin_user}/${from_field:admin_password}", &values, &mut env);
        assert_eq!(out, "root/${GRAFANA_ADMIN_PASSWORD}");
        assert!(env.generated().is_empty(), "no schema, nothing generated");
    }

    #[test]
    fn htpasswd_doubles_dollars() {
        let mut values = FieldValues::new();
        values.insert("dashboard_user".to_string(), FieldValue::from("admin"));
        values.insert("dashboard_password".to_string(), FieldValue::from("pw"));
        let mut env = EnvTable::default();
        let out = run("${generate:htpasswd:dashboard_user:dashboard_password}", &values, &mut env);
        assert!(out.starts_with("admin:$$2y$$10$$"), "{}", out);
        assert!(!out.contains("$$$"));

        let entry = out.replace("$$", "$");
        let (_, hash) = entry.split_once(':').unwrap();
        assert!(bcrypt::verify("pw", hash).unwrap());
    }

    #[test]
    fn htpasswd_generates_missing_password() {
        let mut env = EnvTable::default();
        run("${generate:htpasswd:admin:dashboard_password}", &FieldValues::new(), &mut env);
        assert_eq!(env.get("GRAFANA_DASHBOARD_PASSWORD").map(str::len), Some(32));
    }
}
