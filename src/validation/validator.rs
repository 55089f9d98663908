use super::formats::{is_plausible_timezone, is_valid_domain, is_valid_email};
use super::rules;
use crate::config::{FieldValue, FieldValues, LabConfig, Profile};
use crate::schema::SchemaSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Field keys whose numeric values are host ports.
pub const PORT_FIELDS: &[&str] = &["port", "web_port", "http_port", "external_port", "dns_port"];

/// Services that need companions to run at all.
pub const DECLARED_DEPENDENCIES: &[(&str, &[&str])] = &[
    ("nextcloud", &["postgresql", "redis"]),
    ("gitlab", &["postgresql", "redis"]),
];

/// Services with a large memory/CPU footprint.
pub const HEAVY_SERVICES: &[&str] = &["gitlab", "nextcloud", "monitoring"];

const MAX_HEAVY_SERVICES: usize = 2;

/// One validation error or warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Finding {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            service: None,
            field: None,
        }
    }

    pub fn service(mut self, service: &str) -> Self {
        self.service = Some(service.to_string());
        self
    }

    pub fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.service, &self.field) {
            (Some(service), Some(field)) => write!(f, "[{}.{}] {}", service, field, self.message),
            (Some(service), None) => write!(f, "[{}] {}", service, self.message),
            (None, Some(field)) => write!(f, "[{}] {}", field, self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Accumulated findings of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationReport {
    pub fn error(&mut self, finding: Finding) {
        self.errors.push(finding);
    }

    pub fn warning(&mut self, finding: Finding) {
        self.warnings.push(finding);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Finding>, Vec<Finding>) {
        (self.errors, self.warnings)
    }
}

/// Cross-checks a fully populated configuration.
///
/// Never fails: every finding is returned as an error or a warning. Whether
/// warnings block anything is up to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationValidator<'a> {
    schemas: Option<&'a SchemaSet>,
}

impl<'a> ConfigurationValidator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also check configured values against their schema field constraints.
    pub fn with_schemas(schemas: &'a SchemaSet) -> Self {
        Self {
            schemas: Some(schemas),
        }
    }

    pub fn validate(&self, config: &LabConfig) -> ValidationReport {
        let mut report = ValidationReport::default();

        check_core(config, &mut report);

        for (id, service) in config.get_enabled_services() {
            let values = service.effective_values(config.profile);
            check_ports(id, &values, config.profile, &mut report);
            rules::check_service(id, &values, config.profile, &mut report);
            if let Some(schemas) = self.schemas {
                check_against_schema(config, id, &values, schemas, &mut report);
            }
        }

        for (port, services) in port_collisions(config) {
            report.error(Finding::new(format!(
                "Port {} conflict: used by services {}",
                port,
                services.join(", ")
            )));
        }

        check_declared_dependencies(config, &mut report);
        check_resource_pressure(config, &mut report);

        tracing::debug!(
            "Validation finished with {} error(s) and {} warning(s)",
            report.errors.len(),
            report.warnings.len()
        );
        report
    }
}

fn check_core(config: &LabConfig, report: &mut ValidationReport) {
    let core = &config.core;

    if core.domain.is_empty() {
        report.error(Finding::new("Domain is required").field("core.domain"));
    } else if !is_valid_domain(&core.domain) {
        report.error(Finding::new(format!("Invalid domain format: {}", core.domain)).field("core.domain"));
    } else if core.domain.ends_with(".local") && config.profile.is_prod() {
        report.warning(
            Finding::new("Using a .local domain with the prod profile; public certificates cannot be issued")
                .field("core.domain"),
        );
    }

    if core.email.is_empty() {
        report.error(Finding::new("Admin email is required").field("core.email"));
    } else if !is_valid_email(&core.email) {
        report.error(Finding::new(format!("Invalid email format: {}", core.email)).field("core.email"));
    }

    if !is_plausible_timezone(&core.timezone) {
        report.warning(
            Finding::new(format!("Timezone '{}' does not look like an IANA zone name", core.timezone))
                .field("core.timezone"),
        );
    }
}

fn check_ports(id: &str, values: &FieldValues, profile: Profile, report: &mut ValidationReport) {
    for key in PORT_FIELDS {
        let Some(value) = values.get(*key).filter(|v| !v.is_empty()) else {
            continue;
        };
        match value.as_i64() {
            None => report.error(
                Finding::new(format!("Port must be a number, got '{}'", value))
                    .service(id)
                    .field(key),
            ),
            Some(port) if !(1..=65535).contains(&port) => report.error(
                Finding::new(format!("Port {} is out of range (1-65535)", port))
                    .service(id)
                    .field(key),
            ),
            Some(port) if port < 1024 && profile == Profile::Dev => report.warning(
                Finding::new(format!(
                    "Port {} is privileged and may need root in the dev profile",
                    port
                ))
                .service(id)
                .field(key),
            ),
            Some(_) => {}
        }
    }
}

fn check_against_schema(
    config: &LabConfig,
    id: &str,
    values: &FieldValues,
    schemas: &SchemaSet,
    report: &mut ValidationReport,
) {
    let Some(schema) = schemas.get(id) else {
        report.warning(
            Finding::new("No schema found; a minimal legacy definition will be generated").service(id),
        );
        return;
    };

    let ctx = config.condition_context_with_schemas(id, schemas);
    for field in &schema.fields {
        if field.key == "enabled" || !field.is_visible(&ctx) {
            continue;
        }
        let value = values.get(&field.key).cloned().unwrap_or(FieldValue::Null);
        if let Err(message) = field.check_value(&value) {
            report.error(Finding::new(message).service(id).field(&field.key));
        }
    }
}

/// Ports claimed by more than one enabled service, with the claimants in
/// configuration order.
pub fn port_collisions(config: &LabConfig) -> Vec<(i64, Vec<String>)> {
    let mut claims: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for (id, service) in config.get_enabled_services() {
        let values = service.effective_values(config.profile);
        for key in PORT_FIELDS {
            if let Some(port) = values.get(*key).and_then(FieldValue::as_i64) {
                let owners = claims.entry(port).or_default();
                if !owners.iter().any(|o| o == id) {
                    owners.push(id.to_string());
                }
            }
        }
    }
    claims
        .into_iter()
        .filter(|(_, owners)| owners.len() > 1)
        .collect()
}

fn check_declared_dependencies(config: &LabConfig, report: &mut ValidationReport) {
    for (service, required) in DECLARED_DEPENDENCIES {
        if !config.is_enabled(service) {
            continue;
        }
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|dep| !config.is_enabled(dep))
            .collect();
        if !missing.is_empty() {
            report.error(
                Finding::new(format!(
                    "Service '{}' requires dependencies: {}",
                    service,
                    missing.join(", ")
                ))
                .service(service),
            );
        }
    }
}

fn check_resource_pressure(config: &LabConfig, report: &mut ValidationReport) {
    let heavy: Vec<&str> = HEAVY_SERVICES
        .iter()
        .copied()
        .filter(|s| config.is_enabled(s))
        .collect();
    if heavy.len() > MAX_HEAVY_SERVICES {
        report.warning(Finding::new(format!(
            "Multiple resource-intensive services enabled ({}); at least 8GB RAM and 4 CPU cores are recommended",
            heavy.join(", ")
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoreConfig, ServiceConfig};

    fn base(profile: Profile) -> LabConfig {
        LabConfig::new(
            profile,
            CoreConfig {
                domain: "example.com".to_string(),
                email: "admin@example.com".to_string(),
                timezone: "Europe/Berlin".to_string(),
            },
        )
    }

    #[test]
    fn clean_config_has_no_findings() {
        let report = ConfigurationValidator::new().validate(&base(Profile::Prod));
        assert!(report.is_valid());
        assert!(!report.has_warnings());
    }

    #[test]
    fn core_format_errors() {
        let mut config = base(Profile::Dev);
        config.core.domain = "not a domain".to_string();
        config.core.email = "nope".to_string();
        config.core.timezone = "Mars".to_string();
        let report = ConfigurationValidator::new().validate(&config);
        assert_eq!(report.errors.len(), 2, "{:?}", report.errors);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.errors[0].field.as_deref(), Some("core.domain"));
    }

    #[test]
    fn local_domain_in_prod_is_a_warning() {
        let mut config = base(Profile::Prod);
        config.core.domain = "lab.local".to_string();
        let report = ConfigurationValidator::new().validate(&config);
        assert!(report.is_valid());
        assert!(report.warnings[0].message.contains(".local"));

        config.profile = Profile::Dev;
        assert!(!ConfigurationValidator::new().validate(&config).has_warnings());
    }

    #[test]
    fn port_ranges() {
        let mut config = base(Profile::Dev);
        config.set_service("grafana", ServiceConfig::enabled().with_value("port", 70000));
        config.set_service("pihole", ServiceConfig::enabled().with_value("web_port", 80));
        let report = ConfigurationValidator::new().validate(&config);
        assert!(report.errors.iter().any(|e| e.message.contains("out of range")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.message.contains("privileged") && w.service.as_deref() == Some("pihole")));
    }

    #[test]
    fn port_collision_names_both_services() {
        let mut config = base(Profile::Prod);
        config.set_service("postgresql", ServiceConfig::enabled().with_value("port", 5432));
        config.set_service("timescale", ServiceConfig::enabled().with_value("port", 5432));
        let report = ConfigurationValidator::new().validate(&config);
        let collision = report
            .errors
            .iter()
            .find(|e| e.message.contains("conflict"))
            .expect("collision error");
        assert!(collision.message.contains("postgresql"));
        assert!(collision.message.contains("timescale"));

        config.set_service("timescale", ServiceConfig::enabled().with_value("port", 5433));
        let report = ConfigurationValidator::new().validate(&config);
        assert!(!report.errors.iter().any(|e| e.message.contains("conflict")));
    }

    #[test]
    fn disabled_services_do_not_collide() {
        let mut config = base(Profile::Prod);
        config.set_service("a", ServiceConfig::enabled().with_value("port", 8080));
        config.set_service("b", ServiceConfig::default().with_value("port", 8080));
        assert!(port_collisions(&config).is_empty());
    }

    #[test]
    fn declared_dependencies() {
        let mut config = base(Profile::Prod);
        config.set_service("nextcloud", ServiceConfig::enabled());
        let report = ConfigurationValidator::new().validate(&config);
        assert!(report
            .errors
            .iter()
            .any(|e| e.message == "Service 'nextcloud' requires dependencies: postgresql, redis"));

        config.set_service("postgresql", ServiceConfig::enabled());
        config.set_service("redis", ServiceConfig::enabled());
        let report = ConfigurationValidator::new().validate(&config);
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn heavy_services_warning() {
        let mut config = base(Profile::Prod);
        for id in ["postgresql", "redis", "gitlab", "nextcloud"] {
            config.set_service(id, ServiceConfig::enabled());
        }
        assert!(!ConfigurationValidator::new().validate(&config).has_warnings());

        config.set_service("monitoring", ServiceConfig::enabled());
        let report = ConfigurationValidator::new().validate(&config);
        assert!(report.warnings.iter().any(|w| w.message.contains("8GB")));
    }

    #[test]
    fn finding_display() {
        let finding = Finding::new("bad").service("redis").field("maxmemory");
        assert_eq!(finding.to_string(), "[redis.maxmemory] bad");
        assert_eq!(Finding::new("plain").to_string(), "plain");
    }
}
