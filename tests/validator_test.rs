//! Cross-service validation against the bundled schemas.

use labctl::config::CoreConfig;
use labctl::schema::load_service_schemas;
use labctl::validation::port_collisions;
use labctl::{ConfigurationValidator, LabConfig, Parser, Profile, SchemaSet, ServiceConfig};
use std::path::Path;

fn bundled() -> SchemaSet {
    load_service_schemas(&Path::new(env!("CARGO_MANIFEST_DIR")).join("config/services"))
        .expect("bundled schemas must load")
}

fn base(profile: Profile) -> LabConfig {
    LabConfig::new(
        profile,
        CoreConfig {
            domain: "home.example.org".to_string(),
            email: "me@example.org".to_string(),
            timezone: "America/New_York".to_string(),
        },
    )
}

fn messages(findings: &[labctl::validation::Finding]) -> String {
    findings.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

// ============================================================================
// Example configuration
// ============================================================================

#[test]
fn example_configuration_is_valid() {
    let schemas = bundled();
    let mut config = Parser::new()
        .load_config(Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.example.yaml"))
        .expect("example config must parse");
    config.apply_schema_defaults(&schemas);

    assert!(config.validate_configuration().is_empty());
    assert!(config.validate_against_schemas(&schemas).is_empty());

    let report = ConfigurationValidator::with_schemas(&schemas).validate(&config);
    assert!(report.is_valid(), "errors:\n{}", messages(&report.errors));
    assert!(
        report.warnings.iter().any(|w| w.message.contains("privileged")),
        "traefik's port 80 should warn in dev: {}",
        messages(&report.warnings)
    );
}

// ============================================================================
// Core settings
// ============================================================================

#[test]
fn missing_core_settings_are_errors() {
    let mut config = base(Profile::Dev);
    config.core.domain.clear();
    config.core.email = "nobody".to_string();

    let report = ConfigurationValidator::new().validate(&config);
    let text = messages(&report.errors);
    assert!(text.contains("Domain is required"), "{}", text);
    assert!(text.contains("Invalid email format"), "{}", text);
}

#[test]
fn local_domain_in_prod_only_warns() {
    let mut config = base(Profile::Prod);
    config.core.domain = "homelab.local".to_string();

    let report = ConfigurationValidator::new().validate(&config);
    assert!(report.is_valid());
    assert!(report.has_warnings());
}

// ============================================================================
// Cross-service rules
// ============================================================================

#[test]
fn port_conflicts_name_every_claimant() {
    let mut config = base(Profile::Prod);
    config.set_service("grafana", ServiceConfig::enabled().with_value("port", 3000));
    config.set_service("gitea", ServiceConfig::enabled().with_value("web_port", 3000));
    config.set_service("prometheus", ServiceConfig::default().with_value("port", 3000));

    assert_eq!(
        port_collisions(&config),
        vec![(3000, vec!["grafana".to_string(), "gitea".to_string()])],
        "disabled services do not claim ports"
    );

    let report = ConfigurationValidator::new().validate(&config);
    assert!(messages(&report.errors).contains("Port 3000 conflict: used by services grafana, gitea"));
}

#[test]
fn declared_dependencies_must_be_enabled() {
    let mut config = base(Profile::Prod);
    config.set_service("nextcloud", ServiceConfig::enabled());
    config.set_service("postgresql", ServiceConfig::enabled());

    let report = ConfigurationValidator::new().validate(&config);
    assert!(
        messages(&report.errors).contains("Service 'nextcloud' requires dependencies: redis"),
        "{}",
        messages(&report.errors)
    );
}

#[test]
fn many_heavy_services_warn() {
    let mut config = base(Profile::Prod);
    for id in ["gitlab", "nextcloud", "monitoring", "postgresql", "redis"] {
        config.set_service(id, ServiceConfig::enabled());
    }

    let report = ConfigurationValidator::new().validate(&config);
    assert!(messages(&report.warnings).contains("8GB"), "{}", messages(&report.warnings));
}

// ============================================================================
// Schema-driven checks
// ============================================================================

#[test]
fn schema_constraints_apply_to_visible_fields() {
    let schemas = bundled();
    let mut config = base(Profile::Prod);
    config.set_service("postgresql", ServiceConfig::enabled().with_value("max_connections", 5));
    config.set_service("redis", ServiceConfig::enabled());
    // ldap_host is required but hidden while LDAP is off.
    config.set_service("gitlab", ServiceConfig::enabled().with_value("ldap_enabled", false));
    config.apply_schema_defaults(&schemas);

    let report = ConfigurationValidator::with_schemas(&schemas).validate(&config);
    let text = messages(&report.errors);
    assert!(text.contains("[postgresql.max_connections]"), "{}", text);
    assert!(!text.contains("ldap_host"), "hidden field was checked: {}", text);
}

#[test]
fn revealed_required_field_is_enforced() {
    let schemas = bundled();
    let mut config = base(Profile::Prod);
    config.set_service("postgresql", ServiceConfig::enabled());
    config.set_service("redis", ServiceConfig::enabled());
    config.set_service("gitlab", ServiceConfig::enabled().with_value("ldap_enabled", true));
    config.apply_schema_defaults(&schemas);

    let report = ConfigurationValidator::with_schemas(&schemas).validate(&config);
    let text = messages(&report.errors);
    assert!(text.contains("ldap_host"), "{}", text);
}

#[test]
fn service_rules_reject_bad_formats() {
    let mut config = base(Profile::Dev);
    config.set_service("redis", ServiceConfig::enabled().with_value("maxmemory", "lots"));
    config.set_service(
        "traefik",
        ServiceConfig::enabled().with_value("acme_environment", "qa"),
    );

    let report = ConfigurationValidator::new().validate(&config);
    let text = messages(&report.errors);
    assert!(text.contains("Invalid maxmemory format: lots"), "{}", text);
    assert!(text.contains("Invalid ACME environment: qa"), "{}", text);
}

#[test]
fn service_without_schema_warns() {
    let schemas = bundled();
    let mut config = base(Profile::Dev);
    config.set_service("jellyfin", ServiceConfig::enabled());

    let report = ConfigurationValidator::with_schemas(&schemas).validate(&config);
    assert!(report.is_valid());
    assert!(messages(&report.warnings).contains("[jellyfin] No schema found"));
}
