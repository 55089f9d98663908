//! The bundled schemas and example configuration taken all the way to a
//! manifest and `.env` on disk.

use labctl::envfile::{load_env_file, write_env_file};
use labctl::schema::{load_service_schemas, DependsOnCondition};
use labctl::secret::SecretGenerator;
use labctl::{ConfigurationValidator, LabConfig, Manifest, ManifestBuilder, Parser, SchemaSet, ServiceConfig};
use std::path::{Path, PathBuf};

struct FixedSecrets;

impl SecretGenerator for FixedSecrets {
    fn generate(&self, length: usize, complexity: bool) -> String {
        let base = if complexity { "Aa1!" } else { "abc" };
        base.repeat(length).chars().take(length).collect()
    }

    fn generate_hex(&self, length: usize) -> String {
        "f".repeat(length)
    }
}

fn root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn load() -> (SchemaSet, LabConfig) {
    let schemas = load_service_schemas(&root().join("config/services")).expect("bundled schemas must load");
    let mut config = Parser::new()
        .load_config(root().join("config/config.example.yaml"))
        .expect("example config must parse");
    config.apply_schema_defaults(&schemas);
    (schemas, config)
}

fn position(manifest: &Manifest, id: &str) -> usize {
    manifest
        .services
        .get_index_of(id)
        .unwrap_or_else(|| panic!("'{}' missing from manifest", id))
}

#[test]
fn example_lab_synthesizes_without_degradation() {
    let (schemas, config) = load();
    assert!(ConfigurationValidator::with_schemas(&schemas).validate(&config).is_valid());

    let output = ManifestBuilder::new(&schemas)
        .with_secret_generator(&FixedSecrets)
        .build(&config)
        .unwrap();
    assert!(output.degradations.is_empty(), "{:?}", output.degradations);

    let manifest = &output.manifest;
    let ids: Vec<&str> = manifest.services.keys().map(String::as_str).collect();
    for id in ["traefik", "postgresql", "redis", "nextcloud", "prometheus", "grafana"] {
        assert!(ids.contains(&id), "{} missing from {:?}", id, ids);
    }
    assert!(!ids.contains(&"pihole"), "disabled service was synthesized");

    assert!(position(manifest, "postgresql") < position(manifest, "nextcloud"));
    assert!(position(manifest, "redis") < position(manifest, "nextcloud"));
    assert!(position(manifest, "prometheus") < position(manifest, "grafana"));

    assert!(manifest.networks.contains_key("homelab"));
    for volume in ["postgresql_data", "redis_data", "nextcloud_data", "grafana_data", "traefik_letsencrypt"] {
        assert!(manifest.volumes.contains_key(volume), "volume {} not declared", volume);
    }
    assert!(
        !manifest.volumes.keys().any(|v| v.starts_with('.') || v.starts_with('/')),
        "bind mounts must not be declared as volumes"
    );
}

#[test]
fn nextcloud_is_wired_to_its_backends() {
    let (schemas, config) = load();
    let output = ManifestBuilder::new(&schemas)
        .with_secret_generator(&FixedSecrets)
        .build(&config)
        .unwrap();
    let nextcloud = &output.manifest.services["nextcloud"];

    assert_eq!(nextcloud.image, "nextcloud:29-apache");
    assert_eq!(nextcloud.env("POSTGRES_HOST"), Some("postgresql"));
    assert_eq!(nextcloud.env("POSTGRES_PASSWORD"), Some("${POSTGRESQL_PASSWORD}"));
    assert_eq!(nextcloud.env("REDIS_HOST_PASSWORD"), Some("${REDIS_PASSWORD}"));
    assert_eq!(nextcloud.env("NEXTCLOUD_ADMIN_USER"), Some("admin"));
    assert_eq!(nextcloud.env("NEXTCLOUD_ADMIN_PASSWORD"), Some("${NEXTCLOUD_ADMIN_PASSWORD}"));
    assert_eq!(nextcloud.env("NEXTCLOUD_TRUSTED_DOMAINS"), Some("nextcloud.lab.example.com"));
    assert_eq!(nextcloud.env("PHP_UPLOAD_LIMIT"), Some("512M"));
    assert_eq!(nextcloud.env("OVERWRITEPROTOCOL"), Some("https"));

    assert_eq!(nextcloud.depends_on["postgresql"].condition, DependsOnCondition::ServiceHealthy);
    assert_eq!(nextcloud.depends_on["redis"].condition, DependsOnCondition::ServiceHealthy);

    assert!(nextcloud
        .labels
        .contains(&"traefik.http.routers.nextcloud.rule=Host(`nextcloud.lab.example.com`)".to_string()));
    assert!(nextcloud
        .labels
        .contains(&"traefik.http.services.nextcloud.loadbalancer.server.port=80".to_string()));
    assert!(
        !output.manifest.services["traefik"]
            .labels
            .iter()
            .any(|l| l.starts_with("traefik.http.routers.traefik.")),
        "the proxy does not route to itself"
    );

    let secrets = &output.secrets;
    assert_eq!(secrets["POSTGRESQL_PASSWORD"].len(), 32);
    assert_eq!(secrets["REDIS_PASSWORD"].len(), 32);
    assert_eq!(secrets["NEXTCLOUD_ADMIN_PASSWORD"], "Aa1!".repeat(6));
    assert_eq!(secrets["POSTGRESQL_USERNAME"], "postgres", "from_service values are exported");
}

#[test]
fn existing_env_file_keeps_rebuilds_stable() {
    let (schemas, config) = load();
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join(".env");

    let first = ManifestBuilder::new(&schemas).build(&config).unwrap();
    let written = write_env_file(&env_path, &first.secrets).unwrap();
    assert_eq!(written.len(), first.secrets.len());

    let known = load_env_file(&env_path);
    assert_eq!(known, first.secrets, "secrets survive the .env round trip");

    let second = ManifestBuilder::new(&schemas)
        .with_known_env(known)
        .build(&config)
        .unwrap();
    assert!(second.secrets.is_empty(), "nothing new to persist: {:?}", second.secrets.keys());
    assert_eq!(
        first.manifest.services["nextcloud"].environment,
        second.manifest.services["nextcloud"].environment
    );
}

#[test]
fn manifest_written_to_disk_parses_back() {
    let (schemas, config) = load();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docker-compose.yml");

    let output = ManifestBuilder::new(&schemas)
        .with_secret_generator(&FixedSecrets)
        .build(&config)
        .unwrap();
    output.manifest.write_to(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let parsed: Manifest = serde_yaml::from_str(&text).unwrap();
    assert_eq!(parsed.services.keys().collect::<Vec<_>>(), output.manifest.services.keys().collect::<Vec<_>>());
    assert!(!text.contains("Aa1!"), "secrets belong in .env, not the manifest");
    assert!(Path::new(&path).exists());
}

#[test]
fn traefik_dashboard_auth_follows_the_dashboard_flag() {
    let (schemas, mut config) = load();
    let auth_label = "traefik.http.middlewares.dashboard-auth.basicauth.users=";

    let output = ManifestBuilder::new(&schemas)
        .with_secret_generator(&FixedSecrets)
        .build(&config)
        .unwrap();
    let traefik = &output.manifest.services["traefik"];
    let users = traefik
        .labels
        .iter()
        .find_map(|l| l.strip_prefix(auth_label))
        .expect("dashboard is on in the example config");
    let entry = users.replace("$$", "$");
    let (user, hash) = entry.split_once(':').unwrap();
    assert_eq!(user, "admin");
    assert!(bcrypt::verify("Aa1!".repeat(6), hash).unwrap());
    assert_eq!(output.secrets["TRAEFIK_DASHBOARD_PASSWORD"], "Aa1!".repeat(6));
    assert!(traefik
        .labels
        .contains(&"traefik.http.routers.dashboard.service=api@internal".to_string()));

    config.set_service("traefik", ServiceConfig::enabled().with_value("dashboard", false));
    config.apply_schema_defaults(&schemas);
    let output = ManifestBuilder::new(&schemas)
        .with_secret_generator(&FixedSecrets)
        .build(&config)
        .unwrap();
    let traefik = &output.manifest.services["traefik"];
    assert!(!traefik.labels.iter().any(|l| l.contains("dashboard")), "{:?}", traefik.labels);
    assert!(!output.secrets.contains_key("TRAEFIK_DASHBOARD_PASSWORD"));
}
