//! Smoke tests for the `labctl` binary against the bundled schemas and the
//! example configuration.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn labctl_binary() -> String {
    env!("CARGO_BIN_EXE_labctl").to_string()
}

fn root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn labctl(args: &[&str]) -> Output {
    Command::new(labctl_binary())
        .arg("--schemas")
        .arg(root().join("config/services"))
        .arg("--config")
        .arg(root().join("config/config.example.yaml"))
        .args(args)
        .env_remove("LABCTL_CONFIG")
        .env_remove("LABCTL_SCHEMAS")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run labctl")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// Help
// ============================================================================

#[test]
fn help_lists_commands() {
    let output = Command::new(labctl_binary())
        .arg("--help")
        .output()
        .expect("Failed to run labctl");

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Commands:"));
    for command in ["validate", "build", "resolve", "tree", "deploy", "stop"] {
        assert!(text.contains(command), "help is missing '{}'", command);
    }
}

#[test]
fn completions_need_no_files() {
    let output = Command::new(labctl_binary())
        .args(["--config", "/nonexistent/config.yaml", "completions", "bash"])
        .output()
        .expect("Failed to run labctl");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("labctl"));
}

// ============================================================================
// validate / build
// ============================================================================

#[test]
fn validate_example_configuration() {
    let output = labctl(&["validate"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("valid"));
}

#[test]
fn strict_validation_fails_on_warnings() {
    // traefik's port 80 is privileged in the dev profile.
    let output = labctl(&["validate", "--strict"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Hint:"), "stderr: {}", stderr(&output));
}

#[test]
fn build_writes_manifest_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().to_str().unwrap();

    let output = labctl(&["--quiet", "build", "--output", out_dir]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let manifest = std::fs::read_to_string(dir.path().join("docker-compose.yml")).unwrap();
    assert!(manifest.contains("nextcloud:"));
    assert!(manifest.contains("homelab"));
    assert!(!manifest.contains("pihole"));

    let env = std::fs::read_to_string(dir.path().join(".env")).unwrap();
    assert!(env.contains("POSTGRESQL_PASSWORD="));
    assert!(env.starts_with('#'), "env file starts with its header");

    // A second build backs up the first manifest and adds no new secrets.
    let again = labctl(&["--quiet", "build", "--output", out_dir]);
    assert!(again.status.success(), "stderr: {}", stderr(&again));
    let backups = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("docker-compose.bak."))
        .count();
    assert_eq!(backups, 1);
    assert_eq!(std::fs::read_to_string(dir.path().join(".env")).unwrap(), env);
}

#[test]
fn missing_config_is_reported_with_hint() {
    let output = Command::new(labctl_binary())
        .args(["--schemas"])
        .arg(root().join("config/services"))
        .args(["--config", "/nonexistent/config.yaml", "validate"])
        .output()
        .expect("Failed to run labctl");

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.starts_with("Error:"), "stderr: {}", err);
    assert!(err.contains("Hint:"), "stderr: {}", err);
}

// ============================================================================
// Graph queries
// ============================================================================

#[test]
fn resolve_json_is_in_start_order() {
    let output = labctl(&["resolve", "nextcloud", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let order: Vec<String> = serde_json::from_str(&stdout(&output)).expect("resolve --json prints an array");
    assert_eq!(order.len(), 3);
    assert_eq!(order.last().map(String::as_str), Some("nextcloud"));
    assert!(order.contains(&"postgresql".to_string()));
    assert!(order.contains(&"redis".to_string()));
}

#[test]
fn resolve_unknown_service_fails() {
    let output = labctl(&["resolve", "jellyfin"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("jellyfin"), "stderr: {}", err);
    assert!(err.contains("labctl services"), "stderr: {}", err);
}

#[test]
fn tree_renders_dependencies() {
    let output = labctl(&["tree", "nextcloud"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("Nextcloud (nextcloud)"), "{}", text);
    assert!(text.contains("postgresql"));
    assert!(text.contains("redis"));
}

#[test]
fn services_filters_by_maturity() {
    let output = labctl(&["services", "--min-maturity", "stable", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("\"redis\""));
    assert!(!text.contains("\"gitlab\""), "alpha services are filtered out");
    assert!(!text.contains("\"pihole\""), "beta services are filtered out");
}

#[test]
fn deploy_without_manifest_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = Path::new(dir.path()).join("docker-compose.yml");
    let output = Command::new(labctl_binary())
        .args(["deploy", "--compose-file"])
        .arg(&missing)
        .output()
        .expect("Failed to run labctl");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("labctl build"), "stderr: {}", stderr(&output));
}

#[test]
fn stop_without_manifest_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = Path::new(dir.path()).join("docker-compose.yml");
    let output = Command::new(labctl_binary())
        .args(["stop", "--volumes", "--compose-file"])
        .arg(&missing)
        .output()
        .expect("Failed to run labctl");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("labctl build"), "stderr: {}", stderr(&output));
}
