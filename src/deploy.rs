//! Hand-off of a written manifest to the container runtime.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

/// Text reported back by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait DeploymentRunner: Send + Sync {
    /// Create and start `services` (all when empty) from the manifest.
    async fn up(&self, manifest: &Path, services: &[String], detach: bool) -> Result<DeployReport>;

    /// Stop `services`, or tear down everything the manifest defines when
    /// empty. `remove_volumes` also drops named volumes on a full teardown.
    async fn down(&self, manifest: &Path, services: &[String], remove_volumes: bool) -> Result<DeployReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComposeCommand {
    V2, // docker compose
    V1, // docker-compose
}

static COMPOSE_COMMAND: OnceCell<ComposeCommand> = OnceCell::const_new();

impl ComposeCommand {
    /// Detect which docker compose command is available
    async fn detect() -> Result<ComposeCommand> {
        let v2_check = tokio::process::Command::new("docker")
            .args(["compose", "version"])
            .output()
            .await;

        if let Ok(output) = v2_check {
            if output.status.success() {
                return Ok(ComposeCommand::V2);
            }
        }

        let v1_check = tokio::process::Command::new("docker-compose")
            .args(["--version"])
            .output()
            .await;

        if let Ok(output) = v1_check {
            if output.status.success() {
                return Ok(ComposeCommand::V1);
            }
        }

        Err(Error::Deploy(
            "Neither 'docker compose' (v2) nor 'docker-compose' (v1) found. Please install Docker Compose.".to_string(),
        ))
    }

    /// Get the compose command (cached)
    async fn get() -> Result<ComposeCommand> {
        COMPOSE_COMMAND
            .get_or_try_init(|| async { Self::detect().await })
            .await
            .copied()
    }

    fn command_and_args(&self) -> (&str, Vec<&str>) {
        match self {
            ComposeCommand::V2 => ("docker", vec!["compose"]),
            ComposeCommand::V1 => ("docker-compose", vec![]),
        }
    }
}

/// Runs `docker compose` (or the v1 `docker-compose`) against the manifest.
#[derive(Debug, Clone, Default)]
pub struct ComposeRunner {
    project_name: Option<String>,
}

impl ComposeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    fn base_args(&self, manifest: &Path) -> Vec<String> {
        let mut args = vec!["-f".to_string(), manifest.display().to_string()];
        if let Some(project) = &self.project_name {
            args.push("-p".to_string());
            args.push(project.clone());
        }
        args
    }

    async fn run(&self, manifest: &Path, args: Vec<String>) -> Result<DeployReport> {
        if !manifest.is_file() {
            return Err(Error::Deploy(format!("Manifest '{}' does not exist", manifest.display())));
        }

        let compose = ComposeCommand::get().await?;
        let (program, prefix) = compose.command_and_args();
        let workdir: PathBuf = manifest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut command = tokio::process::Command::new(program);
        command
            .args(prefix)
            .args(self.base_args(manifest))
            .args(&args)
            .current_dir(&workdir);

        tracing::debug!("Running {} {}", program, args.join(" "));
        let output = command
            .output()
            .await
            .map_err(|e| Error::Deploy(format!("Failed to run {}: {}", program, e)))?;

        let report = DeployReport {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(Error::Deploy(format!(
                "{} {} exited with {}:\n{}",
                program,
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                report.stderr.trim()
            )));
        }
        Ok(report)
    }
}

#[async_trait]
impl DeploymentRunner for ComposeRunner {
    async fn up(&self, manifest: &Path, services: &[String], detach: bool) -> Result<DeployReport> {
        let mut args = vec!["up".to_string()];
        if detach {
            args.push("-d".to_string());
        }
        args.extend(services.iter().cloned());
        self.run(manifest, args).await
    }

    async fn down(&self, manifest: &Path, services: &[String], remove_volumes: bool) -> Result<DeployReport> {
        self.run(manifest, down_args(services, remove_volumes)).await
    }
}

/// Partial stops keep containers and volumes; a full teardown uses `down`.
fn down_args(services: &[String], remove_volumes: bool) -> Vec<String> {
    if !services.is_empty() {
        let mut args = vec!["stop".to_string()];
        args.extend(services.iter().cloned());
        return args;
    }

    let mut args = vec!["down".to_string()];
    if remove_volumes {
        args.push("--volumes".to_string());
    }
    args
}

/// Preflight: the docker CLI must be on `PATH`.
pub fn ensure_docker_available() -> Result<PathBuf> {
    which::which("docker")
        .or_else(|_| which::which("docker-compose"))
        .map_err(|_| Error::Deploy("Docker is not installed or not on PATH".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_args_include_project() {
        let runner = ComposeRunner::new().with_project_name("lab");
        let args = runner.base_args(Path::new("/srv/docker-compose.yml"));
        assert_eq!(args, vec!["-f", "/srv/docker-compose.yml", "-p", "lab"]);
    }

    #[test]
    fn compose_command_forms() {
        assert_eq!(ComposeCommand::V2.command_and_args(), ("docker", vec!["compose"]));
        assert_eq!(ComposeCommand::V1.command_and_args().0, "docker-compose");
    }

    #[test]
    fn down_args_forms() {
        assert_eq!(down_args(&[], false), vec!["down"]);
        assert_eq!(down_args(&[], true), vec!["down", "--volumes"]);
        assert_eq!(
            down_args(&["grafana".to_string(), "prometheus".to_string()], true),
            vec!["stop", "grafana", "prometheus"]
        );
    }

    #[tokio::test]
    async fn missing_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ComposeRunner::new()
            .down(&dir.path().join("missing.yml"), &[], false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
