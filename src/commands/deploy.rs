use crate::output::UserOutput;
use labctl::deploy::{ensure_docker_available, ComposeRunner, DeployReport, DeploymentRunner};
use labctl::Error;
use std::path::Path;

fn preflight(compose_file: &Path) -> anyhow::Result<()> {
    if !compose_file.is_file() {
        return Err(Error::Deploy(format!(
            "Manifest '{}' does not exist; run `labctl build` first",
            compose_file.display()
        ))
        .into());
    }

    let docker = ensure_docker_available()?;
    tracing::debug!("Using {}", docker.display());
    Ok(())
}

fn print_report(report: &DeployReport, out: &dyn UserOutput) {
    if !report.stdout.trim().is_empty() {
        out.status(report.stdout.trim_end());
    }
    // compose writes progress to stderr even on success
    if !report.stderr.trim().is_empty() {
        out.status(report.stderr.trim_end());
    }
}

pub async fn run_deploy(
    compose_file: &Path,
    services: &[String],
    detach: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    preflight(compose_file)?;
    deploy_with(&ComposeRunner::new(), compose_file, services, detach, out).await
}

pub async fn run_stop(
    compose_file: &Path,
    services: &[String],
    remove_volumes: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    preflight(compose_file)?;
    stop_with(&ComposeRunner::new(), compose_file, services, remove_volumes, out).await
}

async fn deploy_with(
    runner: &dyn DeploymentRunner,
    compose_file: &Path,
    services: &[String],
    detach: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    if services.is_empty() {
        out.status(&format!("Deploying {}...", compose_file.display()));
    } else {
        out.status(&format!("Deploying {}...", services.join(", ")));
    }

    let report = runner.up(compose_file, services, detach).await?;
    print_report(&report, out);

    out.success("Deployment complete");
    Ok(())
}

async fn stop_with(
    runner: &dyn DeploymentRunner,
    compose_file: &Path,
    services: &[String],
    remove_volumes: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    if services.is_empty() {
        out.status(&format!("Stopping {}...", compose_file.display()));
    } else {
        out.status(&format!("Stopping {}...", services.join(", ")));
        if remove_volumes {
            out.warning("Volumes are only removed when stopping the whole stack");
        }
    }

    let report = runner.down(compose_file, services, remove_volumes).await?;
    print_report(&report, out);

    out.success("Services stopped");
    if remove_volumes && services.is_empty() {
        out.warning("Volumes were removed; their data is gone");
    }
    Ok(())
}
