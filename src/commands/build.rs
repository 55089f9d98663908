use crate::output::UserOutput;
use labctl::envfile::{load_env_file, write_env_file};
use labctl::{ConfigurationValidator, Error, LabConfig, ManifestBuilder, SchemaSet};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "docker-compose.yml";
pub const ENV_FILE: &str = ".env";

pub struct BuildOptions {
    pub output_dir: PathBuf,
    pub skip_validation: bool,
    pub backup: bool,
}

pub fn run_build(
    schemas: &SchemaSet,
    config: &LabConfig,
    options: &BuildOptions,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    if options.skip_validation {
        tracing::debug!("Skipping validation");
    } else {
        config.ensure_valid()?;
        let report = ConfigurationValidator::with_schemas(schemas).validate(config);
        for warning in &report.warnings {
            out.warning(&format!("warning: {}", warning));
        }
        if !report.is_valid() {
            let errors = report.errors.iter().map(ToString::to_string).collect();
            return Err(Error::ConfigurationValidation { errors }.into());
        }
    }

    std::fs::create_dir_all(&options.output_dir).map_err(|e| {
        Error::Filesystem(format!(
            "Cannot create output directory '{}': {}",
            options.output_dir.display(),
            e
        ))
    })?;

    let env_path = options.output_dir.join(ENV_FILE);
    let known_env = load_env_file(&env_path);

    let builder = ManifestBuilder::new(schemas).with_known_env(known_env);
    let order = builder.synthesis_order(config)?;
    out.status(&format!("Building {} service(s): {}", order.len(), order.join(", ")));
    let output = builder.build_ordered(config, &order);

    let manifest_path = options.output_dir.join(MANIFEST_FILE);
    if options.backup {
        if let Some(backup) = backup_existing(&manifest_path)? {
            out.status(&format!("Backed up previous manifest to {}", backup.display()));
        }
    }
    output.manifest.write_to(&manifest_path)?;

    if !output.secrets.is_empty() {
        let written = write_env_file(&env_path, &output.secrets)?;
        if !written.is_empty() {
            out.status(&format!("Stored {} new value(s) in {}", written.len(), env_path.display()));
        }
    }

    for degradation in &output.degradations {
        out.warning(&format!("degraded: {}", degradation));
    }

    out.blank();
    out.success(&format!("Wrote {}", manifest_path.display()));
    Ok(())
}

/// Copy an existing manifest to `docker-compose.bak.<timestamp>.yml`.
fn backup_existing(manifest_path: &Path) -> anyhow::Result<Option<PathBuf>> {
    if !manifest_path.is_file() {
        return Ok(None);
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let backup = manifest_path.with_file_name(format!("docker-compose.bak.{}.yml", timestamp));
    std::fs::copy(manifest_path, &backup).map_err(|e| {
        Error::Filesystem(format!(
            "Failed to back up '{}': {}",
            manifest_path.display(),
            e
        ))
    })?;
    Ok(Some(backup))
}
