use crate::output::UserOutput;
use labctl::{ConfigurationValidator, Error, LabConfig, SchemaSet};

pub fn run_validate(
    schemas: &SchemaSet,
    config: &LabConfig,
    strict: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    out.status(&format!(
        "Validating {} profile ({} enabled service(s))...",
        config.profile.as_str(),
        config.enabled_ids().len()
    ));

    // Structural problems make the remaining checks meaningless.
    config.ensure_valid()?;

    let report = ConfigurationValidator::with_schemas(schemas).validate(config);
    for error in &report.errors {
        out.error(&format!("  error: {}", error));
    }
    for warning in &report.warnings {
        out.warning(&format!("  warning: {}", warning));
    }

    if !report.is_valid() {
        let errors = report.errors.iter().map(ToString::to_string).collect();
        return Err(Error::ConfigurationValidation { errors }.into());
    }
    if strict && report.has_warnings() {
        let errors = report.warnings.iter().map(ToString::to_string).collect();
        return Err(Error::ConfigurationValidation { errors }.into());
    }

    out.blank();
    if report.has_warnings() {
        out.success(&format!(
            "Configuration is valid with {} warning(s)",
            report.warnings.len()
        ));
    } else {
        out.success("Configuration is valid");
    }
    Ok(())
}
