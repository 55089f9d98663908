use crate::output::UserOutput;
use labctl::schema::{filter_by_maturity, service_categories, Maturity};
use labctl::{LabConfig, SchemaSet};
use serde::Serialize;

#[derive(Serialize)]
struct ServiceSummary<'a> {
    id: &'a str,
    name: &'a str,
    category: &'a str,
    maturity: Maturity,
    dependencies: Vec<&'a str>,
}

pub fn run_services(
    schemas: &SchemaSet,
    min_maturity: Option<Maturity>,
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let shown = match min_maturity {
        Some(minimum) => filter_by_maturity(schemas, minimum),
        None => schemas.clone(),
    };

    if json {
        let summaries: Vec<ServiceSummary<'_>> = shown
            .values()
            .map(|s| ServiceSummary {
                id: &s.id,
                name: &s.name,
                category: &s.category,
                maturity: s.maturity,
                dependencies: s.dependencies.iter().map(String::as_str).collect(),
            })
            .collect();
        out.data(&serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if shown.is_empty() {
        out.status("No service schemas found");
        return Ok(());
    }

    for (category, ids) in service_categories(&shown) {
        out.data(&format!("{}:", category));
        for id in ids {
            let Some(schema) = shown.get(&id) else {
                continue;
            };
            let maturity = if schema.maturity == Maturity::Stable {
                String::new()
            } else {
                format!(" [{}]", schema.maturity)
            };
            out.data(&format!("  {:<20} {}{}", id, schema.name, maturity));
        }
    }
    Ok(())
}

pub fn run_urls(config: &LabConfig, out: &dyn UserOutput) -> anyhow::Result<()> {
    let urls = config.get_service_urls();
    if urls.is_empty() {
        out.status("No services enabled");
        return Ok(());
    }
    for (id, url) in urls {
        out.data(&format!("{:<20} {}", id, url));
    }
    Ok(())
}
