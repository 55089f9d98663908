//! Dependency queries: `resolve`, `tree`, `removal-order`, `info`.

use crate::output::UserOutput;
use labctl::{DependencyGraph, Error, SchemaSet};

pub fn run_resolve(
    schemas: &SchemaSet,
    services: &[String],
    include_dependents: bool,
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let graph = DependencyGraph::from_schemas(schemas);
    let order = graph.resolve(services, include_dependents)?;

    if json {
        out.data(&serde_json::to_string_pretty(&order)?);
        return Ok(());
    }

    out.status(&format!("Start order ({} service(s)):", order.len()));
    for (i, id) in order.iter().enumerate() {
        let marker = if services.contains(id) { "" } else { "  (dependency)" };
        out.data(&format!("  {:>2}. {}{}", i + 1, id, marker));
    }
    Ok(())
}

pub fn run_tree(
    schemas: &SchemaSet,
    service: &str,
    max_depth: usize,
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let graph = DependencyGraph::from_schemas(schemas);
    let tree = graph
        .get_dependency_tree(service, max_depth)
        .ok_or_else(|| Error::ServiceNotFound(service.to_string()))?;

    if json {
        out.data(&serde_json::to_string_pretty(&tree)?);
    } else {
        out.data(tree.render().trim_end());
    }
    Ok(())
}

pub fn run_removal_order(schemas: &SchemaSet, services: &[String], out: &dyn UserOutput) -> anyhow::Result<()> {
    let graph = DependencyGraph::from_schemas(schemas);
    let unknown: Vec<&str> = services
        .iter()
        .map(String::as_str)
        .filter(|id| !graph.contains(id))
        .collect();
    if let Some(first) = unknown.first() {
        return Err(Error::ServiceNotFound(first.to_string()).into());
    }

    for (i, batch) in graph.suggest_removal_order(services).iter().enumerate() {
        out.data(&format!("Batch {}: {}", i + 1, batch.join(", ")));
    }

    // Dependents outside the selection keep the service alive.
    for id in services {
        let blockers: Vec<&str> = graph
            .get_dependents(id)
            .iter()
            .map(String::as_str)
            .filter(|d| !services.iter().any(|s| s == d))
            .collect();
        if !blockers.is_empty() {
            out.warning(&format!(
                "'{}' is still required by: {}",
                id,
                blockers.join(", ")
            ));
        }
    }
    Ok(())
}

pub fn run_info(schemas: &SchemaSet, service: &str, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    let graph = DependencyGraph::from_schemas(schemas);
    let info = graph.dependency_info(service)?;

    if json {
        out.data(&serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    out.data(&format!("{} ({})", info.name, info.id));
    out.data(&format!("  Depends on:    {}", list(&info.dependencies)));
    out.data(&format!("  Required by:   {}", list(&info.dependents)));
    out.data(&format!("  Also starts:   {}", list(&info.required_services)));
    out.blank();
    out.data(info.tree.render().trim_end());
    Ok(())
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
