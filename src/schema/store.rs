use super::{check_model, ServiceSchema};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loaded schemas keyed by service id, in load order (file-name order).
pub type SchemaSet = IndexMap<String, ServiceSchema>;

/// Read every schema document in `directory`.
///
/// All problems are collected before failing, so one bad file does not hide
/// the next. Files are read in file-name order, which fixes the load order
/// used as the tie-break during resolution.
pub fn load_service_schemas(directory: &Path) -> Result<SchemaSet> {
    let load_error = |issues: Vec<String>| Error::SchemaLoad {
        directory: directory.to_path_buf(),
        issues,
    };

    if !directory.is_dir() {
        return Err(load_error(vec![format!(
            "schema directory '{}' does not exist",
            directory.display()
        )]));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(directory)
        .map_err(|e| load_error(vec![format!("cannot read directory: {}", e)]))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_schema_file(path))
        .collect();
    files.sort();

    if files.is_empty() {
        tracing::warn!("No service schemas found in {}", directory.display());
        return Ok(SchemaSet::new());
    }

    let mut schemas = SchemaSet::new();
    let mut origins: HashMap<String, String> = HashMap::new();
    let mut issues = Vec::new();

    for path in &files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                issues.push(format!("{}: cannot read file: {}", file_name, e));
                continue;
            }
        };

        if content.trim().is_empty() {
            tracing::warn!("Skipping empty schema file {}", path.display());
            continue;
        }

        let schema: ServiceSchema = match serde_yaml::from_str(&content) {
            Ok(schema) => schema,
            Err(e) => {
                issues.push(format!("{}: {}", file_name, e));
                continue;
            }
        };

        let problems = check_model(&schema);
        if !problems.is_empty() {
            issues.extend(problems.into_iter().map(|p| format!("{}: {}", file_name, p)));
            continue;
        }

        if let Some(first) = origins.get(&schema.id) {
            issues.push(format!(
                "{}: duplicate service id '{}' (already defined in {})",
                file_name, schema.id, first
            ));
            continue;
        }

        tracing::debug!("Loaded schema '{}' from {}", schema.id, file_name);
        origins.insert(schema.id.clone(), file_name);
        schemas.insert(schema.id.clone(), schema);
    }

    if !issues.is_empty() {
        return Err(load_error(issues));
    }

    Ok(schemas)
}

fn is_schema_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    let yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yaml" || e == "yml");
    path.is_file() && !hidden && yaml
}

/// Caller-owned schema cache keyed by directory.
///
/// Loaded sets are shared behind `Arc` and never mutated; `reload` and
/// `invalidate` replace or drop whole entries.
#[derive(Debug, Default)]
pub struct SchemaStore {
    cache: RwLock<HashMap<PathBuf, Arc<SchemaSet>>>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `directory`, serving from cache unless `reload` is set.
    pub fn load<P: AsRef<Path>>(&self, directory: P, reload: bool) -> Result<Arc<SchemaSet>> {
        let key = cache_key(directory.as_ref());

        if !reload {
            if let Some(cached) = self.cache.read().get(&key) {
                return Ok(Arc::clone(cached));
            }
        }

        let schemas = Arc::new(load_service_schemas(directory.as_ref())?);
        self.cache.write().insert(key, Arc::clone(&schemas));
        Ok(schemas)
    }

    pub fn reload<P: AsRef<Path>>(&self, directory: P) -> Result<Arc<SchemaSet>> {
        self.load(directory, true)
    }

    /// Drop the cached entry for `directory`. Returns whether one existed.
    pub fn invalidate<P: AsRef<Path>>(&self, directory: P) -> bool {
        self.cache
            .write()
            .remove(&cache_key(directory.as_ref()))
            .is_some()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn is_cached<P: AsRef<Path>>(&self, directory: P) -> bool {
        self.cache.read().contains_key(&cache_key(directory.as_ref()))
    }
}

fn cache_key(directory: &Path) -> PathBuf {
    directory
        .canonicalize()
        .unwrap_or_else(|_| directory.to_path_buf())
}
