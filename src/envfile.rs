//! `.env` file handling.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

const HEADER: &str = "# Generated by labctl. Contains secrets; do not commit this file.";

/// Append `values` to the env file at `path`.
///
/// Creates the file with a header comment if it doesn't exist. Keys already
/// present are left untouched; the file is re-read under an exclusive lock so
/// concurrent writers don't duplicate entries. Returns the keys written.
pub fn write_env_file(path: &Path, values: &BTreeMap<String, String>) -> Result<Vec<String>> {
    use fs2::FileExt;
    use std::io::Write;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Filesystem(format!("Cannot create '{}': {}", parent.display(), e)))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::Filesystem(format!("Cannot write '{}': {}", path.display(), e)))?;

    file.lock_exclusive()
        .map_err(|e| Error::Filesystem(format!("Cannot lock '{}': {}", path.display(), e)))?;

    let existing = load_env_file(path);
    let new_entries: Vec<(&String, &String)> = values
        .iter()
        .filter(|(k, _)| !existing.contains_key(*k))
        .collect();

    if !new_entries.is_empty() {
        let metadata = file
            .metadata()
            .map_err(|e| Error::Filesystem(format!("Cannot stat '{}': {}", path.display(), e)))?;
        if metadata.len() == 0 {
            writeln!(&file, "{}", HEADER).map_err(|e| Error::Filesystem(format!("Write error: {}", e)))?;
        }
        for (key, value) in &new_entries {
            writeln!(&file, "{}={}", key, quote_value(value))
                .map_err(|e| Error::Filesystem(format!("Write error: {}", e)))?;
        }
    }

    file.unlock()
        .map_err(|e| Error::Filesystem(format!("Cannot unlock '{}': {}", path.display(), e)))?;

    tracing::debug!("Wrote {} new value(s) to {}", new_entries.len(), path.display());
    Ok(new_entries.into_iter().map(|(k, _)| k.clone()).collect())
}

/// Key-value pairs from an existing env file; empty when missing or unreadable.
pub fn load_env_file(path: &Path) -> BTreeMap<String, String> {
    if !path.exists() {
        return BTreeMap::new();
    }

    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter.filter_map(|r| r.ok()).collect(),
        Err(e) => {
            tracing::warn!("Ignoring unreadable env file {}: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}

/// Single-quote values that a shell or dotenv parser would otherwise split
/// or expand.
fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || "#$\"'`\\!&|;<>(){}[]*?~".contains(c));
    if !needs_quotes {
        return value.to_string();
    }
    if value.contains('\'') {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$"))
    } else {
        format!("'{}'", value)
    }
}
