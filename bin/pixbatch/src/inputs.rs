use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub(crate) const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

pub(crate) fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Expands directories one level deep and keeps supported image files,
/// in a stable order with duplicates removed.
pub(crate) fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path)
                .with_context(|| format!("failed to list {}", path.display()))?;

            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported(p))
                .collect();
            files.sort();
            found.extend(files);
        } else if is_supported(path) {
            found.push(path.clone());
        } else {
            tracing::warn!(path = %path.display(), "skipping unsupported input");
        }
    }

    let mut absolute = Vec::with_capacity(found.len());
    for path in found {
        let path = std::fs::canonicalize(&path)
            .with_context(|| format!("cannot resolve {}", path.display()))?;
        if !absolute.contains(&path) {
            absolute.push(path);
        }
    }

    Ok(absolute)
}
