use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use regex::Regex;

use crate::error::Result;
use crate::settings::BuildSettings;

/// Walks source directories, skipping version-control directories.
pub struct SourceWalker {
    extensions: Vec<String>,
    vcs_dir_names: Vec<String>,
}

impl SourceWalker {
    pub fn new(settings: &BuildSettings) -> Self {
        Self {
            extensions: settings.source_extensions.clone(),
            vcs_dir_names: settings.vcs_dir_names.clone(),
        }
    }

    /// Walks with a custom extension set (e.g. sources and headers).
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Matching files under `root`, sorted by file name within each directory.
    pub fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let vcs = self.vcs_dir_names.clone();

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                !(is_dir && vcs.iter().any(|name| entry.file_name() == name.as_str()))
            })
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!("Skipping unreadable entry under {}: {}", root.display(), err);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_file() && self.is_supported(path) {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }
}

/// Path of `file` relative to `dir`, with `/` separators.
pub fn relative_key(dir: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(dir).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Collects source files from `source_dirs` in priority order.
///
/// A relative path already provided by an earlier directory is skipped when
/// `settings.remove_duplicate_sources` is set. Files whose relative path
/// matches any of `excludes` are dropped.
pub fn discover_sources(
    source_dirs: &[PathBuf],
    excludes: &[Regex],
    settings: &BuildSettings,
) -> Result<Vec<PathBuf>> {
    let walker = SourceWalker::new(settings);
    let mut seen: HashSet<String> = HashSet::new();
    let mut sources = Vec::new();

    for dir in source_dirs {
        tracing::debug!("    {}", dir.display());
        for file in walker.walk(dir)? {
            let rel = relative_key(dir, &file);
            if settings.remove_duplicate_sources && seen.contains(&rel) {
                tracing::debug!("    > {} has already been previously added, skipping.", rel);
            } else if excludes.iter().any(|re| re.is_match(&rel)) {
                tracing::debug!("    > {} is marked to be excluded, skipping.", rel);
            } else {
                tracing::trace!("      {}", rel);
                seen.insert(rel);
                sources.push(file);
            }
        }
    }

    Ok(sources)
}
