//! Include directive scanning.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::Result;
use crate::settings::BuildSettings;

use super::tree::{join_key, FileKind, SourceFile, SourceTree};

static ABSOLUTE_INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(.*)\.h>").expect("absolute include pattern is valid"));
static RELATIVE_INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(.*)\.h""#).expect("relative include pattern is valid"));

/// Which files are scanned and which directories are skipped.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub source_extensions: Vec<String>,
    pub header_extensions: Vec<String>,
    pub vcs_dir_names: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_settings(&BuildSettings::default())
    }
}

impl ScanOptions {
    pub fn from_settings(settings: &BuildSettings) -> Self {
        Self {
            source_extensions: settings.source_extensions.clone(),
            header_extensions: settings.header_extensions.clone(),
            vcs_dir_names: settings.vcs_dir_names.clone(),
        }
    }

    fn kind_of(&self, path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_str()?;
        if self.source_extensions.iter().any(|e| e == ext) {
            Some(FileKind::Source)
        } else if self.header_extensions.iter().any(|e| e == ext) {
            Some(FileKind::Header)
        } else {
            None
        }
    }
}

/// Extracts the referenced node id from one line, if it is an include.
///
/// Angle-bracket includes are taken as-is; quoted includes are relative to
/// `dir`, the including file's folder id.
pub fn scan_line(line: &str, dir: &str) -> Option<String> {
    if !line.contains("#include") {
        return None;
    }
    if let Some(caps) = ABSOLUTE_INCLUDE.captures(line) {
        return Some(normalize_key(&caps[1]));
    }
    RELATIVE_INCLUDE
        .captures(line)
        .map(|caps| normalize_key(&join_key(dir, &caps[1])))
}

/// Collapses `.` and `..` segments of a `/`-separated id.
fn normalize_key(key: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in key.split('/') {
        match part {
            "" | "." => {}
            ".." if parts.last().is_some_and(|p| *p != "..") => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

/// References of one file, in line order.
pub fn scan_file(path: &Path, dir: &str) -> Result<Vec<String>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.lines().filter_map(|line| scan_line(line, dir)).collect())
}

/// Scans one source root into a tree. Folder and file ids are relative to `root`.
pub fn scan_root(root: &Path, options: &ScanOptions) -> Result<SourceTree> {
    let mut tree = SourceTree::new();
    tracing::debug!("Scanning includes under {}", root.display());

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| options.vcs_dir_names.iter().any(|v| v == name)))
        });

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let parts: Vec<&str> = relative.iter().filter_map(|p| p.to_str()).collect();
        let Some((last, parents)) = parts.split_last() else {
            continue;
        };

        if entry.file_type().is_dir() {
            tree.root.folder_mut(&parts);
            continue;
        }
        let Some(kind) = options.kind_of(entry.path()) else {
            continue;
        };

        let folder = tree.root.folder_mut(parents);
        let name = Path::new(*last)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(*last)
            .to_string();
        let references = scan_file(entry.path(), &folder.path)?;
        tracing::trace!("  {} -> {} references", relative.display(), references.len());
        folder.files.push(SourceFile {
            path: join_key(&folder.path, &name),
            name,
            kind,
            references,
        });
    }

    Ok(tree)
}

/// Scans every root and appends the results, unmerged, in root order.
pub fn scan_roots(roots: &[PathBuf], options: &ScanOptions) -> Result<SourceTree> {
    let mut tree = SourceTree::new();
    for root in roots {
        if !root.is_dir() {
            tracing::warn!("Include scan root {} doesn't exist, skipping", root.display());
            continue;
        }
        tree.append(scan_root(root, options)?);
    }
    Ok(tree)
}
