//! Linkable artifacts, own-built or third-party.

use std::path::PathBuf;

use serde::Serialize;

use super::LibraryId;
use crate::diagnostics::Diagnostics;

#[derive(Debug, Clone, Serialize)]
pub struct Library {
    #[serde(skip)]
    pub id: LibraryId,
    pub name: String,
    pub include_paths: Vec<PathBuf>,
    pub library_paths: Vec<PathBuf>,
    /// Bare library names (`z`) or file names (`libz.a`).
    pub binaries: Vec<String>,
}

impl Library {
    pub fn new(id: LibraryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            include_paths: Vec::new(),
            library_paths: Vec::new(),
            binaries: Vec::new(),
        }
    }

    pub fn has_library_paths(&self) -> bool {
        !self.library_paths.is_empty()
    }

    pub fn add_include_path(&mut self, path: PathBuf) {
        if !self.include_paths.contains(&path) {
            self.include_paths.push(path);
        }
    }

    pub fn add_library_path(&mut self, path: PathBuf) {
        if !self.library_paths.contains(&path) {
            self.library_paths.push(path);
        }
    }

    pub fn add_binary(&mut self, binary: impl Into<String>) {
        let binary = binary.into();
        if !self.binaries.contains(&binary) {
            self.binaries.push(binary);
        }
    }

    /// Checks that the library looks usable.
    ///
    /// Include paths must exist. For prebuilt libraries every binary must also
    /// be found under one of the library paths; a binary found twice is a
    /// shadowing warning.
    pub fn validate(
        &self,
        prebuilt: bool,
        library_extensions: &[String],
        diagnostics: &mut Diagnostics,
    ) -> bool {
        if let Some(missing) = self.include_paths.iter().find(|p| !p.exists()) {
            tracing::debug!(
                "Include path {} in library '{}' wasn't found",
                missing.display(),
                self.name
            );
            return false;
        }

        if !prebuilt {
            return true;
        }

        let mut unchecked: Vec<&String> = self.binaries.iter().collect();
        let mut found: Vec<&String> = Vec::new();
        for dir in &self.library_paths {
            for binary in &self.binaries {
                let mut candidates: Vec<PathBuf> = library_extensions
                    .iter()
                    .map(|ext| dir.join(format!("lib{}.{}", binary, ext)))
                    .collect();
                candidates.push(dir.join(binary));

                if candidates.iter().any(|c| c.exists()) {
                    if found.contains(&binary) {
                        diagnostics.warn(
                            None,
                            format!(
                                "Library binary {} of library '{}' was found in two locations",
                                binary, self.name
                            ),
                        );
                    } else {
                        found.push(binary);
                        unchecked.retain(|b| *b != binary);
                    }
                }
            }
        }

        if !unchecked.is_empty() {
            let names: Vec<&str> = unchecked.iter().map(|b| b.as_str()).collect();
            tracing::debug!(
                "Binaries listed for library '{}' were not found: {}",
                self.name,
                names.join(", ")
            );
            return false;
        }
        true
    }
}

impl std::fmt::Display for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "library('{}')", self.name)
    }
}

/// A binary name prepared for a link line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkName {
    pub name: String,
    /// True when the binary looked like a file name with an unknown extension.
    pub suspicious: bool,
}

/// Normalizes a binary entry to a bare link name.
///
/// `libXYZ.a` and `libXYZ.so` become `XYZ`, `XYZ.lib` and `XYZ.dll` become
/// `XYZ`. Anything else passes through; a dotted name is flagged.
pub fn link_name(binary: &str, library_extensions: &[String]) -> LinkName {
    let known = |ext: &str| library_extensions.iter().any(|e| e == ext);

    if let Some((stem, ext)) = binary.split_once('.') {
        if known(ext) {
            let name = stem.strip_prefix("lib").unwrap_or(stem);
            return LinkName {
                name: name.to_string(),
                suspicious: false,
            };
        }
        return LinkName {
            name: binary.to_string(),
            suspicious: true,
        };
    }

    LinkName {
        name: binary.to_string(),
        suspicious: false,
    }
}
