use std::path::PathBuf;

use serde::Serialize;

use crate::model::Library;

/// Link data contributed by one library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEntry {
    pub library: String,
    pub include_paths: Vec<PathBuf>,
    pub library_paths: Vec<PathBuf>,
    pub binaries: Vec<String>,
}

impl LinkEntry {
    fn from_library(library: &Library) -> Self {
        Self {
            library: library.name.clone(),
            include_paths: library.include_paths.clone(),
            library_paths: library.library_paths.clone(),
            binaries: library.binaries.clone(),
        }
    }
}

/// Everything a module needs at link time, gathered from its dependencies
/// and used libraries.
///
/// Entries are keyed by library name. The first entry for a name wins and
/// later ones are dropped, so link lines keep declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkClosure {
    entries: Vec<LinkEntry>,
}

impl LinkClosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a library unless one with the same name is already present.
    pub fn absorb(&mut self, library: &Library) -> bool {
        self.push(LinkEntry::from_library(library))
    }

    /// Adds every entry of `other`, in its order.
    pub fn extend_from(&mut self, other: &LinkClosure) {
        for entry in &other.entries {
            self.push(entry.clone());
        }
    }

    fn push(&mut self, entry: LinkEntry) -> bool {
        if self.contains(&entry.library) {
            tracing::trace!("  {} already in link closure, skipping", entry.library);
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, library: &str) -> bool {
        self.entries.iter().any(|e| e.library == library)
    }

    pub fn entries(&self) -> &[LinkEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn include_paths(&self) -> Vec<PathBuf> {
        unique(self.entries.iter().flat_map(|e| e.include_paths.iter().cloned()))
    }

    pub fn library_paths(&self) -> Vec<PathBuf> {
        unique(self.entries.iter().flat_map(|e| e.library_paths.iter().cloned()))
    }

    /// `(library name, binary)` pairs, first occurrence of each binary kept.
    pub fn binaries(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        for entry in &self.entries {
            for binary in &entry.binaries {
                if !out.iter().any(|(_, b)| b == binary) {
                    out.push((entry.library.clone(), binary.clone()));
                }
            }
        }
        out
    }
}

fn unique<T: PartialEq>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut out = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
