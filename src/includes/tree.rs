//! Folder/file tree of scanned sources.
//!
//! Files are identified by their path relative to the scanned root with the
//! extension removed, so `math/vector.c` and `math/vector.h` share the node
//! `math/vector`.

use std::fmt;

use serde::Serialize;

use crate::diagnostics::Diagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Source,
    Header,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    /// File name without extension.
    pub name: String,
    /// Node id: relative path without extension, `/`-separated.
    pub path: String,
    pub kind: FileKind,
    /// Referenced node ids, in the order they were found.
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Folder {
    pub name: String,
    /// Cluster id: relative path, `/`-separated. Empty for the root.
    pub path: String,
    pub folders: Vec<Folder>,
    pub files: Vec<SourceFile>,
}

impl Folder {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Returns the child folder `name`, creating it if missing.
    pub fn child_mut(&mut self, name: &str) -> &mut Folder {
        let position = match self.folders.iter().position(|f| f.name == name) {
            Some(position) => position,
            None => {
                let path = join_key(&self.path, name);
                self.folders.push(Folder::new(name, path));
                self.folders.len() - 1
            }
        };
        &mut self.folders[position]
    }

    /// Walks down `parts`, creating folders on the way.
    pub fn folder_mut(&mut self, parts: &[&str]) -> &mut Folder {
        let mut folder = self;
        for part in parts {
            folder = folder.child_mut(part);
        }
        folder
    }

    fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.iter().all(Folder::is_empty)
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a SourceFile>) {
        for folder in &self.folders {
            folder.collect_files(out);
        }
        out.extend(self.files.iter());
    }

    fn merge(&mut self, duplicates: &mut Vec<DuplicateReference>, diagnostics: &mut Diagnostics) {
        let mut folders: Vec<Folder> = Vec::with_capacity(self.folders.len());
        for folder in std::mem::take(&mut self.folders) {
            match folders.iter_mut().find(|f| f.name == folder.name) {
                Some(existing) => {
                    diagnostics.warn(None, format!("Duplicate folder {}", folder.path));
                    existing.folders.extend(folder.folders);
                    existing.files.extend(folder.files);
                }
                None => folders.push(folder),
            }
        }
        self.folders = folders;

        for folder in &mut self.folders {
            folder.merge(duplicates, diagnostics);
        }

        let mut files: Vec<SourceFile> = Vec::with_capacity(self.files.len());
        for file in std::mem::take(&mut self.files) {
            match files.iter_mut().find(|f| f.name == file.name) {
                Some(existing) => existing.references.extend(file.references),
                None => files.push(file),
            }
        }

        for file in &mut files {
            let mut seen: Vec<String> = Vec::with_capacity(file.references.len());
            for target in std::mem::take(&mut file.references) {
                if target == file.path {
                    continue;
                }
                if seen.contains(&target) {
                    tracing::debug!("Duplicate reference in {} to {}", file.name, target);
                    duplicates.push(DuplicateReference {
                        file: file.name.clone(),
                        target,
                    });
                } else {
                    seen.push(target);
                }
            }
            file.references = seen;
        }
        self.files = files;
    }
}

/// A file that referenced the same target more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateReference {
    pub file: String,
    pub target: String,
}

impl fmt::Display for DuplicateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duplicate reference in {} to {}", self.file, self.target)
    }
}

/// Scanned sources of one or more roots, merged under a single unnamed root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceTree {
    pub root: Folder,
}

impl SourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the contents of another tree without merging anything.
    pub fn append(&mut self, other: SourceTree) {
        self.root.folders.extend(other.root.folders);
        self.root.files.extend(other.root.files);
    }

    /// Consolidates the tree in place.
    ///
    /// Same-named folders are merged (with a warning), same-named files are
    /// merged into one node, repeated references from one file are collapsed
    /// and returned, and self-references are removed.
    pub fn merge_duplicates(&mut self, diagnostics: &mut Diagnostics) -> Vec<DuplicateReference> {
        let mut duplicates = Vec::new();
        self.root.merge(&mut duplicates, diagnostics);
        duplicates
    }

    /// All files, subfolders before the files of their parent.
    pub fn files(&self) -> Vec<&SourceFile> {
        let mut out = Vec::new();
        self.root.collect_files(&mut out);
        out
    }

    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.files().into_iter().find(|f| f.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

pub(crate) fn join_key(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}
