//! Module declarations.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::env::{push_unique, Configuration};
use super::{LibraryId, ModuleId};
use crate::diagnostics::Diagnostics;

/// What a module produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    StaticLibrary,
    SharedLibrary,
    Executable,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::StaticLibrary => "static-library",
            ModuleKind::SharedLibrary => "shared-library",
            ModuleKind::Executable => "executable",
        }
    }

    /// Parses a kind name. Accepts the file-extension style tags as aliases.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "static-library" | "static" | "staticlib" | "a" | "lib" => Some(ModuleKind::StaticLibrary),
            "shared-library" | "shared" | "sharedlib" | "so" | "dll" => Some(ModuleKind::SharedLibrary),
            "executable" | "exe" | "bin" | "program" => Some(ModuleKind::Executable),
            _ => None,
        }
    }

    pub fn is_library(&self) -> bool {
        matches!(self, ModuleKind::StaticLibrary | ModuleKind::SharedLibrary)
    }

    /// File name of the artifact built from `binary_name`.
    pub fn artifact_name(&self, binary_name: &str) -> String {
        match self {
            ModuleKind::StaticLibrary => format!("lib{}.a", binary_name),
            ModuleKind::SharedLibrary => format!("lib{}.so", binary_name),
            ModuleKind::Executable => binary_name.to_string(),
        }
    }
}

/// The inheritable part of a module.
///
/// Everything here flows from ancestors to descendants during composition.
/// Identity, inheritance links and discovered files do not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleConfig {
    pub kind: Option<ModuleKind>,
    pub depends: Vec<String>,
    pub used_libraries: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub pre_actions: Vec<String>,
    pub post_actions: Vec<String>,
    pub install_dir: Option<PathBuf>,
    pub env: Configuration,
}

impl ModuleConfig {
    /// Returns a new snapshot with `ancestor` merged in.
    pub fn inherit_from(
        &self,
        ancestor: &ModuleConfig,
        module: &str,
        diagnostics: &mut Diagnostics,
    ) -> ModuleConfig {
        ModuleConfig {
            kind: self.kind.or(ancestor.kind),
            depends: append_unique(&self.depends, &ancestor.depends),
            used_libraries: append_unique(&self.used_libraries, &ancestor.used_libraries),
            exclude_patterns: append_unique(&self.exclude_patterns, &ancestor.exclude_patterns),
            pre_actions: append_unique(&self.pre_actions, &ancestor.pre_actions),
            post_actions: append_unique(&self.post_actions, &ancestor.post_actions),
            install_dir: self.install_dir.clone().or_else(|| ancestor.install_dir.clone()),
            env: self.env.inherit_from(&ancestor.env, module, diagnostics),
        }
    }
}

fn append_unique(own: &[String], theirs: &[String]) -> Vec<String> {
    let mut merged = own.to_vec();
    for item in theirs {
        push_unique(&mut merged, item.clone());
    }
    merged
}

#[derive(Debug, Clone, Serialize)]
pub struct Module {
    #[serde(skip)]
    pub id: ModuleId,
    pub name: String,
    /// Never produces build output (profiles, `default`, `targets`).
    pub is_marker: bool,
    pub is_profile: bool,
    /// Ancestors in declaration order.
    pub inherits: Vec<String>,
    /// Values as declared, before composition.
    pub declared: ModuleConfig,
    #[serde(rename = "config")]
    composed: Option<ModuleConfig>,
    /// Module-specific profiles: (lowercase profile name, registry name).
    pub profiles: Vec<(String, String)>,
    /// Defaults to the module name.
    pub binary_name: Option<String>,
    /// Module roots, most specific first; discovered when none is declared.
    pub roots: Vec<PathBuf>,
    pub search_for_sources: bool,
    /// Sources listed by hand; disables discovery when non-empty.
    pub explicit_sources: Vec<PathBuf>,
    pub source_paths: Vec<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    pub sources: Vec<PathBuf>,
    pub output_path: Option<PathBuf>,
    /// Install directory after resolution against the module and project roots.
    pub install_path: Option<PathBuf>,
    /// Library produced by this module once it has been resolved.
    #[serde(skip)]
    pub library: Option<LibraryId>,
}

impl Module {
    pub fn new(id: ModuleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_marker: false,
            is_profile: false,
            inherits: Vec::new(),
            declared: ModuleConfig::default(),
            composed: None,
            profiles: Vec::new(),
            binary_name: None,
            roots: Vec::new(),
            search_for_sources: true,
            explicit_sources: Vec::new(),
            source_paths: Vec::new(),
            include_paths: Vec::new(),
            sources: Vec::new(),
            output_path: None,
            install_path: None,
            library: None,
        }
    }

    /// A configuration-only fragment: never inherits, never searches for sources.
    pub fn profile(id: ModuleId, name: impl Into<String>) -> Self {
        Self {
            is_marker: true,
            is_profile: true,
            search_for_sources: false,
            ..Self::new(id, name)
        }
    }

    pub fn marker(mut self) -> Self {
        self.is_marker = true;
        self
    }

    pub fn with_kind(mut self, kind: ModuleKind) -> Self {
        self.declared.kind = Some(kind);
        self
    }

    pub fn with_inherits(mut self, inherits: Vec<String>) -> Self {
        self.inherits = inherits;
        self
    }

    pub fn with_depends(mut self, depends: Vec<String>) -> Self {
        self.declared.depends = depends;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Primary root.
    pub fn root(&self) -> Option<&Path> {
        self.roots.first().map(PathBuf::as_path)
    }

    pub fn add_inherit(&mut self, name: impl Into<String>) {
        push_unique(&mut self.inherits, name.into());
    }

    /// Composed configuration when available, otherwise the declared one.
    pub fn config(&self) -> &ModuleConfig {
        self.composed.as_ref().unwrap_or(&self.declared)
    }

    pub fn is_composed(&self) -> bool {
        self.composed.is_some()
    }

    pub fn set_composed(&mut self, config: ModuleConfig) {
        self.composed = Some(config);
    }

    pub fn kind(&self) -> Option<ModuleKind> {
        self.config().kind
    }

    /// Non-marker with a kind: expected to produce an artifact.
    pub fn is_producing(&self) -> bool {
        !self.is_marker && self.kind().is_some()
    }

    pub fn binary_name(&self) -> &str {
        self.binary_name.as_deref().unwrap_or(&self.name)
    }

    pub fn artifact_name(&self) -> Option<String> {
        self.kind().map(|kind| kind.artifact_name(self.binary_name()))
    }

    /// Where the artifact ends up: the install dir when set, else the output path.
    pub fn artifact_path(&self) -> Option<PathBuf> {
        let name = self.artifact_name()?;
        let dir: &Path = match (&self.install_path, &self.output_path) {
            (Some(install), _) => install,
            (None, Some(output)) => output,
            (None, None) => return None,
        };
        Some(dir.join(name))
    }

    pub fn add_include_path(&mut self, path: PathBuf) {
        if !self.include_paths.contains(&path) {
            self.include_paths.push(path);
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "module('{}')", self.name)
    }
}
