//! Build settings shared by every stage of the engine.
//!
//! Settings are layered: built-in defaults, then the manifest's `[project]` and
//! `[layout]` tables, then command-line overrides.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Name of the project being built.
    pub project_name: String,
    pub project_root: PathBuf,
    /// Optional second root searched after the project (shared engine sources).
    pub engine_root: Option<PathBuf>,
    pub platform: String,
    /// Platform variants searched under `platforms/` and `environments/`,
    /// most specific first.
    pub platform_attributes: Vec<String>,
    /// Explicit output root; derived from the profile string when unset.
    pub output_root: Option<PathBuf>,

    pub source_dir_names: Vec<String>,
    pub header_dir_names: Vec<String>,
    pub module_dir_names: Vec<String>,
    pub library_dir_names: Vec<String>,

    pub source_extensions: Vec<String>,
    pub header_extensions: Vec<String>,
    pub library_extensions: Vec<String>,
    /// Directory names never entered while walking source trees.
    pub vcs_dir_names: Vec<String>,

    /// Exclude patterns applied to every module on this platform.
    pub exclude_patterns: Vec<String>,

    pub max_depth: usize,
    /// Skip a relative source path that an earlier directory already provided.
    pub remove_duplicate_sources: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        let platform = std::env::consts::OS.to_string();
        Self {
            project_name: "project".to_string(),
            project_root: PathBuf::from("."),
            engine_root: None,
            platform_attributes: vec![platform.clone()],
            platform,
            output_root: None,
            source_dir_names: strings(&["src", "source", "sources"]),
            header_dir_names: strings(&["headers", "include", "includes"]),
            module_dir_names: strings(&["sources", "module", "modules"]),
            library_dir_names: strings(&["lib", "library", "libraries"]),
            source_extensions: strings(&["c", "cpp"]),
            header_extensions: strings(&["h"]),
            library_extensions: strings(&["so", "dll", "a", "lib"]),
            vcs_dir_names: strings(&[".svn", ".git", ".hg"]),
            exclude_patterns: Vec::new(),
            max_depth: 256,
            remove_duplicate_sources: true,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl BuildSettings {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    pub fn with_engine_root(mut self, engine_root: impl Into<PathBuf>) -> Self {
        self.engine_root = Some(engine_root.into());
        self
    }

    /// Sets the platform and resets its attributes to the platform name alone.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self.platform_attributes = vec![self.platform.clone()];
        self
    }

    pub fn with_platform_attributes(mut self, attributes: Vec<String>) -> Self {
        self.platform_attributes = attributes;
        self
    }

    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(output_root.into());
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Project root first, then the engine root when it is a different directory.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.project_root.clone()];
        if let Some(engine) = &self.engine_root {
            if engine != &self.project_root {
                roots.push(engine.clone());
            }
        }
        roots
    }

    /// Output root for the given profile string.
    pub fn output_root_for(&self, profile_string: &str) -> PathBuf {
        match &self.output_root {
            Some(root) => root.clone(),
            None => self
                .project_root
                .join("output")
                .join(&self.platform)
                .join(profile_string),
        }
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        has_extension(path, &self.source_extensions)
    }

    pub fn is_header_file(&self, path: &Path) -> bool {
        has_extension(path, &self.header_extensions)
    }

    pub fn is_vcs_dir(&self, name: &str) -> bool {
        self.vcs_dir_names.iter().any(|d| d == name)
    }

    pub fn is_library_extension(&self, ext: &str) -> bool {
        self.library_extensions.iter().any(|e| e == ext)
    }

    /// Compiles the platform-wide exclude patterns.
    pub fn platform_excludes(&self) -> Result<Vec<Regex>> {
        compile_patterns(&self.exclude_patterns)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|e| e == ext))
        .unwrap_or(false)
}

pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| BuildError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Command-line overrides, the highest settings layer.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub project: Option<PathBuf>,
    pub engine: Option<PathBuf>,
    pub platform: Option<String>,
    pub output: Option<PathBuf>,
    pub max_depth: Option<usize>,
}

impl SettingsOverrides {
    pub fn apply(&self, mut settings: BuildSettings) -> BuildSettings {
        if let Some(project) = &self.project {
            settings.project_root = project.clone();
        }
        if let Some(engine) = &self.engine {
            settings.engine_root = Some(engine.clone());
        }
        if let Some(platform) = &self.platform {
            settings = settings.with_platform(platform.clone());
        }
        if let Some(output) = &self.output {
            settings.output_root = Some(output.clone());
        }
        if let Some(max_depth) = self.max_depth {
            settings.max_depth = max_depth;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_root_uses_profile_string() {
        let settings = BuildSettings::new("/work/app").with_platform("linux");
        assert_eq!(
            settings.output_root_for("release"),
            PathBuf::from("/work/app/output/linux/release")
        );

        let settings = settings.with_output_root("/tmp/out");
        assert_eq!(settings.output_root_for("release"), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_roots_skip_duplicate_engine() {
        let settings = BuildSettings::new("/work").with_engine_root("/work");
        assert_eq!(settings.roots(), vec![PathBuf::from("/work")]);

        let settings = BuildSettings::new("/work").with_engine_root("/engine");
        assert_eq!(settings.roots().len(), 2);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = SettingsOverrides {
            platform: Some("qnx".to_string()),
            max_depth: Some(8),
            ..Default::default()
        };
        let settings = overrides.apply(BuildSettings::new("/work"));
        assert_eq!(settings.platform, "qnx");
        assert_eq!(settings.platform_attributes, vec!["qnx".to_string()]);
        assert_eq!(settings.max_depth, 8);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = compile_patterns(&["(".to_string()]).unwrap_err();
        assert!(matches!(err, BuildError::InvalidPattern { .. }));
    }

    #[test]
    fn test_extension_checks() {
        let settings = BuildSettings::default();
        assert!(settings.is_source_file(Path::new("a/b.cpp")));
        assert!(!settings.is_source_file(Path::new("a/b.h")));
        assert!(settings.is_header_file(Path::new("a/b.h")));
        assert!(settings.is_vcs_dir(".svn"));
    }
}
