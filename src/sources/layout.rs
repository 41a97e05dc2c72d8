//! Directory layout conventions.
//!
//! All lists are in priority order, contain only existing directories and hold
//! each directory once.

use std::path::{Path, PathBuf};

use crate::settings::BuildSettings;

pub struct SourceLayout<'a> {
    settings: &'a BuildSettings,
}

impl<'a> SourceLayout<'a> {
    pub fn new(settings: &'a BuildSettings) -> Self {
        Self { settings }
    }

    /// Source directories under the given module roots.
    ///
    /// Per root: platform variants, environment variants, the plain source
    /// directories, then `common/src`.
    pub fn candidate_dirs(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        for root in roots {
            for attr in &self.settings.platform_attributes {
                candidates.push(root.join("platforms").join(attr).join("src"));
            }
            for attr in &self.settings.platform_attributes {
                candidates.push(root.join("environments").join(attr).join("src"));
            }
            for dir in &self.settings.source_dir_names {
                candidates.push(root.join(dir));
            }
            candidates.push(root.join("common").join("src"));
        }
        existing_unique(candidates)
    }

    /// First existing `<root>/<module dir>/<name>` over the configured roots.
    pub fn locate_root(&self, module_name: &str) -> Option<PathBuf> {
        self.locate_roots(module_name).into_iter().next()
    }

    /// The module's directory under each configured root, project first.
    pub fn locate_roots(&self, module_name: &str) -> Vec<PathBuf> {
        self.settings
            .roots()
            .iter()
            .filter_map(|root| {
                self.settings
                    .module_dir_names
                    .iter()
                    .map(|dir| root.join(dir).join(module_name))
                    .find(|candidate| candidate.is_dir())
            })
            .collect()
    }

    /// Separate header directories under the given module roots.
    pub fn header_dirs(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        let candidates = roots
            .iter()
            .flat_map(|root| self.settings.header_dir_names.iter().map(move |dir| root.join(dir)))
            .collect();
        existing_unique(candidates)
    }

    /// Directories scanned for third-party libraries.
    ///
    /// Platform variants before common ones, project before engine.
    pub fn library_dirs(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        for root in self.settings.roots() {
            for dir in &self.settings.library_dir_names {
                for attr in &self.settings.platform_attributes {
                    candidates.push(root.join(dir).join("platforms").join(attr));
                }
            }
            for dir in &self.settings.library_dir_names {
                candidates.push(root.join(dir).join("common"));
            }
        }
        let dirs = existing_unique(candidates);
        if dirs.is_empty() {
            tracing::debug!("Library directories not found");
        }
        dirs
    }

    /// Resolves a relative install dir against the module root, then the project root.
    pub fn resolve_install_dir(&self, install_dir: &Path, module_root: Option<&Path>) -> Option<PathBuf> {
        if install_dir.exists() {
            return Some(install_dir.to_path_buf());
        }
        if install_dir.is_absolute() {
            return None;
        }
        module_root
            .map(|root| root.join(install_dir))
            .into_iter()
            .chain(std::iter::once(self.settings.project_root.join(install_dir)))
            .find(|candidate| candidate.exists())
    }
}

fn existing_unique(candidates: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        if candidate.is_dir() && !dirs.contains(&candidate) {
            dirs.push(candidate);
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_candidate_dirs_priority() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        for sub in ["common/src", "src", "platforms/linux/src", "environments/linux/src"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        let settings = BuildSettings::new(&root).with_platform("linux");
        let layout = SourceLayout::new(&settings);

        let dirs = layout.candidate_dirs(&[root.clone(), root.clone()]);
        assert_eq!(
            dirs,
            vec![
                root.join("platforms/linux/src"),
                root.join("environments/linux/src"),
                root.join("src"),
                root.join("common/src"),
            ]
        );
    }

    #[test]
    fn test_locate_root_uses_module_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("modules/core")).unwrap();
        let settings = BuildSettings::new(dir.path());
        let layout = SourceLayout::new(&settings);

        assert_eq!(layout.locate_root("core"), Some(dir.path().join("modules/core")));
        assert_eq!(layout.locate_root("missing"), None);
    }

    #[test]
    fn test_locate_roots_across_project_and_engine() {
        let project = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        fs::create_dir_all(project.path().join("modules/core")).unwrap();
        fs::create_dir_all(engine.path().join("sources/core")).unwrap();
        let settings = BuildSettings::new(project.path()).with_engine_root(engine.path());
        let layout = SourceLayout::new(&settings);

        assert_eq!(
            layout.locate_roots("core"),
            vec![project.path().join("modules/core"), engine.path().join("sources/core")]
        );
    }

    #[test]
    fn test_library_dirs_project_before_engine() {
        let project = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        fs::create_dir_all(project.path().join("lib/common")).unwrap();
        fs::create_dir_all(project.path().join("lib/platforms/linux")).unwrap();
        fs::create_dir_all(engine.path().join("libraries/common")).unwrap();

        let settings = BuildSettings::new(project.path())
            .with_engine_root(engine.path())
            .with_platform("linux");
        let layout = SourceLayout::new(&settings);

        assert_eq!(
            layout.library_dirs(),
            vec![
                project.path().join("lib/platforms/linux"),
                project.path().join("lib/common"),
                engine.path().join("libraries/common"),
            ]
        );
    }

    #[test]
    fn test_install_dir_resolution() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app/bin")).unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        let settings = BuildSettings::new(dir.path());
        let layout = SourceLayout::new(&settings);
        let module_root = dir.path().join("app");

        assert_eq!(
            layout.resolve_install_dir(Path::new("bin"), Some(&module_root)),
            Some(module_root.join("bin"))
        );
        assert_eq!(
            layout.resolve_install_dir(Path::new("dist"), Some(&module_root)),
            Some(dir.path().join("dist"))
        );
        assert_eq!(layout.resolve_install_dir(Path::new("nowhere"), Some(&module_root)), None);
    }
}
