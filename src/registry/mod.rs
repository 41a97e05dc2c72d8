//! Entity registry.
//!
//! Holds every declared module and library for one build invocation. Entities
//! are created on first reference, addressed by handle, never removed, and
//! iterated in creation order.

use std::collections::HashMap;

use strsim::jaro_winkler;

use crate::model::{Library, LibraryId, Module, ModuleConfig, ModuleId};

/// Inherited by every module that is not a profile.
pub const DEFAULT_MODULE: &str = "default";
/// Inherited by the modules selected as build targets.
pub const TARGETS_MODULE: &str = "targets";

/// Minimum similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug)]
pub struct Registry {
    modules: Vec<Module>,
    module_index: HashMap<String, ModuleId>,
    libraries: Vec<Library>,
    library_index: HashMap<String, LibraryId>,
    targets: Vec<ModuleId>,
    baseline: ModuleConfig,
    default_id: ModuleId,
    targets_id: ModuleId,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates a registry holding only the reserved `default` and `targets` modules.
    pub fn new() -> Self {
        let mut registry = Self {
            modules: Vec::new(),
            module_index: HashMap::new(),
            libraries: Vec::new(),
            library_index: HashMap::new(),
            targets: Vec::new(),
            baseline: ModuleConfig::default(),
            default_id: ModuleId(0),
            targets_id: ModuleId(1),
        };
        registry.default_id = registry.insert_module(|id| Module::new(id, DEFAULT_MODULE).marker());
        registry.targets_id = registry.insert_module(|id| Module::new(id, TARGETS_MODULE).marker());
        registry
    }

    fn insert_module(&mut self, build: impl FnOnce(ModuleId) -> Module) -> ModuleId {
        let id = ModuleId(self.modules.len());
        let module = build(id);
        self.module_index.insert(module.name.clone(), id);
        self.modules.push(module);
        id
    }

    /// Returns the module named `name`, creating it on first reference.
    ///
    /// New modules inherit `default`.
    pub fn get_or_create_module(&mut self, name: &str) -> ModuleId {
        if let Some(id) = self.module_index.get(name) {
            return *id;
        }
        tracing::trace!("Creating module '{}'", name);
        self.insert_module(|id| {
            Module::new(id, name).with_inherits(vec![DEFAULT_MODULE.to_string()])
        })
    }

    /// Returns the profile named `name` (case-insensitive), creating it on first reference.
    pub fn get_or_create_profile(&mut self, name: &str) -> ModuleId {
        let name = name.to_lowercase();
        if let Some(id) = self.module_index.get(&name) {
            return *id;
        }
        tracing::trace!("Creating profile '{}'", name);
        self.insert_module(|id| Module::profile(id, name))
    }

    /// Returns a profile private to `module`, creating it on first reference.
    pub fn module_profile(&mut self, module: ModuleId, profile: &str) -> ModuleId {
        let profile = profile.to_lowercase();
        let scoped = format!("{}:{}", self.modules[module.0].name, profile);
        if let Some(id) = self.module_index.get(&scoped) {
            return *id;
        }
        let id = self.insert_module(|id| Module::profile(id, scoped.clone()));
        self.modules[module.0].profiles.push((profile, scoped));
        id
    }

    /// Returns the library named `name`, creating it on first reference.
    pub fn get_or_create_library(&mut self, name: &str) -> LibraryId {
        if let Some(id) = self.library_index.get(name) {
            return *id;
        }
        tracing::trace!("Creating library '{}'", name);
        let id = LibraryId(self.libraries.len());
        self.libraries.push(Library::new(id, name));
        self.library_index.insert(name.to_string(), id);
        id
    }

    /// Library entry for the output of a library module.
    ///
    /// Reuses the registered library of that name unless it already has
    /// library paths; in that case the registered one keeps the name and a
    /// detached entry is returned (second value `true`).
    pub fn promote_library(&mut self, name: &str) -> (LibraryId, bool) {
        match self.find_library(name) {
            Some(id) if self.libraries[id.0].has_library_paths() => {
                let detached = LibraryId(self.libraries.len());
                self.libraries.push(Library::new(detached, name));
                (detached, true)
            }
            _ => (self.get_or_create_library(name), false),
        }
    }

    pub fn find_module(&self, name: &str) -> Option<ModuleId> {
        self.module_index.get(name).copied()
    }

    pub fn find_library(&self, name: &str) -> Option<LibraryId> {
        self.library_index.get(name).copied()
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0]
    }

    pub fn library(&self, id: LibraryId) -> &Library {
        &self.libraries[id.0]
    }

    pub fn library_mut(&mut self, id: LibraryId) -> &mut Library {
        &mut self.libraries[id.0]
    }

    /// The pristine configuration every module starts from.
    pub fn baseline(&self) -> &ModuleConfig {
        &self.baseline
    }

    pub fn default_module(&self) -> ModuleId {
        self.default_id
    }

    pub fn targets_module(&self) -> ModuleId {
        self.targets_id
    }

    /// Marks a module as a build target. Targets also inherit `targets`.
    pub fn add_target(&mut self, name: &str) -> ModuleId {
        let id = self.get_or_create_module(name);
        self.modules[id.0].add_inherit(TARGETS_MODULE);
        if !self.targets.contains(&id) {
            self.targets.push(id);
        }
        id
    }

    pub fn targets(&self) -> &[ModuleId] {
        &self.targets
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len()).map(ModuleId)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries.iter()
    }

    /// Closest known module or library name to `name`, if any is similar enough.
    pub fn suggest(&self, name: &str) -> Option<String> {
        let query = name.to_lowercase();
        self.modules
            .iter()
            .filter(|m| !m.is_profile)
            .map(|m| m.name.as_str())
            .chain(self.libraries.iter().map(|l| l.name.as_str()))
            .map(|candidate| (candidate, jaro_winkler(&query, &candidate.to_lowercase())))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(candidate, _)| candidate.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut registry = Registry::new();
        let first = registry.get_or_create_module("core");
        let second = registry.get_or_create_module("core");
        assert_eq!(first, second);

        let lib = registry.get_or_create_library("png");
        assert_eq!(lib, registry.get_or_create_library("png"));
        assert_eq!(registry.libraries().count(), 1);
    }

    #[test]
    fn test_reserved_modules_exist() {
        let registry = Registry::new();
        let default = registry.module(registry.default_module());
        assert_eq!(default.name, DEFAULT_MODULE);
        assert!(default.is_marker);
        assert!(default.inherits.is_empty());
        assert_eq!(registry.module(registry.targets_module()).name, TARGETS_MODULE);
    }

    #[test]
    fn test_new_modules_inherit_default() {
        let mut registry = Registry::new();
        let id = registry.get_or_create_module("core");
        assert_eq!(registry.module(id).inherits, vec![DEFAULT_MODULE.to_string()]);
    }

    #[test]
    fn test_profiles_are_case_insensitive() {
        let mut registry = Registry::new();
        let a = registry.get_or_create_profile("Release");
        let b = registry.get_or_create_profile("RELEASE");
        assert_eq!(a, b);

        let profile = registry.module(a);
        assert_eq!(profile.name, "release");
        assert!(profile.is_profile);
        assert!(profile.inherits.is_empty());
    }

    #[test]
    fn test_module_profiles_are_scoped() {
        let mut registry = Registry::new();
        let app = registry.get_or_create_module("app");
        let profile = registry.module_profile(app, "Debug");
        assert_eq!(registry.module(profile).name, "app:debug");
        assert_eq!(
            registry.module(app).profiles,
            vec![("debug".to_string(), "app:debug".to_string())]
        );
        assert_eq!(registry.module_profile(app, "debug"), profile);
    }

    #[test]
    fn test_targets_inherit_targets_module() {
        let mut registry = Registry::new();
        let app = registry.add_target("app");
        registry.add_target("app");
        assert_eq!(registry.targets(), &[app]);
        assert_eq!(
            registry.module(app).inherits,
            vec![DEFAULT_MODULE.to_string(), TARGETS_MODULE.to_string()]
        );
    }

    #[test]
    fn test_suggest_similar_name() {
        let mut registry = Registry::new();
        registry.get_or_create_module("graphics");
        assert_eq!(registry.suggest("grafics"), Some("graphics".to_string()));
        assert_eq!(registry.suggest("zzz"), None);
    }

    #[test]
    fn test_promotion_never_shadows_library_with_paths() {
        let mut registry = Registry::new();
        let (fresh, shadowed) = registry.promote_library("core");
        assert!(!shadowed);
        assert_eq!(registry.find_library("core"), Some(fresh));

        let png = registry.get_or_create_library("png");
        registry
            .library_mut(png)
            .add_library_path(std::path::PathBuf::from("/opt/png/lib"));
        let (detached, shadowed) = registry.promote_library("png");
        assert!(shadowed);
        assert_ne!(detached, png);
        assert_eq!(registry.find_library("png"), Some(png));
    }

    #[test]
    fn test_creation_order_preserved() {
        let mut registry = Registry::new();
        registry.get_or_create_module("b");
        registry.get_or_create_module("a");
        let names: Vec<_> = registry.modules().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec![DEFAULT_MODULE, TARGETS_MODULE, "b", "a"]);
    }
}
