//! End-to-end pipeline of one build invocation.
//!
//! [`Engine::prepare`] turns a manifest into a fully composed and resolved
//! registry: declarations, profile selection, composition, paths, library
//! scan and source resolution. [`Engine::run`] then resolves the dependency
//! graph of the targets and hands plans to an emitter.

use std::path::PathBuf;

use serde::Serialize;

use crate::compose;
use crate::diagnostics::Diagnostics;
use crate::error::{BuildError, Result};
use crate::graph::Resolver;
use crate::manifest::Manifest;
use crate::model::ModuleId;
use crate::plan::PlanEmitter;
use crate::profiles::ProfileSelection;
use crate::registry::Registry;
use crate::settings::BuildSettings;
use crate::sources;

/// What a run resolved.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub profile: String,
    pub output_root: PathBuf,
    /// Module names in build order.
    pub order: Vec<String>,
    pub warnings: usize,
}

pub struct Engine {
    manifest: Manifest,
    settings: BuildSettings,
    registry: Registry,
    selection: ProfileSelection,
    diagnostics: Diagnostics,
    output_root: PathBuf,
    strict: bool,
    prepared: bool,
}

impl Engine {
    /// `settings` should already carry every layer (defaults, manifest, overrides).
    pub fn new(manifest: Manifest, settings: BuildSettings) -> Self {
        let selection = manifest.profile_selection();
        let output_root = settings.output_root_for(&selection.profile_string());
        Self {
            manifest,
            settings,
            registry: Registry::new(),
            selection,
            diagnostics: Diagnostics::new(),
            output_root,
            strict: false,
            prepared: false,
        }
    }

    /// Escalate configuration errors to failures.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Builds the registry. `profiles` replaces the manifest's selection when given.
    ///
    /// Calling it again is a no-op.
    pub fn prepare(&mut self, profiles: Option<&[String]>) -> Result<()> {
        if self.prepared {
            return Ok(());
        }
        tracing::info!("Preparing project '{}'", self.settings.project_name);

        self.manifest
            .apply(&mut self.registry, &self.settings, &mut self.diagnostics);

        let requested = match profiles {
            Some(profiles) => profiles.to_vec(),
            None => self.manifest.profiles.selected.clone(),
        };
        for unknown in self.selection.select(&requested)? {
            self.diagnostics
                .warn(None, format!("Profile {} is not one of the available profiles", unknown));
        }
        self.selection.apply(&mut self.registry, &mut self.diagnostics);
        tracing::info!("Using profile {}", self.selection.profile_string());

        compose::compose_all(&mut self.registry, self.settings.max_depth, &mut self.diagnostics)?;

        self.output_root = self.settings.output_root_for(&self.selection.profile_string());
        sources::complete_paths(
            &mut self.registry,
            &self.settings,
            &self.output_root,
            &mut self.diagnostics,
        );

        let library_dirs = sources::scan_library_dirs(&mut self.registry, &self.settings)?;
        tracing::debug!("Scanned {} library directories", library_dirs.len());

        sources::resolve_all(&mut self.registry, &self.settings, &mut self.diagnostics)?;

        if self.strict {
            self.diagnostics = std::mem::take(&mut self.diagnostics).into_result(true)?;
        }
        self.prepared = true;
        Ok(())
    }

    /// Targets, or every non-marker module when no target was declared.
    pub fn default_roots(&self) -> Vec<ModuleId> {
        if !self.registry.targets().is_empty() {
            return self.registry.targets().to_vec();
        }
        self.registry
            .modules()
            .filter(|m| !m.is_marker)
            .map(|m| m.id)
            .collect()
    }

    /// Resolves the default roots and emits their plans.
    pub fn run(&mut self, emitter: &mut dyn PlanEmitter) -> Result<RunSummary> {
        self.prepare(None)?;
        let roots = self.default_roots();
        self.run_modules(&roots, emitter)
    }

    /// Resolves the named modules and emits their plans.
    pub fn run_named(&mut self, names: &[String], emitter: &mut dyn PlanEmitter) -> Result<RunSummary> {
        self.prepare(None)?;
        let mut roots = Vec::with_capacity(names.len());
        for name in names {
            let id = self
                .registry
                .find_module(name)
                .ok_or_else(|| BuildError::UnresolvedDependency {
                    module: self.settings.project_name.clone(),
                    dependency: name.clone(),
                    suggestion: self.registry.suggest(name),
                })?;
            roots.push(id);
        }
        self.run_modules(&roots, emitter)
    }

    fn run_modules(&mut self, roots: &[ModuleId], emitter: &mut dyn PlanEmitter) -> Result<RunSummary> {
        let mut resolver = Resolver::new(&mut self.registry, &self.settings, emitter, &mut self.diagnostics);
        resolver.resolve_all(roots)?;
        let order = resolver.build_order_names();
        drop(resolver);

        tracing::info!("Resolved {} modules", order.len());
        Ok(RunSummary {
            profile: self.selection.profile_string(),
            output_root: self.output_root.clone(),
            order,
            warnings: self.diagnostics.warnings().count(),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn selection(&self) -> &ProfileSelection {
        &self.selection
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn output_root(&self) -> &PathBuf {
        &self.output_root
    }
}
