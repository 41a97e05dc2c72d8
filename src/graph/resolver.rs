//! Dependency resolution and build ordering.
//!
//! Resolution runs in two passes. The planning pass walks `depends` edges
//! depth-first with an explicit stack, detects cycles and records the
//! post-order build order. The build pass then visits modules in that order,
//! accumulates link closures, hands buildable modules to the emitter and
//! promotes library modules. A cycle or unresolved dependency therefore fails
//! before anything has been emitted.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::Diagnostics;
use crate::error::{BuildError, Result};
use crate::model::{LibraryId, ModuleId, ModuleKind};
use crate::plan::{BuildPlan, PlanEmitter};
use crate::registry::Registry;
use crate::settings::BuildSettings;

use super::closure::LinkClosure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Module(ModuleId),
    /// A dependency name that only exists as a library.
    Library(LibraryId),
}

struct Frame {
    id: ModuleId,
    deps: Vec<ModuleId>,
    next: usize,
}

pub struct Resolver<'a> {
    registry: &'a mut Registry,
    settings: &'a BuildSettings,
    emitter: &'a mut dyn PlanEmitter,
    diagnostics: &'a mut Diagnostics,
    edges: HashMap<ModuleId, Vec<Edge>>,
    planned: HashSet<ModuleId>,
    resolved: HashSet<ModuleId>,
    closures: HashMap<ModuleId, LinkClosure>,
    order: Vec<ModuleId>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        registry: &'a mut Registry,
        settings: &'a BuildSettings,
        emitter: &'a mut dyn PlanEmitter,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            registry,
            settings,
            emitter,
            diagnostics,
            edges: HashMap::new(),
            planned: HashSet::new(),
            resolved: HashSet::new(),
            closures: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Resolves a module and everything it depends on. Memoized.
    pub fn resolve(&mut self, module: ModuleId) -> Result<()> {
        self.resolve_all(&[module])
    }

    /// Resolves several modules. All of them are planned before anything is built.
    pub fn resolve_all(&mut self, modules: &[ModuleId]) -> Result<()> {
        let start = self.order.len();
        for module in modules {
            self.plan(*module)?;
        }

        let pending: Vec<ModuleId> = self.order[start..].to_vec();
        tracing::debug!("Emitting with {}", self.emitter.name());
        for id in pending {
            self.build(id)?;
        }
        Ok(())
    }

    /// Modules in build order: dependencies strictly before dependents.
    pub fn build_order(&self) -> &[ModuleId] {
        &self.order
    }

    pub fn build_order_names(&self) -> Vec<String> {
        self.order
            .iter()
            .map(|id| self.registry.module(*id).name.clone())
            .collect()
    }

    pub fn is_resolved(&self, module: ModuleId) -> bool {
        self.resolved.contains(&module)
    }

    pub fn closure(&self, module: ModuleId) -> Option<&LinkClosure> {
        self.closures.get(&module)
    }

    fn name(&self, id: ModuleId) -> String {
        self.registry.module(id).name.clone()
    }

    fn plan(&mut self, root: ModuleId) -> Result<()> {
        if self.planned.contains(&root) {
            return Ok(());
        }

        let mut in_progress = vec![root];
        let mut stack = vec![Frame {
            id: root,
            deps: self.module_edges(root)?,
            next: 0,
        }];

        while let Some(top) = stack.last_mut() {
            if top.next < top.deps.len() {
                let dep = top.deps[top.next];
                top.next += 1;
                if self.planned.contains(&dep) {
                    continue;
                }
                if let Some(pos) = in_progress.iter().position(|m| *m == dep) {
                    let mut chain: Vec<String> = in_progress[pos..].iter().map(|m| self.name(*m)).collect();
                    chain.push(self.name(dep));
                    return Err(BuildError::CircularDependency {
                        module: self.name(dep),
                        chain,
                    });
                }
                if stack.len() >= self.settings.max_depth {
                    return Err(BuildError::MaxDepthExceeded {
                        module: self.name(dep),
                        depth: self.settings.max_depth,
                    });
                }
                let deps = self.module_edges(dep)?;
                in_progress.push(dep);
                stack.push(Frame { id: dep, deps, next: 0 });
            } else {
                let id = top.id;
                stack.pop();
                in_progress.pop();
                self.planned.insert(id);
                self.order.push(id);
            }
        }

        Ok(())
    }

    /// Looks up the declared dependencies of `id` and returns the module ones.
    fn module_edges(&mut self, id: ModuleId) -> Result<Vec<ModuleId>> {
        let module = self.registry.module(id);
        let mut edges = Vec::new();

        for name in &module.config().depends {
            if let Some(dep) = self.registry.find_module(name) {
                edges.push(Edge::Module(dep));
            } else if let Some(library) = self.registry.find_library(name) {
                self.diagnostics.note(
                    Some(&module.name),
                    format!(
                        "module('{}') marked as dependency in {} wasn't defined. Assuming library('{}') was meant instead.",
                        name, module, name
                    ),
                );
                edges.push(Edge::Library(library));
            } else {
                return Err(BuildError::UnresolvedDependency {
                    module: module.name.clone(),
                    dependency: name.clone(),
                    suggestion: self.registry.suggest(name),
                });
            }
        }

        let modules = edges
            .iter()
            .filter_map(|edge| match edge {
                Edge::Module(dep) => Some(*dep),
                Edge::Library(_) => None,
            })
            .collect();
        self.edges.insert(id, edges);
        Ok(modules)
    }

    fn build(&mut self, id: ModuleId) -> Result<()> {
        if self.resolved.contains(&id) {
            return Ok(());
        }
        tracing::debug!("Setting up {}...", self.registry.module(id));

        let mut closure = LinkClosure::new();
        let edges = self.edges.get(&id).cloned().unwrap_or_default();
        for edge in edges {
            match edge {
                Edge::Module(dep_id) => {
                    let dep = self.registry.module(dep_id);
                    match (dep.kind(), dep.library) {
                        (_, Some(library)) => {
                            closure.absorb(self.registry.library(library));
                        }
                        (Some(ModuleKind::Executable), None) => self.diagnostics.warn(
                            Some(&self.registry.module(id).name),
                            format!("{} marked as a dependency despite being an executable", dep),
                        ),
                        (Some(_), None) => self.diagnostics.warn(
                            Some(&self.registry.module(id).name),
                            format!(
                                "{} marked as a dependency despite not having a valid library definition",
                                dep
                            ),
                        ),
                        (None, None) => {}
                    }
                    if let Some(dep_closure) = self.closures.get(&dep_id) {
                        closure.extend_from(dep_closure);
                    }
                }
                Edge::Library(library) => {
                    closure.absorb(self.registry.library(library));
                }
            }
        }

        let module = self.registry.module(id);
        let buildable = module.is_producing() && !module.sources.is_empty();
        for name in &module.config().used_libraries {
            let library = self.registry.find_library(name).or_else(|| {
                self.registry
                    .find_module(name)
                    .and_then(|m| self.registry.module(m).library)
            });
            match library {
                Some(library) => {
                    closure.absorb(self.registry.library(library));
                }
                None if buildable => {
                    return Err(BuildError::MissingLibrary {
                        module: module.name.clone(),
                        library: name.clone(),
                    });
                }
                None => self.diagnostics.warn(
                    Some(&module.name),
                    format!("Couldn't find library('{}') required by {}", name, module),
                ),
            }
        }

        if buildable {
            self.emit(id, &closure)?;
        } else {
            tracing::debug!("Nothing to build in {}", module);
        }

        tracing::debug!("{} done.", self.registry.module(id));
        self.closures.insert(id, closure);
        self.resolved.insert(id);
        Ok(())
    }

    fn emit(&mut self, id: ModuleId, closure: &LinkClosure) -> Result<()> {
        let module = self.registry.module(id);
        let Some(plan) = BuildPlan::assemble(
            module,
            closure,
            &self.settings.library_extensions,
            self.diagnostics,
        ) else {
            return Err(BuildError::MissingOutputPath {
                module: module.name.clone(),
            });
        };

        for action in &plan.pre_actions {
            tracing::debug!("  Preaction: {}", action);
            self.emitter.pre_action(&plan.module, action)?;
        }
        self.emitter.emit(&plan)?;
        for action in &plan.post_actions {
            tracing::debug!("  Postaction: {}", action);
            self.emitter.post_action(&plan.module, action)?;
        }

        if plan.kind.is_library() {
            self.promote(id, &plan);
        }
        Ok(())
    }

    /// Turns a built library module into a library entry for its dependents.
    fn promote(&mut self, id: ModuleId, plan: &BuildPlan) {
        let artifact = plan.final_artifact();
        let (library, shadowed) = self.registry.promote_library(&plan.module);
        if shadowed {
            self.diagnostics.warn(
                Some(&plan.module),
                format!(
                    "library('{}') already has library paths; the output of module('{}') is only linked into its dependents",
                    plan.module, plan.module
                ),
            );
        }

        let source_paths = self.registry.module(id).source_paths.clone();
        let entry = self.registry.library_mut(library);
        for path in source_paths {
            entry.add_include_path(path);
        }
        if let Some(file) = artifact.file_name().and_then(|f| f.to_str()) {
            entry.add_binary(file);
        }
        if let Some(dir) = artifact.parent() {
            entry.add_library_path(dir.to_path_buf());
        }
        self.registry.module_mut(id).library = Some(library);
        tracing::debug!("Promoted {} to library('{}')", plan.module, plan.module);
    }
}
