//! Build plans handed to the build tool.
//!
//! A [`BuildPlan`] is everything the underlying tool needs for one module:
//! target kind, sources, compile and link collections and the shell actions
//! around the build.

pub mod emitter;

use std::path::PathBuf;

use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::graph::LinkClosure;
use crate::model::{keys, link_name, Module, ModuleKind};
use crate::model::env::push_unique;

pub use emitter::{CommandLineEmitter, EmitEvent, PlanEmitter, RecordingEmitter};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildPlan {
    pub module: String,
    pub kind: ModuleKind,
    /// Built artifact inside the output directory.
    pub artifact: PathBuf,
    pub output_path: PathBuf,
    /// Install target of the artifact, if any.
    pub installed: Option<PathBuf>,
    pub sources: Vec<PathBuf>,

    pub compiler: Option<String>,
    pub cxx_compiler: Option<String>,
    pub archiver: Option<String>,
    pub linker: Option<String>,

    pub cc_flags: Vec<String>,
    pub cxx_flags: Vec<String>,
    pub defines: Vec<String>,
    pub include_paths: Vec<String>,

    pub link_flags: Vec<String>,
    pub library_paths: Vec<String>,
    pub libraries: Vec<String>,

    pub pre_actions: Vec<String>,
    pub post_actions: Vec<String>,
}

impl BuildPlan {
    /// Assembles the plan of a resolved module from its composed
    /// configuration and its link closure.
    ///
    /// Returns `None` for modules without a kind or output path.
    pub fn assemble(
        module: &Module,
        closure: &LinkClosure,
        library_extensions: &[String],
        diagnostics: &mut Diagnostics,
    ) -> Option<BuildPlan> {
        let kind = module.kind()?;
        let output_path = module.output_path.clone()?;
        let config = module.config();
        let env = &config.env;

        let artifact = output_path.join(kind.artifact_name(module.binary_name()));
        let installed = module
            .install_path
            .as_ref()
            .and_then(|dir| artifact.file_name().map(|name| dir.join(name)));

        let mut include_paths = env.items(keys::INCLUDE_PATHS);
        for path in module.include_paths.iter().chain(closure.include_paths().iter()) {
            push_unique(&mut include_paths, path.display().to_string());
        }

        let mut library_paths = env.items(keys::LIBRARY_PATHS);
        for path in closure.library_paths() {
            push_unique(&mut library_paths, path.display().to_string());
        }

        let mut libraries = Vec::new();
        for item in env.items(keys::LIBS) {
            push_unique(&mut libraries, item);
        }
        for (library, binary) in closure.binaries() {
            let name = link_name(&binary, library_extensions);
            if name.suspicious {
                diagnostics.warn(
                    Some(&module.name),
                    format!(
                        "Binary {} was found in library('{}').binaries, however it's not of form \
                         libXYZ.a (or it has an unknown library file extension) so it might not work correctly",
                        binary, library
                    ),
                );
            }
            push_unique(&mut libraries, name.name);
        }

        let final_artifact = installed.as_ref().unwrap_or(&artifact);
        let mut post_actions = config.post_actions.clone();
        post_actions.push(format!("echo Done building {}", final_artifact.display()));

        Some(BuildPlan {
            module: module.name.clone(),
            kind,
            artifact,
            output_path,
            installed,
            sources: module.sources.clone(),
            compiler: env.text(keys::CC).map(str::to_string),
            cxx_compiler: env.text(keys::CXX).map(str::to_string),
            archiver: env.text(keys::AR).map(str::to_string),
            linker: env.text(keys::LINK).map(str::to_string),
            cc_flags: env.items(keys::CC_FLAGS),
            cxx_flags: env.items(keys::CXX_FLAGS),
            defines: env.items(keys::DEFINES),
            include_paths,
            link_flags: env.items(keys::LINK_FLAGS),
            library_paths,
            libraries,
            pre_actions: config.pre_actions.clone(),
            post_actions,
        })
    }

    /// Final location of the artifact (installed copy when installing).
    pub fn final_artifact(&self) -> &PathBuf {
        self.installed.as_ref().unwrap_or(&self.artifact)
    }
}
