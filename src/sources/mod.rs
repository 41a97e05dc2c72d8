//! Source resolution.
//!
//! Fills in each module's roots, source paths, include paths and source files.
//! Source and include resolution share one priority-ordered directory list.

pub mod discovery;
pub mod layout;
pub mod libraries;

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::diagnostics::Diagnostics;
use crate::error::{BuildError, Result};
use crate::model::ModuleId;
use crate::registry::Registry;
use crate::settings::BuildSettings;

pub use discovery::{discover_sources, relative_key, SourceWalker};
pub use layout::SourceLayout;
pub use libraries::scan_library_dirs;

/// Fills in roots, output paths and install directories of non-marker modules.
///
/// Runs after composition so inherited install directories are seen.
pub fn complete_paths(
    registry: &mut Registry,
    settings: &BuildSettings,
    output_root: &Path,
    diagnostics: &mut Diagnostics,
) {
    let layout = SourceLayout::new(settings);
    let ids: Vec<ModuleId> = registry
        .modules()
        .filter(|m| !m.is_marker)
        .map(|m| m.id)
        .collect();

    for id in ids {
        let module = registry.module(id);
        let name = module.name.clone();
        let roots = if module.roots.is_empty() {
            layout.locate_roots(&name)
        } else {
            module.roots.clone()
        };
        let output_path = module
            .output_path
            .clone()
            .unwrap_or_else(|| output_root.join(&name));

        let install_path = match &module.config().install_dir {
            Some(dir) => {
                let resolved = layout.resolve_install_dir(dir, roots.first().map(PathBuf::as_path));
                if resolved.is_none() {
                    diagnostics.warn(
                        Some(&name),
                        format!("Install directory {} of {} wasn't found, ignoring it", dir.display(), module),
                    );
                }
                resolved
            }
            None => None,
        };

        let module = registry.module_mut(id);
        module.roots = roots;
        module.output_path = Some(output_path);
        module.install_path = install_path;
    }
}

/// Resolves sources for every non-marker module, in creation order.
pub fn resolve_all(registry: &mut Registry, settings: &BuildSettings, diagnostics: &mut Diagnostics) -> Result<()> {
    let platform_excludes = settings.platform_excludes()?;
    let ids: Vec<ModuleId> = registry
        .modules()
        .filter(|m| !m.is_marker)
        .map(|m| m.id)
        .collect();

    for id in ids {
        resolve_module(registry, id, settings, &platform_excludes, diagnostics)?;
    }
    Ok(())
}

fn resolve_module(
    registry: &mut Registry,
    id: ModuleId,
    settings: &BuildSettings,
    platform_excludes: &[Regex],
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let layout = SourceLayout::new(settings);
    let module = registry.module(id);
    let name = module.name.clone();

    let mut roots = Vec::new();
    for root in &module.roots {
        if root.is_dir() {
            roots.push(root.clone());
        } else if module.is_producing() {
            return Err(BuildError::MissingSourceRoot {
                module: name,
                path: root.clone(),
            });
        } else {
            diagnostics.warn(
                Some(&name),
                format!("Root {} of {} doesn't exist", root.display(), module),
            );
        }
    }

    if roots.is_empty() {
        tracing::debug!("No root for {}, nothing to search", module);
        return Ok(());
    }

    let source_paths = layout.candidate_dirs(&roots);
    if source_paths.is_empty() {
        diagnostics.warn(Some(&name), format!("No source paths were found under {}", module));
    }
    tracing::debug!("Source paths for {}", module);
    tracing::debug!("  Searching source files starting from {}", roots[0].display());

    let mut excludes = platform_excludes.to_vec();
    for pattern in &module.config().exclude_patterns {
        match Regex::new(pattern) {
            Ok(re) => excludes.push(re),
            Err(err) => diagnostics.config_error(
                &name,
                "exclude",
                format!("invalid pattern '{}': {}", pattern, err),
            ),
        }
    }

    let mut sources: Vec<PathBuf> = Vec::new();
    if !module.explicit_sources.is_empty() {
        for source in &module.explicit_sources {
            match locate_explicit(source, &source_paths) {
                Some(path) => push_path(&mut sources, path),
                None => tracing::debug!("  {} doesn't exist, dropping", source.display()),
            }
        }
    } else if module.search_for_sources {
        for path in discover_sources(&source_paths, &excludes, settings)? {
            push_path(&mut sources, path);
        }
    }

    tracing::debug!("  {} source files", sources.len());
    if sources.is_empty() && module.is_producing() {
        diagnostics.warn(Some(&name), format!("No source files were found for {}", module));
    }

    let mut include_paths = source_paths.clone();
    for dir in layout.header_dirs(&roots) {
        push_path(&mut include_paths, dir);
    }

    let module = registry.module_mut(id);
    module.source_paths = source_paths;
    module.sources = sources;
    for path in include_paths {
        module.add_include_path(path);
    }
    Ok(())
}

fn locate_explicit(source: &Path, source_paths: &[PathBuf]) -> Option<PathBuf> {
    if source.is_absolute() {
        return source.is_file().then(|| source.to_path_buf());
    }
    source_paths
        .iter()
        .map(|dir| dir.join(source))
        .find(|candidate| candidate.is_file())
}

fn push_path(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}
