//! Third-party library discovery.
//!
//! Every child `<dir>/<lib>` of a library directory is a library root:
//! `<lib>/lib` holds binaries and `<lib>/include` holds headers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::registry::Registry;
use crate::settings::BuildSettings;

use super::layout::SourceLayout;

/// Registers the libraries found under the configured library directories.
///
/// Library paths and binaries are only taken for a library that has no
/// library path yet, so the first directory in priority order wins. Include
/// directories are always appended. Returns the scanned directories.
pub fn scan_library_dirs(registry: &mut Registry, settings: &BuildSettings) -> Result<Vec<PathBuf>> {
    let dirs = SourceLayout::new(settings).library_dirs();

    tracing::debug!("Scanning directories for libraries");
    for dir in &dirs {
        for lib_root in sorted_children(dir)? {
            let Some(name) = lib_root.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let lib_dir = lib_root.join("lib");
            let include_dir = lib_root.join("include");
            if !lib_dir.is_dir() && !include_dir.is_dir() {
                continue;
            }

            let id = registry.get_or_create_library(&name);

            if lib_dir.is_dir() && !registry.library(id).has_library_paths() {
                tracing::debug!("  {}", lib_dir.display());
                let binaries = library_binaries(&lib_dir, settings)?;
                let library = registry.library_mut(id);
                library.add_library_path(lib_dir);
                for binary in binaries {
                    tracing::trace!("    {}", binary);
                    library.add_binary(binary);
                }
            }

            if include_dir.is_dir() {
                tracing::debug!("  {}", include_dir.display());
                registry.library_mut(id).add_include_path(include_dir);
            }
        }
    }

    Ok(dirs)
}

fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    children.sort();
    Ok(children)
}

/// `lib*.<ext>` files with a known library extension, sorted.
fn library_binaries(lib_dir: &Path, settings: &BuildSettings) -> Result<Vec<String>> {
    let mut binaries: Vec<String> = fs::read_dir(lib_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            name.starts_with("lib")
                && name
                    .rsplit_once('.')
                    .map(|(_, ext)| settings.is_library_extension(ext))
                    .unwrap_or(false)
        })
        .collect();
    binaries.sort();
    Ok(binaries)
}
