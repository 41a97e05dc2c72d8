//! Static include-graph analyzer.
//!
//! Scans source trees for include directives, builds a file reference graph
//! and reports the files that take part in include cycles. Read-only: it never
//! touches the module registry and never fails a build over a cycle.

pub mod render;
pub mod scanner;
pub mod scc;
pub mod tree;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::diagnostics::Diagnostics;
use crate::error::Result;

pub use render::{cluster_views, cyclic_view, detailed_view, filtered_view, internal_view, to_dot, GraphView};
pub use scanner::{scan_line, scan_root, scan_roots, ScanOptions};
pub use scc::{cyclic_members, strongly_connected_components, ReferenceGraph};
pub use tree::{DuplicateReference, FileKind, Folder, SourceFile, SourceTree};

/// Result of one analyzer run.
#[derive(Debug, Clone)]
pub struct IncludeReport {
    pub tree: SourceTree,
    pub graph: ReferenceGraph,
    /// Cyclic components, more than one member each.
    pub components: Vec<Vec<String>>,
    /// File id to component index, for cyclic files only.
    pub members: HashMap<String, usize>,
    pub duplicates: Vec<DuplicateReference>,
}

impl IncludeReport {
    pub fn has_cycles(&self) -> bool {
        !self.components.is_empty()
    }

    pub fn cyclic_view(&self) -> GraphView {
        cyclic_view(&self.tree, &self.members)
    }

    pub fn detailed_view(&self) -> GraphView {
        detailed_view(&self.tree, &self.members)
    }

    pub fn internal_view(&self) -> GraphView {
        internal_view(&self.tree)
    }

    /// One line per collapsed duplicate reference.
    pub fn duplicates_log(&self) -> String {
        self.duplicates.iter().map(|d| format!("{}\n", d)).collect()
    }
}

/// Scans `roots`, merges duplicates and runs the cycle analysis.
pub fn analyze(roots: &[PathBuf], options: &ScanOptions, diagnostics: &mut Diagnostics) -> Result<IncludeReport> {
    let mut tree = scan_roots(roots, options)?;
    let duplicates = tree.merge_duplicates(diagnostics);
    let graph = ReferenceGraph::from_tree(&tree);
    let components = strongly_connected_components(&graph);
    let members = cyclic_members(&components);

    tracing::info!(
        "Include graph: {} files, {} references, {} cyclic components",
        graph.node_count(),
        graph.edge_count(),
        components.len()
    );

    Ok(IncludeReport {
        tree,
        graph,
        components,
        members,
        duplicates,
    })
}
