//! Graph views of the include analysis and their DOT rendering.
//!
//! A view mirrors the folder tree: folders become clusters and files become
//! nodes. Links are attributed with `closes_cycle` when both ends belong to the
//! same strongly connected component. Folder-level links carry `lhead`/`ltail`
//! so Graphviz clips them at the cluster border.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use serde::Serialize;

use super::tree::{Folder, SourceTree};

/// Colour of links between members of the same cycle.
pub const CYCLE_COLOR: &str = "#3F0000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    /// Invisible point standing in for a whole cluster.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub anchor: bool,
}

impl Node {
    fn file(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            anchor: false,
        }
    }

    fn anchor(cluster: &str) -> Self {
        Self {
            id: cluster.to_string(),
            name: String::new(),
            anchor: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub clusters: Vec<Cluster>,
    pub nodes: Vec<Node>,
}

impl Cluster {
    fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.clusters.iter().all(Cluster::is_empty)
    }

    fn find(&self, id: &str) -> Option<&Cluster> {
        let mut pending = vec![self];
        while let Some(cluster) = pending.pop() {
            if cluster.id == id {
                return Some(cluster);
            }
            pending.extend(cluster.clusters.iter());
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub closes_cycle: bool,
    /// Cluster the link ends at, when the target is a folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lhead: Option<String>,
    /// Cluster the link starts at, when the source is a folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ltail: Option<String>,
}

impl Link {
    fn between(source: &str, target: &str, closes_cycle: bool) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            closes_cycle,
            lhead: None,
            ltail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphView {
    pub name: String,
    pub root: Cluster,
    pub links: Vec<Link>,
}

impl GraphView {
    pub fn node_ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_nodes(&self.root, &mut out);
        out
    }

    pub fn cycle_links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(|l| l.closes_cycle)
    }

    /// Every folder cluster below the root, parents before children.
    pub fn cluster_ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut pending: Vec<&Cluster> = self.root.clusters.iter().rev().collect();
        while let Some(cluster) = pending.pop() {
            out.push(cluster.id.as_str());
            pending.extend(cluster.clusters.iter().rev());
        }
        out
    }
}

fn collect_nodes<'a>(cluster: &'a Cluster, out: &mut Vec<&'a str>) {
    for child in &cluster.clusters {
        collect_nodes(child, out);
    }
    out.extend(cluster.nodes.iter().map(|n| n.id.as_str()));
}

fn same_component(members: &HashMap<String, usize>, a: &str, b: &str) -> bool {
    matches!((members.get(a), members.get(b)), (Some(x), Some(y)) if x == y)
}

/// Builds a cluster tree, keeping the files accepted by `keep` and the
/// references accepted by `link`.
fn build(
    folder: &Folder,
    keep: &dyn Fn(&str) -> bool,
    link: &dyn Fn(&str, &str) -> Option<bool>,
    links: &mut Vec<Link>,
) -> Cluster {
    let mut cluster = Cluster {
        id: folder.path.clone(),
        name: folder.name.clone(),
        ..Default::default()
    };
    for child in &folder.folders {
        let sub = build(child, keep, link, links);
        if !sub.is_empty() {
            cluster.clusters.push(sub);
        }
    }
    for file in &folder.files {
        if !keep(&file.path) {
            continue;
        }
        cluster.nodes.push(Node::file(&file.path, &file.name));
        for target in &file.references {
            if let Some(closes_cycle) = link(&file.path, target) {
                links.push(Link::between(&file.path, target, closes_cycle));
            }
        }
    }
    cluster
}

/// Only files that take part in a cycle, linked to members of their own
/// component.
pub fn cyclic_view(tree: &SourceTree, members: &HashMap<String, usize>) -> GraphView {
    let mut links = Vec::new();
    let root = build(
        &tree.root,
        &|id: &str| members.contains_key(id),
        &|from: &str, to: &str| same_component(members, from, to).then_some(true),
        &mut links,
    );
    GraphView {
        name: "cyclic_dependencies".to_string(),
        root,
        links,
    }
}

/// Every scanned file and every reference between scanned files.
pub fn detailed_view(tree: &SourceTree, members: &HashMap<String, usize>) -> GraphView {
    let known: HashSet<&str> = tree.files().into_iter().map(|f| f.path.as_str()).collect();
    let mut links = Vec::new();
    let root = build(
        &tree.root,
        &|_: &str| true,
        &|from: &str, to: &str| known.contains(to).then(|| same_component(members, from, to)),
        &mut links,
    );
    GraphView {
        name: "dependencies".to_string(),
        root,
        links,
    }
}

/// Id of the entry directly inside `folder` that holds `target`, or `None`
/// when `target` lies outside `folder`.
fn child_of(folder: &str, target: &str) -> Option<String> {
    if folder.is_empty() {
        return target.split('/').next().map(str::to_string);
    }
    let rest = target.strip_prefix(folder)?.strip_prefix('/')?;
    rest.split('/').next().map(|head| format!("{}/{}", folder, head))
}

fn push_link(links: &mut Vec<(String, String)>, source: &str, target: String) {
    if !links.iter().any(|(s, t)| s == source && *t == target) {
        links.push((source.to_string(), target));
    }
}

/// Folder-level view. Inside each folder, a reference is lifted to the entry
/// of that folder holding its target, and references leaving a subfolder are
/// attributed to the subfolder itself. Each lifted link appears once.
pub fn internal_view(tree: &SourceTree) -> GraphView {
    let known: HashSet<&str> = tree.files().into_iter().map(|f| f.path.as_str()).collect();
    let mut links = Vec::new();
    let (root, _) = lift(&tree.root, &known, &mut links);
    GraphView {
        name: "internal_dependencies".to_string(),
        root,
        links,
    }
}

/// Returns the cluster for `folder` and the references that leave it.
fn lift<'t>(folder: &'t Folder, known: &HashSet<&str>, links: &mut Vec<Link>) -> (Cluster, Vec<&'t str>) {
    let mut cluster = Cluster {
        id: folder.path.clone(),
        name: folder.name.clone(),
        ..Default::default()
    };
    let mut local: Vec<(String, String)> = Vec::new();
    let mut leaving = Vec::new();

    for child in &folder.folders {
        let (mut sub, outgoing) = lift(child, known, links);
        sub.nodes.insert(0, Node::anchor(&child.path));
        cluster.clusters.push(sub);
        for target in outgoing {
            match child_of(&folder.path, target) {
                Some(id) => push_link(&mut local, &child.path, id),
                None => leaving.push(target),
            }
        }
    }

    for file in &folder.files {
        if !cluster.nodes.iter().any(|node| node.id == file.path) {
            cluster.nodes.push(Node::file(&file.path, &file.name));
        }
        for target in file.references.iter().filter(|t| known.contains(t.as_str())) {
            match child_of(&folder.path, target) {
                Some(id) if id != file.path => push_link(&mut local, &file.path, id),
                Some(_) => {}
                None => leaving.push(target.as_str()),
            }
        }
    }

    let subfolders: HashSet<&str> = folder.folders.iter().map(|f| f.path.as_str()).collect();
    for (source, target) in local {
        let mut link = Link::between(&source, &target, false);
        link.ltail = subfolders.contains(source.as_str()).then(|| source.clone());
        link.lhead = subfolders.contains(target.as_str()).then(|| target.clone());
        links.push(link);
    }

    (cluster, leaving)
}

fn prune(cluster: &Cluster, keep: &HashSet<&str>) -> Cluster {
    Cluster {
        id: cluster.id.clone(),
        name: cluster.name.clone(),
        clusters: cluster
            .clusters
            .iter()
            .map(|child| prune(child, keep))
            .filter(|child| !child.is_empty())
            .collect(),
        nodes: cluster
            .nodes
            .iter()
            .filter(|node| keep.contains(node.id.as_str()))
            .cloned()
            .collect(),
    }
}

/// The part of `view` around one folder: links with an end at the folder or
/// at an entry directly inside it, the nodes they connect and the clusters
/// holding those nodes. `None` when the view has no such folder.
pub fn filtered_view(view: &GraphView, folder: &str) -> Option<GraphView> {
    if folder.is_empty() {
        return None;
    }
    view.root.find(folder)?;

    let touches = |id: &str| id == folder || child_of(folder, id).as_deref() == Some(id);
    let links: Vec<Link> = view
        .links
        .iter()
        .filter(|link| touches(link.source.as_str()) || touches(link.target.as_str()))
        .cloned()
        .collect();
    let keep: HashSet<&str> = links
        .iter()
        .flat_map(|link| [link.source.as_str(), link.target.as_str()])
        .collect();

    Some(GraphView {
        name: format!("{}_{}", view.name, folder.replace('/', "_")),
        root: prune(&view.root, &keep),
        links,
    })
}

/// One filtered view per folder cluster of `view`.
pub fn cluster_views(view: &GraphView) -> Vec<(String, GraphView)> {
    view.cluster_ids()
        .into_iter()
        .filter_map(|id| filtered_view(view, id).map(|filtered| (id.to_string(), filtered)))
        .collect()
}

fn quote(id: &str) -> String {
    format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\""))
}

fn write_cluster(out: &mut String, cluster: &Cluster, depth: usize) {
    let indent = "    ".repeat(depth);
    for child in &cluster.clusters {
        let _ = writeln!(out, "{}subgraph {} {{", indent, quote(&format!("cluster_{}", child.id)));
        let _ = writeln!(out, "{}    label={};", indent, quote(&child.name));
        write_cluster(out, child, depth + 1);
        let _ = writeln!(out, "{}}}", indent);
    }
    for node in &cluster.nodes {
        if node.anchor {
            let _ = writeln!(out, "{}{} [label=\"\", shape=point, style=invis];", indent, quote(&node.id));
        } else {
            let _ = writeln!(out, "{}{} [label={}, shape=box];", indent, quote(&node.id), quote(&node.name));
        }
    }
}

/// Graphviz DOT text of a view.
pub fn to_dot(view: &GraphView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {} {{", quote(&view.name));
    out.push_str("    rankdir=LR;\n    compound=true;\n    concentrate=true;\n");
    write_cluster(&mut out, &view.root, 1);
    for link in &view.links {
        let mut attributes = Vec::new();
        if link.closes_cycle {
            attributes.push(format!("color={}", quote(CYCLE_COLOR)));
        }
        if let Some(head) = &link.lhead {
            attributes.push(format!("lhead={}", quote(&format!("cluster_{}", head))));
        }
        if let Some(tail) = &link.ltail {
            attributes.push(format!("ltail={}", quote(&format!("cluster_{}", tail))));
        }
        if link.lhead.is_some() || link.ltail.is_some() {
            attributes.push("weight=100".to_string());
        }
        if attributes.is_empty() {
            let _ = writeln!(out, "    {} -> {};", quote(&link.source), quote(&link.target));
        } else {
            let _ = writeln!(
                out,
                "    {} -> {} [{}];",
                quote(&link.source),
                quote(&link.target),
                attributes.join(", ")
            );
        }
    }
    out.push_str("}\n");
    out
}
