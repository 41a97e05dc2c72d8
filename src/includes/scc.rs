//! File reference graph and strongly connected components.

use std::collections::HashMap;

use super::tree::SourceTree;

/// Directed graph of file references. Nodes are file ids; referenced ids that
/// were never scanned (system headers) are nodes without outgoing edges.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<Vec<usize>>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from a merged tree, in tree order.
    pub fn from_tree(tree: &SourceTree) -> Self {
        let mut graph = Self::new();
        for file in tree.files() {
            graph.node(&file.path);
            for target in &file.references {
                graph.add_edge(&file.path, target);
            }
        }
        graph
    }

    fn node(&mut self, id: &str) -> usize {
        if let Some(index) = self.index.get(id) {
            return *index;
        }
        let index = self.nodes.len();
        self.nodes.push(id.to_string());
        self.edges.push(Vec::new());
        self.index.insert(id.to_string(), index);
        index
    }

    /// Adds `from -> to`. Self-edges and repeated edges are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from = self.node(from);
        let to = self.node(to);
        if from != to && !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(from), Some(to)) => self.edges[*from].contains(to),
            _ => false,
        }
    }

    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|i| self.edges[*i].iter().map(|t| self.nodes[*t].as_str()).collect())
            .unwrap_or_default()
    }
}

struct Tarjan<'a> {
    graph: &'a ReferenceGraph,
    next_index: usize,
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn new(graph: &'a ReferenceGraph) -> Self {
        let n = graph.node_count();
        Self {
            graph,
            next_index: 0,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    fn discover(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    fn run(mut self) -> Vec<Vec<usize>> {
        for start in 0..self.graph.node_count() {
            if self.index[start].is_none() {
                self.visit(start);
            }
        }
        self.components
    }

    /// Depth-first visit with an explicit `(node, next edge)` stack.
    fn visit(&mut self, start: usize) {
        self.discover(start);
        let mut work: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some((v, edge)) = work.last().copied() {
            if let Some(&w) = self.graph.edges[v].get(edge) {
                if let Some(frame) = work.last_mut() {
                    frame.1 += 1;
                }
                match self.index[w] {
                    None => {
                        self.discover(w);
                        work.push((w, 0));
                    }
                    Some(w_index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }
            if Some(self.lowlink[v]) == self.index[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                self.components.push(component);
            }
        }
    }
}

/// Components with more than one member, in discovery order. Members keep
/// graph order. Singletons are dropped since self-edges never exist.
pub fn strongly_connected_components(graph: &ReferenceGraph) -> Vec<Vec<String>> {
    Tarjan::new(graph)
        .run()
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| component.into_iter().map(|i| graph.nodes[i].clone()).collect())
        .collect()
}

/// Maps every file that takes part in a cycle to its component index.
pub fn cyclic_members(components: &[Vec<String>]) -> HashMap<String, usize> {
    components
        .iter()
        .enumerate()
        .flat_map(|(i, component)| component.iter().map(move |member| (member.clone(), i)))
        .collect()
}
