//! BitGraph - who pulled in which bit.
//!
//! Nodes are bit names (plus the root project); an edge `a -> b` means `a`
//! declares `b`. The graph is built while resolving and is read-only
//! afterwards.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

/// A node of the bit graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitNode {
    pub name: String,
    /// Resolved version; `None` for the root and for bits that are not installed.
    pub version: Option<String>,
}

/// The resolved dependency graph, rooted at the project.
#[derive(Debug, Clone)]
pub struct BitGraph {
    graph: DiGraph<BitNode, ()>,
    name_to_node: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

impl BitGraph {
    /// Create a graph holding only the root project.
    pub fn new(root: &str) -> Self {
        let mut graph = DiGraph::new();
        let root_node = graph.add_node(BitNode {
            name: root.to_string(),
            version: None,
        });
        let mut name_to_node = HashMap::new();
        name_to_node.insert(root.to_string(), root_node);
        BitGraph {
            graph,
            name_to_node,
            root: root_node,
        }
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.name_to_node.get(name) {
            return node;
        }
        let node = self.graph.add_node(BitNode {
            name: name.to_string(),
            version: None,
        });
        self.name_to_node.insert(name.to_string(), node);
        node
    }

    /// Record that `from` declares `to`.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from_node = self.node(from);
        let to_node = self.node(to);
        if !self.graph.contains_edge(from_node, to_node) {
            self.graph.add_edge(from_node, to_node, ());
        }
    }

    /// Record the version a bit resolved to.
    pub fn set_version(&mut self, name: &str, version: &str) {
        let node = self.node(name);
        self.graph[node].version = Some(version.to_string());
    }

    /// Get the root project's name.
    pub fn root(&self) -> &str {
        &self.graph[self.root].name
    }

    /// Get a node by name.
    pub fn get(&self, name: &str) -> Option<&BitNode> {
        self.name_to_node.get(name).map(|&n| &self.graph[n])
    }

    /// Direct dependencies of a node, sorted by name.
    pub fn deps(&self, name: &str) -> Vec<&BitNode> {
        let mut deps: Vec<&BitNode> = match self.name_to_node.get(name) {
            Some(&node) => self.graph.neighbors(node).map(|n| &self.graph[n]).collect(),
            None => Vec::new(),
        };
        deps.sort_by(|a, b| a.name.cmp(&b.name));
        deps
    }

    /// Nodes that declare the given one, sorted by name.
    pub fn dependents(&self, name: &str) -> Vec<&BitNode> {
        let mut dependents: Vec<&BitNode> = match self.name_to_node.get(name) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|n| &self.graph[n])
                .collect(),
            None => Vec::new(),
        };
        dependents.sort_by(|a, b| a.name.cmp(&b.name));
        dependents
    }

    /// Number of bits, not counting the root.
    pub fn len(&self) -> usize {
        self.graph.node_count() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Groups of bits that declare each other, each sorted by name.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self.graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut names: Vec<String> = component
                    .into_iter()
                    .map(|n| self.graph[n].name.clone())
                    .collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Render the graph as an indented tree from the root.
    ///
    /// Bits reached a second time are marked `(*)` and not expanded.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let mut seen = HashSet::new();
        self.render_node(self.root(), 0, &mut seen, &mut out);
        out
    }

    fn render_node(&self, name: &str, depth: usize, seen: &mut HashSet<String>, out: &mut String) {
        let node = match self.get(name) {
            Some(node) => node,
            None => return,
        };
        let is_duplicate = !seen.insert(name.to_string());

        let prefix = if depth == 0 {
            String::new()
        } else {
            format!("{}├── ", "│   ".repeat(depth - 1))
        };
        let version = match (&node.version, depth) {
            (_, 0) => String::new(),
            (Some(v), _) => format!(" v{}", v),
            (None, _) => " (not installed)".to_string(),
        };
        let dup_marker = if is_duplicate { " (*)" } else { "" };
        out.push_str(&format!("{}{}{}{}\n", prefix, node.name, version, dup_marker));

        if is_duplicate {
            return;
        }
        for dep in self.deps(name) {
            let dep = dep.name.clone();
            self.render_node(&dep, depth + 1, seen, out);
        }
    }
}
