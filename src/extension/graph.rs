// src/extension/graph.rs

//! Version graph and path search
//!
//! Nodes are versions; an edge `from -> to` exists for each update script
//! `name--from--to.sql`. A node is installable when `name--version.sql`
//! exists. Nodes live in an arena and refer to each other by index.

use crate::error::{Error, Result};
use tracing::debug;

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct VersionNode {
    pub name: String,
    pub reachable: Vec<NodeId>,
    pub installable: bool,
    // Working state of one search
    distance: usize,
    finalized: bool,
    previous: Option<NodeId>,
}

impl VersionNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reachable: Vec::new(),
            installable: false,
            distance: usize::MAX,
            finalized: false,
            previous: None,
        }
    }
}

/// Versions of one extension and the update scripts between them
#[derive(Debug, Clone, Default)]
pub struct VersionGraph {
    nodes: Vec<VersionNode>,
}

impl VersionGraph {
    /// Build from script file names. Names of other extensions, and names
    /// with more than two `--` separators, are skipped.
    pub fn build<S: AsRef<str>>(extension: &str, script_names: &[S]) -> Self {
        let mut graph = Self::default();
        let prefix = format!("{}--", extension);

        for file_name in script_names {
            let Some(rest) = file_name
                .as_ref()
                .strip_suffix(super::names::SCRIPT_SUFFIX)
                .and_then(|stem| stem.strip_prefix(&prefix))
            else {
                continue;
            };

            match rest.split_once("--") {
                None => {
                    let node = graph.get_or_insert(rest);
                    graph.nodes[node].installable = true;
                }
                Some((from, to)) if !to.contains("--") => {
                    let from = graph.get_or_insert(from);
                    let to = graph.get_or_insert(to);
                    graph.nodes[from].reachable.push(to);
                }
                Some(_) => continue,
            }
        }

        graph
    }

    fn get_or_insert(&mut self, name: &str) -> NodeId {
        match self.find(name) {
            Some(id) => id,
            None => {
                self.nodes.push(VersionNode::new(name));
                self.nodes.len() - 1
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn node(&self, id: NodeId) -> &VersionNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &VersionNode)> {
        self.nodes.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn reset(&mut self) {
        for node in &mut self.nodes {
            node.distance = usize::MAX;
            node.finalized = false;
            node.previous = None;
        }
    }

    /// Unfinalized node with the smallest distance; earlier nodes win ties
    fn nearest_unfinalized(&self) -> Option<NodeId> {
        let mut best: Option<NodeId> = None;
        for (id, node) in self.nodes.iter().enumerate() {
            if node.finalized {
                continue;
            }
            if best.is_none_or(|b| node.distance < self.nodes[b].distance) {
                best = Some(id);
            }
        }
        best
    }

    /// Shortest path from `start` to `target`, as the versions stepped
    /// through after `start`. `None` when unreachable.
    ///
    /// With `reject_indirect`, the path may not pass through another
    /// installable version.
    /// When two predecessors give the same distance, the one whose name
    /// sorts lower is kept.
    pub fn find_update_path(&mut self, start: NodeId, target: NodeId, reject_indirect: bool) -> Option<Vec<String>> {
        if start == target {
            return None;
        }
        self.reset();
        self.nodes[start].distance = 0;

        while let Some(current) = self.nearest_unfinalized() {
            if self.nodes[current].distance == usize::MAX {
                break;
            }
            self.nodes[current].finalized = true;
            if current == target {
                break;
            }

            let next_distance = self.nodes[current].distance + 1;
            for succ in self.nodes[current].reachable.clone() {
                if reject_indirect && self.nodes[succ].installable {
                    continue;
                }
                let node = &self.nodes[succ];
                let replace = if next_distance < node.distance {
                    true
                } else if next_distance == node.distance {
                    node.previous
                        .is_some_and(|prev| self.nodes[current].name < self.nodes[prev].name)
                } else {
                    false
                };
                if replace {
                    self.nodes[succ].distance = next_distance;
                    self.nodes[succ].previous = Some(current);
                }
            }
        }

        if !self.nodes[target].finalized {
            return None;
        }

        let mut path = Vec::new();
        let mut cursor = target;
        while cursor != start {
            path.push(self.nodes[cursor].name.clone());
            cursor = self.nodes[cursor].previous?;
        }
        path.reverse();
        Some(path)
    }

    /// Best way to reach `target` from nothing: the installable version to
    /// start from and the update steps after it. An installable target
    /// needs no steps.
    pub fn find_install_path(&mut self, target: NodeId) -> Option<(NodeId, Vec<String>)> {
        if self.nodes[target].installable {
            return Some((target, Vec::new()));
        }

        let mut best: Option<(NodeId, Vec<String>)> = None;
        for start in 0..self.nodes.len() {
            if !self.nodes[start].installable {
                continue;
            }
            let Some(path) = self.find_update_path(start, target, true) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((best_start, best_path)) => {
                    path.len() < best_path.len()
                        || (path.len() == best_path.len()
                            && self.nodes[*best_start].name < self.nodes[start].name)
                }
            };
            if better {
                best = Some((start, path));
            }
        }
        best
    }
}

/// Versions to step through from `old_version` to `new_version`
pub fn identify_update_path(
    extension: &str,
    script_names: &[String],
    old_version: &str,
    new_version: &str,
) -> Result<Vec<String>> {
    let mut graph = VersionGraph::build(extension, script_names);
    let no_path = || {
        Error::NoPath(format!(
            "extension \"{}\" has no update path from version \"{}\" to version \"{}\"",
            extension, old_version, new_version
        ))
    };

    let start = graph.find(old_version).ok_or_else(no_path)?;
    let target = graph.find(new_version).ok_or_else(no_path)?;
    let path = graph.find_update_path(start, target, false).ok_or_else(no_path)?;
    debug!(
        "Update path for {} from {}: {:?}",
        extension, old_version, path
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_graph() {
        let graph = VersionGraph::build(
            "e",
            &names(&[
                "e--1.0.sql",
                "e--1.0--1.1.sql",
                "e--1.1--1.2.sql",
                "e--1--2--3.sql",
                "other--1.0.sql",
                "e.control",
                "ex--9.sql",
            ]),
        );
        assert_eq!(graph.len(), 3);
        let v10 = graph.find("1.0").unwrap();
        assert!(graph.node(v10).installable);
        assert!(!graph.node(graph.find("1.1").unwrap()).installable);
        assert_eq!(graph.node(v10).reachable, vec![graph.find("1.1").unwrap()]);
        assert!(graph.find("9").is_none());
    }

    #[test]
    fn test_chained_install_path() {
        let mut graph = VersionGraph::build(
            "e",
            &names(&["e--1.0.sql", "e--1.0--1.1.sql", "e--1.1--1.2.sql"]),
        );
        let target = graph.find("1.2").unwrap();
        let (start, path) = graph.find_install_path(target).unwrap();
        assert_eq!(graph.node(start).name, "1.0");
        assert_eq!(path, names(&["1.1", "1.2"]));
    }

    #[test]
    fn test_installable_target_has_empty_path() {
        let mut graph = VersionGraph::build("e", &names(&["e--2.0.sql", "e--1.0--2.0.sql"]));
        let target = graph.find("2.0").unwrap();
        assert_eq!(graph.find_install_path(target), Some((target, vec![])));
    }

    #[test]
    fn test_shortest_path_wins() {
        let mut graph = VersionGraph::build(
            "e",
            &names(&[
                "e--1.0.sql",
                "e--1.0--1.1.sql",
                "e--1.1--1.2.sql",
                "e--1.0--1.2.sql",
            ]),
        );
        let start = graph.find("1.0").unwrap();
        let target = graph.find("1.2").unwrap();
        assert_eq!(graph.find_update_path(start, target, false), Some(names(&["1.2"])));
    }

    #[test]
    fn test_equal_paths_are_deterministic() {
        let scripts = names(&[
            "e--1.0.sql",
            "e--1.0--1.1a.sql",
            "e--1.0--1.1b.sql",
            "e--1.1a--2.0.sql",
            "e--1.1b--2.0.sql",
        ]);
        let mut first = None;
        for _ in 0..5 {
            let path = identify_update_path("e", &scripts, "1.0", "2.0").unwrap();
            assert_eq!(path.len(), 2);
            match &first {
                None => first = Some(path),
                Some(expected) => assert_eq!(&path, expected),
            }
        }
        assert_eq!(first.unwrap(), names(&["1.1a", "2.0"]));
    }

    #[test]
    fn test_reject_indirect() {
        let mut graph = VersionGraph::build(
            "e",
            &names(&["e--1.0.sql", "e--1.1.sql", "e--1.0--1.1.sql", "e--1.1--1.2.sql"]),
        );
        let target = graph.find("1.2").unwrap();
        let (start, path) = graph.find_install_path(target).unwrap();
        assert_eq!(graph.node(start).name, "1.1");
        assert_eq!(path, names(&["1.2"]));

        let from = graph.find("1.0").unwrap();
        assert_eq!(graph.find_update_path(from, target, true), None);
        assert_eq!(
            graph.find_update_path(from, target, false),
            Some(names(&["1.1", "1.2"]))
        );
    }

    #[test]
    fn test_equal_install_paths_prefer_higher_start() {
        let mut graph = VersionGraph::build(
            "e",
            &names(&["e--a.sql", "e--b.sql", "e--a--c.sql", "e--b--c.sql"]),
        );
        let target = graph.find("c").unwrap();
        let (start, _) = graph.find_install_path(target).unwrap();
        assert_eq!(graph.node(start).name, "b");
    }

    #[test]
    fn test_no_path() {
        let scripts = names(&["e--1.0.sql", "e--2.0.sql"]);
        let err = identify_update_path("e", &scripts, "1.0", "2.0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "extension \"e\" has no update path from version \"1.0\" to version \"2.0\""
        );
        assert!(identify_update_path("e", &scripts, "1.0", "9.9").is_err());
    }
}
