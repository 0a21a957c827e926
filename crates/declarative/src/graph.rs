//! Dependency graph - resources plus typed require/notify edges
//!
//! Edges are declared by [`ResourceId`] and resolved immediately into
//! indices into the resource table, so nothing is looked up by name while
//! converging. Require cycles are rejected the moment the closing edge is
//! added.

use crate::error::GraphError;
use crate::resource::{BoxedResource, Resource};
use crate::types::{ResourceId, format_attributes};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

/// Kind of edge between two resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Source must converge before target
    Require,
    /// If source changed, target is refreshed after the run
    Notify,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Require => f.write_str("require"),
            Self::Notify => f.write_str("notify"),
        }
    }
}

/// A resolved edge, for display and inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: ResourceId,
    pub to: ResourceId,
    pub kind: EdgeKind,
}

/// Directed graph over resources
#[derive(Default)]
pub struct DependencyGraph {
    resources: Vec<BoxedResource>,
    index: HashMap<ResourceId, usize>,
    /// `requires[i]`: resources that must converge before `i`
    requires: Vec<BTreeSet<usize>>,
    /// `required_by[i]`: resources that wait for `i`
    required_by: Vec<BTreeSet<usize>>,
    /// `notifies[i]`: resources refreshed when `i` changes
    notifies: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource
    ///
    /// Declaring an identity that already exists is a no-op when the
    /// attributes are equal, and an error otherwise.
    pub fn add_resource(&mut self, resource: BoxedResource) -> Result<ResourceId, GraphError> {
        let id = resource.id();

        if let Some(&existing) = self.index.get(&id) {
            let current = self.resources[existing].attributes();
            let declared = resource.attributes();
            if current == declared {
                log::debug!("Merged duplicate declaration of {id}");
                return Ok(id);
            }
            return Err(GraphError::ContradictoryDeclaration {
                id,
                existing: format_attributes(&current),
                declared: format_attributes(&declared),
            });
        }

        self.index.insert(id.clone(), self.resources.len());
        self.resources.push(resource);
        self.requires.push(BTreeSet::new());
        self.required_by.push(BTreeSet::new());
        self.notifies.push(BTreeSet::new());
        Ok(id)
    }

    /// Declare a resource by value
    pub fn add<R: Resource + 'static>(&mut self, resource: R) -> Result<ResourceId, GraphError> {
        self.add_resource(Box::new(resource))
    }

    /// `before` must converge before `after`
    pub fn require(&mut self, before: &ResourceId, after: &ResourceId) -> Result<(), GraphError> {
        let from = self.resolve(before, EdgeKind::Require)?;
        let to = self.resolve(after, EdgeKind::Require)?;

        // An existing path to -> ... -> from means from -> to closes a cycle
        if let Some(path) = self.require_path(to, from) {
            let mut cycle: Vec<ResourceId> =
                path.iter().map(|&i| self.resources[i].id()).collect();
            cycle.push(self.resources[to].id());
            return Err(GraphError::CyclicDependency { cycle });
        }

        self.requires[to].insert(from);
        self.required_by[from].insert(to);
        Ok(())
    }

    /// Refresh `target` after the run if `source` changed
    ///
    /// Notification does not imply ordering; add a require edge as well
    /// when the target must also converge after the source.
    pub fn notify(&mut self, source: &ResourceId, target: &ResourceId) -> Result<(), GraphError> {
        let from = self.resolve(source, EdgeKind::Notify)?;
        let to = self.resolve(target, EdgeKind::Notify)?;
        self.notifies[from].insert(to);
        Ok(())
    }

    fn resolve(&self, id: &ResourceId, edge: EdgeKind) -> Result<usize, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownResource {
                id: id.clone(),
                edge,
            })
    }

    /// Breadth-first search along require edges, returning the path
    fn require_path(&self, start: usize, target: usize) -> Option<Vec<usize>> {
        if start == target {
            return Some(vec![start]);
        }

        let mut previous: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for &next in &self.required_by[node] {
                if next == start || previous.contains_key(&next) {
                    continue;
                }
                previous.insert(next, node);
                if next == target {
                    let mut path = vec![target];
                    let mut cursor = target;
                    while let Some(&prev) = previous.get(&cursor) {
                        path.push(prev);
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Number of declared resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resource at a table index
    pub fn resource(&self, index: usize) -> &dyn Resource {
        self.resources[index].as_ref()
    }

    /// Look up a resource by identity
    pub fn get(&self, id: &ResourceId) -> Option<&dyn Resource> {
        self.index.get(id).map(|&i| self.resources[i].as_ref())
    }

    /// Check if a resource with this identity was declared
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.index.contains_key(id)
    }

    /// Indices of resources that must converge before `index`
    pub fn requires_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.requires[index].iter().copied()
    }

    /// Indices of resources refreshed when `index` changes
    pub fn notifies_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.notifies[index].iter().copied()
    }

    /// All edges, require edges first, each group in declaration order
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for (kind, table) in [
            (EdgeKind::Require, &self.required_by),
            (EdgeKind::Notify, &self.notifies),
        ] {
            for (from, targets) in table.iter().enumerate() {
                for &to in targets {
                    edges.push(Edge {
                        from: self.resources[from].id(),
                        to: self.resources[to].id(),
                        kind,
                    });
                }
            }
        }
        edges
    }

    /// Topological order over require edges
    ///
    /// Among resources that are ready at the same time, the one declared
    /// first comes first, so the order is identical across runs.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut pending: Vec<usize> = self.requires.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = (0..self.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &self.required_by[next] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        debug_assert_eq!(order.len(), self.len(), "require edges are acyclic");
        order
    }

    /// Resources grouped by dependency depth
    ///
    /// Every resource in a level only requires resources from earlier
    /// levels. Within a level, topological order is kept.
    pub fn levels(&self) -> Vec<Vec<usize>> {
        let mut depth = vec![0usize; self.len()];
        let mut levels: Vec<Vec<usize>> = Vec::new();

        for index in self.topological_order() {
            let d = self.requires[index]
                .iter()
                .map(|&p| depth[p] + 1)
                .max()
                .unwrap_or(0);
            depth[index] = d;
            if levels.len() <= d {
                levels.resize_with(d + 1, Vec::new);
            }
            levels[d].push(index);
        }

        levels
    }
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field(
                "resources",
                &self.resources.iter().map(|r| r.id()).collect::<Vec<_>>(),
            )
            .field("edges", &self.edges())
            .finish()
    }
}
