//! The in-memory topology snapshot: nodes, namespaces, pods and containers.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::resources::{Ledger, Resources};

/// Key of a node inside the [`Snapshot`] that loaded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    name: String,
    allocatable: Resources,
    capacity: Resources,
    available: Ledger,
    labels: BTreeMap<String, String>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        allocatable: Resources,
        capacity: Resources,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            available: Ledger::new(&allocatable),
            allocatable,
            capacity,
            labels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allocatable(&self) -> &Resources {
        &self.allocatable
    }

    pub fn capacity(&self) -> &Resources {
        &self.capacity
    }

    pub fn available(&self) -> &Ledger {
        &self.available
    }

    pub fn available_mut(&mut self) -> &mut Ledger {
        &mut self.available
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    /// Upper bound enforced by the runtime. All-zero when unset.
    pub limits: Resources,
    /// Reserved amount. Kept for reporting, never subtracted.
    pub requests: Resources,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pod {
    pub name: String,
    /// Node the pod is bound to, empty while unscheduled.
    pub node_name: String,
    pub containers: Vec<Container>,
    node: Option<NodeId>,
}

impl Pod {
    pub fn new(
        name: impl Into<String>,
        node_name: impl Into<String>,
        containers: Vec<Container>,
    ) -> Self {
        Self {
            name: name.into(),
            node_name: node_name.into(),
            containers,
            node: None,
        }
    }

    /// The resolved node key, `None` until linked or when no node matched.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_scheduled(&self) -> bool {
        !self.node_name.is_empty()
    }

    pub(crate) fn set_node(&mut self, node: Option<NodeId>) {
        self.node = node;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub pods: Vec<Pod>,
}

impl Namespace {
    pub fn new(name: impl Into<String>, pods: Vec<Pod>) -> Self {
        Self {
            name: name.into(),
            pods,
        }
    }
}

/// One point-in-time view of the cluster.
///
/// Owns every node and namespace. Pods refer to nodes by [`NodeId`] and all
/// lookups go through the snapshot's name index. When two nodes share a name
/// the one loaded last owns the name.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    nodes: Vec<Node>,
    index: HashMap<String, NodeId>,
    namespaces: Vec<Namespace>,
    namespace_filter: Vec<String>,
}

impl Snapshot {
    pub fn new(nodes: Vec<Node>, namespaces: Vec<Namespace>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.clone(), NodeId(i)))
            .collect();
        Self {
            nodes,
            index,
            namespaces,
            namespace_filter: Vec::new(),
        }
    }

    /// Marks the snapshot as covering only the named namespaces.
    pub fn with_namespace_filter(mut self, namespaces: Vec<String>) -> Self {
        self.namespace_filter = namespaces;
        self
    }

    /// Namespaces the snapshot was restricted to; empty when it covers the
    /// whole cluster.
    pub fn namespace_filter(&self) -> &[String] {
        &self.namespace_filter
    }

    /// True when some namespaces were left out, so the ledgers understate
    /// what is already scheduled.
    pub fn is_filtered(&self) -> bool {
        !self.namespace_filter.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn namespaces_mut(&mut self) -> &mut [Namespace] {
        &mut self.namespaces
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.lookup(name).and_then(|id| self.node(id))
    }

    /// The node a linked pod resolved to.
    pub fn pod_node(&self, pod: &Pod) -> Option<&Node> {
        pod.node().and_then(|id| self.node(id))
    }

    pub(crate) fn index_and_namespaces_mut(
        &mut self,
    ) -> (&HashMap<String, NodeId>, &mut [Namespace]) {
        (&self.index, &mut self.namespaces)
    }

    pub(crate) fn nodes_mut_and_namespaces(&mut self) -> (&mut [Node], &[Namespace]) {
        (&mut self.nodes, &self.namespaces)
    }
}

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}
