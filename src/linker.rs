use serde::Serialize;
use tracing::{debug, warn};

use crate::model::Snapshot;

/// A scheduled pod whose node name matched no loaded node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedPod {
    pub namespace: String,
    pub pod: String,
    pub node_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkOutcome {
    pub resolved: usize,
    /// Pods with no node name at all.
    pub unscheduled: usize,
    pub unresolved: Vec<UnresolvedPod>,
}

/// Resolves every pod's node name to a key into the snapshot's node index.
///
/// Matching is exact and case-sensitive. Every key is recomputed, so linking
/// twice is harmless. Pods that match nothing are left unresolved and are
/// ignored by accounting.
pub fn link(snapshot: &mut Snapshot) -> LinkOutcome {
    let mut outcome = LinkOutcome::default();
    let (index, namespaces) = snapshot.index_and_namespaces_mut();

    for namespace in namespaces.iter_mut() {
        for pod in namespace.pods.iter_mut() {
            let node = index.get(&pod.node_name).copied();
            pod.set_node(node);

            match node {
                Some(_) => outcome.resolved += 1,
                None if !pod.is_scheduled() => {
                    debug!(namespace = %namespace.name, pod = %pod.name, "pod is not scheduled");
                    outcome.unscheduled += 1;
                }
                None => {
                    warn!(
                        namespace = %namespace.name,
                        pod = %pod.name,
                        node = %pod.node_name,
                        "pod is bound to a node missing from the snapshot"
                    );
                    outcome.unresolved.push(UnresolvedPod {
                        namespace: namespace.name.clone(),
                        pod: pod.name.clone(),
                        node_name: pod.node_name.clone(),
                    });
                }
            }
        }
    }

    debug!(
        resolved = outcome.resolved,
        unscheduled = outcome.unscheduled,
        unresolved = outcome.unresolved.len(),
        "linked pods to nodes"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::{Namespace, Node, Pod};
    use crate::resources::Resources;

    fn snapshot(nodes: &[&str], pods: &[(&str, &str)]) -> Snapshot {
        let nodes = nodes
            .iter()
            .map(|name| {
                Node::new(*name, Resources::default(), Resources::default(), BTreeMap::new())
            })
            .collect();
        let pods = pods
            .iter()
            .map(|(pod, node)| Pod::new(*pod, *node, vec![]))
            .collect();
        Snapshot::new(nodes, vec![Namespace::new("default", pods)])
    }

    #[test]
    fn links_pods_to_matching_nodes() {
        let mut snap = snapshot(&["n1", "n2"], &[("a", "n1"), ("b", "n2"), ("c", "n1")]);
        let outcome = link(&mut snap);
        assert_eq!(outcome.resolved, 3);

        let pods = &snap.namespaces()[0].pods;
        assert_eq!(snap.pod_node(&pods[0]).unwrap().name(), "n1");
        assert_eq!(snap.pod_node(&pods[1]).unwrap().name(), "n2");
        assert_eq!(pods[0].node(), pods[2].node());
    }

    #[test]
    fn unknown_and_unscheduled_pods_stay_unresolved() {
        let mut snap = snapshot(&["n1"], &[("a", "ghost"), ("b", ""), ("c", "N1")]);
        let outcome = link(&mut snap);

        assert_eq!(outcome.resolved, 0);
        assert_eq!(outcome.unscheduled, 1);
        assert_eq!(
            outcome.unresolved,
            vec![
                UnresolvedPod {
                    namespace: "default".into(),
                    pod: "a".into(),
                    node_name: "ghost".into(),
                },
                UnresolvedPod {
                    namespace: "default".into(),
                    pod: "c".into(),
                    node_name: "N1".into(),
                },
            ]
        );
        assert!(snap.namespaces()[0].pods.iter().all(|p| p.node().is_none()));
    }

    #[test]
    fn relinking_is_stable() {
        let mut snap = snapshot(&["n1"], &[("a", "n1")]);
        let first = link(&mut snap);
        let second = link(&mut snap);
        assert_eq!(first, second);
    }
}
