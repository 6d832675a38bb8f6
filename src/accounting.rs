use serde::Serialize;
use tracing::{debug, info};

use crate::linker::{link, LinkOutcome};
use crate::model::Snapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountingSummary {
    pub pods_accounted: usize,
    pub pods_skipped: usize,
    /// Containers skipped because neither CPU nor memory had a limit.
    pub containers_without_limits: usize,
}

/// Charges every linked pod against its node's ledger: one pod slot per pod,
/// plus the CPU and memory limits of each container.
///
/// Not idempotent. A second run over the same snapshot charges everything
/// again, so build a fresh snapshot per run (or use [`analyze`], which takes
/// ownership). Pods without a resolved node are skipped.
pub fn account(snapshot: &mut Snapshot) -> AccountingSummary {
    let mut summary = AccountingSummary::default();
    let (nodes, namespaces) = snapshot.nodes_mut_and_namespaces();

    for namespace in namespaces {
        for pod in &namespace.pods {
            let node = match pod.node() {
                Some(id) => nodes.get_mut(id.index()),
                None => None,
            };
            let Some(node) = node else {
                summary.pods_skipped += 1;
                continue;
            };

            let ledger = node.available_mut();
            ledger.decrement_pod_slot();
            for container in &pod.containers {
                if !ledger.decrement_by_limits(&container.limits) {
                    summary.containers_without_limits += 1;
                }
            }
            summary.pods_accounted += 1;
        }
    }

    debug!(
        accounted = summary.pods_accounted,
        skipped = summary.pods_skipped,
        unlimited_containers = summary.containers_without_limits,
        "accounting pass finished"
    );
    summary
}

/// A linked and accounted snapshot, ready for reporting.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub snapshot: Snapshot,
    pub link: LinkOutcome,
    pub accounting: AccountingSummary,
}

/// Links and accounts a freshly loaded snapshot.
pub fn analyze(mut snapshot: Snapshot) -> Analysis {
    let linked = link(&mut snapshot);
    let accounting = account(&mut snapshot);
    info!(
        nodes = snapshot.nodes().len(),
        namespaces = snapshot.namespaces().len(),
        pods = accounting.pods_accounted,
        unresolved = linked.unresolved.len(),
        "computed node headroom"
    );
    Analysis {
        snapshot,
        link: linked,
        accounting,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::{Container, Namespace, Node, Pod};
    use crate::quantity::Quantity;
    use crate::resources::Resources;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn res(cpu: &str, memory: &str, pods: &str) -> Resources {
        Resources::new(q(cpu), q(memory), q(pods))
    }

    fn container(cpu: &str, memory: &str) -> Container {
        Container {
            name: "app".into(),
            limits: res(cpu, memory, "0"),
            requests: res("100m", "64Mi", "0"),
        }
    }

    fn node(name: &str) -> Node {
        Node::new(
            name,
            res("2000m", "4096Mi", "10"),
            res("4", "8Gi", "110"),
            BTreeMap::new(),
        )
    }

    #[test]
    fn example_scenario() {
        let pods = vec![
            Pod::new("p1", "n1", vec![container("500m", "512Mi")]),
            Pod::new("p2", "n1", vec![container("0", "0")]),
        ];
        let analysis = analyze(Snapshot::new(
            vec![node("n1")],
            vec![Namespace::new("default", pods)],
        ));

        let n1 = analysis.snapshot.node_by_name("n1").unwrap();
        assert_eq!(n1.available().remaining(), &res("1500m", "3584Mi", "8"));
        assert_eq!(
            analysis.accounting,
            AccountingSummary {
                pods_accounted: 2,
                pods_skipped: 0,
                containers_without_limits: 1,
            }
        );
    }

    #[test]
    fn requests_are_not_subtracted() {
        let pods = vec![Pod::new("p", "n1", vec![container("0", "0"), container("0", "0")])];
        let analysis = analyze(Snapshot::new(vec![node("n1")], vec![Namespace::new("ns", pods)]));
        let n1 = analysis.snapshot.node_by_name("n1").unwrap();
        assert_eq!(n1.available().cpu(), q("2000m"));
        assert_eq!(n1.available().memory(), q("4096Mi"));
        assert_eq!(n1.available().pods(), q("9"));
    }

    #[test]
    fn unlinked_snapshot_charges_nothing() {
        let pods = vec![Pod::new("p", "n1", vec![container("1", "1Gi")])];
        let mut snap = Snapshot::new(vec![node("n1")], vec![Namespace::new("ns", pods)]);
        let summary = account(&mut snap);
        assert_eq!(summary.pods_skipped, 1);
        assert_eq!(snap.nodes()[0].available().remaining(), snap.nodes()[0].allocatable());
    }

    #[test]
    fn second_pass_double_counts() {
        let pods = vec![Pod::new("p", "n1", vec![container("250m", "256Mi")])];
        let mut snap = Snapshot::new(vec![node("n1")], vec![Namespace::new("ns", pods)]);
        link(&mut snap);
        account(&mut snap);
        account(&mut snap);
        let ledger = snap.nodes()[0].available();
        assert_eq!(ledger.cpu(), q("1500m"));
        assert_eq!(ledger.memory(), q("3584Mi"));
        assert_eq!(ledger.pods(), q("8"));
    }

    #[test]
    fn oversubscription_goes_negative() {
        let pods = (0..3)
            .map(|i| Pod::new(format!("p{i}"), "n1", vec![container("1", "2Gi")]))
            .collect();
        let analysis = analyze(Snapshot::new(vec![node("n1")], vec![Namespace::new("ns", pods)]));
        let ledger = analysis.snapshot.nodes()[0].available();
        assert_eq!(ledger.cpu(), q("-1"));
        assert_eq!(ledger.memory(), q("-2Gi"));
        assert_eq!(ledger.pods(), q("7"));
    }
}
