//! Rendering an [`Analysis`] for operators and tools.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::accounting::Analysis;
use crate::config::OutputFormat;
use crate::linker::UnresolvedPod;
use crate::model::Node;

const MIB: i64 = 1024 * 1024;

/// One line per node: CPU in millicores, memory in MiB (truncated), pod slots
/// left against the node's pod capacity.
pub fn node_line(node: &Node) -> String {
    let available = node.available();
    format!(
        "({}) Available/Total: \tCPU:{}/{} \tMEM: {}/{}\t POD: {}/{}",
        node.name(),
        available.cpu().milli_value(),
        node.allocatable().cpu.milli_value(),
        available.memory().value() / MIB,
        node.allocatable().memory.value() / MIB,
        available.pods(),
        node.capacity().pods,
    )
}

#[derive(Serialize)]
struct PodView<'a> {
    name: &'a str,
    node_name: &'a str,
    /// Resolved node, absent when the pod was not linked.
    node: Option<&'a str>,
}

#[derive(Serialize)]
struct NamespaceView<'a> {
    name: &'a str,
    pods: Vec<PodView<'a>>,
}

#[derive(Serialize)]
struct ReportView<'a> {
    nodes: &'a [Node],
    namespaces: Vec<NamespaceView<'a>>,
    /// Namespaces the snapshot was restricted to; empty for the whole cluster.
    namespace_filter: &'a [String],
    unresolved_pods: &'a [UnresolvedPod],
    pod_counts: BTreeMap<&'static str, usize>,
}

fn view(analysis: &Analysis) -> ReportView<'_> {
    let snapshot = &analysis.snapshot;
    let namespaces = snapshot
        .namespaces()
        .iter()
        .map(|ns| NamespaceView {
            name: &ns.name,
            pods: ns
                .pods
                .iter()
                .map(|pod| PodView {
                    name: &pod.name,
                    node_name: &pod.node_name,
                    node: snapshot.pod_node(pod).map(Node::name),
                })
                .collect(),
        })
        .collect();

    ReportView {
        nodes: snapshot.nodes(),
        namespaces,
        namespace_filter: snapshot.namespace_filter(),
        unresolved_pods: &analysis.link.unresolved,
        pod_counts: BTreeMap::from([
            ("accounted", analysis.accounting.pods_accounted),
            ("unscheduled", analysis.link.unscheduled),
            ("unresolved", analysis.link.unresolved.len()),
        ]),
    }
}

pub fn to_json(analysis: &Analysis) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(view(analysis))
}

pub fn write_report<W: Write>(
    out: &mut W,
    analysis: &Analysis,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => {
            for node in analysis.snapshot.nodes() {
                writeln!(out, "{}", node_line(node))?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &view(analysis))?;
            writeln!(out)?;
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::analyze;
    use crate::model::{Container, Namespace, Pod, Snapshot};
    use crate::quantity::Quantity;
    use crate::resources::Resources;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn sample() -> Analysis {
        let node = Node::new(
            "n1",
            Resources::new(q("2000m"), q("4096Mi"), q("10")),
            Resources::new(q("2"), q("4Gi"), q("110")),
            BTreeMap::from([("role".to_string(), "worker".to_string())]),
        );
        let pods = vec![
            Pod::new(
                "p1",
                "n1",
                vec![Container {
                    name: "app".into(),
                    limits: Resources::new(q("500m"), q("512Mi"), Quantity::ZERO),
                    requests: Resources::default(),
                }],
            ),
            Pod::new("p2", "gone", vec![]),
        ];
        analyze(Snapshot::new(vec![node], vec![Namespace::new("default", pods)]))
    }

    #[test]
    fn renders_node_line() {
        let analysis = sample();
        assert_eq!(
            node_line(&analysis.snapshot.nodes()[0]),
            "(n1) Available/Total: \tCPU:1500/2000 \tMEM: 3584/4096\t POD: 9/110"
        );
    }

    #[test]
    fn memory_is_truncated_to_whole_mebibytes() {
        let node = Node::new(
            "n",
            Resources::new(q("1"), q("1048575"), q("1")),
            Resources::default(),
            BTreeMap::new(),
        );
        assert!(node_line(&node).contains("MEM: 0/0"));
    }

    #[test]
    fn text_report_has_one_line_per_node() {
        let mut out = Vec::new();
        write_report(&mut out, &sample(), OutputFormat::Text).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("(n1)"));
    }

    #[test]
    fn json_report_includes_links_and_ledgers() {
        let json = to_json(&sample()).unwrap();
        assert_eq!(json["nodes"][0]["name"], "n1");
        assert_eq!(json["nodes"][0]["available"]["CPU"], "1500m");
        assert_eq!(json["nodes"][0]["allocatable"]["CPU"], "2");
        assert_eq!(json["nodes"][0]["labels"]["role"], "worker");
        assert_eq!(json["namespaces"][0]["pods"][0]["node"], "n1");
        assert!(json["namespaces"][0]["pods"][1]["node"].is_null());
        assert_eq!(json["unresolved_pods"][0]["node_name"], "gone");
        assert_eq!(json["pod_counts"]["accounted"], 1);
        assert_eq!(json["pod_counts"]["unresolved"], 1);
        assert_eq!(json["namespace_filter"], serde_json::json!([]));
    }

    #[test]
    fn json_report_lists_unresolved_pods_and_counts() {
        let json = to_json(&sample()).unwrap();
        assert_eq!(
            json["unresolved_pods"],
            serde_json::json!([{ "namespace": "default", "pod": "p2", "node_name": "gone" }])
        );
        assert_eq!(
            json["pod_counts"],
            serde_json::json!({ "accounted": 1, "unscheduled": 0, "unresolved": 1 })
        );
    }

    #[test]
    fn json_report_records_namespace_filter() {
        let mut analysis = sample();
        analysis.snapshot = analysis
            .snapshot
            .with_namespace_filter(vec!["default".to_string()]);
        let json = to_json(&analysis).unwrap();
        assert_eq!(json["namespace_filter"], serde_json::json!(["default"]));
    }
}
