//! Listing the cluster and turning the listings into a [`Snapshot`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace as KubeNamespace, Node as KubeNode, Pod as KubePod};
use kube::api::{Api, ResourceExt};
use kube::Client;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::HeadroomError;
use crate::model::{Container, Namespace, Node, Pod, Snapshot};
use crate::resources::Resources;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: String,
    pub allocatable: Resources,
    pub capacity: Resources,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub node_name: String,
    pub containers: Vec<Container>,
}

/// Source of the three flat listings a snapshot is built from.
#[async_trait]
pub trait TopologyLoader: Send + Sync {
    async fn load_nodes(&self) -> Result<Vec<NodeRecord>, HeadroomError>;

    async fn load_namespaces(&self) -> Result<Vec<String>, HeadroomError>;

    async fn load_pods(&self, namespace: &str) -> Result<Vec<PodRecord>, HeadroomError>;
}

impl Snapshot {
    /// Loads nodes, then every namespace and its pods.
    ///
    /// `only` restricts which namespaces are loaded; empty means all of them.
    /// Pods outside those namespaces are not charged, so a filtered snapshot
    /// overstates node headroom; it remembers the filter for reporting.
    /// The first listing failure aborts the load, so a snapshot is never
    /// partial.
    pub async fn load<L>(loader: &L, only: &[String]) -> Result<Snapshot, HeadroomError>
    where
        L: TopologyLoader + ?Sized,
    {
        let nodes: Vec<Node> = loader
            .load_nodes()
            .await?
            .into_iter()
            .map(|record| {
                Node::new(record.name, record.allocatable, record.capacity, record.labels)
            })
            .collect();

        let mut names = loader.load_namespaces().await?;
        if !only.is_empty() {
            warn!(
                namespaces = ?only,
                "namespace filter active; pods in other namespaces are not charged to nodes"
            );
            for wanted in only.iter().filter(|wanted| !names.contains(wanted)) {
                warn!(namespace = %wanted, "requested namespace does not exist");
            }
            names.retain(|name| only.contains(name));
        }

        let mut namespaces = Vec::with_capacity(names.len());
        for name in names {
            let pods = loader
                .load_pods(&name)
                .await?
                .into_iter()
                .map(|record| Pod::new(record.name, record.node_name, record.containers))
                .collect();
            namespaces.push(Namespace::new(name, pods));
        }

        debug!(nodes = nodes.len(), namespaces = namespaces.len(), "snapshot loaded");
        Ok(Snapshot::new(nodes, namespaces).with_namespace_filter(only.to_vec()))
    }
}

/// [`TopologyLoader`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeLoader {
    client: Client,
}

impl KubeLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn connect(config: &ConnectionConfig) -> Result<Self, HeadroomError> {
        Ok(Self::new(config.connect().await?))
    }
}

#[async_trait]
impl TopologyLoader for KubeLoader {
    async fn load_nodes(&self) -> Result<Vec<NodeRecord>, HeadroomError> {
        let nodes: Api<KubeNode> = Api::all(self.client.clone());
        let node_list = nodes
            .list(&Default::default())
            .await
            .map_err(|source| HeadroomError::Listing {
                kind: "nodes",
                namespace: None,
                source,
            })?;
        debug!(count = node_list.items.len(), "listed nodes");
        node_list.items.iter().map(NodeRecord::try_from).collect()
    }

    async fn load_namespaces(&self) -> Result<Vec<String>, HeadroomError> {
        let namespaces: Api<KubeNamespace> = Api::all(self.client.clone());
        let ns_list = namespaces
            .list(&Default::default())
            .await
            .map_err(|source| HeadroomError::Listing {
                kind: "namespaces",
                namespace: None,
                source,
            })?;
        debug!(count = ns_list.items.len(), "listed namespaces");
        Ok(ns_list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn load_pods(&self, namespace: &str) -> Result<Vec<PodRecord>, HeadroomError> {
        let pods: Api<KubePod> = Api::namespaced(self.client.clone(), namespace);
        let pod_list = pods
            .list(&Default::default())
            .await
            .map_err(|source| HeadroomError::Listing {
                kind: "pods",
                namespace: Some(namespace.to_string()),
                source,
            })?;
        debug!(namespace, count = pod_list.items.len(), "listed pods");
        pod_list.items.iter().map(PodRecord::try_from).collect()
    }
}

impl TryFrom<&KubeNode> for NodeRecord {
    type Error = HeadroomError;

    fn try_from(node: &KubeNode) -> Result<Self, Self::Error> {
        let name = node.name_any();
        let invalid = |source| HeadroomError::InvalidResources {
            object: format!("node {name}"),
            source,
        };
        let status = node.status.clone().unwrap_or_default();
        let allocatable = Resources::from_resource_list(&status.allocatable.unwrap_or_default())
            .map_err(invalid)?;
        let capacity =
            Resources::from_resource_list(&status.capacity.unwrap_or_default()).map_err(invalid)?;

        Ok(NodeRecord {
            labels: node.labels().clone(),
            name,
            allocatable,
            capacity,
        })
    }
}

impl TryFrom<&KubePod> for PodRecord {
    type Error = HeadroomError;

    fn try_from(pod: &KubePod) -> Result<Self, Self::Error> {
        let name = pod.name_any();
        let Some(spec) = &pod.spec else {
            return Ok(PodRecord {
                name,
                node_name: String::new(),
                containers: Vec::new(),
            });
        };

        let mut containers = Vec::with_capacity(spec.containers.len());
        for container in &spec.containers {
            let invalid = |source| HeadroomError::InvalidResources {
                object: format!("pod {name} container {}", container.name),
                source,
            };
            let resources = container.resources.clone().unwrap_or_default();
            containers.push(Container {
                name: container.name.clone(),
                limits: Resources::from_resource_list(&resources.limits.unwrap_or_default())
                    .map_err(invalid)?,
                requests: Resources::from_resource_list(&resources.requests.unwrap_or_default())
                    .map_err(invalid)?,
            });
        }

        Ok(PodRecord {
            node_name: spec.node_name.clone().unwrap_or_default(),
            name,
            containers,
        })
    }
}
