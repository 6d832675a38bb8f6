use std::path::PathBuf;

use kube::config::{InClusterError, KubeconfigError};
use thiserror::Error;

use crate::resources::ResourceListError;

/// Failures while connecting to the cluster or loading a snapshot.
#[derive(Debug, Error)]
pub enum HeadroomError {
    #[error("credential file {} is missing: {source}", .path.display())]
    MissingCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load kubeconfig {}: {source}", .path.display())]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },
    #[error("failed to load in-cluster config: {0}")]
    InCluster(#[from] InClusterError),
    #[error("cannot connect to kubernetes: {0}")]
    Client(#[source] kube::Error),
    #[error("failed to list {kind}{}: {source}", in_namespace(.namespace))]
    Listing {
        kind: &'static str,
        namespace: Option<String>,
        #[source]
        source: kube::Error,
    },
    #[error("{object}: {source}")]
    InvalidResources {
        object: String,
        #[source]
        source: ResourceListError,
    },
}

fn in_namespace(namespace: &Option<String>) -> String {
    namespace
        .as_deref()
        .map(|ns| format!(" in namespace {ns}"))
        .unwrap_or_default()
}
