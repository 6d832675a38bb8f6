use std::path::{Path, PathBuf};

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::error::HeadroomError;

pub const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// How to reach the cluster. Each run builds its own client from one of these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionConfig {
    /// Whatever kube infers: `$KUBECONFIG`, `~/.kube/config`, or in-cluster.
    #[default]
    Inferred,
    /// The pod's mounted service-account token and CA.
    InCluster,
    Kubeconfig {
        path: PathBuf,
        context: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One line per node
    #[default]
    Text,
    /// Full snapshot as JSON
    Json,
}

impl ConnectionConfig {
    pub fn kubeconfig(path: impl Into<PathBuf>, context: Option<String>) -> Self {
        Self::Kubeconfig {
            path: path.into(),
            context,
        }
    }

    /// Fails fast when files this mode depends on are absent.
    pub fn check_credentials(&self) -> Result<(), HeadroomError> {
        match self {
            Self::Inferred => Ok(()),
            Self::InCluster => {
                require_file(Path::new(SERVICE_ACCOUNT_CA))?;
                require_file(Path::new(SERVICE_ACCOUNT_TOKEN))
            }
            Self::Kubeconfig { path, .. } => require_file(path),
        }
    }

    pub async fn connect(&self) -> Result<Client, HeadroomError> {
        self.check_credentials()?;
        let client = match self {
            Self::Inferred => Client::try_default().await.map_err(HeadroomError::Client)?,
            Self::InCluster => {
                let config = Config::incluster()?;
                Client::try_from(config).map_err(HeadroomError::Client)?
            }
            Self::Kubeconfig { path, context } => {
                let kubeconfig =
                    Kubeconfig::read_from(path).map_err(|source| HeadroomError::Kubeconfig {
                        path: path.clone(),
                        source,
                    })?;
                let options = KubeConfigOptions {
                    context: context.clone(),
                    ..Default::default()
                };
                let config = Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|source| HeadroomError::Kubeconfig {
                        path: path.clone(),
                        source,
                    })?;
                Client::try_from(config).map_err(HeadroomError::Client)?
            }
        };
        debug!(mode = ?self, "kubernetes client ready");
        Ok(client)
    }
}

fn require_file(path: &Path) -> Result<(), HeadroomError> {
    std::fs::metadata(path)
        .map(|_| ())
        .map_err(|source| HeadroomError::MissingCredentials {
            path: path.to_path_buf(),
            source,
        })
}
