//! Per-node resource headroom for a Kubernetes cluster.
//!
//! A [`Snapshot`] is loaded once through a [`TopologyLoader`], pods are
//! linked to their nodes, and a single accounting pass charges every
//! container's limits against its node's allocatable capacity.

pub mod accounting;
pub mod config;
pub mod error;
pub mod linker;
pub mod loader;
pub mod model;
pub mod quantity;
pub mod report;
pub mod resources;

pub use accounting::{account, analyze, AccountingSummary, Analysis};
pub use config::{ConnectionConfig, OutputFormat};
pub use error::HeadroomError;
pub use linker::{link, LinkOutcome, UnresolvedPod};
pub use loader::{KubeLoader, NodeRecord, PodRecord, TopologyLoader};
pub use model::{Container, Namespace, Node, NodeId, Pod, Snapshot};
pub use quantity::{Quantity, QuantityError};
pub use resources::{Ledger, Resources};
