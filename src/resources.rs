use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quantity::{Quantity, QuantityError};

pub const CPU: &str = "cpu";
pub const MEMORY: &str = "memory";
pub const PODS: &str = "pods";

#[derive(Debug, Error)]
#[error("invalid {resource} quantity: {source}")]
pub struct ResourceListError {
    pub resource: &'static str,
    #[source]
    pub source: QuantityError,
}

/// One reading of the three tracked dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(rename = "CPU")]
    pub cpu: Quantity,
    #[serde(rename = "MEM")]
    pub memory: Quantity,
    #[serde(rename = "POD")]
    pub pods: Quantity,
}

impl Resources {
    pub fn new(cpu: Quantity, memory: Quantity, pods: Quantity) -> Self {
        Self { cpu, memory, pods }
    }

    /// Reads `cpu`, `memory` and `pods` out of a raw resource list.
    /// Missing entries count as zero; other resource names are ignored.
    pub fn from_resource_list(
        list: &BTreeMap<String, KubeQuantity>,
    ) -> Result<Self, ResourceListError> {
        let read = |resource: &'static str| -> Result<Quantity, ResourceListError> {
            list.get(resource)
                .map(Quantity::try_from)
                .transpose()
                .map(Option::unwrap_or_default)
                .map_err(|source| ResourceListError { resource, source })
        };
        Ok(Self {
            cpu: read(CPU)?,
            memory: read(MEMORY)?,
            pods: read(PODS)?,
        })
    }

    /// True when neither CPU nor memory carries a value, i.e. no ceiling was
    /// configured at all.
    pub fn has_no_limits(&self) -> bool {
        self.cpu.is_zero() && self.memory.is_zero()
    }
}

/// Remaining headroom on one node.
///
/// Seeded from the node's allocatable reading and only ever decremented.
/// Values may go negative when a node is oversubscribed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ledger {
    remaining: Resources,
}

impl Ledger {
    pub fn new(allocatable: &Resources) -> Self {
        Self {
            remaining: *allocatable,
        }
    }

    pub fn remaining(&self) -> &Resources {
        &self.remaining
    }

    pub fn cpu(&self) -> Quantity {
        self.remaining.cpu
    }

    pub fn memory(&self) -> Quantity {
        self.remaining.memory
    }

    pub fn pods(&self) -> Quantity {
        self.remaining.pods
    }

    pub fn decrement_pod_slot(&mut self) {
        self.remaining.pods -= Quantity::from_units(1);
    }

    /// Subtracts a container's CPU and memory limits.
    ///
    /// A container whose CPU and memory limits are both zero has no ceiling
    /// and is skipped in both dimensions; `false` is returned in that case.
    /// A single zero dimension is subtracted as zero.
    pub fn decrement_by_limits(&mut self, limits: &Resources) -> bool {
        if limits.has_no_limits() {
            return false;
        }
        self.remaining.cpu -= limits.cpu;
        self.remaining.memory -= limits.memory;
        true
    }
}
