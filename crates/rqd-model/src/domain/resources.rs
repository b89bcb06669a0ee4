use serde::{Deserialize, Serialize};

use crate::{MemoryMb, TaskId};

/// An amount of each accountable resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSet {
    pub cores: u32,
    pub memory_mb: MemoryMb,
    #[serde(default)]
    pub gpu_units: u32,
}

impl ResourceSet {
    pub const ZERO: ResourceSet = ResourceSet {
        cores: 0,
        memory_mb: 0,
        gpu_units: 0,
    };

    pub fn new(cores: u32, memory_mb: MemoryMb, gpu_units: u32) -> Self {
        Self {
            cores,
            memory_mb,
            gpu_units,
        }
    }

    /// Returns `true` if every component of `self` is at most `other`.
    pub fn fits_within(&self, other: &ResourceSet) -> bool {
        self.cores <= other.cores
            && self.memory_mb <= other.memory_mb
            && self.gpu_units <= other.gpu_units
    }

    /// Component-wise minimum.
    pub fn min(&self, other: &ResourceSet) -> ResourceSet {
        ResourceSet {
            cores: self.cores.min(other.cores),
            memory_mb: self.memory_mb.min(other.memory_mb),
            gpu_units: self.gpu_units.min(other.gpu_units),
        }
    }
}

/// Point-in-time view of the host's capacity.
///
/// Invariant: `available.fits_within(&total)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResources {
    pub total: ResourceSet,
    pub available: ResourceSet,
}

impl HostResources {
    /// A fresh host: everything available.
    pub fn new(total: ResourceSet) -> Self {
        Self {
            total,
            available: total,
        }
    }

    /// Resources currently committed to reservations.
    pub fn reserved(&self) -> ResourceSet {
        ResourceSet {
            cores: self.total.cores - self.available.cores,
            memory_mb: self.total.memory_mb - self.available.memory_mb,
            gpu_units: self.total.gpu_units - self.available.gpu_units,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.available == self.total
    }
}

/// Resources committed to one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub task_id: TaskId,
    pub resources: ResourceSet,
}

impl Reservation {
    pub fn cores(&self) -> u32 {
        self.resources.cores
    }

    pub fn memory_mb(&self) -> MemoryMb {
        self.resources.memory_mb
    }
}
