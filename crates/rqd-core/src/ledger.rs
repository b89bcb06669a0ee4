//! Host resource bookkeeping.
//!
//! The ledger is the single point of shared mutable state in the agent. Every
//! operation takes one short mutex-guarded critical section of integer
//! arithmetic; the lock is never held across an `.await`.
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use rqd_model::{HostResources, RejectReason, Reservation, ResourceSet, TaskId};
use tracing::{debug, trace};

/// Tracks available vs. reserved cores, memory and GPU units.
///
/// The initial [`HostResources`] is injected by the caller, so several ledgers
/// can coexist (one per test, for instance).
pub struct ResourceLedger {
    inner: Mutex<LedgerInner>,
}

struct LedgerInner {
    host: HostResources,
    reservations: HashMap<TaskId, Reservation>,
}

impl ResourceLedger {
    /// Create a ledger over the given host snapshot.
    ///
    /// # Panics
    /// If `host.available` exceeds `host.total`.
    pub fn new(host: HostResources) -> Self {
        assert!(
            host.available.fits_within(&host.total),
            "ledger created with available {:?} above total {:?}",
            host.available,
            host.total
        );
        Self {
            inner: Mutex::new(LedgerInner {
                host,
                reservations: HashMap::new(),
            }),
        }
    }

    /// Ledger for an idle host with the given capacity.
    pub fn with_capacity(total: ResourceSet) -> Self {
        Self::new(HostResources::new(total))
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        // A poisoned lock means a panic inside a critical section, which only
        // happens on an invariant violation.
        self.inner.lock().expect("resource ledger lock poisoned")
    }

    /// Atomically reserve `request` for `task_id`.
    ///
    /// All-or-nothing: if any component does not fit, nothing is reserved.
    /// Components are checked in the order cores, memory, GPUs and the first
    /// shortfall is reported.
    pub fn try_reserve(
        &self,
        task_id: &TaskId,
        request: ResourceSet,
    ) -> Result<Reservation, RejectReason> {
        let mut inner = self.lock();

        if inner.reservations.contains_key(task_id) {
            return Err(RejectReason::DuplicateTask);
        }

        let available = inner.host.available;
        if request.cores > available.cores {
            trace!(target: "rqd.core.ledger", %task_id, requested = request.cores, available = available.cores, "insufficient cores");
            return Err(RejectReason::InsufficientCores);
        }
        if request.memory_mb > available.memory_mb {
            trace!(target: "rqd.core.ledger", %task_id, requested = request.memory_mb, available = available.memory_mb, "insufficient memory");
            return Err(RejectReason::InsufficientMemory);
        }
        if request.gpu_units > available.gpu_units {
            trace!(target: "rqd.core.ledger", %task_id, requested = request.gpu_units, available = available.gpu_units, "insufficient gpus");
            return Err(RejectReason::InsufficientGpus);
        }

        inner.host.available = ResourceSet {
            cores: available.cores - request.cores,
            memory_mb: available.memory_mb - request.memory_mb,
            gpu_units: available.gpu_units - request.gpu_units,
        };
        let reservation = Reservation {
            task_id: task_id.clone(),
            resources: request,
        };
        inner
            .reservations
            .insert(task_id.clone(), reservation.clone());

        debug!(
            target: "rqd.core.ledger",
            %task_id,
            cores = request.cores,
            memory_mb = request.memory_mb,
            gpus = request.gpu_units,
            "reserved"
        );
        Ok(reservation)
    }

    /// Return the reservation of `task_id` to the pool.
    ///
    /// Unknown ids are a no-op and return `None`.
    ///
    /// # Panics
    /// If releasing would push any available amount above the total: the
    /// bookkeeping is corrupt and continuing would over-commit the host.
    pub fn release(&self, task_id: &TaskId) -> Option<Reservation> {
        let mut inner = self.lock();

        let Some(reservation) = inner.reservations.remove(task_id) else {
            trace!(target: "rqd.core.ledger", %task_id, "release of unknown reservation ignored");
            return None;
        };

        let total = inner.host.total;
        let available = inner.host.available;
        let restored = ResourceSet {
            cores: available.cores + reservation.resources.cores,
            memory_mb: available.memory_mb + reservation.resources.memory_mb,
            gpu_units: available.gpu_units + reservation.resources.gpu_units,
        };
        assert!(
            restored.fits_within(&total),
            "releasing {task_id} would raise available {restored:?} above total {total:?}"
        );
        inner.host.available = restored;

        debug!(
            target: "rqd.core.ledger",
            %task_id,
            cores = reservation.resources.cores,
            memory_mb = reservation.resources.memory_mb,
            "released"
        );
        Some(reservation)
    }

    /// Consistent point-in-time view of total and available resources.
    pub fn snapshot(&self) -> HostResources {
        self.lock().host
    }

    /// Look up the reservation held by a task.
    pub fn reservation(&self, task_id: &TaskId) -> Option<Reservation> {
        self.lock().reservations.get(task_id).cloned()
    }

    pub fn reservations(&self) -> Vec<Reservation> {
        self.lock().reservations.values().cloned().collect()
    }

    /// Number of live reservations.
    pub fn active(&self) -> usize {
        self.lock().reservations.len()
    }
}
