//! Tracking of replica acknowledgements.
//!
//! The retention policy needs one number from replication: the minimum log
//! position acknowledged by all currently connected replicas. Sessions
//! register a slot here and ack-processing advances it; the registry is
//! shared between those sessions and the cleanup pass, hence the lock.

use parking_lot::Mutex;
use wal_meta::Lsn;

/// This node's role in the cluster. The role decides where the replication
/// floor comes from, not what the retention arithmetic does with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// The dispatching node; replicas of the whole cluster connect here and
    /// their acknowledgements are tracked in shared replication state.
    Coordinator,
    /// One shard of the cluster. Its mirror, if any, is managed outside this
    /// engine, so no floor source is tracked for it here.
    Worker,
}

#[derive(Debug, Clone, Copy)]
struct ReplicaState {
    /// Last log position the replica confirmed durable. INVALID until the
    /// first acknowledgement arrives.
    acked_lsn: Lsn,
}

/// Handle identifying one registered replica session.
#[derive(Debug)]
pub struct ReplicaId(usize);

/// Registry of connected replica sessions. Held by the node (wrapped in an
/// Arc by callers that share it with session tasks).
#[derive(Debug, Default)]
pub struct ReplicaRegistry {
    slots: Mutex<Vec<Option<ReplicaState>>>,
}

impl ReplicaRegistry {
    pub fn new() -> ReplicaRegistry {
        ReplicaRegistry::default()
    }

    /// Register a newly connected replica session.
    pub fn register(&self) -> ReplicaId {
        let mut slots = self.slots.lock();
        let state = ReplicaState {
            acked_lsn: Lsn::INVALID,
        };
        for (i, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(state);
                return ReplicaId(i);
            }
        }
        slots.push(Some(state));
        ReplicaId(slots.len() - 1)
    }

    /// Drop a session's slot on disconnect; its position no longer
    /// constrains deletion.
    pub fn unregister(&self, id: ReplicaId) {
        self.slots.lock()[id.0] = None;
    }

    /// Record an acknowledgement. Positions only move forward; a reordered
    /// reply must not regress the slot.
    pub fn update_ack(&self, id: &ReplicaId, lsn: Lsn) {
        let mut slots = self.slots.lock();
        if let Some(state) = slots[id.0].as_mut() {
            if lsn > state.acked_lsn {
                state.acked_lsn = lsn;
            }
        }
    }

    /// Minimum acknowledged position over all connected replicas, or None
    /// when nothing is connected (or nothing has acknowledged yet). Never
    /// zero: an absent floor is "unset", not "keep everything since the
    /// beginning of time".
    pub fn min_acked_lsn(&self) -> Option<Lsn> {
        self.slots
            .lock()
            .iter()
            .flatten()
            .map(|state| state.acked_lsn)
            .filter(|lsn| lsn.is_valid())
            .min()
    }
}

/// The single value the retention policy consumes from replication, sourced
/// per role: a coordinator reads its replica registry, a worker has no
/// tracked source here and reports the floor as unset.
pub fn replication_floor(role: NodeRole, registry: &ReplicaRegistry) -> Option<Lsn> {
    match role {
        NodeRole::Coordinator => registry.min_acked_lsn(),
        NodeRole::Worker => None,
    }
}
