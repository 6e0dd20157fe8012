//! Store de checkpoints concurrente.
//!
//! Cada flujo tiene un único escritor (el grupo del lote que lo procesa),
//! así que basta con el bloqueo por shard de `DashMap`.
use dashmap::DashMap;
use flow_core::checkpoint::{CheckpointRecord, CheckpointStore};
use flow_core::{Checkpoint, FlowId};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Written,
    /// Mismo fingerprint que el registro almacenado.
    Unchanged,
    Deleted,
}

#[derive(Debug, Default)]
pub struct DashMapCheckpointStore {
    inner: DashMap<FlowId, CheckpointRecord>,
}

impl DashMapCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, flow_id: FlowId) -> Checkpoint {
        Checkpoint::new(flow_id, self.inner.get(&flow_id).map(|r| r.value().clone()))
    }

    /// Persiste el checkpoint. No reescribe un registro sin cambios; uno
    /// inexistente borra el almacenado.
    pub fn commit(&self, checkpoint: Checkpoint) -> CommitKind {
        let flow_id = checkpoint.flow_id();
        if !checkpoint.exists() {
            return match self.inner.remove(&flow_id) {
                Some(_) => CommitKind::Deleted,
                None => CommitKind::Unchanged,
            };
        }
        let stored = self.load(flow_id);
        if stored.exists() {
            match (stored.fingerprint(), checkpoint.fingerprint()) {
                (Ok(a), Ok(b)) if a == b => return CommitKind::Unchanged,
                (Err(e), _) | (_, Err(e)) => {
                    warn!(target: "flow_processor::store", "fingerprint failed for {flow_id}: {e}");
                }
                _ => {}
            }
        }
        if let Some(record) = checkpoint.into_record() {
            self.inner.insert(flow_id, record);
        }
        CommitKind::Written
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl CheckpointStore for DashMapCheckpointStore {
    fn load(&self, flow_id: FlowId) -> Checkpoint {
        DashMapCheckpointStore::load(self, flow_id)
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        DashMapCheckpointStore::commit(self, checkpoint);
    }
}
