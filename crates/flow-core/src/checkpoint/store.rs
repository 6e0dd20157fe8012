use std::collections::HashMap;

use super::{Checkpoint, CheckpointRecord};
use crate::identity::FlowId;

/// Almacenamiento de checkpoints por `flow_id`.
pub trait CheckpointStore {
    /// Devuelve el checkpoint (posiblemente inexistente) de un flujo.
    fn load(&self, flow_id: FlowId) -> Checkpoint;
    /// Persiste el checkpoint; uno inexistente borra el registro.
    fn commit(&mut self, checkpoint: Checkpoint);
}

#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    pub inner: HashMap<FlowId, CheckpointRecord>,
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(&self, flow_id: FlowId) -> Checkpoint {
        Checkpoint::new(flow_id, self.inner.get(&flow_id).cloned())
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        let flow_id = checkpoint.flow_id();
        match checkpoint.into_record() {
            Some(record) => {
                self.inner.insert(flow_id, record);
            }
            None => {
                self.inner.remove(&flow_id);
            }
        }
    }
}
