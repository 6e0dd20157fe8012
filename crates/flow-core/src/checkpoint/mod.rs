//! Checkpoint: registro durable del estado de un flujo entre suspensiones.

mod store;
mod types;
mod waiting_for;

pub use store::{CheckpointStore, InMemoryCheckpointStore};
pub use types::{Checkpoint, CheckpointRecord, FlowStackItem, FlowState, InitiatorKind, StartContext};
pub use waiting_for::WaitingFor;
