//! flow-processor: consumo por lotes del log particionado.
//!
//! Flujos distintos se procesan en paralelo; los eventos de un mismo flujo,
//! en orden y de uno en uno.
pub mod config;
pub mod processor;
pub mod store;

pub use config::ProcessorConfig;
pub use processor::{BatchResult, FlowEventProcessor};
pub use store::{CommitKind, DashMapCheckpointStore};
