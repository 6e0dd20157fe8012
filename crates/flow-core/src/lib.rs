//! flow-core: pipeline de pre-procesado de eventos de flujo.
//!
//! Cada evento del log particionado se aplica al checkpoint de su flujo:
//! handler por tipo de evento, protocolo de sesión, correlador de eventos
//! externos y resolución de la continuación para la etapa de fiber.
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod constants;
pub mod errors;
pub mod event;
pub mod external;
pub mod handler;
pub mod hashing;
pub mod identity;
pub mod pipeline;
pub mod session;

pub use checkpoint::{Checkpoint, CheckpointRecord, CheckpointStore, InMemoryCheckpointStore, WaitingFor};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::PipelineConfig;
pub use errors::{classify_error, ErrorClass, FlowEventError, FlowFatalError, PipelineError};
pub use event::{FlowEvent, FlowEventPayload, OutputRecord};
pub use identity::{FlowId, HoldingIdentity};
pub use pipeline::{FlowContinuation, FlowEventContext, FlowEventPipeline, FlowFiberStage, NoopFiberStage,
                   PipelineOutcome};
