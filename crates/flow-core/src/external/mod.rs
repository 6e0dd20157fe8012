//! Correlación petición/respuesta/reintento de eventos externos.
//!
//! Un único correlador genérico sirve a los tres slots del checkpoint
//! (eventos externos genéricos, firma, persistencia): los dos últimos son
//! adaptadores finos parametrizados por su tipo de respuesta.

mod channel;
mod manager;
mod state;

pub use channel::{derive_request_id, CorrelatedResponse, ExternalChannel};
pub use manager::ExternalEventManager;
pub use state::{ExternalEventState, ExternalEventStatus, ReceivedResponse};
