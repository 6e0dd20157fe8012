//! Eventos de entrada del pipeline y registros de salida.

mod output;
mod session;
mod types;

pub use output::{FlowStatusKind, OutputRecord};
pub use session::{SessionEvent, SessionInit, SessionPayload};
pub use types::{CryptoResponse, ExternalErrorKind, ExternalEventResponse, ExternalEventRetry, FlowEvent,
                FlowEventPayload, PersistenceResponse, ResponsePayload, StartFlow, Wakeup};
