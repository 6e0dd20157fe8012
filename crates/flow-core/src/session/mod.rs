//! Protocolo de sesión: deduplicación, orden y detección de inicio.

mod manager;
mod sandbox;
mod state;

pub use manager::{ReceiveDisposition, ReceiveOutcome, SessionManager};
pub use sandbox::{FlowSandboxResolver, InMemoryFlowSandbox};
pub use state::{PendingSend, ReceivedEvents, SentEvents, SessionState, SessionStatus};
