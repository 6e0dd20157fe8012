//! Pre-procesado polimórfico por tipo de evento.
//!
//! Cada tipo de payload tiene exactamente un handler. El registro los
//! despacha con un `match` exhaustivo sobre `FlowEventPayload`: añadir una
//! variante sin handler no compila.
mod external_response;
mod external_retry;
mod registry;
mod session_event;
mod start_flow;
mod wakeup;

use std::fmt;
use std::sync::Arc;

pub use external_response::{CryptoResponseHandler, ExternalEventResponseHandler, ExternalResponseHandler,
                            PersistenceResponseHandler};
pub use external_retry::ExternalEventRetryHandler;
pub use registry::FlowEventHandlerRegistry;
pub use session_event::SessionEventHandler;
pub use start_flow::StartFlowHandler;
pub use wakeup::WakeupHandler;

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::external::ExternalEventManager;
use crate::pipeline::{FlowEventContext, ObserverHandle};
use crate::session::{FlowSandboxResolver, SessionManager};

/// Handler del tipo de evento `T`.
///
/// `pre_process` recibe el contexto por valor y devuelve el contexto
/// actualizado. Un error descartable (`PipelineError::Event`) no debe haber
/// dejado efectos: el pipeline reanuda con el checkpoint original.
pub trait FlowEventHandler<T>: Send + Sync + fmt::Debug {
    fn event_type(&self) -> &'static str;

    fn pre_process(&self, context: FlowEventContext<T>) -> Result<FlowEventContext<T>, PipelineError>;
}

/// Colaboradores compartidos por los handlers, inyectados al construir el
/// registro.
#[derive(Debug, Clone)]
pub struct HandlerDependencies {
    pub sandbox: Arc<dyn FlowSandboxResolver>,
    pub observer: ObserverHandle,
    pub session_manager: SessionManager,
    pub external_manager: ExternalEventManager,
}

impl HandlerDependencies {
    pub fn new(sandbox: Arc<dyn FlowSandboxResolver>, observer: ObserverHandle, config: &PipelineConfig) -> Self {
        Self { sandbox,
               observer,
               session_manager: SessionManager::new(config.session_out_of_order_limit),
               external_manager: ExternalEventManager::new() }
    }
}
