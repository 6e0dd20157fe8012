use super::{CryptoResponseHandler, ExternalEventResponseHandler, ExternalEventRetryHandler, FlowEventHandler,
            HandlerDependencies, PersistenceResponseHandler, SessionEventHandler, StartFlowHandler, WakeupHandler};
use crate::errors::PipelineError;
use crate::event::{CryptoResponse, ExternalEventResponse, ExternalEventRetry, FlowEventPayload, PersistenceResponse,
                   SessionEvent, StartFlow, Wakeup};
use crate::external::ExternalChannel;
use crate::pipeline::FlowEventContext;

/// Un handler por variante de `FlowEventPayload`.
#[derive(Debug)]
pub struct FlowEventHandlerRegistry {
    start_flow: Box<dyn FlowEventHandler<StartFlow>>,
    wakeup: Box<dyn FlowEventHandler<Wakeup>>,
    session_event: Box<dyn FlowEventHandler<SessionEvent>>,
    external_response: Box<dyn FlowEventHandler<ExternalEventResponse>>,
    external_retry: Box<dyn FlowEventHandler<ExternalEventRetry>>,
    crypto_response: Box<dyn FlowEventHandler<CryptoResponse>>,
    persistence_response: Box<dyn FlowEventHandler<PersistenceResponse>>,
}

impl FlowEventHandlerRegistry {
    pub fn new(deps: &HandlerDependencies) -> Self {
        let external = deps.external_manager;
        Self { start_flow: Box::new(StartFlowHandler::new(deps.observer.clone())),
               wakeup: Box::new(WakeupHandler),
               session_event: Box::new(SessionEventHandler::new(deps.session_manager,
                                                                deps.sandbox.clone(),
                                                                deps.observer.clone())),
               external_response: Box::new(ExternalEventResponseHandler::new(ExternalChannel::External, external)),
               external_retry: Box::new(ExternalEventRetryHandler::new(external)),
               crypto_response: Box::new(CryptoResponseHandler::new(ExternalChannel::Crypto, external)),
               persistence_response: Box::new(PersistenceResponseHandler::new(ExternalChannel::Persistence,
                                                                              external)) }
    }

    /// Despacha al handler de la variante y devuelve el contexto con el
    /// payload original restaurado.
    pub fn dispatch(&self,
                    context: FlowEventContext<FlowEventPayload>)
                    -> Result<FlowEventContext<FlowEventPayload>, PipelineError> {
        let original = context.input_payload.clone();
        let done = match original.clone() {
            FlowEventPayload::StartFlow(p) => self.start_flow.pre_process(context.with_payload(p))?.with_payload(()),
            FlowEventPayload::Wakeup(p) => self.wakeup.pre_process(context.with_payload(p))?.with_payload(()),
            FlowEventPayload::SessionEvent(p) => {
                self.session_event.pre_process(context.with_payload(p))?.with_payload(())
            }
            FlowEventPayload::ExternalEventResponse(p) => {
                self.external_response.pre_process(context.with_payload(p))?.with_payload(())
            }
            FlowEventPayload::ExternalEventRetry(p) => {
                self.external_retry.pre_process(context.with_payload(p))?.with_payload(())
            }
            FlowEventPayload::CryptoResponse(p) => {
                self.crypto_response.pre_process(context.with_payload(p))?.with_payload(())
            }
            FlowEventPayload::PersistenceResponse(p) => {
                self.persistence_response.pre_process(context.with_payload(p))?.with_payload(())
            }
        };
        Ok(done.with_payload(original))
    }
}
