//! `FlowEventPipeline`: procesa un evento contra el checkpoint de su flujo.
//!
//! Garantías:
//! - Descarte (`FlowEventError`): se devuelve el checkpoint original, sin
//!   salidas. El contexto parcial de las etapas se pierde.
//! - Fatal (`FlowFatalError`): se propaga; el llamador no debe persistir
//!   nada del evento.
//! - El pipeline nunca borra un checkpoint; eso lo decide la etapa de fiber.
use std::sync::Arc;

use log::debug;

use super::{resolve_continuation, FlowContinuation, FlowEventContext, ObserverHandle, PipelineBuilder};
use crate::checkpoint::Checkpoint;
use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::errors::{FlowEventError, FlowFatalError, PipelineError};
use crate::event::{FlowEvent, FlowEventPayload, OutputRecord};
use crate::external::{ExternalChannel, ExternalEventManager};
use crate::handler::{FlowEventHandlerRegistry, HandlerDependencies};
use crate::session::{FlowSandboxResolver, SessionManager};

/// Resultado de procesar un evento.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Evento aplicado: contexto final y decisión para la etapa de fiber.
    Processed {
        context: FlowEventContext<FlowEventPayload>,
        continuation: FlowContinuation,
    },
    /// Evento descartado; `checkpoint` es el original, intacto.
    Discarded { checkpoint: Checkpoint, error: FlowEventError },
}

impl PipelineOutcome {
    pub fn is_discarded(&self) -> bool {
        matches!(self, PipelineOutcome::Discarded { .. })
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        match self {
            PipelineOutcome::Processed { context, .. } => &context.checkpoint,
            PipelineOutcome::Discarded { checkpoint, .. } => checkpoint,
        }
    }

    pub fn output_records(&self) -> &[OutputRecord] {
        match self {
            PipelineOutcome::Processed { context, .. } => &context.output_records,
            PipelineOutcome::Discarded { .. } => &[],
        }
    }
}

#[derive(Debug)]
pub struct FlowEventPipeline {
    registry: FlowEventHandlerRegistry,
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    observer: ObserverHandle,
    session_manager: SessionManager,
    external_manager: ExternalEventManager,
}

impl FlowEventPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn new(config: PipelineConfig,
               clock: Arc<dyn Clock>,
               observer: ObserverHandle,
               sandbox: Arc<dyn FlowSandboxResolver>)
               -> Self {
        let deps = HandlerDependencies::new(sandbox, observer.clone(), &config);
        Self { registry: FlowEventHandlerRegistry::new(&deps),
               session_manager: deps.session_manager,
               external_manager: deps.external_manager,
               config,
               clock,
               observer }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn observer(&self) -> &ObserverHandle {
        &self.observer
    }

    /// Procesa `event` contra `checkpoint` (posiblemente inexistente).
    pub fn process(&self, checkpoint: Checkpoint, event: FlowEvent) -> Result<PipelineOutcome, FlowFatalError> {
        let flow_id = event.flow_id;
        let event_type = event.payload.type_name();
        if checkpoint.flow_id() != flow_id {
            let err = FlowFatalError::Internal(format!("checkpoint for flow {} loaded for event of flow {flow_id}",
                                                       checkpoint.flow_id()));
            self.observer.fatal_error(flow_id, event_type, &err);
            return Err(err);
        }

        let original = checkpoint.clone();
        let context = self.load(checkpoint, event);
        match self.run_stages(context) {
            Ok(context) => {
                let continuation = resolve_continuation(&context.checkpoint, &context.input_payload);
                self.observer.event_processed(flow_id, event_type, continuation);
                Ok(PipelineOutcome::Processed { context, continuation })
            }
            Err(PipelineError::Event(error)) => {
                self.observer.event_discarded(flow_id, event_type, &error);
                Ok(PipelineOutcome::Discarded { checkpoint: original,
                                                error })
            }
            Err(PipelineError::Fatal(error)) => {
                self.observer.fatal_error(flow_id, event_type, &error);
                Err(error)
            }
        }
    }

    fn load(&self, checkpoint: Checkpoint, event: FlowEvent) -> FlowEventContext<FlowEventPayload> {
        let payload = event.payload.clone();
        FlowEventContext { checkpoint,
                           input_event: event,
                           input_payload: payload,
                           output_records: Vec::new(),
                           config: self.config.clone(),
                           received_at: self.clock.now() }
    }

    fn run_stages(&self,
                  context: FlowEventContext<FlowEventPayload>)
                  -> Result<FlowEventContext<FlowEventPayload>, PipelineError> {
        let before = context.checkpoint.record().cloned();
        let context = self.registry.dispatch(context)?;
        let context = self.validate(context, before.is_some())?;
        let changed = context.checkpoint.record() != before.as_ref();
        Ok(self.global_post_process(context, changed)?)
    }

    /// Invariantes posteriores al handler.
    fn validate(&self,
                context: FlowEventContext<FlowEventPayload>,
                existed: bool)
                -> Result<FlowEventContext<FlowEventPayload>, FlowFatalError> {
        let flow_id = context.flow_id();
        if existed && !context.checkpoint.exists() {
            return Err(FlowFatalError::Internal(format!("{} handler removed the checkpoint of flow {flow_id}",
                                                        context.event_type())));
        }
        let creates = match &context.input_payload {
            FlowEventPayload::StartFlow(_) => true,
            FlowEventPayload::SessionEvent(e) => e.is_init(),
            _ => false,
        };
        if creates && !context.checkpoint.exists() {
            return Err(FlowFatalError::CheckpointRequired { flow_id,
                                                            context: format!("after {}", context.event_type()) });
        }
        Ok(context)
    }

    /// Reenvíos pendientes: mensajes de sesión sin ack y peticiones externas
    /// sin respuesta que superaron su ventana. `last_event_at` solo avanza si
    /// el handler modificó el registro; una redelivery idéntica no lo reescribe.
    fn global_post_process(&self,
                           mut context: FlowEventContext<FlowEventPayload>,
                           changed: bool)
                           -> Result<FlowEventContext<FlowEventPayload>, FlowFatalError> {
        let flow_id = context.flow_id();
        let now = context.received_at;
        let Some(record) = context.checkpoint.record() else {
            return Ok(context);
        };
        let sessions: Vec<_> = record.sessions.values().cloned().collect();
        if changed {
            context.checkpoint.touch(now)?;
        }

        for state in sessions {
            let destination = state.counterparty.clone();
            let (state, due) =
                self.session_manager
                    .get_messages_to_send(state, now, self.config.session_resend_window_ms);
            if due.is_empty() {
                continue;
            }
            debug!(target: "flow_core::pipeline",
                   "flow_id={flow_id} session={} resending {} message(s)",
                   state.session_id,
                   due.len());
            context.checkpoint.put_session_state(state)?;
            for event in due {
                context.push_output(OutputRecord::SessionMessage { destination: destination.clone(),
                                                                   event });
            }
        }

        for channel in ExternalChannel::ALL {
            let Some(state) = context.checkpoint.external_state(channel).cloned() else {
                continue;
            };
            let (state, resend) =
                self.external_manager
                    .get_event_to_send(flow_id, state, now, self.config.external_event_resend_window_ms);
            if let Some(record) = resend {
                debug!(target: "flow_core::pipeline",
                       "flow_id={flow_id} resending {channel} request {}",
                       state.request_id);
                context.checkpoint.set_external_state(channel, Some(state))?;
                context.push_output(record);
            }
        }
        Ok(context)
    }
}
