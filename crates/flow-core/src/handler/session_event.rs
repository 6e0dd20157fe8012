//! Handler de mensajes de sesión.
//!
//! Pasos:
//! 1. Sin checkpoint sólo se admite un `SessionInit`; lo demás se descarta.
//!    Con checkpoint, un `SessionInit` es fatal (aunque sea redelivery).
//! 2. El secuenciador deduplica y ordena. Todo mensaje secuenciado aceptado
//!    (nuevo, retenido o duplicado) se confirma con un `Ack`.
//! 3. Con checkpoint se guarda el estado de sesión (salvo duplicados).
//! 4. Sin checkpoint, si el siguiente evento recibido es el `SessionInit`,
//!    se crea el checkpoint del flujo iniciado.
use std::sync::Arc;

use log::debug;

use super::FlowEventHandler;
use crate::checkpoint::{InitiatorKind, StartContext, WaitingFor};
use crate::errors::{FlowEventError, FlowFatalError, PipelineError};
use crate::event::{OutputRecord, SessionEvent, SessionPayload};
use crate::pipeline::{FlowEventContext, ObserverHandle};
use crate::session::{FlowSandboxResolver, ReceiveDisposition, SessionManager};

#[derive(Debug)]
pub struct SessionEventHandler {
    manager: SessionManager,
    sandbox: Arc<dyn FlowSandboxResolver>,
    observer: ObserverHandle,
}

impl SessionEventHandler {
    pub fn new(manager: SessionManager, sandbox: Arc<dyn FlowSandboxResolver>, observer: ObserverHandle) -> Self {
        Self { manager,
               sandbox,
               observer }
    }
}

impl FlowEventHandler<SessionEvent> for SessionEventHandler {
    fn event_type(&self) -> &'static str {
        "SessionEvent"
    }

    fn pre_process(&self,
                   mut context: FlowEventContext<SessionEvent>)
                   -> Result<FlowEventContext<SessionEvent>, PipelineError> {
        let flow_id = context.flow_id();
        let now = context.received_at;
        let event = context.input_payload.clone();
        let existed = context.checkpoint.exists();

        if existed && event.is_init() {
            return Err(FlowFatalError::DuplicateSessionInit { flow_id,
                                                              session_id: event.session_id.clone() }.into());
        }
        if !existed && !event.is_init() {
            return Err(FlowEventError::CheckpointMissing { flow_id,
                                                           event_type: self.event_type().to_string() }.into());
        }

        let prior = context.checkpoint.get_session_state(&event.session_id).cloned();
        let known_session = prior.is_some();
        let outcome = self.manager.process_message_received(prior, &event, now)?;
        debug!(target: "flow_core::session",
               "flow_id={flow_id} session={} kind={} seq={:?} -> {:?}",
               event.session_id,
               event.payload.kind_name(),
               event.sequence_num,
               outcome.disposition);

        if let Some(seq) = event.sequence_num {
            let ack = self.manager.generate_ack(&outcome.state, seq, now);
            context.push_output(OutputRecord::SessionMessage { destination: event.source.clone(),
                                                               event: ack });
        }

        if existed {
            let stray_ack = !known_session && outcome.disposition == ReceiveDisposition::AckProcessed;
            if outcome.disposition != ReceiveDisposition::Duplicate && !stray_ack {
                context.checkpoint.put_session_state(outcome.state)?;
            }
            return Ok(context);
        }

        let init = match self.manager.next_received_event(&outcome.state) {
            Some(SessionEvent { payload: SessionPayload::Init(init), .. }) => init.clone(),
            _ => {
                return Err(FlowEventError::CheckpointMissing { flow_id,
                                                               event_type: self.event_type().to_string() }.into())
            }
        };
        let responder = self.sandbox
                            .lookup_initiated_flow(&init.cpi_id, &init.flow_name, &event.destination)
                            .ok_or_else(|| FlowFatalError::InitiatedFlowNotFound { package_id: init.cpi_id.clone(),
                                                                                   initiating_flow: init.flow_name
                                                                                                        .clone(),
                                                                                   holding_identity: event.destination
                                                                                                          .to_string() })?;
        let start_context = StartContext { requesting_identity: event.source.clone(),
                                           holding_identity: event.destination.clone(),
                                           initiator: InitiatorKind::RemotePeer { session_id: event.session_id
                                                                                                  .clone() },
                                           cpi_id: init.cpi_id.clone(),
                                           flow_class_name: responder.clone(),
                                           start_args: None,
                                           created_at: now };
        context.checkpoint.init_flow_state(start_context,
                                           WaitingFor::SessionInit { session_id: event.session_id.clone() },
                                           now)?;
        context.checkpoint.put_session_state(outcome.state)?;
        self.observer.checkpoint_created(flow_id, &responder);
        Ok(context)
    }
}
