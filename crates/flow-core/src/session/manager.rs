//! Secuenciador por sesión.
//!
//! Convierte un flujo de mensajes desordenado y con duplicados en una
//! secuencia ordenada, deduplicada y aplicada a lo sumo una vez:
//! - `seq < next_expected` (o ya en el buffer) => duplicado: estado intacto.
//! - `seq == next_expected` => se aplica, y se drenan los buffers contiguos.
//! - `seq > next_expected` => se retiene hasta que se cierre el hueco.
//!
//! Los `Ack` no llevan secuencia: sólo podan el lado de envío.
use chrono::{DateTime, Duration, Utc};
use log::debug;

use super::{PendingSend, SessionState, SessionStatus};
use crate::checkpoint::Checkpoint;
use crate::constants::INITIAL_SEQUENCE_NUM;
use crate::errors::{FlowEventError, FlowFatalError};
use crate::event::{OutputRecord, SessionEvent, SessionInit, SessionPayload};
use crate::identity::HoldingIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveDisposition {
    /// Aplicado en orden (junto con los contiguos que estaban retenidos).
    Applied,
    /// Retenido por llegar antes de tiempo.
    Buffered,
    /// Ya procesado: sólo se vuelve a confirmar.
    Duplicate,
    /// Ack de transporte procesado.
    AckProcessed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveOutcome {
    pub state: SessionState,
    pub disposition: ReceiveDisposition,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionManager {
    out_of_order_limit: usize,
}

impl SessionManager {
    pub fn new(out_of_order_limit: usize) -> Self {
        Self { out_of_order_limit }
    }

    /// Procesa un mensaje recibido. `state == None` es la primera vez que se
    /// ve la sesión.
    pub fn process_message_received(&self,
                                    state: Option<SessionState>,
                                    event: &SessionEvent,
                                    now: DateTime<Utc>)
                                    -> Result<ReceiveOutcome, FlowEventError> {
        let mut state = state.unwrap_or_else(|| {
                                  SessionState::new(event.session_id.clone(),
                                                    event.destination.clone(),
                                                    event.source.clone(),
                                                    now)
                              });

        if let SessionPayload::Ack { received_sequence_num } = event.payload {
            state.sent
                 .unacknowledged
                 .retain(|p| p.event.sequence_num != Some(received_sequence_num));
            return Ok(ReceiveOutcome { state,
                                       disposition: ReceiveDisposition::AckProcessed });
        }

        let Some(seq) = event.sequence_num else {
            return Err(FlowEventError::MalformedSessionEvent { session_id: event.session_id.clone(),
                                                               reason: format!("{} without sequence number",
                                                                               event.payload.kind_name()) });
        };

        let next = state.received.next_expected();
        if seq < next || state.received.out_of_order.contains_key(&seq) {
            debug!(target: "flow_core::session",
                   "duplicate session={} seq={seq} next_expected={next}",
                   state.session_id);
            return Ok(ReceiveOutcome { state,
                                       disposition: ReceiveDisposition::Duplicate });
        }

        if state.status.is_terminal() {
            return Err(FlowEventError::SessionTerminated { session_id: state.session_id.clone(),
                                                           status: state.status.to_string(),
                                                           sequence_num: seq });
        }

        if seq > next {
            if state.received.out_of_order.len() >= self.out_of_order_limit {
                return Err(FlowEventError::SessionBufferFull { session_id: state.session_id.clone(),
                                                               limit: self.out_of_order_limit,
                                                               sequence_num: seq });
            }
            state.received.out_of_order.insert(seq, event.clone());
            state.last_received_at = Some(now);
            return Ok(ReceiveOutcome { state,
                                       disposition: ReceiveDisposition::Buffered });
        }

        apply_in_order(&mut state, event.clone());
        while !state.status.is_terminal() {
            let next = state.received.next_expected();
            let Some(buffered) = state.received.out_of_order.remove(&next) else {
                break;
            };
            apply_in_order(&mut state, buffered);
        }
        // tras Closed/Error el buffer no se aplica nunca
        if state.status.is_terminal() {
            state.received.out_of_order.clear();
        }
        state.last_received_at = Some(now);
        Ok(ReceiveOutcome { state,
                            disposition: ReceiveDisposition::Applied })
    }

    /// Siguiente mensaje disponible para la lógica del flujo.
    pub fn next_received_event<'a>(&self, state: &'a SessionState) -> Option<&'a SessionEvent> {
        state.received.undelivered.first()
    }

    /// Marca como consumido el mensaje `sequence_num` (lo llama la etapa de
    /// fiber tras entregarlo).
    pub fn acknowledge_received_event(&self, mut state: SessionState, sequence_num: u64) -> SessionState {
        state.received
             .undelivered
             .retain(|e| e.sequence_num != Some(sequence_num));
        state
    }

    /// Ack de transporte para un mensaje recibido.
    pub fn generate_ack(&self, state: &SessionState, sequence_num: u64, now: DateTime<Utc>) -> SessionEvent {
        SessionEvent { session_id: state.session_id.clone(),
                       source: state.local.clone(),
                       destination: state.counterparty.clone(),
                       sequence_num: None,
                       timestamp: now,
                       payload: SessionPayload::Ack { received_sequence_num: sequence_num } }
    }

    /// Sella un mensaje saliente con el siguiente número de secuencia y lo
    /// retiene hasta recibir su ack.
    pub fn process_message_to_send(&self,
                                   mut state: SessionState,
                                   payload: SessionPayload,
                                   now: DateTime<Utc>)
                                   -> (SessionState, SessionEvent) {
        let seq = state.sent.last_sequence_num.map_or(INITIAL_SEQUENCE_NUM, |n| n + 1);
        let event = SessionEvent { session_id: state.session_id.clone(),
                                   source: state.local.clone(),
                                   destination: state.counterparty.clone(),
                                   sequence_num: Some(seq),
                                   timestamp: now,
                                   payload };
        state.sent.last_sequence_num = Some(seq);
        match event.payload {
            SessionPayload::Close => {
                state.status = match state.status {
                    SessionStatus::Closing => SessionStatus::Closed,
                    SessionStatus::Error => SessionStatus::Error,
                    _ => SessionStatus::Closing,
                }
            }
            SessionPayload::Error { .. } => state.status = SessionStatus::Error,
            _ => {}
        }
        state.sent.unacknowledged.push(PendingSend { event: event.clone(),
                                                     last_sent_at: None });
        (state, event)
    }

    /// Mensajes a (re)enviar: nunca enviados, o sin ack tras la ventana.
    pub fn get_messages_to_send(&self,
                                mut state: SessionState,
                                now: DateTime<Utc>,
                                resend_window_ms: i64)
                                -> (SessionState, Vec<SessionEvent>) {
        let window = Duration::milliseconds(resend_window_ms);
        let mut due = Vec::new();
        for pending in state.sent.unacknowledged.iter_mut() {
            let should_send = match pending.last_sent_at {
                None => true,
                Some(at) => at + window <= now,
            };
            if should_send {
                pending.last_sent_at = Some(now);
                due.push(pending.event.clone());
            }
        }
        (state, due)
    }

    /// Abre una sesión nueva desde un flujo existente (lado iniciador). El
    /// nombre del `SessionInit` sale del marco iniciador más cercano de la
    /// pila de sub-flujos.
    pub fn initiate_session(&self,
                            checkpoint: &mut Checkpoint,
                            session_id: impl Into<String>,
                            counterparty: HoldingIdentity,
                            payload: Option<Vec<u8>>,
                            now: DateTime<Utc>)
                            -> Result<OutputRecord, FlowFatalError> {
        let session_id = session_id.into();
        if checkpoint.get_session_state(&session_id).is_some() {
            return Err(FlowFatalError::SessionAlreadyExists { flow_id: checkpoint.flow_id(),
                                                              session_id });
        }
        let flow_name = match checkpoint.nearest_initiating_flow() {
            Some(item) => item.flow_name.clone(),
            None => checkpoint.require("initiate_session")?.start_context.flow_class_name.clone(),
        };
        let record = checkpoint.require("initiate_session")?;
        let local = record.start_context.holding_identity.clone();
        let cpi_id = record.start_context.cpi_id.clone();

        let state = SessionState::new(session_id.clone(), local, counterparty.clone(), now);
        let init = SessionPayload::Init(SessionInit { flow_name, cpi_id, payload });
        let (mut state, event) = self.process_message_to_send(state, init, now);
        if let Some(pending) = state.sent.unacknowledged.last_mut() {
            pending.last_sent_at = Some(now);
        }
        checkpoint.put_session_state(state)?;

        let record = checkpoint.record_mut("initiate_session")?;
        if let Some(top) = record.flow_stack_items.iter_mut().rev().find(|i| i.is_initiating_flow) {
            top.session_ids.push(session_id);
        }
        Ok(OutputRecord::SessionMessage { destination: counterparty,
                                          event })
    }
}

fn apply_in_order(state: &mut SessionState, event: SessionEvent) {
    state.status = match (&event.payload, state.status) {
        (SessionPayload::Init(_), SessionStatus::Created) => SessionStatus::Confirmed,
        (SessionPayload::Confirm, SessionStatus::Created) => SessionStatus::Confirmed,
        (SessionPayload::Close, SessionStatus::Created | SessionStatus::Confirmed) => SessionStatus::Closing,
        (SessionPayload::Close, SessionStatus::Closing) => SessionStatus::Closed,
        (SessionPayload::Error { .. }, _) => SessionStatus::Error,
        (_, current) => current,
    };
    state.received.last_processed_sequence_num = event.sequence_num;
    // Confirm es contabilidad del protocolo, no llega a la lógica del flujo
    if !matches!(event.payload, SessionPayload::Confirm) {
        state.received.undelivered.push(event);
    }
}
