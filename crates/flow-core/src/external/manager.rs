//! Transiciones del correlador de eventos externos.
//!
//! Todas las operaciones son puras: reciben el estado por valor y devuelven
//! el nuevo estado, de modo que un error deja intacto el checkpoint del que
//! salió el estado.
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde_json::Value;

use super::{derive_request_id, CorrelatedResponse, ExternalChannel, ExternalEventState, ExternalEventStatus,
            ReceivedResponse};
use crate::errors::{FlowEventError, FlowFatalError};
use crate::event::{ExternalEventRetry, OutputRecord, ResponsePayload};
use crate::identity::FlowId;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalEventManager;

impl ExternalEventManager {
    pub fn new() -> Self {
        Self
    }

    /// Crea el estado de una petición nueva y el registro que la envía.
    pub fn process_event_to_send(&self,
                                 flow_id: FlowId,
                                 suspend_count: u32,
                                 channel: ExternalChannel,
                                 payload: Value,
                                 now: DateTime<Utc>)
                                 -> (ExternalEventState, OutputRecord) {
        let state = ExternalEventState { request_id: derive_request_id(flow_id, suspend_count, channel),
                                         channel,
                                         status: ExternalEventStatus::Ok,
                                         retries: 0,
                                         send_timestamp: now,
                                         request_payload: payload,
                                         response: None };
        let record = request_record(flow_id, &state);
        (state, record)
    }

    /// Camino feliz a nivel de flujo: sin estado pendiente la respuesta es
    /// obsoleta y se descarta.
    pub fn process_event_received<R: CorrelatedResponse>(&self,
                                                         flow_id: FlowId,
                                                         channel: ExternalChannel,
                                                         state: Option<ExternalEventState>,
                                                         response: &R,
                                                         now: DateTime<Utc>)
                                                         -> Result<ExternalEventState, FlowEventError> {
        match state {
            Some(state) => self.process_response(state, response, now),
            None => Err(FlowEventError::NoOutstandingRequest { flow_id,
                                                               channel: channel.to_string(),
                                                               request_id: response.request_id().to_string() }),
        }
    }

    /// Aplica una respuesta si su `request_id` coincide con la petición
    /// pendiente. Una segunda entrega de la misma respuesta es duplicada.
    pub fn process_response<R: CorrelatedResponse>(&self,
                                                   mut state: ExternalEventState,
                                                   response: &R,
                                                   now: DateTime<Utc>)
                                                   -> Result<ExternalEventState, FlowEventError> {
        if state.request_id != response.request_id() {
            return Err(FlowEventError::RequestIdMismatch { channel: state.channel.to_string(),
                                                           expected: state.request_id,
                                                           received: response.request_id().to_string() });
        }
        if state.response.is_some() {
            return Err(FlowEventError::DuplicateResponse { channel: state.channel.to_string(),
                                                           request_id: state.request_id });
        }
        debug!(target: "flow_core::external",
               "response accepted request_id={} channel={} status={}",
               state.request_id,
               state.channel,
               state.status);
        state.status = ExternalEventStatus::Ok;
        state.response = Some(ReceivedResponse { payload: response.response_payload().clone(),
                                                 received_at: now });
        Ok(state)
    }

    /// Transición `OK -> RETRY`, propia de la etapa emisora.
    pub fn mark_for_retry(&self, mut state: ExternalEventState, reason: impl Into<String>) -> ExternalEventState {
        state.status = ExternalEventStatus::Retry { reason: reason.into() };
        state
    }

    /// Acepta una señal de reintento: sólo válida sobre un estado en `RETRY`.
    /// Copia el contador, pasa a `RETRYING` y devuelve el reenvío.
    pub fn process_retry(&self,
                         flow_id: FlowId,
                         state: Option<ExternalEventState>,
                         retry: &ExternalEventRetry,
                         now: DateTime<Utc>)
                         -> Result<(ExternalEventState, OutputRecord), FlowFatalError> {
        let mut state = match state {
            Some(s) if matches!(s.status, ExternalEventStatus::Retry { .. }) => s,
            Some(s) => {
                return Err(FlowFatalError::UnexpectedRetrySignal { flow_id,
                                                                   status: s.status.to_string() })
            }
            None => {
                return Err(FlowFatalError::UnexpectedRetrySignal { flow_id,
                                                                   status: "absent".to_string() })
            }
        };
        state.retries = retry.retries;
        state.status = ExternalEventStatus::Retrying;
        state.send_timestamp = now;
        let record = request_record(flow_id, &state);
        Ok((state, record))
    }

    pub fn has_received_response(&self, state: &ExternalEventState) -> bool {
        state.response.is_some()
    }

    pub fn get_received_response<'a>(&self, state: &'a ExternalEventState) -> Option<&'a ResponsePayload> {
        state.response.as_ref().map(|r| &r.payload)
    }

    /// Reenvía una petición sin respuesta cuyo último envío supera la
    /// ventana. Un estado en `RETRY` espera la señal de reintento.
    pub fn get_event_to_send(&self,
                             flow_id: FlowId,
                             mut state: ExternalEventState,
                             now: DateTime<Utc>,
                             resend_window_ms: i64)
                             -> (ExternalEventState, Option<OutputRecord>) {
        let waiting_retry = matches!(state.status, ExternalEventStatus::Retry { .. });
        let due = state.send_timestamp + Duration::milliseconds(resend_window_ms) <= now;
        if state.response.is_some() || waiting_retry || !due {
            return (state, None);
        }
        state.send_timestamp = now;
        let record = request_record(flow_id, &state);
        (state, Some(record))
    }
}

fn request_record(flow_id: FlowId, state: &ExternalEventState) -> OutputRecord {
    OutputRecord::ExternalEventRequest { flow_id,
                                         channel: state.channel,
                                         request_id: state.request_id.clone(),
                                         payload: state.request_payload.clone(),
                                         retries: state.retries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ExternalEventResponse;
    use serde_json::json;
    use uuid::Uuid;

    fn response(request_id: &str) -> ExternalEventResponse {
        ExternalEventResponse { request_id: request_id.to_string(),
                                payload: ResponsePayload::Success { data: json!({"ok": true}) },
                                timestamp: Utc::now() }
    }

    fn pending(now: DateTime<Utc>) -> (FlowId, ExternalEventState) {
        let flow_id = Uuid::new_v4();
        let (state, _) = ExternalEventManager.process_event_to_send(flow_id, 1, ExternalChannel::External,
                                                                    json!({"q": 1}), now);
        (flow_id, state)
    }

    #[test]
    fn matching_response_is_stored() {
        let now = Utc::now();
        let (_, state) = pending(now);
        let id = state.request_id.clone();
        let state = ExternalEventManager.process_response(state, &response(&id), now).expect("accepted");
        assert!(ExternalEventManager.has_received_response(&state));
        assert!(matches!(ExternalEventManager.get_received_response(&state),
                         Some(ResponsePayload::Success { .. })));
    }

    #[test]
    fn mismatched_or_duplicate_response_is_discarded() {
        let now = Utc::now();
        let (_, state) = pending(now);
        let err = ExternalEventManager.process_response(state.clone(), &response("other"), now).unwrap_err();
        assert!(matches!(err, FlowEventError::RequestIdMismatch { .. }));

        let id = state.request_id.clone();
        let done = ExternalEventManager.process_response(state, &response(&id), now).expect("first");
        let err = ExternalEventManager.process_response(done, &response(&id), now).unwrap_err();
        assert!(matches!(err, FlowEventError::DuplicateResponse { .. }));
    }

    #[test]
    fn retry_only_from_retry_status() {
        let now = Utc::now();
        let (flow_id, state) = pending(now);
        let signal = ExternalEventRetry { channel: ExternalChannel::External, retries: 2 };

        let err = ExternalEventManager.process_retry(flow_id, Some(state.clone()), &signal, now).unwrap_err();
        assert!(matches!(err, FlowFatalError::UnexpectedRetrySignal { ref status, .. } if status == "OK"));

        let marked = ExternalEventManager.mark_for_retry(state, "timeout");
        let (retrying, record) = ExternalEventManager.process_retry(flow_id, Some(marked), &signal, now)
                                                     .expect("accepted");
        assert_eq!(retrying.status, ExternalEventStatus::Retrying);
        assert_eq!(retrying.retries, 2);
        assert!(matches!(record, OutputRecord::ExternalEventRequest { retries: 2, .. }));

        // segunda señal sobre RETRYING: fatal
        let err = ExternalEventManager.process_retry(flow_id, Some(retrying), &signal, now).unwrap_err();
        assert!(matches!(err, FlowFatalError::UnexpectedRetrySignal { ref status, .. } if status == "RETRYING"));
    }

    #[test]
    fn resend_after_window_only() {
        let now = Utc::now();
        let (flow_id, state) = pending(now);
        let (state, none) = ExternalEventManager.get_event_to_send(flow_id, state, now + Duration::milliseconds(10), 1_000);
        assert!(none.is_none());
        let later = now + Duration::milliseconds(1_000);
        let (state, some) = ExternalEventManager.get_event_to_send(flow_id, state, later, 1_000);
        assert!(some.is_some());
        assert_eq!(state.send_timestamp, later);
    }
}
