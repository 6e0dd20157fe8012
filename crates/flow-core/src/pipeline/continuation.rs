use serde::{Deserialize, Serialize};

use crate::checkpoint::{Checkpoint, WaitingFor};
use crate::event::FlowEventPayload;
use crate::external::ExternalChannel;

/// Qué debe hacer la etapa de fiber tras el pre-procesado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowContinuation {
    /// La condición de `waiting_for` se cumple: reanudar el flujo.
    Run,
    /// Nada que hacer todavía; se persiste el checkpoint y se espera.
    Continue,
    /// Flujo marcado como terminado a la fuerza; no se reanuda.
    Killed,
}

/// Decide si el `waiting_for` del checkpoint queda satisfecho con el estado
/// actual. Un checkpoint inexistente nunca corre.
pub fn resolve_continuation(checkpoint: &Checkpoint, payload: &FlowEventPayload) -> FlowContinuation {
    let Some(record) = checkpoint.record() else {
        return FlowContinuation::Continue;
    };
    if record.flow_state.is_killed {
        return FlowContinuation::Killed;
    }
    let ready = match &record.flow_state.waiting_for {
        WaitingFor::StartFlow | WaitingFor::SessionInit { .. } | WaitingFor::Ready => true,
        WaitingFor::Wakeup => matches!(payload, FlowEventPayload::Wakeup(_)),
        WaitingFor::SessionData { session_ids } => {
            !session_ids.is_empty()
            && session_ids.iter().all(|id| {
                                     record.sessions
                                           .get(id)
                                           .is_some_and(|s| !s.received.undelivered.is_empty())
                                 })
        }
        WaitingFor::ExternalEvent { request_id } => ExternalChannel::ALL.iter().any(|channel| {
            record.external_slot(*channel)
                  .is_some_and(|s| &s.request_id == request_id && s.response.is_some())
        }),
    };
    if ready {
        FlowContinuation::Run
    } else {
        FlowContinuation::Continue
    }
}
