//! Taxonomía de errores del pipeline.
//!
//! Dos familias:
//! - `FlowEventError`: el evento es válido para el transporte pero no
//!   aplicable al estado actual (duplicado, obsoleto, flujo inexistente). Se
//!   registra y se descarta sin mutar el checkpoint ni emitir salidas.
//! - `FlowFatalError`: violación de invariante (estado corrupto o defecto de
//!   despliegue). Se propaga fuera del pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum FlowEventError {
    #[error("no checkpoint exists for flow {flow_id} ({event_type})")]
    CheckpointMissing { flow_id: Uuid, event_type: String },
    #[error("flow {flow_id} has already been started")]
    FlowAlreadyStarted { flow_id: Uuid },
    #[error("flow {flow_id} has been killed ({event_type} ignored)")]
    FlowKilled { flow_id: Uuid, event_type: String },
    #[error("flow {flow_id} has no outstanding {channel} request; response {request_id} is stale")]
    NoOutstandingRequest { flow_id: Uuid, channel: String, request_id: String },
    #[error("{channel} response {received} does not match outstanding request {expected}")]
    RequestIdMismatch { channel: String, expected: String, received: String },
    #[error("{channel} response {request_id} was already received")]
    DuplicateResponse { channel: String, request_id: String },
    #[error("session {session_id} is {status}; message {sequence_num} rejected")]
    SessionTerminated { session_id: String, status: String, sequence_num: u64 },
    #[error("malformed session event on {session_id}: {reason}")]
    MalformedSessionEvent { session_id: String, reason: String },
    #[error("session {session_id} out-of-order buffer is full ({limit}); message {sequence_num} dropped")]
    SessionBufferFull { session_id: String, limit: usize, sequence_num: u64 },
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum FlowFatalError {
    #[error("checkpoint required for flow {flow_id} but none exists ({context})")]
    CheckpointRequired { flow_id: Uuid, context: String },
    #[error("SessionInit on session {session_id} targets existing flow {flow_id}")]
    DuplicateSessionInit { flow_id: Uuid, session_id: String },
    #[error("session {session_id} already exists in flow {flow_id}")]
    SessionAlreadyExists { flow_id: Uuid, session_id: String },
    #[error("no initiated flow registered for '{initiating_flow}' in package {package_id} ({holding_identity})")]
    InitiatedFlowNotFound { package_id: String, initiating_flow: String, holding_identity: String },
    #[error("retry signal for flow {flow_id} observed with external event status {status}; expected RETRY")]
    UnexpectedRetrySignal { flow_id: Uuid, status: String },
    #[error("internal: {0}")]
    Internal(String),
}

/// Error de procesamiento de un evento: descartable o fatal.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PipelineError {
    #[error(transparent)]
    Event(#[from] FlowEventError),
    #[error(transparent)]
    Fatal(#[from] FlowFatalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Discardable,
    Fatal,
}

pub fn classify_error(err: &PipelineError) -> ErrorClass {
    match err {
        PipelineError::Event(_) => ErrorClass::Discardable,
        PipelineError::Fatal(_) => ErrorClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_splits_event_and_fatal() {
        let flow_id = Uuid::new_v4();
        let discard: PipelineError = FlowEventError::FlowAlreadyStarted { flow_id }.into();
        let fatal: PipelineError = FlowFatalError::Internal("boom".into()).into();
        assert_eq!(classify_error(&discard), ErrorClass::Discardable);
        assert_eq!(classify_error(&fatal), ErrorClass::Fatal);
    }

    #[test]
    fn messages_carry_identifiers() {
        let e = FlowEventError::RequestIdMismatch { channel: "external".into(),
                                                    expected: "r1".into(),
                                                    received: "r2".into() };
        let msg = e.to_string();
        assert!(msg.contains("r1") && msg.contains("r2"), "got: {msg}");
    }
}
