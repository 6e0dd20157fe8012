//! Tipos de evento entrante.
//!
//! Cada registro del log llega como `FlowEvent { flow_id, payload }`. El
//! payload es una unión cerrada: el registro de handlers la despacha con un
//! único `match` exhaustivo (ver `handler::FlowEventHandlerRegistry`).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SessionEvent;
use crate::checkpoint::StartContext;
use crate::external::ExternalChannel;
use crate::identity::FlowId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub flow_id: FlowId,
    pub payload: FlowEventPayload,
}

impl FlowEvent {
    pub fn new(flow_id: FlowId, payload: impl Into<FlowEventPayload>) -> Self {
        Self { flow_id,
               payload: payload.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum FlowEventPayload {
    StartFlow(StartFlow),
    Wakeup(Wakeup),
    SessionEvent(SessionEvent),
    ExternalEventResponse(ExternalEventResponse),
    ExternalEventRetry(ExternalEventRetry),
    CryptoResponse(CryptoResponse),
    PersistenceResponse(PersistenceResponse),
}

impl FlowEventPayload {
    /// Nombre estable de la variante (logs/métricas).
    pub fn type_name(&self) -> &'static str {
        match self {
            FlowEventPayload::StartFlow(_) => "StartFlow",
            FlowEventPayload::Wakeup(_) => "Wakeup",
            FlowEventPayload::SessionEvent(_) => "SessionEvent",
            FlowEventPayload::ExternalEventResponse(_) => "ExternalEventResponse",
            FlowEventPayload::ExternalEventRetry(_) => "ExternalEventRetry",
            FlowEventPayload::CryptoResponse(_) => "CryptoResponse",
            FlowEventPayload::PersistenceResponse(_) => "PersistenceResponse",
        }
    }
}

/// Arranque de un flujo iniciado localmente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartFlow {
    pub start_context: StartContext,
}

/// Reanudación puntual, sin datos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wakeup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalErrorKind {
    Transient,
    Platform,
    Fatal,
}

/// Resultado de una operación externa, tal como lo entrega el subsistema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum ResponsePayload {
    Success { data: Value },
    Error { kind: ExternalErrorKind, message: String },
}

/// Respuesta del mecanismo genérico de eventos externos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEventResponse {
    pub request_id: String,
    pub payload: ResponsePayload,
    pub timestamp: DateTime<Utc>,
}

/// Señal de reintento transitorio decidida por la etapa emisora.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEventRetry {
    #[serde(default)]
    pub channel: ExternalChannel,
    pub retries: u32,
}

/// Respuesta del servicio de firma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoResponse {
    pub request_id: String,
    pub result: ResponsePayload,
}

/// Respuesta de una consulta de persistencia de entidades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceResponse {
    pub request_id: String,
    pub result: ResponsePayload,
}

impl From<StartFlow> for FlowEventPayload {
    fn from(v: StartFlow) -> Self {
        FlowEventPayload::StartFlow(v)
    }
}

impl From<Wakeup> for FlowEventPayload {
    fn from(v: Wakeup) -> Self {
        FlowEventPayload::Wakeup(v)
    }
}

impl From<SessionEvent> for FlowEventPayload {
    fn from(v: SessionEvent) -> Self {
        FlowEventPayload::SessionEvent(v)
    }
}

impl From<ExternalEventResponse> for FlowEventPayload {
    fn from(v: ExternalEventResponse) -> Self {
        FlowEventPayload::ExternalEventResponse(v)
    }
}

impl From<ExternalEventRetry> for FlowEventPayload {
    fn from(v: ExternalEventRetry) -> Self {
        FlowEventPayload::ExternalEventRetry(v)
    }
}

impl From<CryptoResponse> for FlowEventPayload {
    fn from(v: CryptoResponse) -> Self {
        FlowEventPayload::CryptoResponse(v)
    }
}

impl From<PersistenceResponse> for FlowEventPayload {
    fn from(v: PersistenceResponse) -> Self {
        FlowEventPayload::PersistenceResponse(v)
    }
}
