use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ExternalChannel;
use crate::event::ResponsePayload;

/// Estado de la petición pendiente.
///
/// `Retry` lo fija la etapa emisora al decidir que hubo un fallo
/// transitorio; `Retrying` lo fija este componente al aceptar la señal de
/// reintento. Una segunda señal sobre `Retrying` delata que el reintento se
/// envió sin que el checkpoint correspondiente se escribiera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExternalEventStatus {
    Ok,
    Retry { reason: String },
    Retrying,
}

impl fmt::Display for ExternalEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalEventStatus::Ok => write!(f, "OK"),
            ExternalEventStatus::Retry { .. } => write!(f, "RETRY"),
            ExternalEventStatus::Retrying => write!(f, "RETRYING"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedResponse {
    pub payload: ResponsePayload,
    pub received_at: DateTime<Utc>,
}

/// Una petición externa en curso. A lo sumo una por slot y flujo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEventState {
    pub request_id: String,
    pub channel: ExternalChannel,
    pub status: ExternalEventStatus,
    pub retries: u32,
    pub send_timestamp: DateTime<Utc>,
    /// Cuerpo de la petición, retenido para reenvíos.
    pub request_payload: Value,
    pub response: Option<ReceivedResponse>,
}
