//! Registros de salida que el transporte publica de forma atómica junto con
//! el checkpoint y el commit del consumo.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SessionEvent;
use crate::errors::FlowFatalError;
use crate::external::ExternalChannel;
use crate::identity::{FlowId, HoldingIdentity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record")]
pub enum OutputRecord {
    /// Mensaje de sesión hacia la contraparte (p2p).
    SessionMessage { destination: HoldingIdentity, event: SessionEvent },
    /// Petición (o reenvío) hacia un subsistema externo.
    ExternalEventRequest {
        flow_id: FlowId,
        channel: ExternalChannel,
        request_id: String,
        payload: Value,
        retries: u32,
    },
    /// Cambio de estado visible del flujo.
    FlowStatus { flow_id: FlowId, status: FlowStatusKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum FlowStatusKind {
    Started { flow_class_name: String },
    Failed { error: FlowFatalError },
}
