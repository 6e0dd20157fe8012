//! Mensajes de sesión entre dos instancias de flujo.
//!
//! Todo mensaje salvo `Ack` lleva número de secuencia (desde 0, por
//! dirección). `Ack` es contabilidad de transporte y no se secuencia.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::HoldingIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: String,
    /// Emisor del mensaje.
    pub source: HoldingIdentity,
    /// Receptor del mensaje.
    pub destination: HoldingIdentity,
    pub sequence_num: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub payload: SessionPayload,
}

impl SessionEvent {
    pub fn is_init(&self) -> bool {
        matches!(self.payload, SessionPayload::Init(_))
    }
}

/// Inicio de sesión: identifica el flujo iniciador para que el receptor
/// resuelva, vía sandbox, qué flujo local lo atiende.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInit {
    pub flow_name: String,
    pub cpi_id: String,
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SessionPayload {
    Init(SessionInit),
    Confirm,
    Data { payload: Vec<u8> },
    Close,
    Error { message: String },
    Ack { received_sequence_num: u64 },
}

impl SessionPayload {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SessionPayload::Init(_) => "Init",
            SessionPayload::Confirm => "Confirm",
            SessionPayload::Data { .. } => "Data",
            SessionPayload::Close => "Close",
            SessionPayload::Error { .. } => "Error",
            SessionPayload::Ack { .. } => "Ack",
        }
    }
}
