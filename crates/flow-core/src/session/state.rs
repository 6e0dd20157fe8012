use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::INITIAL_SEQUENCE_NUM;
use crate::event::SessionEvent;
use crate::identity::HoldingIdentity;

/// Estado de una sesión.
///
/// Transiciones válidas al aplicar mensajes en orden:
/// - `Created` -> `Confirmed` (Confirm, o Init en el lado receptor)
/// - `Created | Confirmed` -> `Closing` (Close)
/// - `Closing` -> `Closed` (Close)
/// - cualquiera -> `Error` (Error)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Created,
    Confirmed,
    Closing,
    Closed,
    Error,
}

impl SessionStatus {
    /// No admite mensajes nuevos.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Closed | SessionStatus::Error)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Created => "CREATED",
            SessionStatus::Confirmed => "CONFIRMED",
            SessionStatus::Closing => "CLOSING",
            SessionStatus::Closed => "CLOSED",
            SessionStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Lado de recepción.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedEvents {
    /// Último número de secuencia aplicado en orden; `None` si ninguno.
    pub last_processed_sequence_num: Option<u64>,
    /// Aplicados en orden y aún no consumidos por la lógica del flujo.
    pub undelivered: Vec<SessionEvent>,
    /// Recibidos por delante de un hueco.
    pub out_of_order: BTreeMap<u64, SessionEvent>,
}

impl ReceivedEvents {
    pub fn next_expected(&self) -> u64 {
        self.last_processed_sequence_num.map_or(INITIAL_SEQUENCE_NUM, |n| n + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSend {
    pub event: SessionEvent,
    pub last_sent_at: Option<DateTime<Utc>>,
}

/// Lado de envío.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentEvents {
    pub last_sequence_num: Option<u64>,
    /// Enviados (o por enviar) sin ack de la contraparte.
    pub unacknowledged: Vec<PendingSend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub local: HoldingIdentity,
    pub counterparty: HoldingIdentity,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_received_at: Option<DateTime<Utc>>,
    pub received: ReceivedEvents,
    pub sent: SentEvents,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>,
               local: HoldingIdentity,
               counterparty: HoldingIdentity,
               now: DateTime<Utc>)
               -> Self {
        Self { session_id: session_id.into(),
               local,
               counterparty,
               status: SessionStatus::Created,
               created_at: now,
               last_received_at: None,
               received: ReceivedEvents::default(),
               sent: SentEvents::default() }
    }
}
