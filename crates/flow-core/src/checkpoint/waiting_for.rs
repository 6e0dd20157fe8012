//! `WaitingFor`: qué condición bloquea al flujo entre checkpoints.
//!
//! Cada handler que crea o avanza un checkpoint debe dejar este valor
//! coherente con lo que acaba de hacer; el pipeline no lo infiere.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WaitingFor {
    /// Flujo local recién creado, pendiente de su primera ejecución.
    StartFlow,
    /// Flujo iniciado por un par remoto; la sesión que lo creó aún no se
    /// entregó a la lógica del flujo.
    SessionInit { session_id: String },
    /// Uno o más mensajes de sesión; todos deben tener un evento disponible.
    SessionData { session_ids: Vec<String> },
    /// Respuesta a una petición despachada a un subsistema externo.
    ExternalEvent { request_id: String },
    /// Reanudación puntual.
    Wakeup,
    /// Nada: listo para ejecutar.
    Ready,
}

impl fmt::Display for WaitingFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitingFor::StartFlow => write!(f, "StartFlow"),
            WaitingFor::SessionInit { session_id } => write!(f, "SessionInit({session_id})"),
            WaitingFor::SessionData { session_ids } => write!(f, "SessionData({})", session_ids.join(",")),
            WaitingFor::ExternalEvent { request_id } => write!(f, "ExternalEvent({request_id})"),
            WaitingFor::Wakeup => write!(f, "Wakeup"),
            WaitingFor::Ready => write!(f, "Ready"),
        }
    }
}
