//! Identidades: flujo y holding identity (miembro de red + grupo).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identificador opaco de una instancia de flujo. Es la clave de partición
/// del log de transporte.
pub type FlowId = Uuid;

/// Identidad de un participante dentro de un grupo de aplicación.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HoldingIdentity {
    pub x500_name: String,
    pub group_id: String,
}

impl HoldingIdentity {
    pub fn new(x500_name: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self { x500_name: x500_name.into(),
               group_id: group_id.into() }
    }
}

impl fmt::Display for HoldingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.x500_name, self.group_id)
    }
}
