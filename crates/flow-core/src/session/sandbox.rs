//! Resolución del flujo iniciado (lado receptor de un `SessionInit`).
//!
//! El sandbox real carga el paquete de la aplicación; aquí sólo interesa su
//! interfaz de consulta, de sólo lectura desde el pipeline.
use std::collections::HashMap;
use std::fmt;

use crate::identity::HoldingIdentity;

pub trait FlowSandboxResolver: Send + Sync + fmt::Debug {
    /// Clase del flujo local que responde a `initiating_flow` del paquete
    /// `package_id` en el nodo `holding_identity`; `None` si no hay mapeo.
    fn lookup_initiated_flow(&self,
                             package_id: &str,
                             initiating_flow: &str,
                             holding_identity: &HoldingIdentity)
                             -> Option<String>;
}

/// Mapeo fijo `(package_id, initiating_flow) -> responder`, igual para
/// cualquier holding identity.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFlowSandbox {
    mappings: HashMap<(String, String), String>,
}

impl InMemoryFlowSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self,
                        package_id: impl Into<String>,
                        initiating_flow: impl Into<String>,
                        responder: impl Into<String>)
                        -> Self {
        self.mappings
            .insert((package_id.into(), initiating_flow.into()), responder.into());
        self
    }
}

impl FlowSandboxResolver for InMemoryFlowSandbox {
    fn lookup_initiated_flow(&self,
                             package_id: &str,
                             initiating_flow: &str,
                             _holding_identity: &HoldingIdentity)
                             -> Option<String> {
        self.mappings
            .get(&(package_id.to_string(), initiating_flow.to_string()))
            .cloned()
    }
}
