//! Frontera con la etapa de reanudación del fiber.
//!
//! La etapa real deserializa el fiber, ejecuta la lógica del flujo hasta la
//! siguiente suspensión y decide si el flujo termina (`mark_deleted`). Aquí
//! sólo se fija su interfaz.
use std::fmt;

use super::{FlowContinuation, FlowEventContext};
use crate::errors::FlowFatalError;
use crate::event::FlowEventPayload;

pub trait FlowFiberStage: Send + Sync + fmt::Debug {
    fn resume(&self,
              context: FlowEventContext<FlowEventPayload>,
              continuation: FlowContinuation)
              -> Result<FlowEventContext<FlowEventPayload>, FlowFatalError>;
}

/// Deja el contexto tal cual.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFiberStage;

impl FlowFiberStage for NoopFiberStage {
    fn resume(&self,
              context: FlowEventContext<FlowEventPayload>,
              _continuation: FlowContinuation)
              -> Result<FlowEventContext<FlowEventPayload>, FlowFatalError> {
        Ok(context)
    }
}
