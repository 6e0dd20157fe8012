//! Contexto que viaja por las etapas del pipeline.
//!
//! Se pasa por valor: cada etapa recibe el contexto y devuelve el nuevo. Si
//! una etapa falla, el llamador conserva el checkpoint original (clonado al
//! cargar) y el contexto parcial simplemente se descarta.
use chrono::{DateTime, Utc};

use crate::checkpoint::Checkpoint;
use crate::config::PipelineConfig;
use crate::event::{FlowEvent, OutputRecord};
use crate::identity::FlowId;

#[derive(Debug, Clone, PartialEq)]
pub struct FlowEventContext<T> {
    pub checkpoint: Checkpoint,
    /// Evento tal como llegó del log.
    pub input_event: FlowEvent,
    /// Payload tipado para el handler en curso.
    pub input_payload: T,
    pub output_records: Vec<OutputRecord>,
    pub config: PipelineConfig,
    pub received_at: DateTime<Utc>,
}

impl<T> FlowEventContext<T> {
    pub fn flow_id(&self) -> FlowId {
        self.input_event.flow_id
    }

    pub fn event_type(&self) -> &'static str {
        self.input_event.payload.type_name()
    }

    /// Cambia el payload tipado conservando el resto.
    pub fn with_payload<U>(self, payload: U) -> FlowEventContext<U> {
        FlowEventContext { checkpoint: self.checkpoint,
                           input_event: self.input_event,
                           input_payload: payload,
                           output_records: self.output_records,
                           config: self.config,
                           received_at: self.received_at }
    }

    pub fn push_output(&mut self, record: OutputRecord) {
        self.output_records.push(record);
    }
}
