use super::FlowEventHandler;
use crate::errors::{FlowEventError, PipelineError};
use crate::event::Wakeup;
use crate::pipeline::FlowEventContext;

/// Un wakeup no muta nada: sólo exige que el flujo exista. Si el flujo
/// espera un wakeup, la resolución de continuación lo deja correr.
#[derive(Debug, Default, Clone, Copy)]
pub struct WakeupHandler;

impl FlowEventHandler<Wakeup> for WakeupHandler {
    fn event_type(&self) -> &'static str {
        "Wakeup"
    }

    fn pre_process(&self, context: FlowEventContext<Wakeup>) -> Result<FlowEventContext<Wakeup>, PipelineError> {
        if !context.checkpoint.exists() {
            return Err(FlowEventError::CheckpointMissing { flow_id: context.flow_id(),
                                                           event_type: self.event_type().to_string() }.into());
        }
        Ok(context)
    }
}
