use super::FlowEventHandler;
use crate::errors::{FlowEventError, PipelineError};
use crate::event::ExternalEventRetry;
use crate::external::ExternalEventManager;
use crate::pipeline::FlowEventContext;

/// Acepta la señal de reintento de un canal (`RETRY -> RETRYING`) y emite
/// el reenvío. Cualquier otro estado es un defecto de la etapa emisora.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalEventRetryHandler {
    manager: ExternalEventManager,
}

impl ExternalEventRetryHandler {
    pub fn new(manager: ExternalEventManager) -> Self {
        Self { manager }
    }
}

impl FlowEventHandler<ExternalEventRetry> for ExternalEventRetryHandler {
    fn event_type(&self) -> &'static str {
        "ExternalEventRetry"
    }

    fn pre_process(&self,
                   mut context: FlowEventContext<ExternalEventRetry>)
                   -> Result<FlowEventContext<ExternalEventRetry>, PipelineError> {
        let flow_id = context.flow_id();
        if !context.checkpoint.exists() {
            return Err(FlowEventError::CheckpointMissing { flow_id,
                                                           event_type: self.event_type().to_string() }.into());
        }
        if context.checkpoint.is_killed() {
            return Err(FlowEventError::FlowKilled { flow_id,
                                                    event_type: self.event_type().to_string() }.into());
        }
        let channel = context.input_payload.channel;
        let pending = context.checkpoint.external_state(channel).cloned();
        let (state, resend) =
            self.manager
                .process_retry(flow_id, pending, &context.input_payload, context.received_at)?;
        context.checkpoint.set_external_state(channel, Some(state))?;
        context.push_output(resend);
        Ok(context)
    }
}
