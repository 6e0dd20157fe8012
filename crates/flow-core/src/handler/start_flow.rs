use super::FlowEventHandler;
use crate::checkpoint::WaitingFor;
use crate::errors::{FlowEventError, PipelineError};
use crate::event::{FlowStatusKind, OutputRecord, StartFlow};
use crate::pipeline::{FlowEventContext, ObserverHandle};

/// Crea el checkpoint de un flujo iniciado localmente.
#[derive(Debug)]
pub struct StartFlowHandler {
    observer: ObserverHandle,
}

impl StartFlowHandler {
    pub fn new(observer: ObserverHandle) -> Self {
        Self { observer }
    }
}

impl FlowEventHandler<StartFlow> for StartFlowHandler {
    fn event_type(&self) -> &'static str {
        "StartFlow"
    }

    fn pre_process(&self, mut context: FlowEventContext<StartFlow>) -> Result<FlowEventContext<StartFlow>, PipelineError> {
        let flow_id = context.flow_id();
        if context.checkpoint.exists() {
            return Err(FlowEventError::FlowAlreadyStarted { flow_id }.into());
        }
        let start_context = context.input_payload.start_context.clone();
        let flow_class_name = start_context.flow_class_name.clone();
        context.checkpoint
               .init_flow_state(start_context, WaitingFor::StartFlow, context.received_at)?;
        context.push_output(OutputRecord::FlowStatus { flow_id,
                                                       status: FlowStatusKind::Started { flow_class_name:
                                                                                             flow_class_name.clone() } });
        self.observer.checkpoint_created(flow_id, &flow_class_name);
        Ok(context)
    }
}
