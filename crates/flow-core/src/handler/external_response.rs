//! Respuestas de subsistemas externos.
//!
//! Un único handler genérico sobre `CorrelatedResponse` sirve los tres
//! canales (genérico, firma, persistencia); cada canal usa su propio slot
//! del checkpoint.
use std::fmt;
use std::marker::PhantomData;

use super::FlowEventHandler;
use crate::errors::{FlowEventError, PipelineError};
use crate::event::{CryptoResponse, ExternalEventResponse, PersistenceResponse};
use crate::external::{CorrelatedResponse, ExternalChannel, ExternalEventManager};
use crate::pipeline::FlowEventContext;

pub struct ExternalResponseHandler<R> {
    channel: ExternalChannel,
    manager: ExternalEventManager,
    _response: PhantomData<fn() -> R>,
}

pub type ExternalEventResponseHandler = ExternalResponseHandler<ExternalEventResponse>;
pub type CryptoResponseHandler = ExternalResponseHandler<CryptoResponse>;
pub type PersistenceResponseHandler = ExternalResponseHandler<PersistenceResponse>;

impl<R> ExternalResponseHandler<R> {
    pub fn new(channel: ExternalChannel, manager: ExternalEventManager) -> Self {
        Self { channel,
               manager,
               _response: PhantomData }
    }

    pub fn channel(&self) -> ExternalChannel {
        self.channel
    }
}

impl<R> fmt::Debug for ExternalResponseHandler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalResponseHandler")
         .field("channel", &self.channel)
         .finish()
    }
}

impl<R: CorrelatedResponse> FlowEventHandler<R> for ExternalResponseHandler<R> {
    fn event_type(&self) -> &'static str {
        match self.channel {
            ExternalChannel::External => "ExternalEventResponse",
            ExternalChannel::Crypto => "CryptoResponse",
            ExternalChannel::Persistence => "PersistenceResponse",
        }
    }

    fn pre_process(&self, mut context: FlowEventContext<R>) -> Result<FlowEventContext<R>, PipelineError> {
        let flow_id = context.flow_id();
        if !context.checkpoint.exists() {
            return Err(FlowEventError::CheckpointMissing { flow_id,
                                                           event_type: self.event_type().to_string() }.into());
        }
        let pending = context.checkpoint.external_state(self.channel).cloned();
        let updated = self.manager.process_event_received(flow_id,
                                                          self.channel,
                                                          pending,
                                                          &context.input_payload,
                                                          context.received_at)?;
        context.checkpoint.set_external_state(self.channel, Some(updated))?;
        Ok(context)
    }
}
