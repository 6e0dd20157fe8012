//! `FlowEventProcessor`: aplica un lote de registros `(flow_id, evento)`.
//!
//! Por evento se confirma, de forma atómica respecto al lote, el par
//! (checkpoint, salidas):
//! - descartado: nada se escribe ni se emite;
//! - procesado: la etapa de fiber decide la continuación y el checkpoint se
//!   persiste (o se borra si la etapa lo marcó como terminado);
//! - fatal: no se escribe el checkpoint, se emite `FlowStatus::Failed` y se
//!   omiten los eventos restantes de ese flujo en el lote.
use std::sync::Arc;

use flow_core::event::FlowStatusKind;
use flow_core::{Checkpoint, FlowEvent, FlowEventPipeline, FlowFatalError, FlowFiberStage, FlowId, OutputRecord,
                PipelineOutcome};
use indexmap::IndexMap;
use log::{debug, error};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::ProcessorConfig;
use crate::store::{CommitKind, DashMapCheckpointStore};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub outputs: Vec<OutputRecord>,
    pub failures: Vec<(FlowId, FlowFatalError)>,
    pub processed: usize,
    pub discarded: usize,
    /// Eventos no procesados por un fallo previo de su flujo.
    pub skipped: usize,
    pub checkpoints_written: usize,
    pub checkpoints_deleted: usize,
}

impl BatchResult {
    fn absorb(&mut self, other: BatchResult) {
        self.outputs.extend(other.outputs);
        self.failures.extend(other.failures);
        self.processed += other.processed;
        self.discarded += other.discarded;
        self.skipped += other.skipped;
        self.checkpoints_written += other.checkpoints_written;
        self.checkpoints_deleted += other.checkpoints_deleted;
    }
}

#[derive(Debug)]
pub struct FlowEventProcessor {
    pipeline: FlowEventPipeline,
    fiber: Arc<dyn FlowFiberStage>,
    store: DashMapCheckpointStore,
    config: ProcessorConfig,
}

impl FlowEventProcessor {
    pub fn new(pipeline: FlowEventPipeline, fiber: Arc<dyn FlowFiberStage>, config: ProcessorConfig) -> Self {
        Self { pipeline,
               fiber,
               store: DashMapCheckpointStore::new(),
               config }
    }

    pub fn store(&self) -> &DashMapCheckpointStore {
        &self.store
    }

    /// Agrupa por flujo respetando el orden de llegada y procesa los grupos
    /// (en paralelo si así se configuró). Las salidas se devuelven en el
    /// orden de aparición de cada flujo en el lote.
    pub fn process_batch(&self, events: Vec<FlowEvent>) -> BatchResult {
        let mut groups: IndexMap<FlowId, Vec<FlowEvent>> = IndexMap::new();
        for event in events {
            groups.entry(event.flow_id).or_default().push(event);
        }
        let groups: Vec<(FlowId, Vec<FlowEvent>)> = groups.into_iter().collect();
        debug!(target: "flow_processor", "batch with {} flow(s)", groups.len());

        let partials: Vec<BatchResult> = if self.config.parallel {
            groups.into_par_iter()
                  .map(|(flow_id, events)| self.process_flow(flow_id, events))
                  .collect()
        } else {
            groups.into_iter()
                  .map(|(flow_id, events)| self.process_flow(flow_id, events))
                  .collect()
        };

        let mut result = BatchResult::default();
        for partial in partials {
            result.absorb(partial);
        }
        result
    }

    fn process_flow(&self, flow_id: FlowId, events: Vec<FlowEvent>) -> BatchResult {
        let mut result = BatchResult::default();
        let total = events.len();
        for (index, event) in events.into_iter().enumerate() {
            let event_type = event.payload.type_name();
            let checkpoint = self.store.load(flow_id);
            match self.process_event(checkpoint, event) {
                Ok(Some((checkpoint, outputs))) => {
                    match self.store.commit(checkpoint) {
                        CommitKind::Written => result.checkpoints_written += 1,
                        CommitKind::Deleted => result.checkpoints_deleted += 1,
                        CommitKind::Unchanged => {}
                    }
                    result.outputs.extend(outputs);
                    result.processed += 1;
                }
                Ok(None) => result.discarded += 1,
                Err(err) => {
                    error!(target: "flow_processor",
                           "flow {flow_id} failed on {event_type}: {err}");
                    result.outputs.push(OutputRecord::FlowStatus { flow_id,
                                                                   status: FlowStatusKind::Failed { error:
                                                                                                        err.clone() } });
                    result.failures.push((flow_id, err));
                    result.skipped += total - index - 1;
                    break;
                }
            }
        }
        result
    }

    /// `None` si el evento se descartó.
    fn process_event(&self,
                     checkpoint: Checkpoint,
                     event: FlowEvent)
                     -> Result<Option<(Checkpoint, Vec<OutputRecord>)>, FlowFatalError> {
        let flow_id = event.flow_id;
        let event_type = event.payload.type_name();
        match self.pipeline.process(checkpoint, event)? {
            PipelineOutcome::Discarded { .. } => Ok(None),
            PipelineOutcome::Processed { context, continuation } => {
                let context = self.fiber.resume(context, continuation).map_err(|err| {
                                                                       self.pipeline
                                                                           .observer()
                                                                           .fatal_error(flow_id, event_type, &err);
                                                                       err
                                                                   })?;
                Ok(Some((context.checkpoint, context.output_records)))
            }
        }
    }
}
