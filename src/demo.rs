//! Escenario ping/pong entre dos nodos.
//!
//! Alice arranca `Ping`, abre una sesión con Bob y espera su respuesta; el
//! `SessionInit` crea en Bob el flujo `PingResponder`, que contesta y
//! termina. Con la respuesta, Alice pide un tipo de cambio a un subsistema
//! externo y termina al recibirlo.
//!
//! El transporte simulado puede reentregar mensajes de datos y forzar fallos
//! transitorios del subsistema externo para ejercitar deduplicación y
//! reintentos.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use flow_core::checkpoint::{InitiatorKind, StartContext};
use flow_core::event::{CryptoResponse, ExternalEventResponse, ExternalEventRetry, PersistenceResponse,
                       ResponsePayload, SessionPayload, StartFlow};
use flow_core::external::{ExternalChannel, ExternalEventManager};
use flow_core::pipeline::{CompositeObserver, CountingObserver, LogObserver, ObserverCounts};
use flow_core::session::{InMemoryFlowSandbox, SessionManager};
use flow_core::{FlowContinuation, FlowEvent, FlowEventContext, FlowEventPayload, FlowEventPipeline, FlowFatalError,
                FlowFiberStage, FlowId, HoldingIdentity, OutputRecord, SystemClock, WaitingFor};
use flow_processor::FlowEventProcessor;
use log::{debug, info};
use serde_json::json;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;

pub const PACKAGE_ID: &str = "ping-cpi";
pub const INITIATOR_FLOW: &str = "Ping";
pub const RESPONDER_FLOW: &str = "PingResponder";
const MAX_ROUNDS: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct DemoOptions {
    /// Reentregar cada mensaje de datos (entrega al-menos-una-vez).
    pub redeliver_data: bool,
    /// Fallos transitorios del subsistema externo antes de responder.
    pub transient_failures: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoReport {
    pub rounds: usize,
    pub initiator_completed: bool,
    pub responder_completed: bool,
    pub retries: u32,
    pub failures: usize,
    pub counts: ObserverCounts,
}

/// Etapa de fiber mínima que ejecuta `Ping` y `PingResponder`.
#[derive(Debug)]
pub struct PingPongFiber {
    sessions: SessionManager,
    external: ExternalEventManager,
}

impl PingPongFiber {
    pub fn new(out_of_order_limit: usize) -> Self {
        Self { sessions: SessionManager::new(out_of_order_limit),
               external: ExternalEventManager::new() }
    }

    fn run_initiator(&self,
                     mut context: FlowEventContext<FlowEventPayload>)
                     -> Result<FlowEventContext<FlowEventPayload>, FlowFatalError> {
        let flow_id = context.flow_id();
        let now = context.received_at;
        let waiting_for = context.checkpoint
                                 .waiting_for()
                                 .cloned()
                                 .ok_or_else(|| FlowFatalError::CheckpointRequired { flow_id,
                                                                                     context: "fiber".into() })?;
        match waiting_for {
            WaitingFor::StartFlow => {
                let session_id = initiator_session_id(flow_id);
                let counterparty = responder_identity();
                let init = self.sessions.initiate_session(&mut context.checkpoint,
                                                          session_id.clone(),
                                                          counterparty,
                                                          Some(b"ping".to_vec()),
                                                          now)?;
                context.push_output(init);
                context.checkpoint.suspend(WaitingFor::SessionData { session_ids: vec![session_id] },
                                           "receive-pong",
                                           b"receive-pong".to_vec())?;
            }
            WaitingFor::SessionData { session_ids } => {
                for session_id in session_ids {
                    let state = context.checkpoint
                                       .get_session_state(&session_id)
                                       .cloned()
                                       .ok_or_else(|| FlowFatalError::Internal(format!("unknown session {session_id}")))?;
                    let seq = self.sessions
                                  .next_received_event(&state)
                                  .and_then(|e| e.sequence_num)
                                  .ok_or_else(|| FlowFatalError::Internal(format!("no event on {session_id}")))?;
                    let state = self.sessions.acknowledge_received_event(state, seq);
                    context.checkpoint.put_session_state(state)?;
                }
                let suspend_count = context.checkpoint.suspend_count().unwrap_or_default();
                let (state, request) = self.external.process_event_to_send(flow_id,
                                                                           suspend_count,
                                                                           ExternalChannel::External,
                                                                           json!({"query": "fx-rate", "pair": "GBP/EUR"}),
                                                                           now);
                let request_id = state.request_id.clone();
                context.checkpoint.set_external_state(ExternalChannel::External, Some(state))?;
                context.push_output(request);
                context.checkpoint.suspend(WaitingFor::ExternalEvent { request_id },
                                           "fetch-rate",
                                           b"fetch-rate".to_vec())?;
            }
            WaitingFor::ExternalEvent { .. } => {
                let rate = context.checkpoint
                                  .external_state(ExternalChannel::External)
                                  .and_then(|s| self.external.get_received_response(s))
                                  .cloned();
                info!(target: "ledgerflow::demo", "flow {flow_id} received {rate:?}; completing");
                context.checkpoint.mark_deleted();
            }
            other => debug!(target: "ledgerflow::demo", "flow {flow_id} idle on {other}"),
        }
        Ok(context)
    }

    fn run_responder(&self,
                     mut context: FlowEventContext<FlowEventPayload>)
                     -> Result<FlowEventContext<FlowEventPayload>, FlowFatalError> {
        let flow_id = context.flow_id();
        let now = context.received_at;
        let Some(WaitingFor::SessionInit { session_id }) = context.checkpoint.waiting_for().cloned() else {
            return Ok(context);
        };
        let state = context.checkpoint
                           .get_session_state(&session_id)
                           .cloned()
                           .ok_or_else(|| FlowFatalError::Internal(format!("unknown session {session_id}")))?;
        let state = self.sessions.acknowledge_received_event(state, 0);
        let (state, _) = self.sessions
                             .process_message_to_send(state, SessionPayload::Data { payload: b"pong".to_vec() }, now);
        let (state, due) = self.sessions.get_messages_to_send(state, now, context.config.session_resend_window_ms);
        let destination = state.counterparty.clone();
        context.checkpoint.put_session_state(state)?;
        for event in due {
            context.push_output(OutputRecord::SessionMessage { destination: destination.clone(),
                                                               event });
        }
        info!(target: "ledgerflow::demo", "responder {flow_id} answered on {session_id}; completing");
        context.checkpoint.mark_deleted();
        Ok(context)
    }
}

impl FlowFiberStage for PingPongFiber {
    fn resume(&self,
              context: FlowEventContext<FlowEventPayload>,
              continuation: FlowContinuation)
              -> Result<FlowEventContext<FlowEventPayload>, FlowFatalError> {
        if continuation != FlowContinuation::Run {
            return Ok(context);
        }
        let flow_class = context.checkpoint
                                .record()
                                .map(|r| r.start_context.flow_class_name.clone())
                                .unwrap_or_default();
        match flow_class.as_str() {
            INITIATOR_FLOW => self.run_initiator(context),
            RESPONDER_FLOW => self.run_responder(context),
            _ => Ok(context),
        }
    }
}

fn initiator_session_id(flow_id: FlowId) -> String {
    format!("{flow_id}-s1")
}

pub fn initiator_identity() -> HoldingIdentity {
    HoldingIdentity::new("O=Alice, L=London, C=GB", "demo-network")
}

pub fn responder_identity() -> HoldingIdentity {
    HoldingIdentity::new("O=Bob, L=Paris, C=FR", "demo-network")
}

struct Node {
    identity: HoldingIdentity,
    processor: FlowEventProcessor,
    inbox: Vec<FlowEvent>,
}

fn build_node(identity: HoldingIdentity, config: &AppConfig, observer: Arc<CompositeObserver>) -> Node {
    let sandbox = InMemoryFlowSandbox::new().with_mapping(PACKAGE_ID, INITIATOR_FLOW, RESPONDER_FLOW);
    let pipeline = FlowEventPipeline::builder().with_config(config.pipeline.clone())
                                               .with_clock(Arc::new(SystemClock))
                                               .with_observer(observer)
                                               .with_sandbox(Arc::new(sandbox))
                                               .build();
    let fiber = Arc::new(PingPongFiber::new(config.pipeline.session_out_of_order_limit));
    Node { identity,
           processor: FlowEventProcessor::new(pipeline, fiber, config.processor),
           inbox: Vec::new() }
}

fn start_event(flow_id: FlowId) -> FlowEvent {
    let alice = initiator_identity();
    FlowEvent::new(flow_id,
                   StartFlow { start_context: StartContext { requesting_identity: alice.clone(),
                                                             holding_identity: alice,
                                                             initiator: InitiatorKind::LocalClient { client_request_id:
                                                                                                         Uuid::new_v4().to_string() },
                                                             cpi_id: PACKAGE_ID.into(),
                                                             flow_class_name: INITIATOR_FLOW.into(),
                                                             start_args: None,
                                                             created_at: Utc::now() } })
}

/// Respuesta del subsistema simulado para `channel`.
fn answer(flow_id: FlowId, channel: ExternalChannel, request_id: String) -> FlowEvent {
    let payload = ResponsePayload::Success { data: json!({"pair": "GBP/EUR", "rate": 1.17}) };
    match channel {
        ExternalChannel::External => FlowEvent::new(flow_id,
                                                    ExternalEventResponse { request_id,
                                                                            payload,
                                                                            timestamp: Utc::now() }),
        ExternalChannel::Crypto => FlowEvent::new(flow_id, CryptoResponse { request_id, result: payload }),
        ExternalChannel::Persistence => FlowEvent::new(flow_id, PersistenceResponse { request_id, result: payload }),
    }
}

/// Ejecuta el escenario completo hasta que no quedan eventos en tránsito.
pub fn run_ping_pong(config: &AppConfig, options: DemoOptions) -> Result<DemoReport, AppError> {
    let counter = Arc::new(CountingObserver::new());
    let observer = Arc::new(CompositeObserver::with_observers(vec![counter.clone(), Arc::new(LogObserver)]));
    let mut nodes = [build_node(initiator_identity(), config, observer.clone()),
                     build_node(responder_identity(), config, observer)];
    // (nodo, sesión) -> flujo local; el transporte enruta los mensajes de sesión
    let mut routes: HashMap<(usize, String), FlowId> = HashMap::new();

    let initiator_flow = Uuid::new_v4();
    routes.insert((0, initiator_session_id(initiator_flow)), initiator_flow);
    nodes[0].inbox.push(start_event(initiator_flow));
    let mut report = DemoReport::default();

    while nodes.iter().any(|n| !n.inbox.is_empty()) {
        report.rounds += 1;
        if report.rounds > MAX_ROUNDS {
            return Err(AppError::Scenario(format!("still delivering after {MAX_ROUNDS} rounds")));
        }
        for index in 0..nodes.len() {
            let batch = std::mem::take(&mut nodes[index].inbox);
            if batch.is_empty() {
                continue;
            }
            let result = nodes[index].processor.process_batch(batch);
            report.failures += result.failures.len();
            for record in result.outputs {
                match record {
                    OutputRecord::SessionMessage { destination, event } => {
                        let Some(target) = nodes.iter().position(|n| n.identity == destination) else {
                            continue;
                        };
                        let flow_id = *routes.entry((target, event.session_id.clone()))
                                             .or_insert_with(Uuid::new_v4);
                        let redeliver = options.redeliver_data && matches!(event.payload, SessionPayload::Data { .. });
                        let delivery = FlowEvent::new(flow_id, event);
                        if redeliver {
                            nodes[target].inbox.push(delivery.clone());
                        }
                        nodes[target].inbox.push(delivery);
                    }
                    OutputRecord::ExternalEventRequest { flow_id, channel, request_id, retries, .. } => {
                        if retries < options.transient_failures {
                            schedule_retry(&nodes[index].processor, flow_id, channel, retries + 1)?;
                            nodes[index].inbox
                                        .push(FlowEvent::new(flow_id, ExternalEventRetry { channel,
                                                                                           retries: retries + 1 }));
                            report.retries += 1;
                        } else {
                            nodes[index].inbox.push(answer(flow_id, channel, request_id));
                        }
                    }
                    OutputRecord::FlowStatus { flow_id, status } => {
                        info!(target: "ledgerflow::demo", "flow {flow_id} status {}", serde_json::to_string(&status)?);
                    }
                }
            }
        }
    }

    report.initiator_completed = !nodes[0].processor.store().load(initiator_flow).exists();
    report.responder_completed = nodes[1].processor.store().is_empty();
    report.counts = counter.snapshot();
    Ok(report)
}

/// La etapa emisora decide el reintento: `OK -> RETRY` en el checkpoint.
fn schedule_retry(processor: &FlowEventProcessor,
                  flow_id: FlowId,
                  channel: ExternalChannel,
                  attempt: u32)
                  -> Result<(), AppError> {
    let mut checkpoint = processor.store().load(flow_id);
    let Some(state) = checkpoint.external_state(channel).cloned() else {
        return Err(AppError::Scenario(format!("flow {flow_id} has no pending {channel} request")));
    };
    let state = ExternalEventManager::new().mark_for_retry(state, format!("transient failure #{attempt}"));
    checkpoint.set_external_state(channel, Some(state))?;
    processor.store().commit(checkpoint);
    Ok(())
}
