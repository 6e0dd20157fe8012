//! Fixtures compartidas por los tests de integración de flow-core.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use flow_core::checkpoint::{CheckpointStore, InitiatorKind, StartContext};
use flow_core::event::{CryptoResponse, ExternalEventResponse, ExternalEventRetry, PersistenceResponse,
                       ResponsePayload, SessionEvent, SessionInit, SessionPayload, StartFlow, Wakeup};
use flow_core::external::ExternalChannel;
use flow_core::pipeline::CountingObserver;
use flow_core::session::InMemoryFlowSandbox;
use flow_core::{Clock, FixedClock, FlowEvent, FlowEventPipeline, FlowFatalError, FlowId, HoldingIdentity,
                InMemoryCheckpointStore, PipelineConfig, PipelineOutcome};
use serde_json::json;

pub const SESSION: &str = "S1";

pub fn alice() -> HoldingIdentity {
    HoldingIdentity::new("O=Alice, L=London, C=GB", "group-1")
}

pub fn bob() -> HoldingIdentity {
    HoldingIdentity::new("O=Bob, L=Paris, C=FR", "group-1")
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig { session_resend_window_ms: 1_000,
                     external_event_resend_window_ms: 10_000,
                     session_out_of_order_limit: 8 }
}

/// Pipeline con reloj fijo, contador de observaciones y store en memoria.
pub struct Harness {
    pub pipeline: FlowEventPipeline,
    pub clock: Arc<FixedClock>,
    pub observer: Arc<CountingObserver>,
    pub store: InMemoryCheckpointStore,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new(t0()));
        let observer = Arc::new(CountingObserver::new());
        let sandbox = InMemoryFlowSandbox::new().with_mapping("X", "Ping", "PingResponder");
        let pipeline = FlowEventPipeline::builder().with_config(test_config())
                                                   .with_clock(clock.clone())
                                                   .with_observer(observer.clone())
                                                   .with_sandbox(Arc::new(sandbox))
                                                   .build();
        Self { pipeline,
               clock,
               observer,
               store: InMemoryCheckpointStore::default() }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Carga, procesa y, si el evento se aplicó, persiste el checkpoint.
    pub fn deliver(&mut self, event: FlowEvent) -> Result<PipelineOutcome, FlowFatalError> {
        let checkpoint = self.store.load(event.flow_id);
        let outcome = self.pipeline.process(checkpoint, event)?;
        if let PipelineOutcome::Processed { context, .. } = &outcome {
            self.store.commit(context.checkpoint.clone());
        }
        Ok(outcome)
    }
}

pub fn start_context() -> StartContext {
    StartContext { requesting_identity: alice(),
                   holding_identity: alice(),
                   initiator: InitiatorKind::LocalClient { client_request_id: "client-1".into() },
                   cpi_id: "X".into(),
                   flow_class_name: "Ping".into(),
                   start_args: Some("{\"n\":1}".into()),
                   created_at: t0() }
}

pub fn start_flow(flow_id: FlowId) -> FlowEvent {
    FlowEvent::new(flow_id, StartFlow { start_context: start_context() })
}

pub fn wakeup(flow_id: FlowId) -> FlowEvent {
    FlowEvent::new(flow_id, Wakeup)
}

/// Mensaje de Alice hacia Bob en la sesión `S1`.
pub fn session_message(seq: Option<u64>, payload: SessionPayload) -> SessionEvent {
    SessionEvent { session_id: SESSION.into(),
                   source: alice(),
                   destination: bob(),
                   sequence_num: seq,
                   timestamp: t0(),
                   payload }
}

pub fn session_init(flow_id: FlowId) -> FlowEvent {
    let init = SessionPayload::Init(SessionInit { flow_name: "Ping".into(),
                                                  cpi_id: "X".into(),
                                                  payload: Some(b"hello".to_vec()) });
    FlowEvent::new(flow_id, session_message(Some(0), init))
}

pub fn session_data(flow_id: FlowId, seq: u64) -> FlowEvent {
    FlowEvent::new(flow_id, session_message(Some(seq), SessionPayload::Data { payload: vec![seq as u8] }))
}

pub fn success(data: serde_json::Value) -> ResponsePayload {
    ResponsePayload::Success { data }
}

pub fn external_response(flow_id: FlowId, request_id: &str) -> FlowEvent {
    FlowEvent::new(flow_id,
                   ExternalEventResponse { request_id: request_id.into(),
                                           payload: success(json!({"rate": 1.25})),
                                           timestamp: t0() })
}

pub fn crypto_response(flow_id: FlowId, request_id: &str) -> FlowEvent {
    FlowEvent::new(flow_id,
                   CryptoResponse { request_id: request_id.into(),
                                    result: success(json!({"signature": "c2ln"})) })
}

pub fn persistence_response(flow_id: FlowId, request_id: &str) -> FlowEvent {
    FlowEvent::new(flow_id,
                   PersistenceResponse { request_id: request_id.into(),
                                         result: success(json!({"rows": 3})) })
}

pub fn retry(flow_id: FlowId, channel: ExternalChannel, retries: u32) -> FlowEvent {
    FlowEvent::new(flow_id, ExternalEventRetry { channel, retries })
}
