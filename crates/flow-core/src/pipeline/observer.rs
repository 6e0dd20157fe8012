//! Observadores del pipeline.
//!
//! Métricas y trazas se inyectan como `ObserverHandle` en la construcción;
//! ningún componente consulta un logger global para contar eventos.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{error, info, warn};

use super::FlowContinuation;
use crate::errors::{FlowEventError, FlowFatalError};
use crate::identity::FlowId;

pub type ObserverHandle = Arc<dyn PipelineObserver>;

/// Puntos de observación. Todos tienen implementación vacía por defecto.
pub trait PipelineObserver: Send + Sync + fmt::Debug {
    fn event_processed(&self, _flow_id: FlowId, _event_type: &str, _continuation: FlowContinuation) {}

    fn event_discarded(&self, _flow_id: FlowId, _event_type: &str, _error: &FlowEventError) {}

    fn fatal_error(&self, _flow_id: FlowId, _event_type: &str, _error: &FlowFatalError) {}

    fn checkpoint_created(&self, _flow_id: FlowId, _flow_class_name: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Escribe cada observación a través de `log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn event_processed(&self, flow_id: FlowId, event_type: &str, continuation: FlowContinuation) {
        info!(target: "flow_core::pipeline",
              "processed flow_id={flow_id} event={event_type} continuation={continuation:?}");
    }

    fn event_discarded(&self, flow_id: FlowId, event_type: &str, error: &FlowEventError) {
        warn!(target: "flow_core::pipeline",
              "discarded flow_id={flow_id} event={event_type}: {error}");
    }

    fn fatal_error(&self, flow_id: FlowId, event_type: &str, error: &FlowFatalError) {
        error!(target: "flow_core::pipeline",
               "fatal flow_id={flow_id} event={event_type}: {error}");
    }

    fn checkpoint_created(&self, flow_id: FlowId, flow_class_name: &str) {
        info!(target: "flow_core::pipeline",
              "checkpoint created flow_id={flow_id} flow={flow_class_name}");
    }
}

/// Contadores atómicos, útiles en tests y para exportar métricas.
#[derive(Debug, Default)]
pub struct CountingObserver {
    processed: AtomicU64,
    discarded: AtomicU64,
    fatal: AtomicU64,
    created: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverCounts {
    pub processed: u64,
    pub discarded: u64,
    pub fatal: u64,
    pub checkpoints_created: u64,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ObserverCounts {
        ObserverCounts { processed: self.processed.load(Ordering::Relaxed),
                         discarded: self.discarded.load(Ordering::Relaxed),
                         fatal: self.fatal.load(Ordering::Relaxed),
                         checkpoints_created: self.created.load(Ordering::Relaxed) }
    }
}

impl PipelineObserver for CountingObserver {
    fn event_processed(&self, _flow_id: FlowId, _event_type: &str, _continuation: FlowContinuation) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn event_discarded(&self, _flow_id: FlowId, _event_type: &str, _error: &FlowEventError) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    fn fatal_error(&self, _flow_id: FlowId, _event_type: &str, _error: &FlowFatalError) {
        self.fatal.fetch_add(1, Ordering::Relaxed);
    }

    fn checkpoint_created(&self, _flow_id: FlowId, _flow_class_name: &str) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }
}

/// Reparte cada observación entre varios observadores, en orden.
#[derive(Debug, Default, Clone)]
pub struct CompositeObserver {
    pub observers: Vec<ObserverHandle>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self { observers: vec![] }
    }

    pub fn with_observers(observers: Vec<ObserverHandle>) -> Self {
        Self { observers }
    }
}

impl PipelineObserver for CompositeObserver {
    fn event_processed(&self, flow_id: FlowId, event_type: &str, continuation: FlowContinuation) {
        for o in self.observers.iter() {
            o.event_processed(flow_id, event_type, continuation);
        }
    }

    fn event_discarded(&self, flow_id: FlowId, event_type: &str, error: &FlowEventError) {
        for o in self.observers.iter() {
            o.event_discarded(flow_id, event_type, error);
        }
    }

    fn fatal_error(&self, flow_id: FlowId, event_type: &str, error: &FlowFatalError) {
        for o in self.observers.iter() {
            o.fatal_error(flow_id, event_type, error);
        }
    }

    fn checkpoint_created(&self, flow_id: FlowId, flow_class_name: &str) {
        for o in self.observers.iter() {
            o.checkpoint_created(flow_id, flow_class_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn composite_fans_out_to_every_observer() {
        let a = Arc::new(CountingObserver::new());
        let b = Arc::new(CountingObserver::new());
        let composite = CompositeObserver::with_observers(vec![a.clone(), b.clone(), Arc::new(LogObserver)]);
        let flow_id = Uuid::new_v4();
        composite.event_processed(flow_id, "Wakeup", FlowContinuation::Run);
        composite.event_discarded(flow_id,
                                  "Wakeup",
                                  &FlowEventError::FlowAlreadyStarted { flow_id });
        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.snapshot().processed, 1);
        assert_eq!(a.snapshot().discarded, 1);
        assert_eq!(a.snapshot().fatal, 0);
    }
}
