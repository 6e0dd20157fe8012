//! Builder de `FlowEventPipeline`.
//!
//! Los colaboradores que no se indiquen toman un valor por defecto:
//! `SystemClock`, `NoopObserver` y un sandbox vacío (ningún `SessionInit`
//! resoluble).
use std::sync::Arc;

use super::{FlowEventPipeline, NoopObserver, ObserverHandle};
use crate::clock::{Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::session::{FlowSandboxResolver, InMemoryFlowSandbox};

#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    clock: Option<Arc<dyn Clock>>,
    observer: Option<ObserverHandle>,
    sandbox: Option<Arc<dyn FlowSandboxResolver>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn FlowSandboxResolver>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn build(self) -> FlowEventPipeline {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let observer = self.observer.unwrap_or_else(|| Arc::new(NoopObserver));
        let sandbox = self.sandbox.unwrap_or_else(|| Arc::new(InMemoryFlowSandbox::new()));
        FlowEventPipeline::new(self.config, clock, observer, sandbox)
    }
}
