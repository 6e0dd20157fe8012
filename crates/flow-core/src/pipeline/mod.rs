//! Pipeline de procesamiento de un evento:
//! load -> pre_process -> validate -> global_post_process -> continuación.
mod builder;
mod context;
mod continuation;
mod core;
mod fiber;
mod observer;

pub use builder::PipelineBuilder;
pub use context::FlowEventContext;
pub use continuation::{resolve_continuation, FlowContinuation};
pub use self::core::{FlowEventPipeline, PipelineOutcome};
pub use fiber::{FlowFiberStage, NoopFiberStage};
pub use observer::{CompositeObserver, CountingObserver, LogObserver, NoopObserver, ObserverCounts, ObserverHandle,
                   PipelineObserver};
