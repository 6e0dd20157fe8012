use flow_core::FlowFatalError;
use thiserror::Error;

/// Errores del binario y de los escenarios de demostración.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("flow failure: {0}")]
    Flow(#[from] FlowFatalError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("scenario did not converge: {0}")]
    Scenario(String),
}
