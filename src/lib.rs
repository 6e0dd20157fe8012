//! ledgerflow
//!
//! Fachada del workspace:
//! - `flow_core`: pipeline de pre-procesado de eventos de flujo.
//! - `flow_processor`: consumo por lotes, en paralelo por flujo.
//! - `config`: configuración global (`CONFIG`).
//! - `demo`: escenario ping/pong entre dos nodos, usado por `main-core`.

pub mod config;
pub mod demo;
pub mod errors;

pub use flow_core;
pub use flow_processor;

pub use config::{AppConfig, CONFIG};
pub use errors::AppError;
