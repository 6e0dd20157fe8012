//! Constantes del pipeline de eventos de flujo.
//!
//! Valores por defecto de la configuración (`PipelineConfig`) y la versión
//! lógica del pipeline. `PIPELINE_VERSION` participa en la derivación de
//! `request_id` de eventos externos: cambiarla invalida la correlación con
//! peticiones emitidas por una versión anterior.

/// Versión lógica del pipeline. Mantener estable mientras el formato del
/// checkpoint no cambie de forma incompatible.
pub const PIPELINE_VERSION: &str = "P1.0";

/// Ventana (ms) tras la cual un mensaje de sesión sin ack se reenvía.
pub const DEFAULT_SESSION_RESEND_WINDOW_MS: i64 = 5_000;

/// Ventana (ms) tras la cual una petición externa sin respuesta se reenvía.
pub const DEFAULT_EXTERNAL_EVENT_RESEND_WINDOW_MS: i64 = 60_000;

/// Máximo de mensajes fuera de orden retenidos por sesión.
pub const DEFAULT_SESSION_OUT_OF_ORDER_LIMIT: usize = 64;

/// Primer número de secuencia de cada dirección de una sesión.
pub const INITIAL_SEQUENCE_NUM: u64 = 0;
