//! Configuración del pipeline.
//!
//! `PipelineConfig` se inyecta por valor en el pipeline; el núcleo no lee
//! variables de entorno mientras procesa eventos. `from_env` es para la capa
//! que arma el proceso (binario/procesador).

use std::env;

use log::warn;
use once_cell::sync::Lazy;

use crate::constants::{DEFAULT_EXTERNAL_EVENT_RESEND_WINDOW_MS, DEFAULT_SESSION_OUT_OF_ORDER_LIMIT,
                       DEFAULT_SESSION_RESEND_WINDOW_MS};

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv(); // ignora error si no existe .env
});

pub const ENV_SESSION_RESEND_WINDOW_MS: &str = "FLOW_SESSION_RESEND_WINDOW_MS";
pub const ENV_EXTERNAL_EVENT_RESEND_WINDOW_MS: &str = "FLOW_EXTERNAL_EVENT_RESEND_WINDOW_MS";
pub const ENV_SESSION_OUT_OF_ORDER_LIMIT: &str = "FLOW_SESSION_OUT_OF_ORDER_LIMIT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Mensajes de sesión sin ack más antiguos que esto se reenvían.
    pub session_resend_window_ms: i64,
    /// Peticiones externas sin respuesta más antiguas que esto se reenvían.
    pub external_event_resend_window_ms: i64,
    /// Límite del buffer fuera de orden por sesión.
    pub session_out_of_order_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { session_resend_window_ms: DEFAULT_SESSION_RESEND_WINDOW_MS,
               external_event_resend_window_ms: DEFAULT_EXTERNAL_EVENT_RESEND_WINDOW_MS,
               session_out_of_order_limit: DEFAULT_SESSION_OUT_OF_ORDER_LIMIT }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        init_dotenv();
        let defaults = Self::default();
        Self { session_resend_window_ms: read_var(ENV_SESSION_RESEND_WINDOW_MS, defaults.session_resend_window_ms),
               external_event_resend_window_ms: read_var(ENV_EXTERNAL_EVENT_RESEND_WINDOW_MS,
                                                         defaults.external_event_resend_window_ms),
               session_out_of_order_limit: read_var(ENV_SESSION_OUT_OF_ORDER_LIMIT,
                                                    defaults.session_out_of_order_limit) }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

/// `true` una vez que algún componente pasó por `init_dotenv`.
pub fn dotenv_loaded() -> bool {
    Lazy::get(&DOTENV_LOADED).is_some()
}

/// Lee `key` y la parsea; ausente o inválida devuelve `default`.
pub fn read_var<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                                         warn!(target: "flow_core::config", "invalid {key}={raw:?}, using {default}");
                                         default
                                     }),
        Err(_) => default,
    }
}
