//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone una estructura
//! inmutable (`CONFIG`) con la configuración del pipeline, del procesador y
//! del logging.
use std::env;

use flow_core::PipelineConfig;
use flow_processor::ProcessorConfig;
use once_cell::sync::Lazy;

pub const ENV_LOG: &str = "FLOW_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub processor: ProcessorConfig,
    /// Filtro de `tracing-subscriber` (sintaxis `EnvFilter`).
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        flow_core::config::init_dotenv();
        let log_filter = env::var(ENV_LOG).ok()
                                          .filter(|v| !v.trim().is_empty())
                                          .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Self { pipeline: PipelineConfig::from_env(),
               processor: ProcessorConfig::from_env(),
               log_filter }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { pipeline: PipelineConfig::default(),
               processor: ProcessorConfig::default(),
               log_filter: DEFAULT_LOG_FILTER.to_string() }
    }
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_goes_through_shared_dotenv_guard() {
        env::set_var(ENV_LOG, "debug,flow_core=trace");
        let config = AppConfig::from_env();
        assert!(flow_core::config::dotenv_loaded());
        assert_eq!(config.log_filter, "debug,flow_core=trace");
        assert_eq!(config.pipeline, PipelineConfig::from_env());
    }
}
