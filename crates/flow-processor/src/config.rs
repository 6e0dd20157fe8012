use flow_core::config::read_var;

pub const ENV_PROCESSOR_PARALLEL: &str = "FLOW_PROCESSOR_PARALLEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Procesar los grupos de un lote en paralelo (rayon).
    pub parallel: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Self {
        flow_core::config::init_dotenv();
        Self { parallel: read_var(ENV_PROCESSOR_PARALLEL, Self::default().parallel) }
    }
}
