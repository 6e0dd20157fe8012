use ledgerflow::demo::{run_ping_pong, DemoOptions};
use ledgerflow::{AppError, CONFIG};
use log::info;
use tracing_subscriber::EnvFilter;

fn init_logging(filter: &str) -> Result<(), AppError> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(filter))
                             .try_init()
                             .map_err(|e| AppError::Logging(e.to_string()))
}

fn main() -> Result<(), AppError> {
    init_logging(&CONFIG.log_filter)?;
    info!(target: "ledgerflow", "pipeline config: {:?}", CONFIG.pipeline);

    info!(target: "ledgerflow", "--- escenario 1: ping/pong ---");
    let report = run_ping_pong(&CONFIG, DemoOptions::default())?;
    info!(target: "ledgerflow", "{report:?}");

    info!(target: "ledgerflow", "--- escenario 2: reentregas y fallo transitorio ---");
    let report = run_ping_pong(&CONFIG,
                               DemoOptions { redeliver_data: true,
                                             transient_failures: 1 })?;
    info!(target: "ledgerflow", "{report:?}");
    if !(report.initiator_completed && report.responder_completed) {
        return Err(AppError::Scenario("flows did not complete".into()));
    }
    Ok(())
}
