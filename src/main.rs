use dispatch_worker::{configuration::WorkerSettings, Worker};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = WorkerSettings::from_env();
    tracing::info!(
        error_percent = settings.error_percent,
        processing = ?settings.processing,
        "Error Percent is {}",
        settings.error_percent
    );

    Worker::from_settings(&settings).run_until_sigterm().await
}
