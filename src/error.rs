use crate::readiness::ReceiverGone;

/// Unrecoverable worker failures.
///
/// Dial failures never show up here: they are retried forever by the link manager.
/// Everything else that goes wrong on an otherwise-live connection points at a configuration or
/// permission problem and stops the worker.
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("Failed to create channel")]
    Channel(#[source] anyhow::Error),
    #[error("Failed to declare the messaging topology")]
    Topology(#[source] anyhow::Error),
    #[error("Failed to consume")]
    Consume(#[source] anyhow::Error),
    #[error(transparent)]
    ReadinessClosed(#[from] ReceiverGone),
}
