use crate::{
    amqp::{ConnectionFactory, TransportFactory},
    configuration::WorkerSettings,
    consumers::{ConsumptionLoop, Handler, ProcessingPolicy},
    error::WorkerError,
    link::{ChannelOf, LinkManager},
    processor::DispatchSimulator,
    readiness,
    topology::Topology,
};
use shutdown_handler::ShutdownHandler;
use std::sync::Arc;
use std::time::Duration;

/// The process-wide worker: a link manager feeding fresh channels to a consumption loop.
///
/// Both halves are created together, wired through a [readiness](crate::readiness) handoff,
/// and live until the process terminates.
///
/// # How do I build a `Worker`?
///
/// [`Worker::from_settings`] assembles the production worker.
/// [`Worker::builder`] lets you plug in a different transport, handler, topology or
/// processing policy.
pub struct Worker<T: TransportFactory> {
    link: LinkManager<T>,
    consumption: ConsumptionLoop<ChannelOf<T>>,
}

impl Worker<ConnectionFactory> {
    /// The dispatch worker described by `settings`.
    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Worker::builder(
            ConnectionFactory::new_from_config(&settings.rabbitmq),
            DispatchSimulator::new(settings.error_percent),
        )
        .processing_policy(settings.processing)
        .build()
    }
}

impl<T: TransportFactory> Worker<T> {
    /// Start building a [`Worker`] around a transport and an order handler.
    pub fn builder(factory: T, handler: impl Handler) -> WorkerBuilder<T> {
        WorkerBuilder {
            factory,
            handler: Arc::new(handler),
            topology: Topology::orders(),
            policy: ProcessingPolicy::default(),
            retry_interval: None,
        }
    }

    /// Run the link manager and the consumption loop.
    ///
    /// Returns only on a fatal failure.
    pub async fn run(self) -> Result<(), WorkerError> {
        tracing::info!("Waiting for messages...");
        tokio::try_join!(self.link.run(), self.consumption.run())?;
        Ok(())
    }

    /// You can call `run_until_sigterm` to start consuming messages.
    /// As the name implies, `run_until_sigterm` returns control to the caller only if:
    /// - the worker hits a fatal failure;
    /// - the application is stopped via SIGTERM.
    pub async fn run_until_sigterm(self) -> Result<(), anyhow::Error> {
        self.run_until_shutdown(ShutdownHandler::sigterm()?).await
    }

    /// Same as [`Worker::run_until_sigterm`], with a caller-provided shutdown handler.
    ///
    /// Orders still being processed when the shutdown signal fires are neither awaited nor
    /// cancelled by the worker.
    #[tracing::instrument(skip_all, name = "worker_run")]
    pub async fn run_until_shutdown(
        self,
        shutdown: Arc<ShutdownHandler>,
    ) -> Result<(), anyhow::Error> {
        tokio::select! {
            biased;

            _ = shutdown.wait_for_signal() => {
                tracing::info!("worker received shutdown event");
                Ok(())
            }
            result = self.run() => {
                if let Err(e) = &result {
                    tracing::error!(error = ?e, "Worker failed");
                }
                result.map_err(Into::into)
            }
        }
    }
}

/// A builder to customise a [`Worker`].
///
/// Use [`Worker::builder`] as entrypoint.
pub struct WorkerBuilder<T: TransportFactory> {
    factory: T,
    handler: Arc<dyn Handler>,
    topology: Topology,
    policy: ProcessingPolicy,
    retry_interval: Option<Duration>,
}

impl<T: TransportFactory> WorkerBuilder<T> {
    /// Declare and consume through a different topology.
    #[must_use]
    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Limit how many orders can be processed concurrently.
    /// Processing is unbounded by default.
    #[must_use]
    pub fn processing_policy(mut self, policy: ProcessingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the pause between two failed dial attempts (one second by default).
    #[must_use]
    pub fn retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = Some(retry_interval);
        self
    }

    pub fn build(self) -> Worker<T> {
        let (ready_sender, ready_receiver) = readiness::channel();
        let queue_name = self.topology.queue_name().to_owned();

        let mut link = LinkManager::new(self.factory, Arc::new(self.topology), ready_sender);
        if let Some(retry_interval) = self.retry_interval {
            link = link.with_retry_interval(retry_interval);
        }
        let consumption =
            ConsumptionLoop::new(ready_receiver, queue_name, self.handler, self.policy);

        Worker { link, consumption }
    }
}
