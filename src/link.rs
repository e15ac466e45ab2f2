//! The broker link manager: dials, re-dials and re-declares the topology after every reconnect.
//!
//! ```text
//! Disconnected --dial (retry every second)--> install topology --announce--> Connected
//!      ^                                                                        |
//!      +--------------------------- close notification -------------------------+
//! ```
//!
//! The manager starts in [`LinkState::Disconnected`]: the first connection goes through the same
//! path as every reconnection.
use crate::amqp::{BrokerConnection, CloseNotifier, LinkClosed, TransportFactory};
use crate::error::WorkerError;
use crate::readiness::ReadySender;
use crate::topology::Topology;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long to wait between two failed dial attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// The channel type produced by a [`TransportFactory`].
pub type ChannelOf<T> = <<T as TransportFactory>::Connection as BrokerConnection>::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// `generation` counts successful dials, starting from 1.
    Connected { generation: u64 },
}

pub struct LinkManager<T: TransportFactory> {
    factory: T,
    topology: Arc<Topology>,
    ready: ReadySender<ChannelOf<T>>,
    retry_interval: Duration,
    // Kept so the close queue stays open between two links.
    close_sender: mpsc::UnboundedSender<LinkClosed>,
    close_receiver: mpsc::UnboundedReceiver<LinkClosed>,
    generation: u64,
    // Held so the live connection is not dropped while in use.
    connection: Option<T::Connection>,
}

impl<T: TransportFactory> LinkManager<T> {
    pub fn new(factory: T, topology: Arc<Topology>, ready: ReadySender<ChannelOf<T>>) -> Self {
        let (close_sender, close_receiver) = mpsc::unbounded_channel();
        Self {
            factory,
            topology,
            ready,
            retry_interval: RETRY_INTERVAL,
            close_sender,
            close_receiver,
            generation: 0,
            connection: None,
        }
    }

    /// Override the pause between two failed dial attempts.
    #[must_use]
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Keep the link up forever.
    ///
    /// Only returns on a fatal setup failure.
    #[tracing::instrument(name = "link_manager_run", skip_all)]
    pub async fn run(mut self) -> Result<(), WorkerError> {
        let mut state = LinkState::Disconnected;
        loop {
            state = self.step(state).await?;
        }
    }

    /// Perform a single transition of the link state machine.
    pub async fn step(&mut self, state: LinkState) -> Result<LinkState, WorkerError> {
        match state {
            LinkState::Disconnected => {
                let generation = self.establish().await?;
                Ok(LinkState::Connected { generation })
            }
            LinkState::Connected { generation } => {
                self.wait_for_close(generation).await;
                Ok(LinkState::Disconnected)
            }
        }
    }

    /// Dial, install the topology on a fresh channel and hand the channel over.
    async fn establish(&mut self) -> Result<u64, WorkerError> {
        tracing::info!(uri = self.factory.target(), "Connecting to RabbitMQ");
        let connection = self.dial().await;
        self.generation += 1;
        let generation = self.generation;
        connection.on_close(CloseNotifier::new(generation, self.close_sender.clone()));

        let channel = connection
            .create_channel()
            .await
            .map_err(WorkerError::Channel)?;
        self.topology
            .install(&channel)
            .await
            .map_err(WorkerError::Topology)?;
        self.connection = Some(connection);

        self.ready.announce(channel).await?;
        tracing::info!(generation, "RabbitMQ link established");
        Ok(generation)
    }

    /// Dial until the broker accepts the connection.
    async fn dial(&self) -> T::Connection {
        loop {
            match self.factory.connect().await {
                Ok(connection) => return connection,
                Err(e) => {
                    tracing::warn!(error = ?e, "Failed to connect to RabbitMQ");
                    tracing::info!(uri = self.factory.target(), "Reconnecting");
                    tokio::time::sleep(self.retry_interval).await;
                }
            }
        }
    }

    /// Wait until the link of the given generation is reported closed.
    async fn wait_for_close(&mut self, generation: u64) {
        while let Some(closed) = self.close_receiver.recv().await {
            if closed.generation == generation {
                tracing::warn!(generation, reason = %closed.reason, "RabbitMQ link closed");
                break;
            }
            tracing::debug!(
                generation = closed.generation,
                "Ignoring close notification for a superseded link"
            );
        }
        self.connection = None;
    }
}
