//! The seams between the worker and the broker.
//!
//! The link manager and the consumption loop never talk to `lapin` directly: they go through
//! [`TransportFactory`], [`BrokerConnection`] and [`AmqpChannel`].
//! The `lapin` implementations live here; tests plug in in-memory transports.
use crate::amqp::ConnectionFactory;
use crate::consumers::Delivery;
use amq_protocol_types::FieldTable;
use futures_util::stream::{BoxStream, StreamExt};
use lapin::options::{
    BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::ExchangeKind;
use std::fmt;
use tokio::sync::mpsc;

/// A live subscription to a queue: deliveries in the order the broker hands them over.
///
/// The stream ends (or yields an error) when the underlying channel goes away.
pub type Subscription = BoxStream<'static, Result<Delivery, anyhow::Error>>;

/// `TransportFactory` defines an interface for types that are capable of dialing the broker.
#[async_trait::async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    /// The connection type produced by a successful dial.
    type Connection: BrokerConnection;

    /// The broker address, for logging purposes. It must not contain credentials.
    fn target(&self) -> &str;

    /// Dial the broker once.
    ///
    /// A failure here is transient from the caller's point of view.
    async fn connect(&self) -> Result<Self::Connection, anyhow::Error>;
}

/// An established connection to the broker.
#[async_trait::async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    /// The channel type multiplexed over this connection.
    type Channel: AmqpChannel;

    /// Register `notifier` to be fired when the connection is closed unexpectedly.
    fn on_close(&self, notifier: CloseNotifier);

    /// Open a logical channel on top of this connection.
    async fn create_channel(&self) -> Result<Self::Channel, anyhow::Error>;
}

/// The operations the worker performs against a channel: topology declaration and consumption.
#[async_trait::async_trait]
pub trait AmqpChannel: Send + Sync + 'static {
    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
    ) -> Result<(), anyhow::Error>;

    async fn declare_queue(
        &self,
        name: &str,
        options: QueueDeclareOptions,
        arguments: FieldTable,
    ) -> Result<(), anyhow::Error>;

    async fn bind_queue(
        &self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), anyhow::Error>;

    /// Start a subscription on `queue_name` with automatic acknowledgement.
    ///
    /// The broker assigns the consumer tag.
    async fn consume(&self, queue_name: &str) -> Result<Subscription, anyhow::Error>;
}

/// A close notification for the link of a given generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkClosed {
    /// The generation of the link that went down.
    pub generation: u64,
    /// Why the link went down, as reported by the transport.
    pub reason: String,
}

/// Hands close notifications of one link back to the link manager.
///
/// Every link gets its own notifier tagged with the link generation, all feeding the same
/// queue.
#[derive(Clone)]
pub struct CloseNotifier {
    generation: u64,
    sender: mpsc::UnboundedSender<LinkClosed>,
}

impl CloseNotifier {
    pub fn new(generation: u64, sender: mpsc::UnboundedSender<LinkClosed>) -> Self {
        Self { generation, sender }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report the link as closed.
    ///
    /// A notification sent after the link manager is gone is silently dropped.
    pub fn notify(&self, reason: impl fmt::Display) {
        let _ = self.sender.send(LinkClosed {
            generation: self.generation,
            reason: reason.to_string(),
        });
    }
}

#[async_trait::async_trait]
impl TransportFactory for ConnectionFactory {
    type Connection = lapin::Connection;

    fn target(&self) -> &str {
        self.display_uri()
    }

    async fn connect(&self) -> Result<lapin::Connection, anyhow::Error> {
        self.new_connection().await
    }
}

#[async_trait::async_trait]
impl BrokerConnection for lapin::Connection {
    type Channel = lapin::Channel;

    fn on_close(&self, notifier: CloseNotifier) {
        self.on_error(move |e| {
            tracing::warn!(generation = notifier.generation(), "RabbitMQ broken connection: {:?}", e);
            notifier.notify(e);
        });
    }

    async fn create_channel(&self) -> Result<lapin::Channel, anyhow::Error> {
        Ok(lapin::Connection::create_channel(self).await?)
    }
}

#[async_trait::async_trait]
impl AmqpChannel for lapin::Channel {
    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
    ) -> Result<(), anyhow::Error> {
        self.exchange_declare(name, kind, options, FieldTable::default())
            .await?;
        Ok(())
    }

    async fn declare_queue(
        &self,
        name: &str,
        options: QueueDeclareOptions,
        arguments: FieldTable,
    ) -> Result<(), anyhow::Error> {
        self.queue_declare(name, options, arguments).await?;
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), anyhow::Error> {
        self.queue_bind(
            queue_name,
            exchange_name,
            routing_key,
            QueueBindOptions { nowait: false },
            arguments,
        )
        .await?;
        Ok(())
    }

    async fn consume(&self, queue_name: &str) -> Result<Subscription, anyhow::Error> {
        let consumer = self
            .basic_consume(
                queue_name,
                "",
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: true,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await?;
        Ok(StreamExt::map(consumer, |event| {
            event.map(Delivery::from).map_err(anyhow::Error::from)
        })
        .boxed())
    }
}
