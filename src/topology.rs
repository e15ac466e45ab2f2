//! The messaging topology the worker relies on, and how to (re-)declare it.
//!
//! Declarations are idempotent on the broker side: they run after every successful
//! (re)connection.
//!
//! ```
//! use dispatch_worker::topology::{Bind, DeclareDurableExchange, DeclareDurableQueue, RoutingKey};
//! use dispatch_worker::amqp::ExchangeKind;
//!
//! // bind a durable queue to a durable direct exchange using a single routing key
//! let hook = Bind {
//!     exchange: DeclareDurableExchange {
//!         name: "robot-shop".to_owned(),
//!         kind: ExchangeKind::Direct,
//!     },
//!     queue: DeclareDurableQueue,
//!     binding: RoutingKey::from("orders"),
//! };
//! # drop(hook);
//! ```

use crate::amqp::AmqpChannel;
use amq_protocol_types::FieldTable;
use lapin::options::{ExchangeDeclareOptions, QueueDeclareOptions};
pub use lapin::ExchangeKind;

/// The exchange order events are published to.
pub const EXCHANGE_NAME: &str = "robot-shop";
/// The queue the worker consumes from.
pub const QUEUE_NAME: &str = "orders";
/// The routing key binding [`QUEUE_NAME`] to [`EXCHANGE_NAME`].
pub const ROUTING_KEY: &str = "orders";

#[async_trait::async_trait]
/// A declaration step executed against a fresh channel before consumption starts.
pub trait TopologyHook: Send + Sync + 'static {
    async fn run(
        &self,
        channel: &dyn AmqpChannel,
        queue_name: &str,
        queue_args: FieldTable,
    ) -> Result<(), anyhow::Error>;
}

/// assert it's object safe
type _CHECK = Box<dyn TopologyHook>;

#[async_trait::async_trait]
/// Defines how to setup an exchange
pub trait ExchangeSetup: Send + Sync + 'static {
    /// The name of the exchange that will be set up.
    fn exchange_name(&self) -> &str;

    /// Ensures the exchange is set up.
    async fn setup_exchange(&self, channel: &dyn AmqpChannel) -> Result<(), anyhow::Error>;
}

/// Declares a new durable exchange, never auto-deleted.
pub struct DeclareDurableExchange {
    pub name: String,
    pub kind: ExchangeKind,
}

#[async_trait::async_trait]
impl ExchangeSetup for DeclareDurableExchange {
    fn exchange_name(&self) -> &str {
        &self.name
    }

    async fn setup_exchange(&self, channel: &dyn AmqpChannel) -> Result<(), anyhow::Error> {
        channel
            .declare_exchange(
                &self.name,
                self.kind.clone(),
                ExchangeDeclareOptions {
                    passive: false,
                    durable: true,
                    auto_delete: false,
                    internal: false,
                    nowait: false,
                },
            )
            .await
    }
}

/// Declare a durable, shared queue that outlives its consumers.
#[derive(Clone)]
pub struct DeclareDurableQueue;

#[async_trait::async_trait]
impl TopologyHook for DeclareDurableQueue {
    async fn run(
        &self,
        channel: &dyn AmqpChannel,
        queue_name: &str,
        queue_args: FieldTable,
    ) -> Result<(), anyhow::Error> {
        channel
            .declare_queue(
                queue_name,
                QueueDeclareOptions {
                    passive: false,
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    nowait: false,
                },
                queue_args,
            )
            .await
    }
}

#[async_trait::async_trait]
/// Defines how to bind an exchange to a queue
pub trait Binding: Send + Sync + 'static {
    async fn bind(
        &self,
        channel: &dyn AmqpChannel,
        exchange_name: &str,
        queue_name: &str,
    ) -> Result<(), anyhow::Error>;
}

/// Binds an exchange to a queue using a routing key.
pub struct RoutingKey(pub String);

impl From<&str> for RoutingKey {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for RoutingKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[async_trait::async_trait]
impl Binding for RoutingKey {
    async fn bind(
        &self,
        channel: &dyn AmqpChannel,
        exchange_name: &str,
        queue_name: &str,
    ) -> Result<(), anyhow::Error> {
        channel
            .bind_queue(queue_name, exchange_name, &self.0, FieldTable::default())
            .await
    }
}

/// Bind the exchange defined by [`ExchangeSetup`] to the queue declared by the nested `Queue`
/// [`TopologyHook`] using the [`Binding`] method specified.
///
/// Runs, in order: exchange, queue, binding. The first failure aborts the sequence.
pub struct Bind<Exchange: ExchangeSetup, Queue: TopologyHook, Binds: Binding> {
    pub exchange: Exchange,
    pub queue: Queue,
    pub binding: Binds,
}

#[async_trait::async_trait]
impl<E: ExchangeSetup, Q: TopologyHook, B: Binding> TopologyHook for Bind<E, Q, B> {
    async fn run(
        &self,
        channel: &dyn AmqpChannel,
        queue_name: &str,
        queue_args: FieldTable,
    ) -> Result<(), anyhow::Error> {
        self.exchange.setup_exchange(channel).await?;
        self.queue.run(channel, queue_name, queue_args).await?;
        self.binding
            .bind(channel, self.exchange.exchange_name(), queue_name)
            .await?;

        Ok(())
    }
}

/// The full topology the worker consumes through: a queue and the hook that declares it.
pub struct Topology {
    queue_name: String,
    hook: Box<dyn TopologyHook>,
}

impl Topology {
    pub fn new(queue_name: impl Into<String>, hook: impl TopologyHook) -> Self {
        Self {
            queue_name: queue_name.into(),
            hook: Box::new(hook),
        }
    }

    /// The `orders` queue, bound with routing key `orders` to the durable direct
    /// `robot-shop` exchange.
    pub fn orders() -> Self {
        Self::new(
            QUEUE_NAME,
            Bind {
                exchange: DeclareDurableExchange {
                    name: EXCHANGE_NAME.to_owned(),
                    kind: ExchangeKind::Direct,
                },
                queue: DeclareDurableQueue,
                binding: RoutingKey::from(ROUTING_KEY),
            },
        )
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Declare the whole topology on `channel`.
    #[tracing::instrument(name = "install_topology", skip_all, fields(queue_name = %self.queue_name))]
    pub async fn install(&self, channel: &dyn AmqpChannel) -> Result<(), anyhow::Error> {
        self.hook
            .run(channel, &self.queue_name, FieldTable::default())
            .await
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::orders()
    }
}
