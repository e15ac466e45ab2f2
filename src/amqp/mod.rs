//! Helpers for connecting to a rabbitmq broker

pub mod configuration;
mod factory;
pub mod transport;
pub use factory::ConnectionFactory;
pub use transport::{
    AmqpChannel, BrokerConnection, CloseNotifier, LinkClosed, Subscription, TransportFactory,
};

pub use lapin::{options, types, BasicProperties, ExchangeKind};
