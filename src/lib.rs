//! `dispatch-worker` consumes order events from RabbitMq and simulates their dispatch.
//!
//! The interesting part is keeping consumption alive across broker outages:
//! - the [`LinkManager`](crate::link::LinkManager) dials the broker (retrying forever), declares
//!   the [`Topology`](crate::topology::Topology) and announces a fresh channel after every
//!   (re)connection;
//! - the [`ConsumptionLoop`](crate::consumers::ConsumptionLoop) subscribes on the last announced
//!   channel and spawns the processing of every delivered order.
//!
//! [`Worker`](crate::worker::Worker) wires the two together and is the best starting point.

pub mod amqp;
pub mod configuration;
pub mod consumers;
mod error;
pub mod link;
pub mod order;
pub mod processor;
pub mod readiness;
pub mod topology;
pub mod worker;

pub use error::WorkerError;
pub use worker::{Worker, WorkerBuilder};
