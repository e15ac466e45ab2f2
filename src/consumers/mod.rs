//! Facilities to consume order messages from a RabbitMq queue. Check out [`ConsumptionLoop`] as a
//! starting point.
pub use consumer::ConsumptionLoop;
pub use handler::{ClosureHandler, Handler};
pub use incoming_message::Delivery;
pub use policy::ProcessingPolicy;

mod consumer;
mod handler;
mod incoming_message;
mod policy;
