//! Simulated order dispatch.
//!
//! Nothing leaves the process: dispatch and sale processing are timed sleeps, and dispatch
//! failures are a log line driven by a configurable percentage.
use crate::consumers::Handler;
use crate::order::OrderId;
use rand::Rng;
use std::time::Duration;

/// A randomised processing delay: `base` plus a uniformly drawn amount in `[0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    pub base: Duration,
    pub jitter: Duration,
}

impl Latency {
    pub const fn fixed(base: Duration) -> Self {
        Self {
            base,
            jitter: Duration::ZERO,
        }
    }

    pub fn sample(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rand::rng().random_range(0..jitter_ms))
    }
}

impl Default for Latency {
    /// Between 42 and 83 milliseconds.
    fn default() -> Self {
        Self {
            base: Duration::from_millis(42),
            jitter: Duration::from_millis(42),
        }
    }
}

/// What the dispatch step reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched,
    SimulatedFailure,
}

/// The order processor: a dispatch step followed by a sale processing step.
///
/// Stateless apart from its configuration, so it can process any number of orders
/// concurrently.
#[derive(Debug, Clone)]
pub struct DispatchSimulator {
    error_percent: u8,
    dispatch_latency: Latency,
    sale_latency: Latency,
}

impl DispatchSimulator {
    /// `error_percent` is clamped to 100.
    pub fn new(error_percent: u8) -> Self {
        Self {
            error_percent: error_percent.min(100),
            dispatch_latency: Latency::default(),
            sale_latency: Latency::default(),
        }
    }

    #[must_use]
    pub fn with_latency(mut self, dispatch: Latency, sale: Latency) -> Self {
        self.dispatch_latency = dispatch;
        self.sale_latency = sale;
        self
    }

    pub fn error_percent(&self) -> u8 {
        self.error_percent
    }

    /// Process a single order.
    ///
    /// A simulated dispatch failure does not interrupt processing: the order always goes on to
    /// sale processing.
    pub async fn process(&self, order_id: &OrderId) -> DispatchOutcome {
        tracing::info!(%order_id, "Processing order");
        tokio::time::sleep(self.dispatch_latency.sample()).await;

        let roll: u8 = rand::rng().random_range(0..100);
        let outcome = self.outcome(roll);
        match outcome {
            DispatchOutcome::SimulatedFailure => {
                tracing::warn!(%order_id, "Simulated dispatch failure")
            }
            DispatchOutcome::Dispatched => tracing::info!(%order_id, "Order dispatched successfully"),
        }

        self.process_sale(order_id).await;
        outcome
    }

    /// `roll` is a uniform draw in `[0, 100)`.
    fn outcome(&self, roll: u8) -> DispatchOutcome {
        if roll < self.error_percent {
            DispatchOutcome::SimulatedFailure
        } else {
            DispatchOutcome::Dispatched
        }
    }

    async fn process_sale(&self, order_id: &OrderId) {
        tracing::info!(%order_id, "Order sent for further processing");
        tokio::time::sleep(self.sale_latency.sample()).await;
    }
}

#[async_trait::async_trait]
impl Handler for DispatchSimulator {
    async fn handle(&self, order_id: OrderId) {
        self.process(&order_id).await;
    }
}
