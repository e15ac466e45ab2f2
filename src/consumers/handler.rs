//! The `Handler` trait is heavily inspired by `tide`'s approach to endpoint handlers.
use crate::order::OrderId;
use std::future::Future;

/// Implementers of the `Handler` trait process the orders pulled from the queue.
///
/// # Scope
///
/// `handle` does not get access to the underlying RabbitMq channel, nor to the raw delivery:
/// the consumption loop extracts the order identity and hands it over.
/// Deliveries are auto-acknowledged, so there is nothing to report back to the broker and
/// `handle` has no return value.
///
/// # Concurrency
///
/// The consumption loop does not wait for `handle` to complete before pulling the next message:
/// `handle` must be safe to run concurrently an arbitrary number of times.
///
/// # Implementers
///
/// While you can implement `Handler` for a struct or enum, you can also wrap an async
/// function of the form `Fn(OrderId) -> Fut` in a [`ClosureHandler`].
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, order_id: OrderId);
}

/// Implement the [`Handler`] trait for all Boxed handlers.
///
/// E.g. `Box<dyn Handler>`.
#[async_trait::async_trait]
impl<H> Handler for Box<H>
where
    H: Handler + ?Sized,
{
    async fn handle(&self, order_id: OrderId) {
        H::handle(self, order_id).await
    }
}

/// Wrapper type to turn an async function into a [`Handler`].
pub struct ClosureHandler<F>(pub F);

#[async_trait::async_trait]
impl<F, Fut> Handler for ClosureHandler<F>
where
    F: Fn(OrderId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, order_id: OrderId) {
        // `self.0` is a function, which we are calling on its argument using
        // parenthesis notation - (self.0)(_)
        (self.0)(order_id).await
    }
}
