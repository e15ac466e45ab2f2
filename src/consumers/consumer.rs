use crate::{
    amqp::{AmqpChannel, Subscription},
    consumers::{policy::Limiter, Delivery, Handler, ProcessingPolicy},
    error::WorkerError,
    order::{order_id, OrderId},
    readiness::ReadyReceiver,
};
use futures_util::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::Instrument;

/// Pulls orders from the queue on whichever channel the link manager announced last.
///
/// Each delivered message is handed to the [`Handler`] on its own task: the loop never waits
/// for processing to complete before pulling the next message (unless a
/// [`ProcessingPolicy::Bounded`] limit is reached).
pub struct ConsumptionLoop<C: AmqpChannel> {
    ready: ReadyReceiver<C>,
    /// The name of the queue we will be consuming messages from.
    queue_name: String,
    /// `handler` determines what processing will be run on each incoming order.
    handler: Arc<dyn Handler>,
    policy: ProcessingPolicy,
}

impl<C: AmqpChannel> ConsumptionLoop<C> {
    pub fn new(
        ready: ReadyReceiver<C>,
        queue_name: impl Into<String>,
        handler: Arc<dyn Handler>,
        policy: ProcessingPolicy,
    ) -> Self {
        Self {
            ready,
            queue_name: queue_name.into(),
            handler,
            policy,
        }
    }

    /// Consume until the link manager goes away.
    ///
    /// Every time a channel is announced the loop subscribes to the queue on it.
    /// When the subscription ends, because the channel died or because a fresher channel was
    /// announced, the loop moves on to the next announced channel.
    /// Failing to subscribe is fatal, even when the link dropped while the subscription
    /// request was in flight: the worker does not retry a refused `basic_consume`.
    #[tracing::instrument(skip_all, name = "consumption_loop_run", fields(queue_name = %self.queue_name))]
    pub async fn run(self) -> Result<(), WorkerError> {
        let Self {
            mut ready,
            queue_name,
            handler,
            policy,
        } = self;
        let limiter = policy.limiter();

        let mut announced = ready.next_ready().await;
        while let Some(channel) = announced {
            tracing::info!("RabbitMQ ready");
            let subscription = channel
                .consume(&queue_name)
                .await
                .map_err(WorkerError::Consume)?;

            announced = match consume(subscription, &mut ready, &handler, &limiter).await {
                Some(superseding) => superseding,
                None => ready.next_ready().await,
            };
            // `channel` is released only now: the subscription is over.
        }

        tracing::info!("Link manager is gone, stopping consumption");
        Ok(())
    }
}

/// Drain `subscription` until it ends or a new channel is announced.
///
/// Returns the announcement that superseded the subscription, if any.
async fn consume<C>(
    mut subscription: Subscription,
    ready: &mut ReadyReceiver<C>,
    handler: &Arc<dyn Handler>,
    limiter: &Limiter,
) -> Option<Option<C>> {
    loop {
        tokio::select! {
            // A fresh channel wins over anything still buffered on the stale one.
            biased;

            fresh = ready.next_ready() => {
                if fresh.is_some() {
                    tracing::info!("A fresh channel was announced, dropping the current subscription");
                }
                return Some(fresh);
            }

            event = subscription.next() => {
                match event {
                    Some(Ok(delivery)) => {
                        let order_id = inspect(&delivery);
                        // Waiting for a processing slot must not hold a fresh channel back.
                        tokio::select! {
                            biased;

                            fresh = ready.next_ready() => {
                                // The order was acknowledged on receipt: it waits for its slot
                                // on its own task.
                                let limiter = limiter.clone();
                                spawn_processing(order_id, handler, async move {
                                    limiter.acquire().await
                                });
                                if fresh.is_some() {
                                    tracing::info!("A fresh channel was announced, dropping the current subscription");
                                }
                                return Some(fresh);
                            }
                            permit = limiter.acquire() => {
                                spawn_processing(order_id, handler, std::future::ready(permit));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = ?e, "Subscription failed");
                        return None;
                    }
                    None => {
                        tracing::info!("Subscription ended");
                        return None;
                    }
                }
            }
        }
    }
}

/// Log the delivery and extract its order identity.
fn inspect(delivery: &Delivery) -> OrderId {
    tracing::info!(body = %String::from_utf8_lossy(&delivery.data), "Order body");
    tracing::info!(headers = ?delivery.properties.headers(), "Headers");
    order_id(&delivery.data)
}

/// Process `order_id` on its own task, once `permit` resolves.
fn spawn_processing<P>(order_id: OrderId, handler: &Arc<dyn Handler>, permit: P)
where
    P: Future<Output = Option<OwnedSemaphorePermit>> + Send + 'static,
{
    let handler = handler.clone();
    let span = tracing::info_span!("process_order", order_id = %order_id);
    tokio::spawn(
        async move {
            let permit = permit.await;
            handler.handle(order_id).await;
            drop(permit);
        }
        .instrument(span),
    );
}
