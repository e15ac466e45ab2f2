//! A single-slot handoff announcing "a fresh, topology-complete channel is available".
//!
//! The link manager owns the [`ReadySender`], the consumption loop owns the [`ReadyReceiver`].
//! Ownership of the announced channel moves to the receiver.
//!
//! The slot is latest-wins: announcing while a previous channel is still waiting to be picked up
//! drops the previous one. A channel that was not picked up before its link was replaced is
//! never handed out.
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Create a connected readiness pair.
pub fn channel<C>() -> (ReadySender<C>, ReadyReceiver<C>) {
    let slot = Arc::new(Mutex::new(None));
    let (signal, watcher) = watch::channel(0);
    (
        ReadySender {
            slot: slot.clone(),
            signal,
        },
        ReadyReceiver { slot, watcher },
    )
}

/// The receiving half was dropped: nobody will ever consume the announced channel.
#[derive(Debug, thiserror::Error)]
#[error("the consumption loop is no longer listening for ready channels")]
pub struct ReceiverGone;

pub struct ReadySender<C> {
    slot: Arc<Mutex<Option<C>>>,
    /// Counts announcements.
    signal: watch::Sender<u64>,
}

impl<C> ReadySender<C> {
    /// Hand `channel` over to the consumption loop, replacing any announcement still pending.
    pub async fn announce(&self, channel: C) -> Result<(), ReceiverGone> {
        if self.signal.is_closed() {
            return Err(ReceiverGone);
        }
        if self.slot.lock().await.replace(channel).is_some() {
            tracing::debug!("Dropping a channel that was superseded before being picked up");
        }
        self.signal.send_modify(|announced| *announced += 1);
        Ok(())
    }
}

pub struct ReadyReceiver<C> {
    slot: Arc<Mutex<Option<C>>>,
    watcher: watch::Receiver<u64>,
}

impl<C> ReadyReceiver<C> {
    /// Wait for the next announced channel.
    ///
    /// Returns `None` once the link manager is gone and no announcement is pending.
    /// Cancelling the wait leaves a pending announcement in place.
    pub async fn next_ready(&mut self) -> Option<C> {
        loop {
            self.watcher.borrow_and_update();
            if let Some(channel) = self.slot.lock().await.take() {
                return Some(channel);
            }
            if self.watcher.changed().await.is_err() {
                return self.slot.lock().await.take();
            }
        }
    }
}
