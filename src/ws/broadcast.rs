use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Central fan-out hub: one channel for full-state snapshots and one for
/// the lighter price-tick stream.
///
/// Publishing is fire-and-forget — with no live subscriber the message is
/// dropped, and a slow subscriber lags (skipping old messages) without ever
/// blocking the sender or the other viewers. Clone-able via the internal
/// senders.
#[derive(Clone)]
pub struct BroadcastHub {
    state_tx: broadcast::Sender<String>,
    ticks_tx: broadcast::Sender<String>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            state_tx: broadcast::channel(CHANNEL_CAPACITY).0,
            ticks_tx: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<String> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_ticks(&self) -> broadcast::Receiver<String> {
        self.ticks_tx.subscribe()
    }

    /// Publish a snapshot message and return the live receiver count.
    pub fn publish_state(&self, message: String) -> usize {
        self.state_tx.send(message).unwrap_or(0)
    }

    /// Publish a tick message and return the live receiver count.
    pub fn publish_ticks(&self, message: String) -> usize {
        self.ticks_tx.send(message).unwrap_or(0)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
