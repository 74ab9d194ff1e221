//! Stop signal fan-out.
//!
//! The signal forwarder holds one handle, the server holds a receiver. A
//! trigger wakes every receiver exactly once; later triggers are no-ops for
//! receivers that already observed the first.

use tokio::sync::broadcast;

/// Cloneable handle to the gateway's stop signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// A receiver that resolves once [`trigger`](Self::trigger) is called.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the stop signal. Returns how many receivers were listening.
    pub fn trigger(&self) -> usize {
        match self.tx.send(()) {
            Ok(listeners) => {
                tracing::info!(listeners, "Stop signal sent");
                listeners
            }
            Err(_) => 0,
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_every_receiver() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut drain = shutdown.subscribe();

        assert_eq!(shutdown.trigger(), 2);
        assert!(server.recv().await.is_ok());
        assert!(drain.recv().await.is_ok());
    }

    #[tokio::test]
    async fn clones_share_one_signal() {
        let shutdown = Shutdown::new();
        let forwarder = shutdown.clone();
        let mut server = shutdown.subscribe();

        forwarder.trigger();
        assert!(server.recv().await.is_ok());
    }

    #[test]
    fn trigger_without_receivers_is_harmless() {
        assert_eq!(Shutdown::new().trigger(), 0);
    }
}
