//! Cooperative shutdown coordination.
//!
//! A `Shutdown` token is shared between a loop and its owner; the owner
//! flips it once, every waiter wakes up, and late subscribers observe the
//! terminated state immediately.

use tokio::sync::watch;

pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx,
        }
    }

    /// Signal termination. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_terminated(&self) -> bool {
        *self.tx.borrow()
    }

    /// Future that resolves once `shutdown` has been called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.wait_for(|terminated| *terminated).await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::Shutdown;

    #[tokio::test]
    async fn test_wait_resolves_after_shutdown() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_terminated());

        let wait = shutdown.wait();
        shutdown.shutdown();
        wait.await;
        assert!(shutdown.is_terminated());

        // late subscriber sees the terminated state without blocking
        shutdown.wait().await;
    }
}
