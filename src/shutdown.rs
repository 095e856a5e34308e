//! Stop signal handed to every worker at spawn time.

use tokio::sync::watch;

/// Owner side of the stop signal.
pub(crate) struct Shutdown(watch::Sender<bool>);

/// Worker side of the stop signal.
#[derive(Clone)]
pub(crate) struct ShutdownListener(watch::Receiver<bool>);

impl Shutdown {
    pub(crate) fn new() -> (Self, ShutdownListener) {
        let (send, recv) = watch::channel(false);
        (Self(send), ShutdownListener(recv))
    }

    /// Set the signal. Returns `false` if it was already set.
    pub(crate) fn trigger(&self) -> bool {
        !self.0.send_replace(true)
    }
}

impl ShutdownListener {
    pub(crate) fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Completes once the signal is set or its owner is gone.
    ///
    /// Cancel safe, so it can be raced against socket I/O in `select!`.
    pub(crate) async fn triggered(&mut self) {
        let _ = self.0.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_flips_once() {
        let (shutdown, listener) = Shutdown::new();
        assert!(!listener.is_triggered());
        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(listener.is_triggered());
    }

    #[tokio::test]
    async fn every_clone_wakes() {
        let (shutdown, listener) = Shutdown::new();
        let waiters = (0..4)
            .map(|_| {
                let mut listener = listener.clone();
                tokio::spawn(async move { listener.triggered().await })
            })
            .collect::<Vec<_>>();
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();
        let all = futures::future::join_all(waiters);
        let results = tokio::time::timeout(Duration::from_secs(2), all)
            .await
            .expect("listeners did not wake");
        assert!(results.iter().all(|x| x.is_ok()));
    }

    #[tokio::test]
    async fn late_listener_sees_earlier_trigger() {
        let (shutdown, mut listener) = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(100), listener.triggered())
            .await
            .expect("already triggered");
    }

    #[tokio::test]
    async fn dropped_owner_releases_listeners() {
        let (shutdown, mut listener) = Shutdown::new();
        drop(shutdown);
        tokio::time::timeout(Duration::from_millis(100), listener.triggered())
            .await
            .expect("owner dropped");
    }
}
