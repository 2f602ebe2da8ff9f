//! Readiness probes.
//!
//! A probe turns a cancellation token into a one-shot signal that fires once
//! the container is usable by its dependents. A cancelled probe drops its
//! sender without sending, so a receiver never observes readiness after the
//! wait was abandoned.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Default wait of [`ConstantDelay`].
pub const DEFAULT_READY_DELAY: Duration = Duration::from_secs(5);

/// Decides when a started container is ready.
pub trait ReadyProbe: Send + Sync {
    /// Start waiting for readiness. The returned receiver resolves with `Ok`
    /// once ready; it never does after `cancel` fired.
    fn ready(&self, cancel: CancellationToken) -> oneshot::Receiver<()>;
}

impl<F> ReadyProbe for F
where
    F: Fn(CancellationToken) -> oneshot::Receiver<()> + Send + Sync,
{
    fn ready(&self, cancel: CancellationToken) -> oneshot::Receiver<()> {
        self(cancel)
    }
}

/// Considers the container ready after a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDelay(pub Duration);

impl Default for ConstantDelay {
    fn default() -> Self {
        Self(DEFAULT_READY_DELAY)
    }
}

impl ReadyProbe for ConstantDelay {
    fn ready(&self, cancel: CancellationToken) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let delay = self.0;

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(());
                }
            }
        });

        rx
    }
}

/// Polls an HTTP endpoint until it answers with a success status.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    interval: Duration,
}

impl HttpProbe {
    /// Probe `url` every 500ms.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            interval: Duration::from_millis(500),
        }
    }

    /// Set the polling interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Probed URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn poll(client: reqwest::Client, url: String, interval: Duration) {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(url = %url, "HTTP endpoint ready");
                    return;
                }
                Ok(resp) => {
                    tracing::debug!(url = %url, status = %resp.status(), "HTTP endpoint not ready");
                }
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "HTTP request failed");
                }
            }

            tokio::time::sleep(interval).await;
        }
    }
}

impl ReadyProbe for HttpProbe {
    fn ready(&self, cancel: CancellationToken) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let poll = Self::poll(self.client.clone(), self.url.clone(), self.interval);

        tokio::spawn(async move {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {}
                () = poll => {
                    let _ = tx.send(());
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn constant_delay_fires() {
        let rx = ConstantDelay(Duration::from_secs(2)).ready(CancellationToken::new());
        assert!(rx.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn constant_delay_never_fires_after_cancel() {
        let cancel = CancellationToken::new();
        let rx = ConstantDelay::default().ready(cancel.clone());
        cancel.cancel();

        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn closures_are_probes() {
        let probe = |_cancel: CancellationToken| {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(());
            rx
        };

        assert!(probe.ready(CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn http_probe_never_fires_after_cancel() {
        let cancel = CancellationToken::new();
        let probe = HttpProbe::new("http://127.0.0.1:9/health")
            .with_interval(Duration::from_millis(10));
        let rx = probe.ready(cancel.clone());
        cancel.cancel();

        assert!(rx.await.is_err());
        assert_eq!(probe.url(), "http://127.0.0.1:9/health");
    }
}
