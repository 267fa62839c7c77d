// ── Status subscription guard ──
//
// Holds the push feed for at most a fixed window counted from the moment
// it was acquired. Traffic on the feed does not extend it. Expiry, an
// explicit release or drop ends the subscription.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::transport::StatusFeed;

/// Scoped ownership of a status feed.
///
/// The pump task owns the feed; when it exits for any reason the feed is
/// dropped, which releases the subscription on the network side.
pub(crate) struct StatusSubscription {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StatusSubscription {
    /// Start pumping `feed` into `on_status` until `lifetime` has passed.
    /// Messages are handled one at a time, in arrival order.
    pub(crate) fn spawn<F, Fut>(feed: StatusFeed, lifetime: Duration, on_status: F) -> Self
    where
        F: Fn(bool) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + lifetime;
        let task = tokio::spawn(pump(feed, deadline, on_status, cancel.clone()));
        Self { cancel, task }
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Tear down now, regardless of the deadline.
    pub(crate) fn release(self) {
        self.cancel.cancel();
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn pump<F, Fut>(mut feed: StatusFeed, deadline: Instant, on_status: F, cancel: CancellationToken)
where
    F: Fn(bool) -> Fut,
    Fut: Future<Output = ()>,
{
    let expiry = tokio::time::sleep_until(deadline);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("Status subscription released");
                break;
            }
            () = &mut expiry => {
                tracing::info!("Status subscription expired");
                break;
            }
            next = feed.next() => {
                let Some(is_loading) = next else {
                    tracing::info!("Status feed closed");
                    break;
                };
                on_status(is_loading).await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const IDLE: Duration = Duration::from_secs(20 * 60);

    fn recorder() -> (Arc<Mutex<Vec<bool>>>, impl Fn(bool) -> std::future::Ready<()> + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v| {
            sink.lock().unwrap().push(v);
            std::future::ready(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_idle_window() {
        let (tx, feed) = StatusFeed::channel();
        let (_, on_status) = recorder();
        let sub = StatusSubscription::spawn(feed, IDLE, on_status);

        tokio::time::sleep(IDLE - Duration::from_secs(1)).await;
        assert!(sub.is_active());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!sub.is_active());
        assert!(tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn messages_do_not_extend_the_lifetime() {
        let (tx, feed) = StatusFeed::channel();
        let (seen, on_status) = recorder();
        let sub = StatusSubscription::spawn(feed, IDLE, on_status);

        tokio::time::sleep(IDLE - Duration::from_secs(60)).await;
        tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(sub.is_active());
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!sub.is_active());
        assert!(tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn release_tears_down_immediately() {
        let (tx, feed) = StatusFeed::channel();
        let (_, on_status) = recorder();
        let sub = StatusSubscription::spawn(feed, IDLE, on_status);

        sub.release();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_tears_down() {
        let (tx, feed) = StatusFeed::channel();
        let (_, on_status) = recorder();
        drop(StatusSubscription::spawn(feed, IDLE, on_status));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(tx.is_closed());
    }
}
