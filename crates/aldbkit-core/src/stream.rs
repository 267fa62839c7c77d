// ── Store subscriptions ──
//
// Consumers (CLI, panels) hold one of these per collection and redraw
// whenever the store publishes a new snapshot.

use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Immutable point-in-time view of a store collection.
pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// Handle on a store collection's change feed.
///
/// `current` is whatever the handle last observed; `changed` waits for the
/// next publish. Every load, edit, commit or removal publishes exactly once.
pub struct SnapshotStream<T: Send + Sync + 'static> {
    seen: Snapshot<T>,
    rx: watch::Receiver<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> SnapshotStream<T> {
    pub(crate) fn new(rx: watch::Receiver<Snapshot<T>>) -> Self {
        let seen = Arc::clone(&rx.borrow());
        Self { seen, rx }
    }

    pub fn current(&self) -> &Snapshot<T> {
        &self.seen
    }

    /// Next published snapshot; `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        self.seen = Arc::clone(&self.rx.borrow_and_update());
        Some(Arc::clone(&self.seen))
    }

    /// Yields the present snapshot first, then one item per publish.
    pub fn into_stream(self) -> impl Stream<Item = Snapshot<T>> + Send + Unpin {
        WatchStream::new(self.rx)
    }
}
