//! Server-sent event stream of newly appended log entries.

use axum::response::sse::Event;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::eventlog::{Entry, EventStore};

/// Tracks how many entries the client has already seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    seen: usize,
}

impl Cursor {
    pub fn starting_at(seen: usize) -> Self {
        Self { seen }
    }

    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Entries appended since the last call. A shrunken log (cleaned or
    /// cleared) rebases the cursor and yields nothing.
    pub fn advance(&mut self, mut entries: Vec<Entry>) -> Vec<Entry> {
        if entries.len() < self.seen {
            debug!(from = self.seen, to = entries.len(), "event log shrank, rebasing");
            self.seen = entries.len();
            return Vec::new();
        }
        let fresh = entries.split_off(self.seen);
        self.seen += fresh.len();
        fresh
    }
}

/// Read the log on the blocking pool; both backends do synchronous I/O.
async fn load_entries(store: &Arc<dyn EventStore>) -> Result<Vec<Entry>> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || store.all_entries())
        .await
        .map_err(|e| NotifyError::LogWrite(format!("event poll task failed: {e}")))?
}

fn entry_event(entry: &Entry) -> Option<Event> {
    Event::default().event("entry").json_data(entry).ok()
}

/// Spawn a poller and return the receiving half as a stream.
///
/// The poller stops as soon as the client goes away (the receiver is dropped).
pub fn event_stream(
    store: Arc<dyn EventStore>,
    poll: Duration,
) -> ReceiverStream<std::result::Result<Event, Infallible>> {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let initial = load_entries(&store).await.map(|e| e.len()).unwrap_or(0);
        let mut cursor = Cursor::starting_at(initial);
        if tx.send(Ok(Event::default().event("ready").data(initial.to_string()))).await.is_err() {
            return;
        }

        let mut ticker = tokio::time::interval(poll);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            let entries = match load_entries(&store).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("event poll failed: {e}");
                    continue;
                }
            };
            for entry in cursor.advance(entries) {
                let Some(event) = entry_event(&entry) else {
                    continue;
                };
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
        }
        debug!("event stream closed");
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn entries(n: usize) -> Vec<Entry> {
        (0..n)
            .map(|i| Entry::cooldown_skipped(Local::now(), "p", &format!("a{i}"), 5))
            .collect()
    }

    #[test]
    fn cursor_emits_only_new_entries() {
        let mut cursor = Cursor::starting_at(2);
        let fresh = cursor.advance(entries(4));
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].action, "a2");
        assert!(cursor.advance(entries(4)).is_empty());
        assert_eq!(cursor.seen(), 4);
    }

    #[test]
    fn cursor_rebases_after_truncation() {
        let mut cursor = Cursor::starting_at(5);
        assert!(cursor.advance(entries(1)).is_empty());
        assert_eq!(cursor.seen(), 1);
        assert_eq!(cursor.advance(entries(3)).len(), 2);
    }

    /// Remembers which threads read the log.
    struct ThreadRecordingStore {
        inner: crate::eventlog::FileStore,
        readers: parking_lot::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl EventStore for ThreadRecordingStore {
        fn append(&self, entry: &Entry) -> Result<()> {
            self.inner.append(entry)
        }
        fn all_entries(&self) -> Result<Vec<Entry>> {
            self.readers.lock().push(std::thread::current().id());
            self.inner.all_entries()
        }
        fn read_content(&self) -> Result<String> {
            self.inner.read_content()
        }
        fn clean(&self, days: u32) -> Result<usize> {
            self.inner.clean(days)
        }
        fn remove_profile(&self, name: &str) -> Result<usize> {
            self.inner.remove_profile(name)
        }
        fn clear(&self) -> Result<()> {
            self.inner.clear()
        }
        fn path(&self) -> &std::path::Path {
            self.inner.path()
        }
        fn storage_kind(&self) -> crate::config::StorageKind {
            self.inner.storage_kind()
        }
    }

    #[tokio::test]
    async fn log_reads_run_off_the_async_thread() {
        use tokio_stream::StreamExt;

        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(ThreadRecordingStore {
            inner: crate::eventlog::FileStore::new(dir.path().join("notify.log")),
            readers: parking_lot::Mutex::new(Vec::new()),
        });
        let mut stream = event_stream(store.clone(), Duration::from_millis(10));
        assert!(stream.next().await.is_some());
        store.log_cooldown("p", "a", 5).unwrap();
        let next = tokio::time::timeout(Duration::from_secs(2), stream.next()).await;
        assert!(matches!(next, Ok(Some(Ok(_)))));

        // The test runtime is single-threaded, so inline reads would land here.
        let here = std::thread::current().id();
        let readers = store.readers.lock();
        assert!(readers.len() >= 2);
        assert!(readers.iter().all(|id| *id != here));
    }

    #[tokio::test]
    async fn stream_reports_appended_entries() {
        use crate::eventlog::FileStore;
        use tokio_stream::StreamExt;

        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn EventStore> = Arc::new(FileStore::new(dir.path().join("notify.log")));
        store.log_cooldown("p", "old", 5).unwrap();

        let mut stream = event_stream(store.clone(), Duration::from_millis(20));
        assert!(stream.next().await.is_some());
        store.log_cooldown("p", "new", 5).unwrap();
        let next = tokio::time::timeout(Duration::from_secs(2), stream.next()).await;
        assert!(matches!(next, Ok(Some(Ok(_)))));
    }
}
