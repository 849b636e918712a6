//! Progress event stream and thread-safe aggregation.

use std::sync::{Arc, Mutex};

use crate::url::AlbumId;

/// State transition of one asset within an album download.
///
/// Events are immutable values pushed by workers; consumers render or
/// aggregate them on their own cadence. Nothing here is persisted.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// An album's task list was accepted: `total` assets queued.
    AlbumStarted { album: AlbumId, total: usize },
    /// A worker picked the asset up.
    Started { album: AlbumId, index: usize },
    /// Another chunk of the asset's body arrived.
    Transferred {
        album: AlbumId,
        index: usize,
        bytes: u64,
    },
    /// The asset finished downloading.
    Finished { album: AlbumId, index: usize },
    /// The asset failed terminally (retries already spent).
    Failed {
        album: AlbumId,
        index: usize,
        reason: String,
    },
    /// The asset was never fetched (already on disk, or shutdown).
    Skipped {
        album: AlbumId,
        index: usize,
        reason: String,
    },
}

/// Sink for progress events.
///
/// Implementations must tolerate concurrent calls from every worker. The
/// default method is a no-op so the pipeline never depends on a consumer
/// being present.
pub trait ProgressSink: Send + Sync {
    /// Called by workers for every state transition.
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// A null sink that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

impl<P: ProgressSink + ?Sized> ProgressSink for Arc<P> {
    fn on_event(&self, event: &ProgressEvent) {
        (**self).on_event(event);
    }
}

/// Fans each event out to two sinks, letting independent consumers (say, a
/// bar renderer and a line logger) share one event stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: ProgressSink, B: ProgressSink> ProgressSink for Tee<A, B> {
    fn on_event(&self, event: &ProgressEvent) {
        self.0.on_event(event);
        self.1.on_event(event);
    }
}

/// Consistent point-in-time view of the aggregated counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    /// Assets queued across all albums seen so far.
    pub total: usize,
    /// Assets currently being fetched.
    pub in_flight: usize,
    /// Assets downloaded successfully.
    pub finished: usize,
    /// Assets that failed terminally.
    pub failed: usize,
    /// Assets skipped without a fetch.
    pub skipped: usize,
    /// Body bytes received so far.
    pub bytes: u64,
}

impl ProgressSnapshot {
    /// Assets that reached a terminal state.
    #[must_use]
    pub const fn done(&self) -> usize {
        self.finished + self.failed + self.skipped
    }
}

/// Mutex-guarded aggregation of the event stream.
///
/// Updates are serialized, and `snapshot` reads every counter under the
/// same lock, so a renderer polling on its own schedule never observes a
/// torn update.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    state: Mutex<ProgressSnapshot>,
}

impl ProgressCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a consistent copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.state.lock().expect("progress mutex poisoned")
    }
}

impl ProgressSink for ProgressCounters {
    fn on_event(&self, event: &ProgressEvent) {
        let mut s = self.state.lock().expect("progress mutex poisoned");
        match event {
            ProgressEvent::AlbumStarted { total, .. } => s.total += total,
            ProgressEvent::Started { .. } => s.in_flight += 1,
            ProgressEvent::Transferred { bytes, .. } => s.bytes += bytes,
            ProgressEvent::Finished { .. } => {
                s.in_flight = s.in_flight.saturating_sub(1);
                s.finished += 1;
            }
            ProgressEvent::Failed { .. } => {
                s.in_flight = s.in_flight.saturating_sub(1);
                s.failed += 1;
            }
            // Skips happen before a worker ever starts the asset.
            ProgressEvent::Skipped { .. } => s.skipped += 1,
        }
    }
}

/// Live-log consumer: one log line per notable transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::AlbumStarted { album, total } => {
                log::info!("album {album}: {total} asset(s) queued");
            }
            ProgressEvent::Finished { album, index } => {
                log::info!("album {album}: asset {index} downloaded");
            }
            ProgressEvent::Failed {
                album,
                index,
                reason,
            } => {
                log::warn!("album {album}: asset {index} failed: {reason}");
            }
            ProgressEvent::Skipped {
                album,
                index,
                reason,
            } => {
                log::debug!("album {album}: asset {index} skipped: {reason}");
            }
            ProgressEvent::Started { .. } | ProgressEvent::Transferred { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> AlbumId {
        AlbumId::from_raw("4242")
    }

    #[test]
    fn no_progress_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoProgress>();
        assert_send_sync::<ProgressCounters>();
    }

    #[test]
    fn counters_track_a_full_lifecycle() {
        let counters = ProgressCounters::new();
        counters.on_event(&ProgressEvent::AlbumStarted { album: id(), total: 2 });
        counters.on_event(&ProgressEvent::Started { album: id(), index: 0 });
        counters.on_event(&ProgressEvent::Transferred { album: id(), index: 0, bytes: 100 });
        counters.on_event(&ProgressEvent::Finished { album: id(), index: 0 });
        counters.on_event(&ProgressEvent::Started { album: id(), index: 1 });
        counters.on_event(&ProgressEvent::Failed {
            album: id(),
            index: 1,
            reason: "404".to_string(),
        });

        let snap = counters.snapshot();
        assert_eq!(snap.total, 2);
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.finished, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.bytes, 100);
        assert_eq!(snap.done(), 2);
    }

    #[test]
    fn skipped_assets_count_without_in_flight() {
        let counters = ProgressCounters::new();
        counters.on_event(&ProgressEvent::AlbumStarted { album: id(), total: 1 });
        counters.on_event(&ProgressEvent::Skipped {
            album: id(),
            index: 0,
            reason: "already on disk".to_string(),
        });

        let snap = counters.snapshot();
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.done(), 1);
    }

    #[test]
    fn concurrent_events_never_lose_counts() {
        let counters = Arc::new(ProgressCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        counters.on_event(&ProgressEvent::Started { album: id(), index: i });
                        counters.on_event(&ProgressEvent::Transferred {
                            album: id(),
                            index: i,
                            bytes: 10,
                        });
                        counters.on_event(&ProgressEvent::Finished { album: id(), index: i });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = counters.snapshot();
        assert_eq!(snap.finished, 800);
        assert_eq!(snap.bytes, 8000);
        assert_eq!(snap.in_flight, 0);
    }

    #[test]
    fn tee_delivers_to_both_sinks() {
        let a = Arc::new(ProgressCounters::new());
        let b = Arc::new(ProgressCounters::new());
        let tee = Tee(Arc::clone(&a), Arc::clone(&b));

        tee.on_event(&ProgressEvent::Started { album: id(), index: 0 });
        assert_eq!(a.snapshot().in_flight, 1);
        assert_eq!(b.snapshot().in_flight, 1);
    }
}
