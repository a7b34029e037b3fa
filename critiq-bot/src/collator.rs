//! Album collation
//!
//! Telegram delivers a multi-photo album as separate messages that share a
//! `media_group_id`. The collator buffers messages with the same correlation
//! id for a fixed quiescence window after the first one arrives, then hands the
//! whole group to the downstream handler exactly once. Messages without a
//! correlation id pass straight through.
//!
//! # Lifecycle of a pending group
//! 1. First arrival for an id creates the group (sole member) and owns the
//!    wait-then-deliver path.
//! 2. Later arrivals during the window are appended in arrival order and
//!    return [`Collated::Absorbed`].
//! 3. When the window elapses the group is removed from the map and its
//!    members are delivered. Removal happens before the handler runs, so a
//!    handler failure never leaves an entry behind.
//!
//! The window is fixed: a member arriving after removal opens a fresh group
//! under the same id and is delivered separately.
//!
//! Groups live only in memory; a restart loses any group still open.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Default quiescence window (0.6 s)
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(600);

type PendingMap<T> = HashMap<String, Vec<T>>;

/// Outcome of [`AlbumCollator::accept`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collated<R> {
    /// The downstream handler ran on this call path and produced `R`
    Delivered(R),
    /// Merged into a group opened by an earlier call; no handler result here
    Absorbed,
}

impl<R> Collated<R> {
    pub fn is_absorbed(&self) -> bool {
        matches!(self, Collated::Absorbed)
    }
}

/// Result of the atomic admission step
pub enum Admission<T> {
    /// No correlation id: deliver this payload on its own
    Passthrough(T),
    /// First arrival for its id: the caller owns the group and must close it
    Opened(OpenGroup<T>),
    /// Appended to an already open group
    Absorbed,
}

impl<T> std::fmt::Debug for Admission<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Admission::Passthrough(_) => f.write_str("Passthrough"),
            Admission::Opened(group) => write!(f, "Opened({})", group.correlation_id),
            Admission::Absorbed => f.write_str("Absorbed"),
        }
    }
}

/// Debouncing buffer keyed by correlation id
///
/// Cheap to clone; clones share the same pending map.
pub struct AlbumCollator<T> {
    quiescence: Duration,
    pending: Arc<Mutex<PendingMap<T>>>,
}

impl<T> Clone for AlbumCollator<T> {
    fn clone(&self) -> Self {
        Self {
            quiescence: self.quiescence,
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T> Default for AlbumCollator<T> {
    fn default() -> Self {
        Self::new(DEFAULT_QUIESCENCE)
    }
}

impl<T> AlbumCollator<T> {
    /// Create a collator with a fixed quiescence window
    pub fn new(quiescence: Duration) -> Self {
        Self {
            quiescence,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn quiescence(&self) -> Duration {
        self.quiescence
    }

    /// Number of groups currently open
    pub fn open_groups(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Whether a group is open for `correlation_id`
    pub fn is_open(&self, correlation_id: &str) -> bool {
        lock(&self.pending).contains_key(correlation_id)
    }

    /// Insert-if-absent, else append, as one indivisible step
    ///
    /// Never suspends. Callers that process events on separate tasks should
    /// call this in arrival order before spawning, so members keep their order.
    pub fn admit(&self, correlation_id: Option<String>, payload: T) -> Admission<T> {
        let Some(correlation_id) = correlation_id else {
            return Admission::Passthrough(payload);
        };

        let mut pending = lock(&self.pending);
        match pending.get_mut(&correlation_id) {
            Some(members) => {
                members.push(payload);
                debug!(
                    correlation_id = %correlation_id,
                    members = members.len(),
                    "Absorbed into open group"
                );
                Admission::Absorbed
            }
            None => {
                pending.insert(correlation_id.clone(), vec![payload]);
                debug!(correlation_id = %correlation_id, "Opened group");
                Admission::Opened(OpenGroup {
                    correlation_id,
                    quiescence: self.quiescence,
                    pending: Arc::clone(&self.pending),
                    closed: false,
                })
            }
        }
    }

    /// Route one event through the collator
    ///
    /// - no correlation id: `handler` runs now with a one-element vector
    /// - first arrival: waits out the window, then `handler` runs once with
    ///   every member in arrival order
    /// - later arrival: returns [`Collated::Absorbed`] without running `handler`
    ///
    /// A handler error is returned only to the first-arrival caller.
    pub async fn accept<F, Fut, R, E>(
        &self,
        correlation_id: Option<String>,
        payload: T,
        handler: F,
    ) -> Result<Collated<R>, E>
    where
        F: FnOnce(Vec<T>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let members = match self.admit(correlation_id, payload) {
            Admission::Passthrough(payload) => vec![payload],
            Admission::Opened(group) => {
                let members = group.close().await;
                if members.is_empty() {
                    return Ok(Collated::Absorbed);
                }
                members
            }
            Admission::Absorbed => return Ok(Collated::Absorbed),
        };

        handler(members).await.map(Collated::Delivered)
    }
}

/// Ownership of an open group, held by its first arrival
///
/// Dropping it before [`OpenGroup::close`] finishes (for example when the
/// owning task is aborted) removes the group so the map never leaks an entry.
pub struct OpenGroup<T> {
    correlation_id: String,
    quiescence: Duration,
    pending: Arc<Mutex<PendingMap<T>>>,
    closed: bool,
}

impl<T> OpenGroup<T> {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Wait out the quiescence window, then remove and return the members
    pub async fn close(mut self) -> Vec<T> {
        tokio::time::sleep(self.quiescence).await;

        let members = lock(&self.pending).remove(&self.correlation_id);
        self.closed = true;

        match members {
            Some(members) => {
                debug!(
                    correlation_id = %self.correlation_id,
                    members = members.len(),
                    "Closed group"
                );
                members
            }
            None => {
                // Only this handle removes its entry
                warn!(correlation_id = %self.correlation_id, "Group vanished before close");
                Vec::new()
            }
        }
    }
}

impl<T> Drop for OpenGroup<T> {
    fn drop(&mut self) {
        if !self.closed {
            if let Some(members) = lock(&self.pending).remove(&self.correlation_id) {
                warn!(
                    correlation_id = %self.correlation_id,
                    dropped = members.len(),
                    "Group discarded before its window closed"
                );
            }
        }
    }
}

fn lock<T>(pending: &Mutex<PendingMap<T>>) -> MutexGuard<'_, PendingMap<T>> {
    // The map holds plain data; a panic elsewhere cannot leave it half-updated
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
