//! Observable location state shared with the map view.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::{FriendsLocationSet, LocationSample};

/// Snapshot consumed by the map renderer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationState {
    pub my_location: Option<LocationSample>,
    pub friends: FriendsLocationSet,
    pub error: Option<String>,
    /// Bumped once per applied mutation
    pub revision: u64,
}

/// Dependency-injected container for [`LocationState`]
#[derive(Clone)]
pub struct LocationStore {
    tx: Arc<watch::Sender<LocationState>>,
}

impl LocationStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LocationState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> LocationState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationState> {
        self.tx.subscribe()
    }

    /// Hand out a writer; its updates stop landing once it is detached
    pub fn attach(&self) -> StoreWriter {
        StoreWriter {
            tx: self.tx.clone(),
            shared: Arc::new(WriterShared {
                live: AtomicBool::new(true),
                last_applied_seq: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
            }),
        }
    }
}

impl Default for LocationStore {
    fn default() -> Self {
        Self::new()
    }
}

struct WriterShared {
    live: AtomicBool,
    last_applied_seq: AtomicU64,
    /// Advanced by `clear_friends`; responses issued under an older epoch are dropped
    epoch: AtomicU64,
}

/// Write side of the store owned by one mounted poller
#[derive(Clone)]
pub struct StoreWriter {
    tx: Arc<watch::Sender<LocationState>>,
    shared: Arc<WriterShared>,
}

impl StoreWriter {
    pub fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Stop accepting writes. Serialised with in-progress writes, so nothing
    /// lands after this returns.
    pub fn detach(&self) {
        self.tx.send_if_modified(|_| {
            self.shared.live.store(false, Ordering::SeqCst);
            false
        });
    }

    fn apply(&self, mutate: impl FnOnce(&mut LocationState) -> bool) -> bool {
        self.tx.send_if_modified(|state| {
            if !self.shared.live.load(Ordering::SeqCst) {
                return false;
            }
            let changed = mutate(state);
            if changed {
                state.revision += 1;
            }
            changed
        })
    }

    pub fn set_my_location(&self, sample: LocationSample) -> bool {
        self.apply(|state| {
            state.my_location = Some(sample);
            true
        })
    }

    /// Epoch to capture when issuing a friends fetch
    pub fn epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, epoch: u64) -> bool {
        epoch == self.shared.epoch.load(Ordering::SeqCst)
    }

    /// Replace the friends set regardless of issue order, unless the set was
    /// cleared after `epoch` was captured
    pub fn replace_friends(&self, epoch: u64, friends: FriendsLocationSet) -> bool {
        self.apply(|state| {
            if !self.is_current(epoch) {
                return false;
            }
            state.friends = friends;
            true
        })
    }

    /// Replace the friends set only if `seq` is newer than the last applied one
    pub fn replace_friends_if_newer(
        &self,
        epoch: u64,
        seq: u64,
        friends: FriendsLocationSet,
    ) -> bool {
        self.apply(|state| {
            if !self.is_current(epoch) {
                return false;
            }
            if seq <= self.shared.last_applied_seq.load(Ordering::SeqCst) {
                return false;
            }
            self.shared.last_applied_seq.store(seq, Ordering::SeqCst);
            state.friends = friends;
            true
        })
    }

    /// Empty the friends set and invalidate every response issued before now
    pub fn clear_friends(&self) -> bool {
        self.apply(|state| {
            self.shared.epoch.fetch_add(1, Ordering::SeqCst);
            if state.friends.is_empty() {
                return false;
            }
            state.friends = FriendsLocationSet::default();
            true
        })
    }

    pub fn set_error(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.apply(|state| {
            state.error = Some(message);
            true
        })
    }

    pub fn clear_error(&self) -> bool {
        self.apply(|state| state.error.take().is_some())
    }
}
