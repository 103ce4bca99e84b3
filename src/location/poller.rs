//! Location Poller
//!
//! Mounting starts three pieces of work against one [`StoreWriter`]:
//! a device push subscription for the own position, a friends timer that
//! spawns one fetch per tick, and an optional timer sharing the own position.
//! Unmounting detaches the writer, aborts the timers and cancels the device
//! subscription before returning. Fetches already in flight run to completion
//! but their results no longer reach the store.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{
    FriendsLocationSet, LocationError, LocationFeed, LocationSample, LocationStore,
    PermissionStatus, PositionSource, PositionWatch, StoreWriter, Subscription,
};
use crate::config::Config;
use crate::session::Session;

/// How overlapping friends responses are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyOrder {
    /// Last response to complete wins, even if it was issued earlier
    #[default]
    Completion,
    /// Responses older than the last applied one are dropped
    Issue,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub friends_interval: Duration,
    /// `None` disables sharing the own position with the server
    pub share_interval: Option<Duration>,
    pub apply_order: ApplyOrder,
}

impl PollerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            friends_interval: config.friends_poll_interval,
            share_interval: Some(config.own_location_interval),
            apply_order: ApplyOrder::default(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            friends_interval: Duration::from_millis(5_000),
            share_interval: Some(Duration::from_millis(10_000)),
            apply_order: ApplyOrder::default(),
        }
    }
}

pub struct LocationPoller {
    source: Arc<dyn PositionSource>,
    feed: Arc<dyn LocationFeed>,
    store: LocationStore,
    config: PollerConfig,
    session_changes: Option<watch::Receiver<Option<Session>>>,
}

impl LocationPoller {
    pub fn new(
        source: Arc<dyn PositionSource>,
        feed: Arc<dyn LocationFeed>,
        store: LocationStore,
        config: PollerConfig,
    ) -> Self {
        Self {
            source,
            feed,
            store,
            config,
            session_changes: None,
        }
    }

    /// Refresh on sign-in and clear friends on sign-out
    pub fn with_session_changes(mut self, changes: watch::Receiver<Option<Session>>) -> Self {
        self.session_changes = Some(changes);
        self
    }

    pub async fn mount(&self) -> MountedPoller {
        let writer = self.store.attach();
        let mut mounted = MountedPoller {
            writer: writer.clone(),
            tasks: Vec::new(),
            subscription: None,
            status: MountStatus::Failed,
        };

        if self.source.request_permission().await != PermissionStatus::Granted {
            warn!("Location permission denied, map disabled");
            writer.set_error(LocationError::PermissionDenied.to_string());
            return mounted;
        }

        match self.source.current_position().await {
            Ok(sample) => {
                writer.clear_error();
                writer.set_my_location(sample);
            }
            Err(e) => {
                error!("Initial location read failed: {}", e);
                writer.set_error(e.to_string());
                return mounted;
            }
        }

        let PositionWatch {
            updates,
            subscription,
        } = match self.source.watch_position() {
            Ok(watch) => watch,
            Err(e) => {
                error!("Failed to start position tracking: {}", e);
                writer.set_error(e.to_string());
                return mounted;
            }
        };
        mounted.subscription = Some(subscription);

        mounted
            .tasks
            .push(tokio::spawn(forward_positions(updates, writer.clone())));

        mounted.tasks.push(tokio::spawn(poll_friends(
            self.feed.clone(),
            writer.clone(),
            self.config.friends_interval,
            self.config.apply_order,
            self.session_changes.clone(),
        )));

        if let Some(every) = self.config.share_interval {
            mounted.tasks.push(tokio::spawn(share_own_location(
                self.feed.clone(),
                self.store.clone(),
                writer,
                every,
            )));
        }

        mounted.status = MountStatus::Running;
        info!(
            "Location poller mounted (friends every {:?})",
            self.config.friends_interval
        );
        mounted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountStatus {
    Running,
    /// Permission or initial read failed; nothing was started
    Failed,
}

/// Lifetime of one mount. Dropping it unmounts.
pub struct MountedPoller {
    writer: StoreWriter,
    tasks: Vec<JoinHandle<()>>,
    subscription: Option<Subscription>,
    status: MountStatus,
}

impl MountedPoller {
    pub fn status(&self) -> MountStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == MountStatus::Running && self.writer.is_live()
    }

    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.writer.is_live() {
            return;
        }
        self.writer.detach();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        info!("Location poller unmounted");
    }
}

impl Drop for MountedPoller {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn forward_positions(mut updates: mpsc::UnboundedReceiver<LocationSample>, writer: StoreWriter) {
    while let Some(sample) = updates.recv().await {
        if !writer.set_my_location(sample) {
            break;
        }
    }
    debug!("Position stream closed");
}

async fn poll_friends(
    feed: Arc<dyn LocationFeed>,
    writer: StoreWriter,
    every: Duration,
    order: ApplyOrder,
    mut session_changes: Option<watch::Receiver<Option<Session>>>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if signed_out(&session_changes) {
                    continue;
                }
            }
            signed_in = session_changed(&mut session_changes) => {
                if !signed_in {
                    debug!("Signed out, clearing friends' locations");
                    writer.clear_friends();
                    continue;
                }
                info!("Signed in, refreshing friends' locations");
            }
        }

        seq += 1;
        let epoch = writer.epoch();
        tokio::spawn(fetch_friends(feed.clone(), writer.clone(), epoch, seq, order));
    }
}

/// Without a session watch the poller always fetches
fn signed_out(changes: &Option<watch::Receiver<Option<Session>>>) -> bool {
    changes.as_ref().is_some_and(|rx| rx.borrow().is_none())
}

/// Resolves on the next session change with whether a session is present
async fn session_changed(changes: &mut Option<watch::Receiver<Option<Session>>>) -> bool {
    let Some(rx) = changes.as_mut() else {
        return std::future::pending::<bool>().await;
    };
    if rx.changed().await.is_err() {
        return std::future::pending::<bool>().await;
    }
    let signed_in = rx.borrow_and_update().is_some();
    signed_in
}

async fn fetch_friends(
    feed: Arc<dyn LocationFeed>,
    writer: StoreWriter,
    epoch: u64,
    seq: u64,
    order: ApplyOrder,
) {
    match feed.friend_locations().await {
        Ok(samples) => {
            let friends = FriendsLocationSet::from_samples(samples);
            let count = friends.len();
            let applied = match order {
                ApplyOrder::Completion => writer.replace_friends(epoch, friends),
                ApplyOrder::Issue => writer.replace_friends_if_newer(epoch, seq, friends),
            };
            if applied {
                debug!("Friends poll #{} applied {} locations", seq, count);
            } else {
                debug!("Friends poll #{} result discarded", seq);
            }
        }
        Err(e) => {
            warn!("Friends poll #{} failed, keeping last known locations: {}", seq, e);
        }
    }
}

async fn share_own_location(
    feed: Arc<dyn LocationFeed>,
    store: LocationStore,
    writer: StoreWriter,
    every: Duration,
) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !writer.is_live() {
            break;
        }
        let Some(sample) = store.snapshot().my_location else {
            continue;
        };
        if let Err(e) = feed.share_location(&sample).await {
            warn!("Failed to share own location: {}", e);
        }
    }
}
