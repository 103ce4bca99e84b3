//! Location Module
//!
//! Keeps "my location" and "friends' locations" fresh for the map view.

mod feed;
mod poller;
mod sample;
mod source;
mod store;

pub use feed::{ApiLocationFeed, LocationFeed};
pub use poller::{ApplyOrder, LocationPoller, MountStatus, MountedPoller, PollerConfig};
pub use sample::{FriendsLocationSet, LocationSample};
pub use source::{PermissionStatus, PositionSource, PositionWatch, StaticPositionSource, Subscription};
pub use store::{LocationState, LocationStore, StoreWriter};

/// Location errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}
