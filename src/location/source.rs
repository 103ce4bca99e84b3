//! Device position source and its cancellable subscription handle.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{LocationError, LocationSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Explicit handle for a device-level listener.
///
/// The cancel hook runs exactly once: on `cancel()` or when the handle drops.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Continuous position updates plus the handle that stops them
pub struct PositionWatch {
    pub updates: mpsc::UnboundedReceiver<LocationSample>,
    pub subscription: Subscription,
}

/// Device GPS subsystem
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn current_position(&self) -> Result<LocationSample, LocationError>;

    fn watch_position(&self) -> Result<PositionWatch, LocationError>;
}

/// Fixed position for hosts without a GPS receiver
pub struct StaticPositionSource {
    sample: LocationSample,
}

impl StaticPositionSource {
    pub fn new(sample: LocationSample) -> Self {
        Self { sample }
    }
}

#[async_trait]
impl PositionSource for StaticPositionSource {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_position(&self) -> Result<LocationSample, LocationError> {
        if !self.sample.has_valid_coordinates() {
            return Err(LocationError::Unavailable(format!(
                "invalid coordinates {}, {}",
                self.sample.latitude, self.sample.longitude
            )));
        }
        let mut sample = self.sample.clone();
        sample.timestamp = chrono::Utc::now();
        Ok(sample)
    }

    fn watch_position(&self) -> Result<PositionWatch, LocationError> {
        // A fixed device never moves, so the stream stays silent until cancelled.
        let (tx, updates) = mpsc::unbounded_channel();
        let subscription = Subscription::new(move || {
            drop(tx);
            debug!("Static position watch released");
        });
        Ok(PositionWatch {
            updates,
            subscription,
        })
    }
}
