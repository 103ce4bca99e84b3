//! MAPIC Client Library
//!
//! Core modules for the location-sharing client: API access, session,
//! account flows, app settings and live location sync.

pub mod api;
pub mod auth;
pub mod config;
pub mod location;
pub mod logging;
pub mod session;
pub mod settings;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use api::{ApiClient, ApiError};
use auth::AuthService;
use config::Config;
use location::{ApiLocationFeed, LocationPoller, LocationStore, PollerConfig, PositionSource};
use session::SessionStore;
use settings::SettingsStore;
use storage::{FileStorage, KeyValueStore, StorageError};

/// Application state shared across screens
pub struct AppState {
    pub config: Config,
    pub api: Arc<ApiClient>,
    pub session: SessionStore,
    pub settings: SettingsStore,
    pub locations: LocationStore,
}

impl AppState {
    /// Build state backed by file storage under the configured data dir
    pub fn new(config: Config) -> Result<Self, StartupError> {
        let storage = FileStorage::new(config.storage_dir())?;
        Self::with_storage(config, Arc::new(storage))
    }

    pub fn with_storage(
        config: Config,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self, StartupError> {
        let api = ApiClient::new(&config.api_base_url, config.request_timeout)?;

        Ok(Self {
            api: Arc::new(api),
            session: SessionStore::new(storage),
            settings: SettingsStore::new(),
            locations: LocationStore::new(),
            config,
        })
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.api.clone(), self.session.clone())
    }

    /// Poller for the map screen, refreshing on session changes
    pub fn location_poller(&self, source: Arc<dyn PositionSource>) -> LocationPoller {
        let feed = Arc::new(ApiLocationFeed::new(self.api.clone(), self.session.clone()));
        LocationPoller::new(
            source,
            feed,
            self.locations.clone(),
            PollerConfig::from_config(&self.config),
        )
        .with_session_changes(self.session.subscribe())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
