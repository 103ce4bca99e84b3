use async_trait::async_trait;
use std::sync::Arc;

use super::LocationSample;
use crate::api::{ApiClient, ApiError};
use crate::session::SessionStore;

/// Remote side of location sync
#[async_trait]
pub trait LocationFeed: Send + Sync {
    /// Current locations of every friend of the signed-in user
    async fn friend_locations(&self) -> Result<Vec<LocationSample>, ApiError>;

    /// Publish the signed-in user's own position
    async fn share_location(&self, sample: &LocationSample) -> Result<(), ApiError>;
}

/// [`LocationFeed`] backed by the HTTP API and the current session token
pub struct ApiLocationFeed {
    api: Arc<ApiClient>,
    session: SessionStore,
}

impl ApiLocationFeed {
    pub fn new(api: Arc<ApiClient>, session: SessionStore) -> Self {
        Self { api, session }
    }
}

fn signed_out() -> ApiError {
    ApiError::Unauthorized("not signed in".into())
}

#[async_trait]
impl LocationFeed for ApiLocationFeed {
    async fn friend_locations(&self) -> Result<Vec<LocationSample>, ApiError> {
        let token = self.session.access_token().ok_or_else(signed_out)?;
        self.api.friend_locations(&token).await
    }

    async fn share_location(&self, sample: &LocationSample) -> Result<(), ApiError> {
        let session = self.session.current().ok_or_else(signed_out)?;

        // Device fixes carry no identity; stamp the signed-in user.
        let mut sample = sample.clone();
        sample.user_id = session.user.id;

        self.api.post_location(&session.access_token, &sample).await
    }
}
