//! MAPIC Client - Headless Entry Point
//!
//! Restores or creates a session, then keeps the location state in sync
//! until interrupted.

use anyhow::{bail, Context};
use std::sync::Arc;
use tracing::{info, warn};

use mapic_client_lib::{
    config::Config,
    location::{LocationSample, StaticPositionSource},
    logging, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    logging::init(&config);
    info!("MAPIC client starting against {}", config.api_base_url);

    let state = AppState::new(config).context("failed to initialise client state")?;

    if state.session.restore()?.is_none() {
        let (Ok(email), Ok(password)) = (
            std::env::var("MAPIC_EMAIL"),
            std::env::var("MAPIC_PASSWORD"),
        ) else {
            bail!("no stored session; set MAPIC_EMAIL and MAPIC_PASSWORD to sign in");
        };
        let session = state.auth().login(&email, &password).await?;
        info!("Signed in as {}", session.user.full_name);
    }

    let device = device_position()?;
    let poller = state.location_poller(Arc::new(StaticPositionSource::new(device)));
    let mounted = poller.mount().await;

    if !mounted.is_running() {
        let error = state.locations.snapshot().error.unwrap_or_default();
        bail!("location sync could not start: {}", error);
    }

    let mut updates = state.locations.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                info!("{} friends on the map", snapshot.friends.len());
                for friend in snapshot.friends.iter() {
                    info!(
                        "  {} at {:.5}, {:.5}",
                        friend.user_id, friend.latitude, friend.longitude
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    mounted.unmount();
    Ok(())
}

fn device_position() -> anyhow::Result<LocationSample> {
    let read = |key: &str| -> anyhow::Result<f64> {
        let raw = std::env::var(key).with_context(|| format!("{} is not set", key))?;
        raw.trim()
            .parse()
            .with_context(|| format!("{} is not a number: {}", key, raw))
    };

    let sample = LocationSample::new("device", read("MAPIC_DEVICE_LAT")?, read("MAPIC_DEVICE_LNG")?);
    if !sample.has_valid_coordinates() {
        warn!("Device coordinates out of range");
    }
    Ok(sample)
}
