//! App-wide preferences and connectivity flag.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Vi,
    En,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub theme: ThemePreference,
    pub language: Language,
    pub is_online: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: ThemePreference::Auto,
            language: Language::Vi,
            is_online: true,
        }
    }
}

#[derive(Clone)]
pub struct SettingsStore {
    tx: Arc<watch::Sender<AppSettings>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AppSettings::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> AppSettings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppSettings> {
        self.tx.subscribe()
    }

    pub fn set_theme(&self, theme: ThemePreference) {
        self.update(|s| std::mem::replace(&mut s.theme, theme) != theme);
    }

    pub fn set_language(&self, language: Language) {
        self.update(|s| std::mem::replace(&mut s.language, language) != language);
    }

    pub fn set_online_status(&self, is_online: bool) {
        if self.update(|s| std::mem::replace(&mut s.is_online, is_online) != is_online) {
            debug!("Connectivity changed: online={}", is_online);
        }
    }

    // Subscribers only wake for actual changes.
    fn update(&self, modify: impl FnOnce(&mut AppSettings) -> bool) -> bool {
        self.tx.send_if_modified(modify)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}
