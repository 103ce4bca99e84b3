use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::string_or_number;

/// One timestamped position reading for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(user_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            user_id: user_id.into(),
            latitude,
            longitude,
            speed: None,
            heading: None,
            status: None,
            timestamp: Utc::now(),
        }
    }

    pub fn has_valid_coordinates(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Latest sample per friend, replaced wholesale on every poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FriendsLocationSet {
    entries: BTreeMap<String, LocationSample>,
}

impl FriendsLocationSet {
    /// Build a set from one response; duplicate users keep their newest sample
    pub fn from_samples(samples: impl IntoIterator<Item = LocationSample>) -> Self {
        let mut entries: BTreeMap<String, LocationSample> = BTreeMap::new();
        for sample in samples {
            match entries.get(&sample.user_id) {
                Some(existing) if existing.timestamp > sample.timestamp => {}
                _ => {
                    entries.insert(sample.user_id.clone(), sample);
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, user_id: &str) -> Option<&LocationSample> {
        self.entries.get(user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocationSample> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(user: &str, secs: i64) -> LocationSample {
        LocationSample {
            timestamp: Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap(),
            ..LocationSample::new(user, 21.03, 105.85)
        }
    }

    #[test]
    fn one_entry_per_user_newest_wins() {
        let set = FriendsLocationSet::from_samples(vec![at("a", 10), at("b", 5), at("a", 3)]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a").unwrap().timestamp, at("a", 10).timestamp);
        assert_eq!(set.user_ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn decodes_server_shape() {
        let sample: LocationSample = serde_json::from_value(json!({
            "userId": 17,
            "latitude": 10.762,
            "longitude": 106.660,
            "speed": 3.5,
            "heading": 270.0,
            "timestamp": "2026-10-15T08:30:00Z"
        }))
        .unwrap();
        assert_eq!(sample.user_id, "17");
        assert_eq!(sample.speed, Some(3.5));
        assert_eq!(sample.status, None);
        assert!(sample.has_valid_coordinates());
    }

    #[test]
    fn missing_timestamp_defaults_to_now() {
        let before = Utc::now();
        let sample: LocationSample = serde_json::from_value(json!({
            "userId": "x",
            "latitude": 0.0,
            "longitude": 0.0
        }))
        .unwrap();
        assert!(sample.timestamp >= before);
    }

    #[test]
    fn out_of_range_coordinates_flagged() {
        assert!(!LocationSample::new("x", 91.0, 0.0).has_valid_coordinates());
        assert!(!LocationSample::new("x", 0.0, f64::NAN).has_valid_coordinates());
    }
}
