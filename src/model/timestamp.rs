use chrono::{DateTime, Duration, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

pub fn now() -> Timestamp {
    Utc::now().into()
}

/// A UTC instant that is stored as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, new)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Whether `self` lies strictly less than `window` before `now`.
    pub fn is_within(self, window: Duration, now: Timestamp) -> bool {
        now - self < window
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl std::ops::Deref for Timestamp {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.to_rfc3339().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| Self(dt.into()))
            .map_err(serde::de::Error::custom)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self(self.0 - rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_window_is_exclusive() {
        let now = now();
        let window = Duration::hours(1);

        assert!((now - Duration::minutes(59)).is_within(window, now));
        assert!(!(now - Duration::hours(1)).is_within(window, now));
        assert!(!(now - Duration::days(1)).is_within(window, now));
    }

    #[test]
    fn serializes_as_rfc3339() {
        let timestamp = now();
        let json = serde_json::to_string(&timestamp).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();

        assert_eq!(json, format!("\"{}\"", timestamp));
        assert_eq!(back, timestamp);
    }
}
