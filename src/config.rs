use std::net::SocketAddr;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use snafu::ResultExt as _;

use crate::auth::Authenticator;
use crate::database::DatabaseConfig;
use crate::error::{ApplicationError, ConfigLoadSnafu};
use crate::service::RecorderPolicy;

/// Process configuration, read from environment variables (and `.env`).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address")]
    pub host: SocketAddr,
    #[serde(flatten)]
    pub database: DatabaseConfig,

    pub jwt_secret: SecretString,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "one_hour", deserialize_with = "human_duration")]
    pub owner_view_cooldown: chrono::Duration,
    #[serde(default = "default_repeat_limit")]
    pub abuse_repeat_limit: u32,
    #[serde(default = "one_hour", deserialize_with = "human_duration")]
    pub abuse_window: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.jwt_secret.clone())
    }

    pub fn policy(&self) -> RecorderPolicy {
        RecorderPolicy {
            owner_cooldown: self.owner_view_cooldown,
            repeat_limit: self.abuse_repeat_limit,
            abuse_window: self.abuse_window,
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn one_hour() -> chrono::Duration {
    chrono::Duration::hours(1)
}

fn default_repeat_limit() -> u32 {
    RecorderPolicy::default().repeat_limit
}

/// Accepts durations such as `45m` or `1h 30m`.
fn human_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<chrono::Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    let duration = humantime::parse_duration(&text).map_err(serde::de::Error::custom)?;
    chrono::Duration::from_std(duration).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret as _;

    use super::*;

    fn vars(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let base = [
            ("HOST_ADDRESS", "127.0.0.1:8080"),
            ("SURREAL_URL", "mem://"),
            ("SURREAL_NS", "listings"),
            ("SURREAL_DB", "views"),
            ("JWT_SECRET", "hunter2"),
        ];

        base.iter()
            .chain(extra)
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_the_recorder_policy() {
        let config: Config = envy::from_iter(vars(&[])).unwrap();

        assert_eq!(config.host, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.database.namespace, "listings");
        assert_eq!(config.database.username, None);
        assert_eq!(config.jwt_secret.expose_secret(), "hunter2");
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.policy(), RecorderPolicy::default());
    }

    #[test]
    fn thresholds_can_be_tuned() {
        let config: Config = envy::from_iter(vars(&[
            ("OWNER_VIEW_COOLDOWN", "30m"),
            ("ABUSE_REPEAT_LIMIT", "9"),
            ("ABUSE_WINDOW", "1day"),
        ]))
        .unwrap();

        let policy = config.policy();
        assert_eq!(policy.owner_cooldown, chrono::Duration::minutes(30));
        assert_eq!(policy.repeat_limit, 9);
        assert_eq!(policy.abuse_window, chrono::Duration::days(1));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let without_secret: Vec<_> = vars(&[])
            .into_iter()
            .filter(|(key, _)| key != "JWT_SECRET")
            .collect();

        assert!(envy::from_iter::<_, Config>(without_secret).is_err());
    }
}
