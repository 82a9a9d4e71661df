use serde::{Deserialize, Deserializer};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use time::macros::format_description;
use time::{Time, UtcOffset};

use crate::types::alert::AlertKind;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub auth: AuthConfig,
    pub notify: NotifyConfig,
    pub inventory: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub key: String,
    pub token_ttl: time::Duration,
    pub cookie_name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Wall-clock time of day, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime(Time);

impl DailyTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ConfigError> {
        Time::from_hms(hour, minute, 0)
            .map(DailyTime)
            .map_err(|err| ConfigError::Invalid(format!("invalid time of day: {err}")))
    }

    pub fn time(self) -> Time {
        self.0
    }
}

impl FromStr for DailyTime {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Time::parse(value.trim(), format_description!("[hour]:[minute]"))
            .map(DailyTime)
            .map_err(|_| ConfigError::Invalid(format!("invalid time '{value}'; expected HH:MM")))
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl<'de> Deserialize<'de> for DailyTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailMode {
    #[default]
    PerAlert,
    Digest,
}

/// Maps a distance in days to the alert it produces. `message` may contain
/// `{item}`, replaced by the item name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExpiryThreshold {
    pub days: i64,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
}

impl ExpiryThreshold {
    pub fn render_message(&self, item_name: &str) -> String {
        self.message.replace("{item}", item_name)
    }
}

pub fn default_thresholds() -> Vec<ExpiryThreshold> {
    vec![
        ExpiryThreshold {
            days: 3,
            kind: AlertKind::ExpireIn3,
            title: "Expiry approaching".to_string(),
            message: "[{item}] 3 days left".to_string(),
        },
        ExpiryThreshold {
            days: 1,
            kind: AlertKind::ExpireIn1,
            title: "Expiry approaching".to_string(),
            message: "[{item}] tomorrow is the expiry date".to_string(),
        },
        ExpiryThreshold {
            days: 0,
            kind: AlertKind::ExpireToday,
            title: "Expiry day!".to_string(),
            message: "[{item}] today is the expiry date".to_string(),
        },
    ]
}

const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub session_timeout_secs: u64,
    pub session_buffer: usize,
    pub heartbeat_interval_secs: u64,
    pub retention_days: u32,
    pub generator_at: DailyTime,
    pub sweeper_at: DailyTime,
    #[serde(deserialize_with = "deserialize_offset")]
    pub utc_offset: UtcOffset,
    pub email_mode: EmailMode,
    pub mail_from: Option<String>,
    pub thresholds: Vec<ExpiryThreshold>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 600,
            session_buffer: 32,
            heartbeat_interval_secs: 30,
            retention_days: 30,
            generator_at: DailyTime(time::macros::time!(9:00)),
            sweeper_at: DailyTime(time::macros::time!(3:00)),
            utc_offset: UtcOffset::UTC,
            email_mode: EmailMode::PerAlert,
            mail_from: None,
            thresholds: default_thresholds(),
        }
    }
}

impl NotifyConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn retention(&self) -> time::Duration {
        time::Duration::days(i64::from(self.retention_days))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "session_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.session_buffer < 2 {
            return Err(ConfigError::Invalid(
                "session_buffer must hold at least the two initial events".to_string(),
            ));
        }
        if self.retention_days == 0 || self.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "retention_days must be between 1 and {MAX_RETENTION_DAYS}"
            )));
        }
        if self.generator_at == self.sweeper_at {
            return Err(ConfigError::Invalid(format!(
                "generator_at and sweeper_at must differ (both {})",
                self.generator_at
            )));
        }
        if self.thresholds.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one expiry threshold is required".to_string(),
            ));
        }
        for (index, threshold) in self.thresholds.iter().enumerate() {
            if threshold.days < 0 {
                return Err(ConfigError::Invalid(format!(
                    "threshold days must not be negative ({})",
                    threshold.days
                )));
            }
            let earlier = &self.thresholds[..index];
            if earlier.iter().any(|other| other.days == threshold.days) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate threshold for {} days",
                    threshold.days
                )));
            }
            if earlier.iter().any(|other| other.kind == threshold.kind) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate threshold kind {}",
                    threshold.kind
                )));
            }
        }
        if let Some(from) = self.mail_from.as_deref()
            && from.trim().is_empty()
        {
            return Err(ConfigError::Invalid("mail_from cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Contents of the optional `--config` file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bind: Option<SocketAddr>,
    pub inventory: Option<PathBuf>,
    pub notify: NotifyConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let parsed: FileConfig = toml::from_str(contents)?;
        parsed.notify.validate()?;
        Ok(parsed)
    }
}

pub fn parse_utc_offset(raw: &str) -> Result<UtcOffset, ConfigError> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        value,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| ConfigError::Invalid(format!("invalid utc offset '{value}'; expected +HH:MM")))
}

fn deserialize_offset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UtcOffset, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_utc_offset(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
impl AppConfig {
    pub(crate) fn for_tests(key: &str) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            auth: AuthConfig {
                key: key.to_string(),
                token_ttl: time::Duration::hours(1),
                cookie_name: "larder_auth".to_string(),
            },
            notify: NotifyConfig::default(),
            inventory: None,
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use time::macros::offset;

    #[test]
    fn notify_config__should_default_to_documented_values() {
        // When
        let config = NotifyConfig::default();

        // Then
        assert_eq!(config.session_timeout(), Duration::from_secs(600));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.retention(), time::Duration::days(30));
        assert_eq!(config.generator_at.to_string(), "09:00");
        assert_eq!(config.sweeper_at.to_string(), "03:00");
        let days: Vec<_> = config.thresholds.iter().map(|t| t.days).collect();
        assert_eq!(days, vec![3, 1, 0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_config__should_parse_overrides() {
        // Given
        let raw = r#"
bind = "0.0.0.0:8080"

[notify]
heartbeat_interval_secs = 5
generator_at = "07:30"
utc_offset = "+09:00"
email_mode = "digest"
mail_from = "larder@example.com"

[[notify.thresholds]]
days = 2
kind = "EXPIRE_IN_1"
title = "Soon"
message = "{item} in two days"
"#;

        // When
        let config = FileConfig::from_toml_str(raw).expect("parse config");

        // Then
        assert_eq!(config.bind, Some(SocketAddr::from(([0, 0, 0, 0], 8080))));
        assert_eq!(config.notify.heartbeat_interval_secs, 5);
        assert_eq!(config.notify.session_timeout_secs, 600);
        assert_eq!(config.notify.generator_at.to_string(), "07:30");
        assert_eq!(config.notify.utc_offset, offset!(+9));
        assert_eq!(config.notify.email_mode, EmailMode::Digest);
        assert_eq!(config.notify.thresholds.len(), 1);
        assert_eq!(
            config.notify.thresholds[0].render_message("Milk"),
            "Milk in two days"
        );
    }

    #[test]
    fn file_config__should_reject_identical_job_times() {
        // Given
        let raw = r#"
[notify]
generator_at = "03:00"
"#;

        // Then
        assert!(matches!(
            FileConfig::from_toml_str(raw),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn validate__should_reject_duplicate_thresholds() {
        // Given
        let mut config = NotifyConfig::default();
        config.thresholds[1].days = 3;

        // Then
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate__should_bound_retention_days() {
        // Given
        let mut config = NotifyConfig::default();

        // Then
        config.retention_days = 0;
        assert!(config.validate().is_err());
        config.retention_days = u32::MAX;
        assert!(config.validate().is_err());
        config.retention_days = 36_500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn daily_time__should_reject_malformed_values() {
        assert!("9".parse::<DailyTime>().is_err());
        assert!("25:00".parse::<DailyTime>().is_err());
        assert_eq!(
            "06:05".parse::<DailyTime>().expect("parse time"),
            DailyTime::new(6, 5).expect("time")
        );
    }

    #[test]
    fn parse_utc_offset__should_accept_signed_offsets_and_utc() {
        assert_eq!(parse_utc_offset("UTC").expect("utc"), UtcOffset::UTC);
        assert_eq!(parse_utc_offset("-05:30").expect("offset"), offset!(-5:30));
        assert!(parse_utc_offset("9").is_err());
    }
}
