//! User delivery profile: recipient, timezone and channel preferences.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::config::ProfileConfig;
use super::rule::RuleId;
use super::task::{Priority, WorkerType};
use crate::domain::errors::{DomainError, DomainResult};

/// Destination for an alert (a chat channel, `dm`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryChannel(String);

impl DeliveryChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message handed to an alert sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub worker_type: WorkerType,
    /// Rule that fired; `None` for digests.
    pub rule_id: Option<RuleId>,
    pub priority: Priority,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Parse `UTC`, `Z`, `+05:30`, `-0800` or `UTC+02:00` into a fixed offset.
pub fn parse_utc_offset(tz: &str) -> Option<FixedOffset> {
    let tz = tz.trim();
    let upper = tz.to_uppercase();
    if matches!(upper.as_str(), "UTC" | "Z" | "GMT") {
        return FixedOffset::east_opt(0);
    }
    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);
    let (sign, digits) = match rest.chars().next()? {
        '+' => (1, &rest[1..]),
        '-' => (-1, &rest[1..]),
        _ => return None,
    };
    if !digits.chars().all(|c| c.is_ascii_digit() || c == ':') {
        return None;
    }
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Delivery preferences for the single user of the system.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub recipient: String,
    pub timezone: String,
    offset: FixedOffset,
    channels: HashMap<Priority, DeliveryChannel>,
    default_channel: DeliveryChannel,
}

impl UserProfile {
    pub fn new(recipient: impl Into<String>, timezone: &str) -> DomainResult<Self> {
        let offset = parse_utc_offset(timezone)
            .ok_or_else(|| DomainError::InvalidTimezone(timezone.to_string()))?;
        Ok(Self {
            recipient: recipient.into(),
            timezone: timezone.to_string(),
            offset,
            channels: HashMap::new(),
            default_channel: DeliveryChannel::new(ProfileConfig::DEFAULT_CHANNEL),
        })
    }

    pub fn from_config(config: &ProfileConfig) -> DomainResult<Self> {
        let mut profile =
            Self::new(config.recipient.clone(), &config.timezone)?.with_default_channel(
                DeliveryChannel::new(config.default_channel.clone()),
            );
        for (priority, channel) in config.channels.entries() {
            profile = profile.with_channel(priority, DeliveryChannel::new(channel));
        }
        Ok(profile)
    }

    #[must_use]
    pub fn with_channel(mut self, priority: Priority, channel: DeliveryChannel) -> Self {
        self.channels.insert(priority, channel);
        self
    }

    #[must_use]
    pub fn with_default_channel(mut self, channel: DeliveryChannel) -> Self {
        self.default_channel = channel;
        self
    }

    pub fn channel_for(&self, priority: Priority) -> Option<&DeliveryChannel> {
        self.channels.get(&priority)
    }

    pub const fn default_channel(&self) -> &DeliveryChannel {
        &self.default_channel
    }

    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_time(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.offset)
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            recipient: ProfileConfig::DEFAULT_RECIPIENT.to_string(),
            timezone: "UTC".to_string(),
            offset: Utc.fix(),
            channels: HashMap::new(),
            default_channel: DeliveryChannel::new(ProfileConfig::DEFAULT_CHANNEL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parse_offsets() {
        assert_eq!(parse_utc_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19800);
        assert_eq!(parse_utc_offset("-0800").unwrap().local_minus_utc(), -28800);
        assert_eq!(parse_utc_offset("UTC+2").unwrap().local_minus_utc(), 7200);
        assert!(parse_utc_offset("Mars/Olympus").is_none());
        assert!(parse_utc_offset("+25:00").is_none());
    }

    #[test]
    fn test_non_ascii_offsets_rejected() {
        assert!(parse_utc_offset("+1é1").is_none());
        assert!(parse_utc_offset("-٠٥٣٠").is_none());
        assert!(parse_utc_offset("UTC+０２").is_none());
        assert!(parse_utc_offset("++0530").is_none());
    }

    #[test]
    fn test_local_time_applies_offset() {
        let profile = UserProfile::new("@ops", "+02:00").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 22, 30, 0).unwrap();
        assert_eq!(profile.local_time(now).hour(), 0);
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        assert!(matches!(
            UserProfile::new("@ops", "Nowhere"),
            Err(DomainError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_from_config_uses_channel_table() {
        let profile = UserProfile::from_config(&ProfileConfig::default()).unwrap();
        assert_eq!(
            profile.channel_for(Priority::Critical).map(DeliveryChannel::as_str),
            Some("#breaking-alerts")
        );
        assert_eq!(profile.channel_for(Priority::High).map(DeliveryChannel::as_str), Some("dm"));
        assert_eq!(profile.default_channel().as_str(), ProfileConfig::DEFAULT_CHANNEL);
    }
}
