//! Runtime configuration: operating mode, timeouts, retries and per-provider
//! settings.
//!
//! ```yaml
//! mode: live
//! provider_timeout: 20s
//! retry_attempts: 2
//! backoff_step: 300ms
//! providers:
//!   claude:
//!     endpoint: https://factcheck.example.org/v1/claude
//!     api_key_env: CLAUDE_API_KEY
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Where provider answers come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Deterministic offline mocks
    #[default]
    Mock,
    /// Real backends built from the per-provider config
    Live,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Mock => write!(f, "mock"),
            Mode::Live => write!(f, "live"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Mode::Mock),
            "live" => Ok(Mode::Live),
            other => Err(format!("unknown mode '{}', expected mock or live", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub mode: Mode,

    /// Upper bound on one provider attempt
    #[serde(with = "duration_human")]
    pub provider_timeout: Duration,

    /// Retries after the first attempt, for transient errors only
    pub retry_attempts: usize,

    /// Linear backoff step: the n-th retry waits `backoff_step × n`
    #[serde(with = "duration_human")]
    pub backoff_step: Duration,

    /// Per-provider settings keyed by provider id
    pub providers: BTreeMap<String, JsonValue>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Mock,
            provider_timeout: Duration::from_secs(20),
            retry_attempts: 2,
            backoff_step: Duration::from_millis(300),
            providers: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.mode, Mode::Mock);
        assert_eq!(config.provider_timeout, Duration::from_secs(20));
        assert_eq!(config.retry_attempts, 2);
        assert_eq!(config.backoff_step, Duration::from_millis(300));
    }

    #[test]
    fn test_human_durations() {
        let config = RuntimeConfig::from_yaml(
            r#"
mode: live
provider_timeout: 1m 30s
backoff_step: 250ms
providers:
  claude:
    endpoint: https://factcheck.example.org/v1/claude
"#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Live);
        assert_eq!(config.provider_timeout, Duration::from_secs(90));
        assert_eq!(config.backoff_step, Duration::from_millis(250));
        assert_eq!(config.retry_attempts, 2);
        assert_eq!(
            config.providers["claude"]["endpoint"],
            "https://factcheck.example.org/v1/claude"
        );
    }

    #[test]
    fn test_bad_duration_rejected() {
        assert!(RuntimeConfig::from_yaml("provider_timeout: soon").is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("LIVE".parse::<Mode>().unwrap(), Mode::Live);
        assert_eq!(Mode::Mock.to_string(), "mock");
        assert!("offline".parse::<Mode>().is_err());
    }
}
