//! Chain configuration: local directory, retry policy, sync interval.
//!
//! Read from the `persist:` section of the YAML config file, then overridden
//! by environment variables:
//! - `RAT_LOCAL_DIR` (default: `.rat-local`)
//! - `RAT_RETRY_ATTEMPTS` (default: 2)
//! - `RAT_RETRY_DELAY_MS` (default: 500)
//! - `RAT_ATTEMPT_TIMEOUT_SECS` (default: 15)
//! - `RAT_SYNC_INTERVAL_SECS` (default: 30)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rat_client::ConfigError;
use serde::Deserialize;

use crate::local::DEFAULT_LOCAL_DIR;
use crate::retry::{
    RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS,
};
use crate::sync::DEFAULT_SYNC_INTERVAL_SECS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistConfig {
    pub local_dir: PathBuf,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub attempt_timeout: Duration,
    pub sync_interval: Duration,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from(DEFAULT_LOCAL_DIR),
            retry_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
        }
    }
}

/// On-disk shape of the `persist` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPersistConfig {
    pub local_dir: Option<PathBuf>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub attempt_timeout_secs: Option<u64>,
    pub sync_interval_secs: Option<u64>,
}

impl RawPersistConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct File {
            #[serde(default)]
            persist: RawPersistConfig,
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        let file: File = serde_yaml::from_str(&text)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))?;
        Ok(file.persist)
    }
}

impl PersistConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(RawPersistConfig::default(), |k| std::env::var(k).ok())
    }

    pub fn resolve(
        file: RawPersistConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let local_dir = lookup("RAT_LOCAL_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or(file.local_dir)
            .unwrap_or(defaults.local_dir);

        let retry_attempts = number(&lookup, "RAT_RETRY_ATTEMPTS", file.retry_attempts)?
            .unwrap_or(defaults.retry_attempts);
        let retry_delay = number(&lookup, "RAT_RETRY_DELAY_MS", file.retry_delay_ms)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_delay);
        let attempt_timeout =
            number(&lookup, "RAT_ATTEMPT_TIMEOUT_SECS", file.attempt_timeout_secs)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.attempt_timeout);
        let sync_interval = number(&lookup, "RAT_SYNC_INTERVAL_SECS", file.sync_interval_secs)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.sync_interval);

        if retry_attempts == 0 {
            return Err(ConfigError::InvalidNumber(
                "RAT_RETRY_ATTEMPTS".into(),
                "0".into(),
            ));
        }
        if sync_interval.is_zero() {
            return Err(ConfigError::InvalidNumber(
                "RAT_SYNC_INTERVAL_SECS".into(),
                "0".into(),
            ));
        }

        Ok(Self {
            local_dir,
            retry_attempts,
            retry_delay,
            attempt_timeout,
            sync_interval,
        })
    }

    /// Retry policy applied to every remote tier.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.retry_attempts, self.retry_delay)
            .with_attempt_timeout(self.attempt_timeout)
    }
}

fn number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    from_file: Option<T>,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber(var.to_string(), raw)),
        None => Ok(from_file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let cfg = PersistConfig::resolve(RawPersistConfig::default(), env(&[])).unwrap();
        assert_eq!(cfg, PersistConfig::default());
        assert_eq!(cfg.local_dir, PathBuf::from(".rat-local"));
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn env_overrides_file() {
        let file = RawPersistConfig {
            local_dir: Some("/var/lib/rat".into()),
            retry_attempts: Some(4),
            ..RawPersistConfig::default()
        };
        let cfg = PersistConfig::resolve(
            file,
            env(&[("RAT_RETRY_ATTEMPTS", "3"), ("RAT_SYNC_INTERVAL_SECS", "5")]),
        )
        .unwrap();
        assert_eq!(cfg.local_dir, PathBuf::from("/var/lib/rat"));
        assert_eq!(cfg.retry_attempts, 3);
        assert_eq!(cfg.sync_interval, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = PersistConfig::resolve(
            RawPersistConfig::default(),
            env(&[("RAT_RETRY_DELAY_MS", "soon")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("RAT_RETRY_DELAY_MS"));

        assert!(PersistConfig::resolve(
            RawPersistConfig::default(),
            env(&[("RAT_RETRY_ATTEMPTS", "0")]),
        )
        .is_err());
    }

    #[test]
    fn rejects_zero_sync_interval() {
        let err = PersistConfig::resolve(
            RawPersistConfig::default(),
            env(&[("RAT_SYNC_INTERVAL_SECS", "0")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("RAT_SYNC_INTERVAL_SECS"));

        let file = RawPersistConfig {
            sync_interval_secs: Some(0),
            ..RawPersistConfig::default()
        };
        assert!(PersistConfig::resolve(file, env(&[])).is_err());
    }

    #[test]
    fn reads_persist_section_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rat.yaml");
        std::fs::write(
            &path,
            "remote:\n  backend_url: http://localhost:8091\npersist:\n  local_dir: /tmp/rat\n  retry_delay_ms: 50\n",
        )
        .unwrap();
        let raw = RawPersistConfig::from_yaml_file(&path).unwrap();
        assert_eq!(raw.local_dir, Some(PathBuf::from("/tmp/rat")));
        assert_eq!(raw.retry_delay_ms, Some(50));
    }
}
