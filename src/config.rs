use std::{env, path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;

pub const DEFAULT_STORAGE_KEY: &str = "habit-tracker-data";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub sync_interval: Duration,
    pub backup_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("data"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            sync_interval: Duration::from_millis(1000),
            backup_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            data_dir: lookup("APP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            storage_key: lookup("APP_STORAGE_KEY")
                .filter(|key| !key.trim().is_empty())
                .unwrap_or(defaults.storage_key),
            sync_interval: parsed(&lookup, "APP_SYNC_INTERVAL_MS")
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.sync_interval),
            backup_dir: lookup("APP_BACKUP_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring invalid {name}={raw:?}, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset_or_invalid() {
        let vars: HashMap<&str, &str> = [("PORT", "eighty"), ("APP_SYNC_INTERVAL_MS", "0")].into();
        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.port, 8080);
        assert_eq!(config.sync_interval, Duration::from_millis(1000));
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert!(config.backup_dir.is_none());
    }

    #[test]
    fn reads_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "9000"),
            ("APP_DATA_DIR", "/tmp/habits"),
            ("APP_STORAGE_KEY", "mine"),
            ("APP_SYNC_INTERVAL_MS", "250"),
            ("APP_BACKUP_DIR", "/mnt/dav"),
        ]
        .into();
        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/habits"));
        assert_eq!(config.storage_key, "mine");
        assert_eq!(config.sync_interval, Duration::from_millis(250));
        assert_eq!(config.backup_dir, Some(PathBuf::from("/mnt/dav")));
    }
}
