//! Environment-driven client configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;

use curia_observability::LogFormat;

pub const DATA_DIR_VAR: &str = "CURIA_DATA_DIR";
pub const LOG_FORMAT_VAR: &str = "CURIA_LOG_FORMAT";

const APP_DIR: &str = "curia";
const SESSION_DB: &str = "session.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Directory holding the session database.
    pub data_dir: PathBuf,
    pub log_format: LogFormat,
    /// Problems found while reading the environment; defaults were used instead.
    ///
    /// Collected rather than logged because logging is configured from this
    /// very struct.
    pub warnings: Vec<String>,
}

impl ClientConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup` (environment stand-in).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut warnings = Vec::new();

        let data_dir = match lookup(DATA_DIR_VAR) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
            Some(_) => {
                warnings.push(format!("{DATA_DIR_VAR} is empty; using the default data directory"));
                default_data_dir()?
            }
            None => default_data_dir()?,
        };

        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                warnings.push(format!("{LOG_FORMAT_VAR}: {err}; using {}", LogFormat::default()));
                LogFormat::default()
            }),
            None => LogFormat::default(),
        };

        Ok(Self {
            data_dir,
            log_format,
            warnings,
        })
    }

    pub fn session_db_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_DB)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// OS app-data directory for curia, falling back to `~/.local/share/curia`.
pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut home| {
                home.push(".local");
                home.push("share");
                home
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    Ok(base.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn explicit_values_are_used() {
        let config = ClientConfig::from_lookup(lookup(&[
            (DATA_DIR_VAR, "/var/lib/curia"),
            (LOG_FORMAT_VAR, "pretty"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/curia"));
        assert_eq!(config.session_db_path(), PathBuf::from("/var/lib/curia/session.db"));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn invalid_log_format_falls_back_with_a_warning() {
        let config = ClientConfig::from_lookup(lookup(&[
            (DATA_DIR_VAR, "/tmp/curia"),
            (LOG_FORMAT_VAR, "xml"),
        ]))
        .unwrap();

        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("xml"));
    }

    #[test]
    fn defaults_end_in_the_app_directory() {
        let Ok(config) = ClientConfig::from_lookup(lookup(&[])) else {
            // No resolvable home on this machine; nothing to assert.
            return;
        };
        assert!(config.data_dir.ends_with(APP_DIR));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_data_dir_is_reported() {
        let Ok(config) = ClientConfig::from_lookup(lookup(&[(DATA_DIR_VAR, "   ")])) else {
            return;
        };
        assert!(config.data_dir.ends_with(APP_DIR));
        assert_eq!(config.warnings.len(), 1);
    }
}
