//! Timeout and polling settings for settle
//!
//! Every mutating resource operation waits for the remote object to converge,
//! and every wait must be bounded. The bounds live here so that operators can
//! tune them per operation without touching resource code.

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILE: &str = "settle.yaml";
const SETTINGS_DIR: &str = ".settle";
const CONFIG_PATH_ENV: &str = "SETTLE_CONFIG_PATH";

/// Longest accepted timeout or poll interval (30 days)
pub const MAX_SECS: u64 = 30 * 24 * 60 * 60;

/// Operation timeout overrides, in seconds.
const TIMEOUT_ENV: [(&str, Phase); 4] = [
    ("SETTLE_TIMEOUT_CREATE", Phase::Create),
    ("SETTLE_TIMEOUT_READ", Phase::Read),
    ("SETTLE_TIMEOUT_UPDATE", Phase::Update),
    ("SETTLE_TIMEOUT_DELETE", Phase::Delete),
];

/// Lifecycle phase a timeout applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Read,
    Update,
    Delete,
}

/// Top-level settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timeouts: Timeouts,
    pub polling: PollingDefaults,
}

/// Upper bound on each operation, including its convergence wait
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub create_secs: u64,
    pub read_secs: u64,
    pub update_secs: u64,
    pub delete_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_secs: 30 * 60,
            read_secs: 5 * 60,
            update_secs: 30 * 60,
            delete_secs: 30 * 60,
        }
    }
}

impl Timeouts {
    pub fn for_phase(&self, phase: Phase) -> Duration {
        let secs = match phase {
            Phase::Create => self.create_secs,
            Phase::Read => self.read_secs,
            Phase::Update => self.update_secs,
            Phase::Delete => self.delete_secs,
        };
        Duration::from_secs(secs)
    }

    fn set(&mut self, phase: Phase, secs: u64) {
        match phase {
            Phase::Create => self.create_secs = secs,
            Phase::Read => self.read_secs = secs,
            Phase::Update => self.update_secs = secs,
            Phase::Delete => self.delete_secs = secs,
        }
    }
}

/// Poll spacing used when a resource does not pick its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingDefaults {
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
}

impl Default for PollingDefaults {
    fn default() -> Self {
        Self {
            min_interval_secs: 10,
            max_interval_secs: 60,
        }
    }
}

impl PollingDefaults {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }
}

impl Settings {
    /// Load settings from the discovered file (or defaults) and apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match find_settings_file() {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::debug!("No settings file found, using defaults");
                Self::default()
            }
        };
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        for (name, phase) in TIMEOUT_ENV {
            if let Ok(value) = std::env::var(name) {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidEnvValue {
                        name: name.to_string(),
                        value: value.clone(),
                    })?;
                self.timeouts.set(phase, secs);
            }
        }
        Ok(())
    }

    /// Zero timeouts would turn every wait into an immediate failure, and a
    /// zero poll interval into a busy loop. Values above `MAX_SECS` are
    /// rejected so deadlines stay representable.
    pub fn validate(&self) -> Result<()> {
        let t = &self.timeouts;
        let timeouts = [t.create_secs, t.read_secs, t.update_secs, t.delete_secs];
        if timeouts.contains(&0) {
            return Err(ConfigError::Invalid(
                "operation timeouts must be greater than zero".to_string(),
            ));
        }
        if timeouts.iter().any(|&secs| secs > MAX_SECS) {
            return Err(ConfigError::Invalid(format!(
                "operation timeouts must not exceed {} seconds",
                MAX_SECS
            )));
        }
        if self.polling.max_interval_secs > MAX_SECS {
            return Err(ConfigError::Invalid(format!(
                "polling.max_interval_secs must not exceed {} seconds",
                MAX_SECS
            )));
        }
        if self.polling.min_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "polling.min_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.polling.max_interval_secs < self.polling.min_interval_secs {
            return Err(ConfigError::Invalid(
                "polling.max_interval_secs must not be below min_interval_secs".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the settings file
///
/// Search order:
/// 1. `SETTLE_CONFIG_PATH`
/// 2. `./settle.yaml`
/// 3. `./.settle/settle.yaml`
/// 4. `~/.config/settle/settle.yaml`
pub fn find_settings_file() -> Option<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(
            "{} points at {}, which does not exist",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let path = current_dir.join(SETTINGS_FILE);
        if path.exists() {
            return Some(path);
        }

        let path = current_dir.join(SETTINGS_DIR).join(SETTINGS_FILE);
        if path.exists() {
            return Some(path);
        }
    }

    let global = dirs::config_dir()?.join("settle").join(SETTINGS_FILE);
    global.exists().then_some(global)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(
            settings.timeouts.for_phase(Phase::Create),
            Duration::from_secs(1800)
        );
        assert_eq!(
            settings.timeouts.for_phase(Phase::Read),
            Duration::from_secs(300)
        );
        assert_eq!(settings.polling.min_interval(), Duration::from_secs(10));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settle.yaml");
        fs::write(&path, "timeouts:\n  delete_secs: 120\n").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.timeouts.delete_secs, 120);
        assert_eq!(settings.timeouts.create_secs, 1800);
        assert_eq!(settings.polling, PollingDefaults::default());
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settle.yaml");
        fs::write(&path, "timeouts: [not, a, map]\n").unwrap();

        let err = Settings::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("settle.yaml"));
    }

    #[test]
    fn test_validate_rejects_zero() {
        let mut settings = Settings::default();
        settings.timeouts.update_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.polling.min_interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.polling.max_interval_secs = 5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut settings = Settings::default();
        settings.timeouts.create_secs = u64::MAX;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

        settings.timeouts.create_secs = MAX_SECS;
        assert!(settings.validate().is_ok());

        let mut settings = Settings::default();
        settings.polling.max_interval_secs = MAX_SECS + 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_env_override_out_of_range() {
        temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, None),
                ("SETTLE_TIMEOUT_CREATE", Some("18446744073709551615")),
            ],
            || {
                let err = Settings::load().unwrap_err();
                assert!(matches!(err, ConfigError::Invalid(_)));
            },
        );
    }

    #[test]
    #[serial]
    fn test_env_path_and_override() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "timeouts:\n  create_secs: 600\n").unwrap();

        temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, Some(path.to_str().unwrap())),
                ("SETTLE_TIMEOUT_CREATE", None),
                ("SETTLE_TIMEOUT_DELETE", Some("90")),
            ],
            || {
                let settings = Settings::load().unwrap();
                assert_eq!(settings.timeouts.create_secs, 600);
                assert_eq!(settings.timeouts.delete_secs, 90);
            },
        );
    }

    #[test]
    #[serial]
    fn test_env_override_must_be_numeric() {
        temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, None),
                ("SETTLE_TIMEOUT_READ", Some("5m")),
            ],
            || {
                let err = Settings::load().unwrap_err();
                assert!(matches!(err, ConfigError::InvalidEnvValue { .. }));
            },
        );
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_settle_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let dir = temp_dir.path().join(SETTINGS_DIR);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(SETTINGS_FILE), "polling:\n  min_interval_secs: 3\n").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let found = temp_env::with_var_unset(CONFIG_PATH_ENV, find_settings_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(found.unwrap().ends_with(".settle/settle.yaml"));
    }
}
