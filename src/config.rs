//! Configuration loaded from `claimdesk.toml`.
//!
//! [`ClaimdeskConfig`] holds every tunable. Missing keys fall back to the
//! defaults below. `CLAIMDESK_STATE_DIR` takes precedence over the file for
//! the state directory.

use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimdeskConfig {
    /// Denial code whose claims form the work queue.
    #[serde(default = "default_target_denial_code")]
    pub target_denial_code: String,

    /// RARC attached to every workflow projection.
    #[serde(default = "default_rarc_code")]
    pub rarc_code: String,

    /// Directory holding the session snapshot.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Multiplier applied to every simulated delay. 0 disables delays.
    #[serde(default = "default_delay_scale")]
    pub delay_scale: f64,

    /// Give rows without a denial code the target code instead of leaving
    /// them unclassified.
    #[serde(default)]
    pub default_unclassified_to_target: bool,

    #[serde(default)]
    pub submission: SubmissionConfig,
}

/// Payer upload retry policy.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionConfig {
    /// Upload attempts before the claim is handed to manual flow.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Failure probability per attempt; the last value covers later attempts.
    #[serde(default = "default_failure_probabilities")]
    pub failure_probabilities: Vec<f64>,
}

fn default_target_denial_code() -> String {
    "CO252".to_string()
}

fn default_rarc_code() -> String {
    "M127".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".claimdesk")
}

fn default_delay_scale() -> f64 {
    1.0
}

fn default_max_attempts() -> u32 {
    2
}

fn default_failure_probabilities() -> Vec<f64> {
    vec![0.3, 0.2]
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            failure_probabilities: default_failure_probabilities(),
        }
    }
}

impl Default for ClaimdeskConfig {
    fn default() -> Self {
        Self {
            target_denial_code: default_target_denial_code(),
            rarc_code: default_rarc_code(),
            state_dir: default_state_dir(),
            delay_scale: default_delay_scale(),
            default_unclassified_to_target: false,
            submission: SubmissionConfig::default(),
        }
    }
}

impl ClaimdeskConfig {
    /// Loads `claimdesk.toml` from the current directory, or defaults when
    /// the file is absent.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_path(Path::new("claimdesk.toml"))?;

        // The environment variable wins over the file for the state directory.
        if let Ok(dir) = std::env::var("CLAIMDESK_STATE_DIR")
            && !dir.is_empty()
        {
            config.state_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<ClaimdeskConfig>(&contents)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.target_denial_code.trim().is_empty() {
            bail!("target_denial_code must not be empty");
        }
        if self.submission.max_attempts == 0 {
            bail!("submission.max_attempts must be at least 1");
        }
        if let Some(p) = self
            .submission
            .failure_probabilities
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            bail!("failure probability {p} is outside 0.0..=1.0");
        }
        if !self.delay_scale.is_finite() || self.delay_scale < 0.0 {
            bail!("delay_scale must be a non-negative number");
        }
        Ok(())
    }

    /// The denial code given to rows that have none, if enabled.
    pub fn unclassified_fallback(&self) -> Option<&str> {
        self.default_unclassified_to_target
            .then_some(self.target_denial_code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = ClaimdeskConfig::default();
        assert_eq!(config.target_denial_code, "CO252");
        assert_eq!(config.rarc_code, "M127");
        assert_eq!(config.state_dir, PathBuf::from(".claimdesk"));
        assert_eq!(config.submission.max_attempts, 2);
        assert_eq!(config.submission.failure_probabilities, vec![0.3, 0.2]);
        assert!(config.unclassified_fallback().is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            target_denial_code = "CO16"
            default_unclassified_to_target = true

            [submission]
            max_attempts = 3
        "#;
        let config: ClaimdeskConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.target_denial_code, "CO16");
        assert_eq!(config.unclassified_fallback(), Some("CO16"));
        assert_eq!(config.submission.max_attempts, 3);
        assert_eq!(config.submission.failure_probabilities, vec![0.3, 0.2]);
        assert_eq!(config.delay_scale, 1.0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClaimdeskConfig::from_path(&dir.path().join("claimdesk.toml")).unwrap();
        assert_eq!(config.submission.max_attempts, 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claimdesk.toml");

        std::fs::write(&path, "[submission]\nfailure_probabilities = [1.5]\n").unwrap();
        assert!(ClaimdeskConfig::from_path(&path).is_err());

        std::fs::write(&path, "[submission]\nmax_attempts = 0\n").unwrap();
        assert!(ClaimdeskConfig::from_path(&path).is_err());

        std::fs::write(&path, "delay_scale = -1.0\n").unwrap();
        assert!(ClaimdeskConfig::from_path(&path).is_err());
    }
}
