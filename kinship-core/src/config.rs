//! Configuration for the Kinship engine.
//!
//! Maps directly to `kinship.toml`. Every field has a default, so an empty
//! file (or no file at all) yields the stock game rules: 15 minute
//! kidnap cooldown, 10% gates, 6 h kidnappings, 24 h arguments.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{KinshipError, Result};

/// Longest accepted kidnap or argument duration: one hundred years.
pub const MAX_DURATION_HOURS: i64 = 24 * 365 * 100;

/// Longest accepted cooldown window: one year.
pub const MAX_WINDOW_MINUTES: i64 = 60 * 24 * 365;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KinshipConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Persistence / database settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Rate limiting.
    #[serde(default)]
    pub cooldown: CooldownConfig,
    /// Kidnap subsystem tuning.
    #[serde(default)]
    pub kidnap: KidnapConfig,
    /// Argument window tuning.
    #[serde(default)]
    pub argument: ArgumentConfig,
    /// Child registry tuning.
    #[serde(default)]
    pub children: ChildrenConfig,
    /// Leaderboard settings.
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    /// Randomness settings.
    #[serde(default)]
    pub chance: ChanceConfig,
}

impl KinshipConfig {
    /// Load configuration from a TOML string and validate it.
    ///
    /// # Errors
    /// Returns [`KinshipError::Config`] if the TOML is invalid or a value is
    /// out of range.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| KinshipError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns [`KinshipError::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            ("kidnap.success_probability", self.kidnap.success_probability),
            ("kidnap.escape_probability", self.kidnap.escape_probability),
            ("children.conception_probability", self.children.conception_probability),
        ];
        for (key, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(KinshipError::Config(format!("{key} must be in [0, 1], got {p}")));
            }
        }

        let durations = [
            ("cooldown.window_minutes", self.cooldown.window_minutes, MAX_WINDOW_MINUTES),
            ("kidnap.duration_hours", self.kidnap.duration_hours, MAX_DURATION_HOURS),
            ("argument.duration_hours", self.argument.duration_hours, MAX_DURATION_HOURS),
        ];
        for (key, v, max) in durations {
            if !(1..=max).contains(&v) {
                return Err(KinshipError::Config(format!("{key} must be in [1, {max}], got {v}")));
            }
        }

        if self.children.max_name_chars == 0 {
            return Err(KinshipError::Config("children.max_name_chars must be positive".into()));
        }
        if self.leaderboard.limit == 0 {
            return Err(KinshipError::Config("leaderboard.limit must be positive".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level hint for the host's subscriber: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Persistence / database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Use WAL mode for concurrent readers.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_5000")]
    pub busy_timeout_ms: u32,
    /// Number of rotating backups to keep.
    #[serde(default = "default_3")]
    pub backup_count: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal_mode: true,
            busy_timeout_ms: 5000,
            backup_count: 3,
        }
    }
}

/// How cooldown records are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// One record per user: touching any command overwrites the previous
    /// command's record. Harmless while only `kidnap` is rate limited.
    #[default]
    SharedPerUser,
    /// One record per (user, command).
    PerCommand,
}

/// Rate-limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Minutes a rate-limited command stays blocked after use.
    #[serde(default = "default_15")]
    pub window_minutes: i64,
    /// Record keying policy.
    #[serde(default)]
    pub policy: CooldownPolicy,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            window_minutes: 15,
            policy: CooldownPolicy::SharedPerUser,
        }
    }
}

/// Kidnap subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KidnapConfig {
    /// Probability that a kidnap attempt succeeds.
    #[serde(default = "default_0_1")]
    pub success_probability: f64,
    /// Probability that an escape attempt succeeds.
    #[serde(default = "default_0_1")]
    pub escape_probability: f64,
    /// How long a captive is held.
    #[serde(default = "default_6")]
    pub duration_hours: i64,
}

impl Default for KidnapConfig {
    fn default() -> Self {
        Self {
            success_probability: 0.1,
            escape_probability: 0.1,
            duration_hours: 6,
        }
    }
}

/// Argument window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentConfig {
    /// How long an argument lasts unless peace is made.
    #[serde(default = "default_24")]
    pub duration_hours: i64,
}

impl Default for ArgumentConfig {
    fn default() -> Self {
        Self { duration_hours: 24 }
    }
}

/// Child registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildrenConfig {
    /// Probability that `make_love` conceives a child.
    #[serde(default = "default_0_1")]
    pub conception_probability: f64,
    /// Longest accepted child name, in characters.
    #[serde(default = "default_64")]
    pub max_name_chars: usize,
}

impl Default for ChildrenConfig {
    fn default() -> Self {
        Self {
            conception_probability: 0.1,
            max_name_chars: 64,
        }
    }
}

/// Leaderboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Rows returned by the top-marriages and top-kidnappers boards.
    #[serde(default = "default_10")]
    pub limit: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

/// Randomness configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChanceConfig {
    /// Fixed RNG seed. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_db_path() -> PathBuf { PathBuf::from("kinship.db") }
fn default_0_1() -> f64 { 0.1 }
fn default_3() -> u32 { 3 }
fn default_6() -> i64 { 6 }
fn default_10() -> usize { 10 }
fn default_15() -> i64 { 15 }
fn default_24() -> i64 { 24 }
fn default_64() -> usize { 64 }
fn default_5000() -> u32 { 5000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_game_defaults() {
        let config = KinshipConfig::from_toml("").expect("parse");
        assert_eq!(config.cooldown.window_minutes, 15);
        assert_eq!(config.cooldown.policy, CooldownPolicy::SharedPerUser);
        assert!((config.kidnap.success_probability - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.kidnap.duration_hours, 6);
        assert_eq!(config.argument.duration_hours, 24);
        assert_eq!(config.leaderboard.limit, 10);
        assert!(config.chance.seed.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = KinshipConfig::from_toml(
            r#"
            [cooldown]
            policy = "per_command"

            [kidnap]
            duration_hours = 2

            [chance]
            seed = 7
            "#,
        )
        .expect("parse");
        assert_eq!(config.cooldown.policy, CooldownPolicy::PerCommand);
        assert_eq!(config.cooldown.window_minutes, 15);
        assert_eq!(config.kidnap.duration_hours, 2);
        assert!((config.kidnap.escape_probability - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.chance.seed, Some(7));
    }

    fn rejected_key(toml_str: &str) -> String {
        match KinshipConfig::from_toml(toml_str) {
            Err(KinshipError::Config(msg)) => msg,
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let msg = rejected_key("[kidnap]\nsuccess_probability = 1.5\n");
        assert!(msg.contains("kidnap.success_probability"), "{msg}");

        let msg = rejected_key("[kidnap]\nescape_probability = nan\n");
        assert!(msg.contains("kidnap.escape_probability"), "{msg}");

        let msg = rejected_key("[argument]\nduration_hours = 0\n");
        assert!(msg.contains("argument.duration_hours"), "{msg}");
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let msg = rejected_key("[kidnap]\nduration_hours = 9223372036854775807\n");
        assert!(msg.contains("kidnap.duration_hours"), "{msg}");

        let msg = rejected_key(&format!(
            "[argument]\nduration_hours = {}\n",
            MAX_DURATION_HOURS + 1
        ));
        assert!(msg.contains("argument.duration_hours"), "{msg}");

        let msg = rejected_key("[cooldown]\nwindow_minutes = 9223372036854775807\n");
        assert!(msg.contains("cooldown.window_minutes"), "{msg}");
    }

    #[test]
    fn largest_durations_are_accepted() {
        let config = KinshipConfig::from_toml(&format!(
            "[kidnap]\nduration_hours = {MAX_DURATION_HOURS}\n\
             [argument]\nduration_hours = {MAX_DURATION_HOURS}\n\
             [cooldown]\nwindow_minutes = {MAX_WINDOW_MINUTES}\n"
        ))
        .expect("parse");
        assert_eq!(config.kidnap.duration_hours, MAX_DURATION_HOURS);
        assert_eq!(config.cooldown.window_minutes, MAX_WINDOW_MINUTES);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = KinshipConfig::from_toml("[kidnap\n").expect_err("should reject");
        assert!(matches!(err, KinshipError::Config(_)));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("kinship.toml");
        std::fs::write(&path, "[leaderboard]\nlimit = 3\n").expect("write");
        let config = KinshipConfig::from_file(&path).expect("load");
        assert_eq!(config.leaderboard.limit, 3);
    }
}
