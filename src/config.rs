use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::buckets::{TimeBucketer, DEFAULT_MAX_BUCKETS};
use crate::logging::LogConfig;
use crate::matcher::{ExerciseMatcher, MatchPolicy, DEFAULT_MAX_EDIT_DISTANCE};

/// Main analytics configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Exercise name matching
    #[serde(default)]
    pub matching: MatchingSettings,

    /// Trend bucketing
    #[serde(default)]
    pub buckets: BucketSettings,

    /// Skill map comparison
    #[serde(default)]
    pub skill_map: SkillMapSettings,

    /// Backing store
    #[serde(default)]
    pub store: StoreSettings,

    /// Logging output
    #[serde(default)]
    pub logging: LogConfig,
}

/// Exercise name matching settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    /// Largest edit distance still considered the same exercise
    pub max_edit_distance: usize,

    /// Policy for the trend graph's exercise search
    pub trend_policy: MatchPolicy,

    /// Policy for skill map and personal records
    pub comparison_policy: MatchPolicy,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        MatchingSettings {
            max_edit_distance: DEFAULT_MAX_EDIT_DISTANCE,
            trend_policy: MatchPolicy::Loose,
            comparison_policy: MatchPolicy::Strict,
        }
    }
}

/// Trend bucketing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketSettings {
    /// Upper bound on buckets for long windows
    pub max_buckets: usize,
}

impl Default for BucketSettings {
    fn default() -> Self {
        BucketSettings {
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

/// Skill map settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillMapSettings {
    /// Most exercises a single comparison accepts
    pub max_selections: usize,
}

impl Default for SkillMapSettings {
    fn default() -> Self {
        SkillMapSettings { max_selections: 6 }
    }
}

/// Backing store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite database file, when the SQLite adapter is used
    pub database_path: Option<PathBuf>,

    /// How long a query waits on a locked database
    pub busy_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            database_path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl AnalyticsConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AnalyticsConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sportlens")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %err,
                    "config file not loaded, using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn matcher(&self) -> ExerciseMatcher {
        ExerciseMatcher::with_max_edit_distance(self.matching.max_edit_distance)
    }

    pub fn bucketer(&self) -> TimeBucketer {
        TimeBucketer::with_max_buckets(self.buckets.max_buckets)
    }
}
