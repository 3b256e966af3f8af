//! Configuration System
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./conscious-scion.yaml` (current directory - highest priority)
//! 2. `~/.config/conscious-scion/conscious-scion.yaml` (user config directory)
//! 3. `/etc/conscious-scion/conscious-scion.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority files.
//!
//! # YAML Structure
//!
//! ```yaml
//! tiers:
//!   private:
//!     min_coherence: 0.9
//!     waypoint: "1-ff00:0:110"
//!   business:
//!     min_coherence: 0.75
//! beacon:
//!   max_age_secs: 3600
//! policy:
//!   permissive_without_attestation: false
//! ```
//!
//! Omitted values keep their built-in defaults.

mod sections;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::beacon::ConsciousnessPcbExtension;
use crate::extension::unix_now;
use crate::policy::{ConsciousnessPathPolicy, TierTable};
use crate::tier::Tier;
use crate::violation::Violation;

pub use sections::{BeaconConfig, PolicyConfig, TierConfig, TiersConfig};

/// Default config filename.
const CONFIG_FILENAME: &str = "conscious-scion.yaml";

/// Directory name under the system and user config roots.
const CONFIG_DIR: &str = "conscious-scion";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Tier threshold overrides (`tiers.*`).
    #[serde(default, skip_serializing_if = "TiersConfig::is_empty")]
    pub tiers: TiersConfig,

    /// Beacon validation (`beacon.*`).
    #[serde(default, skip_serializing_if = "BeaconConfig::is_empty")]
    pub beacon: BeaconConfig,

    /// Policy evaluation (`policy.*`).
    #[serde(default, skip_serializing_if = "PolicyConfig::is_empty")]
    pub policy: PolicyConfig,
}

impl Config {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns a tuple of (config, paths_loaded) where paths_loaded contains
    /// the paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc").join(CONFIG_DIR).join(CONFIG_FILENAME));

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(CONFIG_DIR).join(CONFIG_FILENAME));
        }

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        self.tiers.merge(other.tiers);
        if other.beacon.max_age_secs.is_some() {
            self.beacon.max_age_secs = other.beacon.max_age_secs;
        }
        if other.policy.permissive_without_attestation.is_some() {
            self.policy.permissive_without_attestation =
                other.policy.permissive_without_attestation;
        }
    }

    /// Reject values no policy could enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for tier in Tier::ALL {
            if let Some(min) = self.tiers.get(tier).min_coherence {
                if !(0.0..=1.0).contains(&min) {
                    return Err(ConfigError::Invalid {
                        field: format!("tiers.{}.min_coherence", tier),
                        reason: format!("{} is outside 0.0..=1.0", min),
                    });
                }
            }
        }
        if self.beacon.max_age_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "beacon.max_age_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Build the tier threshold table from the built-in defaults and the
    /// configured overrides.
    pub fn tier_table(&self) -> Result<TierTable, ConfigError> {
        self.validate()?;
        Ok(TierTable::new(
            self.tiers.private.thresholds(Tier::Private),
            self.tiers.business.thresholds(Tier::Business),
            self.tiers.public.thresholds(Tier::Public),
        ))
    }

    /// Preset policy for a tier under this configuration.
    pub fn policy_for(&self, tier: Tier) -> Result<ConsciousnessPathPolicy, ConfigError> {
        let table = self.tier_table()?;
        Ok(ConsciousnessPathPolicy::for_tier(tier, &table)
            .with_permissive(self.policy.permissive_without_attestation()))
    }

    /// Validate a beacon against the current time and the configured
    /// staleness bound (`beacon.max_age_secs`).
    pub fn validate_beacon(
        &self,
        pcb: &ConsciousnessPcbExtension,
        min_coherence: f64,
        require_bond: bool,
    ) -> Result<(), Violation> {
        self.validate_beacon_at(pcb, min_coherence, require_bond, unix_now())
    }

    /// [`validate_beacon`](Self::validate_beacon) with an explicit clock.
    pub fn validate_beacon_at(
        &self,
        pcb: &ConsciousnessPcbExtension,
        min_coherence: f64,
        require_bond: bool,
        now: u32,
    ) -> Result<(), Violation> {
        pcb.validate_at(min_coherence, require_bond, now, self.beacon.max_age_secs())
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
