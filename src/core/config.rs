//! Configuration for the memory cleaner

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cleaner::safety::{CriticalProcessRegistry, DEFAULT_CRITICAL_PROCESSES};
use crate::cleaner::{CleanOptions, MemorySource};
use crate::error::ConfigError;

/// Longest accepted cooldown (one week).
pub const MAX_COOLDOWN_SECS: u64 = 7 * 24 * 60 * 60;

/// What the pressure loop runs when the threshold is crossed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoAction {
    /// Purge the standby list
    #[default]
    Purge,
    /// Trim all process working sets
    Trim,
    /// Purge, then trim
    Both,
}

impl AutoAction {
    pub fn purges(self) -> bool {
        matches!(self, AutoAction::Purge | AutoAction::Both)
    }

    pub fn trims(self) -> bool {
        matches!(self, AutoAction::Trim | AutoAction::Both)
    }
}

/// Main cleaner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Clean when standby exceeds this percentage of free memory
    pub percent_threshold: u64,

    /// Minimum time between two automatic cleanups (seconds)
    pub cooldown_secs: u64,

    /// Pressure check interval (seconds)
    pub pressure_interval_secs: u64,

    /// Status refresh interval (seconds)
    pub status_interval_secs: u64,

    /// Pause between two process trims (milliseconds)
    pub trim_delay_ms: u64,

    /// Action taken by the pressure loop
    pub auto_action: AutoAction,

    /// Where memory figures come from
    pub memory_source: MemorySource,

    /// Trim critical processes too during automatic trims
    pub ignore_critical: bool,

    /// Processes to never trim
    pub critical_processes: Vec<String>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            percent_threshold: 65,
            cooldown_secs: 300,
            pressure_interval_secs: 60,
            status_interval_secs: 5,
            trim_delay_ms: 10,
            auto_action: AutoAction::Purge,
            memory_source: MemorySource::PerfCounters,
            ignore_critical: false,
            critical_processes: DEFAULT_CRITICAL_PROCESSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CleanerConfig {
    /// Load config from TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or the default location when `None`. A missing
    /// file yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Save config to TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `<config dir>/windows-ram-cleaner/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("windows-ram-cleaner").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.percent_threshold == 0 || self.percent_threshold > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "percent_threshold must be in 1..=10000, got {}",
                self.percent_threshold
            )));
        }
        if self.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(ConfigError::Invalid(format!(
                "cooldown_secs must be at most {}, got {}",
                MAX_COOLDOWN_SECS, self.cooldown_secs
            )));
        }
        if self.pressure_interval_secs == 0 {
            return Err(ConfigError::Invalid("pressure_interval_secs must be positive".into()));
        }
        if self.status_interval_secs == 0 {
            return Err(ConfigError::Invalid("status_interval_secs must be positive".into()));
        }
        if self.status_interval_secs > self.pressure_interval_secs {
            return Err(ConfigError::Invalid(format!(
                "status_interval_secs ({}) must not exceed pressure_interval_secs ({})",
                self.status_interval_secs, self.pressure_interval_secs
            )));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn pressure_interval(&self) -> Duration {
        Duration::from_secs(self.pressure_interval_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn trim_delay(&self) -> Duration {
        Duration::from_millis(self.trim_delay_ms)
    }

    pub fn critical_registry(&self) -> CriticalProcessRegistry {
        CriticalProcessRegistry::new(&self.critical_processes)
    }

    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions { ignore_critical: self.ignore_critical }
    }
}
