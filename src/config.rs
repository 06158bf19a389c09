//! Configuration types for the pairing service.
//!
//! All sections use serde defaults so a partial TOML file is valid; a
//! missing file is not (operators should know which settings they run
//! with). [`PairupConfig::validate`] is called once at startup and any
//! failure is fatal — the process must not run with invalid settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for the pairing service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PairupConfig {
    /// Reset cycle settings (anchor instant + interval).
    pub reset: ResetConfig,
    /// Pairing negotiation settings (cooldowns, deadlines).
    pub pairing: PairingConfig,
    /// Currency display names.
    pub currency: CurrencyConfig,
    /// Milestone announcements, keyed by cumulative total.
    ///
    /// TOML table keys are strings; each key must parse as an integer.
    /// A value of `false` announces the milestone without flavor text,
    /// a string value is appended to the announcement.
    pub milestones: BTreeMap<String, Milestone>,
}

/// Reset cycle configuration. Loaded once; the source of truth for all
/// boundary computations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Anchor instant all reset boundaries are phase-locked to.
    pub anchor: DateTime<Utc>,
    /// Interval between boundaries in seconds.
    pub interval_secs: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            anchor: DateTime::<Utc>::UNIX_EPOCH,
            interval_secs: 7 * 24 * 3600,
        }
    }
}

/// Pairing negotiation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Anti-spam lock on issuing invites, in milliseconds.
    ///
    /// Distinct from the per-pair cycle cooldown: this only stops the same
    /// member from opening a second invitation right after the first.
    pub invite_cooldown_ms: u64,
    /// How long a member counts as "recently active" after their last
    /// qualifying activity, in milliseconds.
    pub activity_window_ms: u64,
    /// How long an open invitation waits for an acceptance, in milliseconds.
    pub acceptance_deadline_ms: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            invite_cooldown_ms: 15_000,
            activity_window_ms: 60_000,
            acceptance_deadline_ms: 30_000,
        }
    }
}

impl PairingConfig {
    /// Invite-spam cooldown as a [`Duration`].
    #[must_use]
    pub fn invite_cooldown(&self) -> Duration {
        Duration::from_millis(self.invite_cooldown_ms)
    }

    /// Activity window as a [`Duration`].
    #[must_use]
    pub fn activity_window(&self) -> Duration {
        Duration::from_millis(self.activity_window_ms)
    }

    /// Acceptance deadline as a [`Duration`].
    #[must_use]
    pub fn acceptance_deadline(&self) -> Duration {
        Duration::from_millis(self.acceptance_deadline_ms)
    }
}

/// Display names for the reward currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Singular form, e.g. `melon bread`.
    pub one: String,
    /// Plural form, e.g. `melon breads`.
    pub other: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            one: "melon bread".to_owned(),
            other: "melon breads".to_owned(),
        }
    }
}

/// One milestone entry: flavor text, or `false` for a plain announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Milestone {
    /// Extra flavor text appended to the milestone announcement.
    Text(String),
    /// `false` in the settings file: announce without flavor text.
    Plain(bool),
}

impl Milestone {
    /// Flavor text for the announcement, if any.
    #[must_use]
    pub fn flavor_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Plain(_) => None,
        }
    }
}

impl PairupConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::PairError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::PairError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/pairup/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("pairup").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("pairup")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/pairup-config/config.toml")
        }
    }

    /// Validate the configuration. Any error here is fatal at startup.
    ///
    /// # Errors
    ///
    /// Returns [`PairError::Config`](crate::error::PairError::Config)
    /// describing the first invalid field found.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::PairError;

        if self.reset.interval_secs == 0 {
            return Err(PairError::Config(
                "reset.interval_secs must be greater than zero".to_owned(),
            ));
        }
        if self.pairing.invite_cooldown_ms == 0 {
            return Err(PairError::Config(
                "pairing.invite_cooldown_ms must be greater than zero".to_owned(),
            ));
        }
        if self.pairing.activity_window_ms == 0 {
            return Err(PairError::Config(
                "pairing.activity_window_ms must be greater than zero".to_owned(),
            ));
        }
        if self.pairing.acceptance_deadline_ms == 0 {
            return Err(PairError::Config(
                "pairing.acceptance_deadline_ms must be greater than zero".to_owned(),
            ));
        }
        if self.currency.one.trim().is_empty() || self.currency.other.trim().is_empty() {
            return Err(PairError::Config(
                "currency.one and currency.other must not be empty".to_owned(),
            ));
        }
        for key in self.milestones.keys() {
            if key.parse::<u64>().is_err() {
                return Err(PairError::Config(format!(
                    "milestone key `{key}` is not a whole number"
                )));
            }
        }
        Ok(())
    }

    /// Milestone entry for the given cumulative total, if configured.
    #[must_use]
    pub fn milestone_for(&self, total: u64) -> Option<&Milestone> {
        self.milestones.get(&total.to_string())
    }
}
