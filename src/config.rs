//! Chatgen Configuration
//!
//! Handles parsing, validation and management of chatgen.toml files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::corpus::TIER_COUNT;
use crate::weighting::TransitionPrior;

/// Configuration file name searched for by [`ChatgenConfig::find_and_load`]
pub const CONFIG_FILE_NAME: &str = "chatgen.toml";

/// Prompt used when none (or an empty one) is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Root configuration structure matching chatgen.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ChatgenConfig {
    /// Run-level settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Sampler weighting parameters
    #[serde(default)]
    pub weighting: WeightingConfig,
}

impl ChatgenConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: ChatgenConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find and load configuration by searching up from the given directory.
    ///
    /// Falls back to defaults when no chatgen.toml exists.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir()?;
        Self::find_and_load(&cwd)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values that would make generation meaningless or the
    /// weighting distributions invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        self.generation.validate()?;
        self.weighting.validate()
    }
}

/// Run-level generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// Instruction attached to every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Number of conversations to generate
    #[serde(default = "default_generate_times")]
    pub generate_times: usize,

    /// Maximum number of rounds per conversation
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Random seed for reproducible runs (entropy when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Worker threads for the outer dialogue loop
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_generate_times() -> usize {
    1000
}

fn default_max_depth() -> usize {
    8
}

fn default_workers() -> usize {
    1
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            generate_times: default_generate_times(),
            max_depth: default_max_depth(),
            seed: None,
            workers: default_workers(),
        }
    }
}

impl GenerationConfig {
    /// The configured prompt, or the default one when empty
    pub fn effective_system_prompt(&self) -> &str {
        if self.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            &self.system_prompt
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.generate_times == 0 {
            return Err(invalid("generate_times", "must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        Ok(())
    }
}

/// Weighting parameters for the conversation walk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightingConfig {
    /// Opening weight of tiers B and C (lower favors tier A)
    #[serde(default = "default_init_weight")]
    pub init_weight: f64,

    /// Opening weight of tier Z
    #[serde(default = "default_final_level_weight")]
    pub final_level_weight: f64,

    /// Multiplier applied to the previously drawn cell
    #[serde(default = "default_current_punish")]
    pub current_punish: f64,

    /// Children of the previous record are scaled by `1 + child_reward`
    #[serde(default = "default_child_reward")]
    pub child_reward: f64,

    /// Rounds after which the terminal tier gets `final_level_reward`
    #[serde(default = "default_final_weighting_threshold")]
    pub final_weighting_threshold: usize,

    /// Terminal tier is scaled by `1 + final_level_reward` past the threshold
    #[serde(default = "default_final_level_reward")]
    pub final_level_reward: f64,

    /// Tier transition prior, rows A, B, C, Z
    #[serde(default)]
    pub transition_prior: TransitionPrior,
}

fn default_init_weight() -> f64 {
    0.05
}

fn default_final_level_weight() -> f64 {
    0.0000001
}

fn default_current_punish() -> f64 {
    0.01
}

fn default_child_reward() -> f64 {
    1000.0
}

fn default_final_weighting_threshold() -> usize {
    2
}

fn default_final_level_reward() -> f64 {
    50.0
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            init_weight: default_init_weight(),
            final_level_weight: default_final_level_weight(),
            current_punish: default_current_punish(),
            child_reward: default_child_reward(),
            final_weighting_threshold: default_final_weighting_threshold(),
            final_level_reward: default_final_level_reward(),
            transition_prior: TransitionPrior::default(),
        }
    }
}

impl WeightingConfig {
    /// Round-zero tier weights: `[1 - 2w - f, w, w, f]`
    pub fn opening_weights(&self) -> [f64; TIER_COUNT] {
        [
            1.0 - 2.0 * self.init_weight - self.final_level_weight,
            self.init_weight,
            self.init_weight,
            self.final_level_weight,
        ]
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let floats = [
            ("init_weight", self.init_weight),
            ("final_level_weight", self.final_level_weight),
            ("current_punish", self.current_punish),
            ("child_reward", self.child_reward),
            ("final_level_reward", self.final_level_reward),
        ];
        for (field, value) in floats {
            if !value.is_finite() {
                return Err(invalid(field, "must be a finite number"));
            }
            if value < 0.0 {
                return Err(invalid(field, format!("{} is negative", value)));
            }
        }
        if self.init_weight >= 0.5 {
            return Err(invalid("init_weight", "must be below 0.5"));
        }
        if self.opening_weights()[0] < 0.0 {
            return Err(invalid(
                "final_level_weight",
                "1 - 2 * init_weight - final_level_weight must not be negative",
            ));
        }
        if self.current_punish >= 1.0 {
            return Err(invalid("current_punish", "must be below 1"));
        }
        self.transition_prior
            .check()
            .map_err(|reason| invalid("transition_prior", reason))
    }
}
