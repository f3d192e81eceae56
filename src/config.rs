//! Configuration management for the transcript extractor.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub pause: PauseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            scanner: ScannerConfig::default(),
            resolver: ResolverConfig::default(),
            scheduler: SchedulerConfig::default(),
            pause: PauseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the extractor is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Minimum visible text length for a root child to count as a turn
    #[serde(default = "default_min_child_text_len")]
    pub min_child_text_len: usize,

    /// Minimum text length for the paragraph fallback
    #[serde(default = "default_min_paragraph_len")]
    pub min_paragraph_len: usize,

    /// Hard cap on candidates processed per scan
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_child_text_len: 10,
            min_paragraph_len: 15,
            max_candidates: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Root lookup attempts before falling back to the document body
    #[serde(default = "default_max_root_attempts")]
    pub max_root_attempts: u32,

    /// Delay between root lookup attempts
    #[serde(default = "default_root_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_root_attempts: 10,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Debounce after a burst of tree mutations
    #[serde(default = "default_mutation_debounce")]
    pub mutation_debounce_ms: u64,

    /// Deferral after nodes become visible (lazy rendering settles)
    #[serde(default = "default_visibility_defer")]
    pub visibility_defer_ms: u64,

    /// Debounce after a viewport resize
    #[serde(default = "default_resize_debounce")]
    pub resize_debounce_ms: u64,

    /// Base polling interval
    #[serde(default = "default_poll_base")]
    pub poll_base_ms: u64,

    /// Polling interval cap after backoff
    #[serde(default = "default_poll_max")]
    pub poll_max_ms: u64,

    /// Multiplier applied to the polling interval on quiet pages
    #[serde(default = "default_poll_backoff")]
    pub poll_backoff: f64,

    /// Consecutive no-change scans before backoff kicks in
    #[serde(default = "default_no_change_threshold")]
    pub no_change_threshold: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mutation_debounce_ms: 750,
            visibility_defer_ms: 500,
            resize_debounce_ms: 1000,
            poll_base_ms: 1000,
            poll_max_ms: 10_000,
            poll_backoff: 1.5,
            no_change_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseConfig {
    /// Quiet period after a keystroke
    #[serde(default = "default_typing_quiet")]
    pub typing_quiet_ms: u64,

    /// Quiet period after a click
    #[serde(default = "default_click_quiet")]
    pub click_quiet_ms: u64,

    /// Quiet period after focus leaves the page
    #[serde(default = "default_blur_quiet")]
    pub blur_quiet_ms: u64,
}

impl Default for PauseConfig {
    fn default() -> Self {
        Self {
            typing_quiet_ms: 2000,
            click_quiet_ms: 1000,
            blur_quiet_ms: 500,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_min_child_text_len() -> usize {
    10
}

fn default_min_paragraph_len() -> usize {
    15
}

fn default_max_candidates() -> usize {
    100
}

fn default_max_root_attempts() -> u32 {
    10
}

fn default_root_retry_delay() -> u64 {
    500
}

fn default_mutation_debounce() -> u64 {
    750
}

fn default_visibility_defer() -> u64 {
    500
}

fn default_resize_debounce() -> u64 {
    1000
}

fn default_poll_base() -> u64 {
    1000
}

fn default_poll_max() -> u64 {
    10_000
}

fn default_poll_backoff() -> f64 {
    1.5
}

fn default_no_change_threshold() -> u32 {
    5
}

fn default_typing_quiet() -> u64 {
    2000
}

fn default_click_quiet() -> u64 {
    1000
}

fn default_blur_quiet() -> u64 {
    500
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("transcript-extractor")
            .join("config.toml")
    }

    /// Save configuration to the default path
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to_path(Self::default_config_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
