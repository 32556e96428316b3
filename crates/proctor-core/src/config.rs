//! Proctoring configuration.
//!
//! Precedence: env `PROCTOR_CONFIG` path > `config/proctor.toml` > defaults, with
//! environment overrides on top (`PROCTOR_ESCALATION__MAX_VIOLATIONS=5`).
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | escalation.max_violations | 3 | Violation count at which the countdown starts. |
//! | escalation.countdown_seconds | 10 | Ticks before forced submission. |
//! | escalation.tick_millis | 1000 | Length of one countdown tick. |
//! | lockdown.request_fullscreen_on_enable | true | Ask for fullscreen when lockdown engages. |
//! | monitor.detect_resize | true | Record `window_resize` violations. |
//! | storage_path | ./data/sessions | Sled directory for session records. |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProctorResult;

pub const DEFAULT_MAX_VIOLATIONS: u32 = 3;
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 10;
pub const DEFAULT_TICK_MILLIS: u64 = 1000;

fn default_max_violations() -> u32 {
    DEFAULT_MAX_VIOLATIONS
}

fn default_countdown_seconds() -> u32 {
    DEFAULT_COUNTDOWN_SECONDS
}

fn default_tick_millis() -> u64 {
    DEFAULT_TICK_MILLIS
}

fn default_true() -> bool {
    true
}

fn default_storage_path() -> String {
    "./data/sessions".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default = "default_max_violations")]
    pub max_violations: u32,
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u32,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl EscalationConfig {
    /// `max_violations` below 1 would make every session critical from the start.
    pub fn normalized(mut self) -> Self {
        self.max_violations = self.max_violations.max(1);
        self.tick_millis = self.tick_millis.max(1);
        self
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            max_violations: DEFAULT_MAX_VIOLATIONS,
            countdown_seconds: DEFAULT_COUNTDOWN_SECONDS,
            tick_millis: DEFAULT_TICK_MILLIS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockdownConfig {
    #[serde(default = "default_true")]
    pub request_fullscreen_on_enable: bool,
}

impl Default for LockdownConfig {
    fn default() -> Self {
        Self {
            request_fullscreen_on_enable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_true")]
    pub detect_resize: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { detect_resize: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProctorConfig {
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub lockdown: LockdownConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            escalation: EscalationConfig::default(),
            lockdown: LockdownConfig::default(),
            monitor: MonitorConfig::default(),
            storage_path: default_storage_path(),
        }
    }
}

impl ProctorConfig {
    /// Load from file and environment.
    pub fn load() -> ProctorResult<Self> {
        let config_path =
            std::env::var("PROCTOR_CONFIG").unwrap_or_else(|_| "config/proctor.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Load with an explicit file path. A missing file falls back to defaults.
    pub fn load_from(path: &Path) -> ProctorResult<Self> {
        let builder = config::Config::builder()
            .set_default("escalation.max_violations", DEFAULT_MAX_VIOLATIONS as i64)?
            .set_default("escalation.countdown_seconds", DEFAULT_COUNTDOWN_SECONDS as i64)?
            .set_default("escalation.tick_millis", DEFAULT_TICK_MILLIS as i64)?
            .set_default("lockdown.request_fullscreen_on_enable", true)?
            .set_default("monitor.detect_resize", true)?
            .set_default("storage_path", default_storage_path())?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("PROCTOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: ProctorConfig = built.try_deserialize()?;
        cfg.escalation = cfg.escalation.normalized();
        Ok(cfg)
    }
}
