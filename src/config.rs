//! Configuration loader for the runner audio engine.
//!
//! * Looks for `runner_audio.toml` in the cwd unless overridden by `--config`.
//! * Provides defaults so the file is optional.

use std::fs;

use log::warn;
use serde::Deserialize;

use crate::error::AudioError;

pub const DEFAULT_CONFIG_PATH: &str = "runner_audio.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AudioConfig {
    /// When false the output device is never opened and every sound is a no-op.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Master gain applied to everything the engine plays (0.0 to 1.0).
    #[serde(default = "default_master_gain")]
    pub master_gain: f32,
    /// Rate of synthesized noise buffers and of the output mix.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_enabled() -> bool { true }
fn default_master_gain() -> f32 { 0.4 }
fn default_sample_rate() -> u32 { 44_100 }

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            master_gain: default_master_gain(),
            sample_rate: default_sample_rate(),
        }
    }
}

impl AudioConfig {
    /// Load from a TOML file; fall back to defaults on any error.
    pub fn load(path: Option<&str>) -> Self {
        let p = path.unwrap_or(DEFAULT_CONFIG_PATH);
        match fs::read_to_string(p) {
            Ok(text) => Self::from_toml(&text).unwrap_or_else(|err| {
                warn!("ignoring {p}: {err}");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, AudioError> {
        Ok(toml::from_str(text)?)
    }

    /// Master gain clamped to the valid range.
    pub fn master_gain(&self) -> f32 {
        self.master_gain.clamp(0.0, 1.0)
    }
}
