//! Error type shared by the output device seam and the config loader.
//!
//! None of these ever reach the game: the engine context turns them into
//! silence (see [`crate::audio::EngineContext`]).

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio output disabled by configuration")]
    Disabled,
    #[error("audio output device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("failed to resume suspended output: {0}")]
    ResumeFailed(String),
    #[error("invalid audio config: {0}")]
    Config(#[from] toml::de::Error),
}
