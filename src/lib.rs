//! runner-audio: procedural sound for an endless runner.
//!
//! Every sound is synthesized at runtime from noise and oscillators; there
//! are no sample assets. The crate has three layers:
//!
//! * **noise**: pink, brown and crackle buffers.
//! * **effects**: one-shot game-event sounds that stop on their own.
//! * **ambience**: one layered soundscape per biome with self-rescheduling
//!   sub-events (waves, birds, chimes, clock ticks) and a fade-out teardown.
//!
//! No operation returns an error to the caller. Without an output device
//! everything is a silent no-op.
//!
//! # Example
//! ```no_run
//! use runner_audio::{AudioConfig, AudioEngine, Biome};
//! let mut audio = AudioEngine::new(AudioConfig::load(None));
//! audio.play_jump(false);
//! audio.start_ambience(Biome::Coastal);
//! loop {
//!     audio.update();
//!     # break;
//! }
//! ```

pub mod audio;
pub mod config;
pub mod error;

pub use audio::{AudioEngine, Biome, Effect, SessionState};
pub use config::AudioConfig;
pub use error::AudioError;
