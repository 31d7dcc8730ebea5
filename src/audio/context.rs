//! Process-wide audio output handle.
//!
//! The device is opened lazily on the first operation that needs it. Opening
//! is attempted once; if it fails the context stays [`Unavailable`] and every
//! later call is a silent no-op.
//!
//! [`Unavailable`]: ContextState::Unavailable

use std::sync::Arc;

use log::{debug, info, warn};
use rand::Rng;

use super::graph::Voice;
use super::noise::{self, NoiseKind, SoundBuffer};
use super::output::{AudioOutput, OutputOpener, RodioOutput, VoiceHandle};
use crate::config::AudioConfig;

enum ContextState {
    Uninitialized(OutputOpener),
    Ready(Box<dyn AudioOutput>),
    Unavailable,
}

pub struct EngineContext {
    config: AudioConfig,
    state: ContextState,
}

impl EngineContext {
    /// Context backed by the default rodio output device.
    pub fn new(config: AudioConfig) -> Self {
        Self::with_opener(config, RodioOutput::opener())
    }

    pub fn with_opener(config: AudioConfig, opener: OutputOpener) -> Self {
        Self { config, state: ContextState::Uninitialized(opener) }
    }

    pub fn config(&self) -> &AudioConfig { &self.config }

    /// Open the device on first call; on later calls wake it if suspended.
    /// Never fails: errors leave the context unavailable or are swallowed.
    pub fn init(&mut self) {
        if matches!(self.state, ContextState::Uninitialized(_)) {
            let state = std::mem::replace(&mut self.state, ContextState::Unavailable);
            if let ContextState::Uninitialized(open) = state {
                match open(&self.config) {
                    Ok(output) => self.state = ContextState::Ready(output),
                    Err(err) => warn!("audio disabled: {err}"),
                }
            }
        }

        if let ContextState::Ready(output) = &mut self.state {
            if output.is_suspended() {
                match output.resume() {
                    Ok(()) => info!("audio output resumed"),
                    Err(err) => debug!("resume failed, will retry: {err}"),
                }
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, ContextState::Ready(_))
    }

    /// Initialize if needed and return the current engine time, or `None`
    /// when no device is available.
    pub fn ensure_ready(&mut self) -> Option<f64> {
        self.init();
        self.now()
    }

    /// Current engine time without touching the device state.
    pub fn now(&self) -> Option<f64> {
        match &self.state {
            ContextState::Ready(output) => Some(output.now()),
            _ => None,
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        match &self.state {
            ContextState::Ready(output) => Some(output.sample_rate()),
            _ => None,
        }
    }

    /// A fresh noise buffer at the output rate, or `None` without a device.
    pub fn noise(&self, kind: NoiseKind, duration: f64, rng: &mut impl Rng) -> Option<Arc<SoundBuffer>> {
        let rate = self.sample_rate()?;
        Some(Arc::new(noise::generate(kind, duration, rate, rng)))
    }

    pub fn play(&mut self, voice: Voice) -> Option<VoiceHandle> {
        match &mut self.state {
            ContextState::Ready(output) => Some(output.play(voice)),
            _ => None,
        }
    }

    /// Pause the output, e.g. when the host loses focus. The next operation
    /// that initializes the context resumes it.
    pub fn suspend(&mut self) {
        if let ContextState::Ready(output) = &mut self.state {
            output.suspend();
            info!("audio output suspended");
        }
    }
}
