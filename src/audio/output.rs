//! Output device seam.
//!
//! [`AudioOutput`] is everything the engine needs from a device: a clock, a
//! sample rate, suspend/resume, and a way to start a [`Voice`]. The real
//! implementation mixes voices through rodio; tests use a recording output
//! with a hand-driven clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF64;
use cpal::traits::{DeviceTrait, HostTrait};
use crossbeam_channel::Sender;
use log::{info, warn};
use rodio::dynamic_mixer::{self, DynamicMixerController};
use rodio::{OutputStream, OutputStreamHandle, Sink};

use super::graph::{FadeRole, Voice, VoiceCommand};
use super::render::{ClockedSource, VoiceSource};
use crate::config::AudioConfig;
use crate::error::AudioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

impl VoiceId {
    pub fn next() -> Self {
        VoiceId(NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Control handle for a voice that is already playing.
///
/// Dropping the handle leaves the voice running to its own stop time.
/// Commands sent after the voice finished are ignored.
#[derive(Debug, Clone)]
pub struct VoiceHandle {
    id: VoiceId,
    commands: Sender<VoiceCommand>,
}

impl VoiceHandle {
    pub fn new(id: VoiceId, commands: Sender<VoiceCommand>) -> Self {
        Self { id, commands }
    }

    pub fn id(&self) -> VoiceId { self.id }

    pub fn fade_out(&self, at: f64, window: f64, floor: f32, role: FadeRole) {
        let _ = self.commands.send(VoiceCommand::FadeOut { at, window, floor, role });
    }

    /// Stop the voice and drop it from the mix.
    pub fn disconnect(&self) {
        let _ = self.commands.send(VoiceCommand::Stop);
    }
}

pub trait AudioOutput {
    fn sample_rate(&self) -> u32;
    /// Engine clock in seconds.
    fn now(&self) -> f64;
    fn is_suspended(&self) -> bool;
    fn suspend(&mut self);
    fn resume(&mut self) -> Result<(), AudioError>;
    fn play(&mut self, voice: Voice) -> VoiceHandle;
}

/// Opens the output device on first use of the engine.
pub type OutputOpener = Box<dyn FnOnce(&AudioConfig) -> Result<Box<dyn AudioOutput>, AudioError>>;

/// Default output: every voice is a source in one rodio dynamic mixer played
/// by a single sink, whose volume is the master gain.
pub struct RodioOutput {
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    master: Sink,
    mixer: Arc<DynamicMixerController<f32>>,
    clock: Arc<AtomicF64>,
    sample_rate: u32,
}

impl RodioOutput {
    pub fn open(config: &AudioConfig) -> Result<Self, AudioError> {
        if !config.enabled {
            return Err(AudioError::Disabled);
        }
        let (stream, handle) = OutputStream::try_default()
            .map_err(|err| AudioError::DeviceUnavailable(err.to_string()))?;
        let master = Sink::try_new(&handle)
            .map_err(|err| AudioError::DeviceUnavailable(err.to_string()))?;

        let sample_rate = config.sample_rate;
        let (mixer, mixed) = dynamic_mixer::mixer::<f32>(2, sample_rate);
        // Keeps the mixer alive while no voice is playing.
        mixer.add(rodio::source::Zero::<f32>::new(2, sample_rate));

        let clock = Arc::new(AtomicF64::new(0.0));
        master.append(ClockedSource::new(mixed, clock.clone()));
        master.set_volume(config.master_gain());

        info!("audio output opened at {sample_rate} Hz, master gain {:.2}", config.master_gain());

        Ok(Self {
            _stream: stream,
            _handle: handle,
            master,
            mixer,
            clock,
            sample_rate,
        })
    }

    pub fn opener() -> OutputOpener {
        Box::new(|config: &AudioConfig| {
            RodioOutput::open(config).map(|output| Box::new(output) as Box<dyn AudioOutput>)
        })
    }
}

impl AudioOutput for RodioOutput {
    fn sample_rate(&self) -> u32 { self.sample_rate }

    fn now(&self) -> f64 { self.clock.load(Ordering::Relaxed) }

    fn is_suspended(&self) -> bool { self.master.is_paused() }

    fn suspend(&mut self) { self.master.pause(); }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.master.play();
        if self.master.is_paused() {
            return Err(AudioError::ResumeFailed("sink still paused".into()));
        }
        Ok(())
    }

    fn play(&mut self, voice: Voice) -> VoiceHandle {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.mixer.add(VoiceSource::new(voice, self.sample_rate, self.clock.clone(), rx));
        VoiceHandle::new(VoiceId::next(), tx)
    }
}

/// Names of the output devices on the default host.
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices
            .map(|device| device.name().unwrap_or_else(|_| String::from("<no name>")))
            .collect(),
        Err(err) => {
            warn!("could not enumerate output devices: {err}");
            Vec::new()
        }
    }
}
