//! Sample-level rendering of a [`Voice`] as an interleaved stereo rodio
//! [`Source`].

use std::f32::consts::{FRAC_PI_2, TAU};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use atomic_float::AtomicF64;
use crossbeam_channel::Receiver;
use rodio::Source;

use super::graph::{Filter, FilterKind, Generator, Voice, VoiceCommand};

/// Frames rendered between checks of the command channel.
const COMMAND_POLL_FRAMES: u64 = 64;

/// RBJ cookbook biquad, recomputed whenever the cutoff moves.
#[derive(Debug, Default)]
struct Biquad {
    cutoff: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    fn design(&mut self, kind: FilterKind, cutoff: f32, q: f32, sample_rate: f32) {
        let w0 = TAU * cutoff / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q.max(1e-3));

        let (b0, b1, b2) = match kind {
            FilterKind::Lowpass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
            FilterKind::Highpass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
            FilterKind::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = -2.0 * cos / a0;
        self.a2 = (1.0 - alpha) / a0;
        self.cutoff = cutoff;
    }

    fn process(&mut self, filter: &Filter, t: f64, sample_rate: f32, x: f32) -> f32 {
        let cutoff = filter.frequency.value_at(t).clamp(10.0, sample_rate * 0.49);
        if cutoff != self.cutoff {
            self.design(filter.kind, cutoff, filter.q, sample_rate);
        }
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Equal-power gains for `pan` in [-1, 1].
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5;
    let angle = x * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

pub struct VoiceSource {
    voice: Voice,
    sample_rate: u32,
    clock: Arc<AtomicF64>,
    commands: Receiver<VoiceCommand>,
    origin: Option<f64>,
    frames: u64,
    phase: f64,
    cursor: usize,
    biquad: Biquad,
    pending_right: Option<f32>,
    finished: bool,
}

impl VoiceSource {
    /// `clock` is the engine time of the frame the mixer is about to render;
    /// the voice reads it once, when it is first pulled.
    pub fn new(voice: Voice, sample_rate: u32, clock: Arc<AtomicF64>, commands: Receiver<VoiceCommand>) -> Self {
        Self {
            voice,
            sample_rate,
            clock,
            commands,
            origin: None,
            frames: 0,
            phase: 0.0,
            cursor: 0,
            biquad: Biquad::default(),
            pending_right: None,
            finished: false,
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            if !self.voice.apply(&command) {
                self.finished = true;
            }
        }
    }

    fn generate(&mut self, t: f64) -> Option<f32> {
        match &self.voice.generator {
            Generator::Oscillator { waveform, frequency } => {
                let s = waveform.sample(self.phase);
                let freq = frequency.value_at(t) as f64;
                self.phase = (self.phase + freq / self.sample_rate as f64).rem_euclid(1.0);
                Some(s)
            }
            Generator::Noise { buffer, looping } => {
                let samples = buffer.samples();
                if samples.is_empty() {
                    return None;
                }
                if self.cursor >= samples.len() {
                    if !*looping {
                        return None;
                    }
                    self.cursor = 0;
                }
                let s = samples[self.cursor];
                self.cursor += 1;
                Some(s)
            }
        }
    }

    /// Render one stereo frame at engine time `t`.
    fn frame(&mut self, t: f64) -> Option<(f32, f32)> {
        if let Some(stop) = self.voice.stop {
            if t >= stop {
                return None;
            }
        }
        if t < self.voice.start {
            return Some((0.0, 0.0));
        }

        let dry = self.generate(t)?;
        let sample_rate = self.sample_rate as f32;
        let wet = match &self.voice.filter {
            Some(filter) => self.biquad.process(filter, t, sample_rate, dry),
            None => dry,
        };
        let out = wet * self.voice.gain.value_at(t);

        Some(match self.voice.pan {
            Some(pan) => {
                let (l, r) = pan_gains(pan);
                (out * l, out * r)
            }
            None => (out, out),
        })
    }
}

impl Iterator for VoiceSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(right) = self.pending_right.take() {
            return Some(right);
        }
        if self.frames % COMMAND_POLL_FRAMES == 0 {
            self.drain_commands();
        }
        if self.finished {
            return None;
        }

        let origin = match self.origin {
            Some(origin) => origin,
            None => {
                let now = self.clock.load(Ordering::Relaxed);
                self.origin = Some(now);
                now
            }
        };
        let t = origin + self.frames as f64 / self.sample_rate as f64;

        match self.frame(t) {
            Some((left, right)) => {
                self.frames += 1;
                self.pending_right = Some(right);
                Some(left)
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

impl Source for VoiceSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Advances the shared engine clock as the mixer below it is drained.
pub struct ClockedSource<S> {
    inner: S,
    clock: Arc<AtomicF64>,
    frame_secs: f64,
    channel: u16,
}

impl<S: Source<Item = f32>> ClockedSource<S> {
    pub fn new(inner: S, clock: Arc<AtomicF64>) -> Self {
        let frame_secs = 1.0 / inner.sample_rate().max(1) as f64;
        Self { inner, clock, frame_secs, channel: 0 }
    }
}

impl<S: Source<Item = f32>> Iterator for ClockedSource<S> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.inner.next()?;
        self.channel += 1;
        if self.channel >= self.inner.channels().max(1) {
            self.channel = 0;
            let now = self.clock.load(Ordering::Relaxed);
            self.clock.store(now + self.frame_secs, Ordering::Relaxed);
        }
        Some(sample)
    }
}

impl<S: Source<Item = f32>> Source for ClockedSource<S> {
    fn current_frame_len(&self) -> Option<usize> { self.inner.current_frame_len() }
    fn channels(&self) -> u16 { self.inner.channels() }
    fn sample_rate(&self) -> u32 { self.inner.sample_rate() }
    fn total_duration(&self) -> Option<Duration> { self.inner.total_duration() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::graph::{Param, Waveform};
    use crate::audio::noise::SoundBuffer;

    fn source(voice: Voice) -> (VoiceSource, crossbeam_channel::Sender<VoiceCommand>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (VoiceSource::new(voice, 1000, Arc::new(AtomicF64::new(0.0)), rx), tx)
    }

    #[test]
    fn voice_ends_at_stop_time() {
        let voice = Voice::oscillator(Waveform::Sine, Param::constant(100.0)).between(0.0, 0.1);
        let (src, _tx) = source(voice);
        // 100 frames of interleaved stereo
        assert_eq!(src.count(), 200);
    }

    #[test]
    fn silent_until_start() {
        let voice = Voice::oscillator(Waveform::Square, Param::constant(100.0)).between(0.05, 0.1);
        let (src, _tx) = source(voice);
        let samples: Vec<f32> = src.collect();
        assert!(samples[..100].iter().all(|s| *s == 0.0));
        assert!(samples[100..].iter().any(|s| *s != 0.0));
    }

    #[test]
    fn one_shot_buffer_ends_with_buffer() {
        let buffer = Arc::new(SoundBuffer::new(1000, vec![0.5; 30]));
        let (src, _tx) = source(Voice::noise(buffer));
        assert_eq!(src.count(), 60);
    }

    #[test]
    fn looping_buffer_runs_until_stopped() {
        let buffer = Arc::new(SoundBuffer::new(1000, vec![0.5; 30]));
        let (mut src, tx) = source(Voice::noise(buffer).looping());
        for _ in 0..1000 {
            assert!(src.next().is_some());
        }
        tx.send(VoiceCommand::Stop).unwrap();
        // finishes within one command poll period
        let remaining = src.count();
        assert!(remaining <= 2 * COMMAND_POLL_FRAMES as usize);
    }

    #[test]
    fn hard_left_pan_silences_right_channel() {
        let buffer = Arc::new(SoundBuffer::new(1000, vec![0.5; 10]));
        let (src, _tx) = source(Voice::noise(buffer).pan(-1.0));
        let samples: Vec<f32> = src.collect();
        for frame in samples.chunks(2) {
            assert!((frame[0] - 0.5).abs() < 1e-6);
            assert!(frame[1].abs() < 1e-6);
        }
    }

    #[test]
    fn center_pan_is_equal_power() {
        let (l, r) = pan_gains(0.0);
        assert!((l - r).abs() < 1e-6);
        assert!((l * l + r * r - 1.0).abs() < 1e-6);
    }

    /// RMS of the left channel of a `freq` sine through `filter`, after the
    /// filter has settled.
    fn rms_through(filter: Option<Filter>, freq: f32) -> f32 {
        const RATE: u32 = 48_000;
        let mut voice = Voice::oscillator(Waveform::Sine, Param::constant(freq)).between(0.0, 0.5);
        voice.filter = filter;
        let (_tx, rx) = crossbeam_channel::unbounded();
        let src = VoiceSource::new(voice, RATE, Arc::new(AtomicF64::new(0.0)), rx);
        let left: Vec<f32> = src.step_by(2).skip(RATE as usize / 10).collect();
        (left.iter().map(|s| s * s).sum::<f32>() / left.len() as f32).sqrt()
    }

    fn response(filter: Filter, freq: f32) -> f32 {
        rms_through(Some(filter), freq) / rms_through(None, freq)
    }

    #[test]
    fn lowpass_passes_lows_and_cuts_highs() {
        let lp = || Filter::lowpass(Param::constant(250.0));
        assert!(response(lp(), 8_000.0) < 0.1, "8 kHz should lose more than 20 dB");
        assert!(response(Filter::lowpass(Param::constant(4_000.0)), 100.0) > 0.9);
    }

    #[test]
    fn highpass_passes_highs_and_cuts_lows() {
        assert!(response(Filter::highpass(Param::constant(2_000.0)), 100.0) < 0.1);
        assert!(response(Filter::highpass(Param::constant(250.0)), 8_000.0) > 0.9);
    }

    #[test]
    fn bandpass_peaks_at_centre() {
        let bp = || Filter::bandpass(Param::constant(1_000.0)).with_q(1.0);
        let centre = response(bp(), 1_000.0);
        assert!(centre > 0.9, "centre gain {centre}");
        assert!(response(bp(), 40.0) < 0.15);
        assert!(response(bp(), 16_000.0) < 0.15);
    }

    #[test]
    fn clock_advances_once_per_frame() {
        let clock = Arc::new(AtomicF64::new(0.0));
        let inner = rodio::source::Zero::<f32>::new(2, 1000);
        let clocked = ClockedSource::new(inner, clock.clone());
        let _: Vec<f32> = clocked.take(2000).collect();
        assert!((clock.load(Ordering::Relaxed) - 1.0).abs() < 1e-9);
    }
}
