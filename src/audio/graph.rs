//! Synthesis graph description.
//!
//! A [`Voice`] is one chain `generator -> [filter] -> gain -> [pan] -> master`
//! with absolute start/stop times on the engine clock. Effects are built from
//! one or more voices; the renderer in [`super::render`] turns a voice into
//! samples and the test output records them as-is.

use std::f64::consts::TAU;
use std::sync::Arc;

use super::noise::SoundBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    Set { time: f64, value: f32 },
    Ramp { end: f64, value: f32, curve: Curve },
}

impl Automation {
    #[inline]
    pub fn time(&self) -> f64 {
        match *self {
            Automation::Set { time, .. } => time,
            Automation::Ramp { end, .. } => end,
        }
    }

    #[inline]
    pub fn value(&self) -> f32 {
        match *self {
            Automation::Set { value, .. } | Automation::Ramp { value, .. } => value,
        }
    }
}

/// Automation timeline for one parameter.
///
/// Ramps start from the previous event. An exponential ramp between values
/// that are not both strictly positive (or both strictly negative) holds its
/// start value, which is why envelopes decay to a small floor instead of 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    default: f32,
    events: Vec<Automation>,
}

impl Timeline {
    pub fn new(default: f32) -> Self {
        Self { default, events: Vec::new() }
    }

    pub fn events(&self) -> &[Automation] { &self.events }

    fn push(&mut self, event: Automation) {
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
    }

    pub fn set_at(&mut self, time: f64, value: f32) {
        self.push(Automation::Set { time, value });
    }

    pub fn ramp_to(&mut self, value: f32, end: f64, curve: Curve) {
        self.push(Automation::Ramp { end, value, curve });
    }

    pub fn value_at(&self, t: f64) -> f32 {
        let mut prev_time = f64::NEG_INFINITY;
        let mut prev_value = self.default;

        for event in &self.events {
            match *event {
                Automation::Set { time, value } => {
                    if t < time {
                        return prev_value;
                    }
                    prev_time = time;
                    prev_value = value;
                }
                Automation::Ramp { end, value, curve } => {
                    if t < end {
                        return interpolate(prev_time, prev_value, end, value, t, curve);
                    }
                    prev_time = end;
                    prev_value = value;
                }
            }
        }
        prev_value
    }

    /// Drop everything scheduled at or after `at`, hold the value reached at
    /// `at`, then decay exponentially to `floor` over `window` seconds.
    pub fn fade_out(&mut self, at: f64, window: f64, floor: f32) {
        let current = self.value_at(at);
        self.events.retain(|e| e.time() < at);
        self.push(Automation::Set { time: at, value: current });
        self.push(Automation::Ramp { end: at + window, value: floor, curve: Curve::Exponential });
    }

    /// First value written by the automation, or the default.
    pub fn start_value(&self) -> f32 {
        self.events.first().map(Automation::value).unwrap_or(self.default)
    }

    /// Last value the automation settles on.
    pub fn end_value(&self) -> f32 {
        self.events.last().map(Automation::value).unwrap_or(self.default)
    }

    /// Largest value written by the automation.
    pub fn peak(&self) -> f32 {
        self.events.iter().map(Automation::value).fold(self.default, f32::max)
    }
}

fn interpolate(t0: f64, v0: f32, t1: f64, v1: f32, t: f64, curve: Curve) -> f32 {
    if !t0.is_finite() || t1 <= t0 {
        return v0;
    }
    let x = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
    match curve {
        Curve::Linear => v0 + (v1 - v0) * x as f32,
        Curve::Exponential => {
            if v0 == 0.0 || v1 == 0.0 || v0.signum() != v1.signum() {
                v0
            } else {
                v0 * (v1 / v0).powf(x as f32)
            }
        }
    }
}

/// Low-frequency oscillator summed onto a parameter.
///
/// Phase is measured from engine time 0, not from when the voice starts, so a
/// gain LFO on a layer that starts later must ramp its depth in from 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Lfo {
    pub rate: f32,
    /// Phase offset in cycles.
    pub phase: f32,
    pub depth: Timeline,
}

impl Lfo {
    pub fn new(rate: f32, depth: f32) -> Self {
        Self { rate, phase: 0.0, depth: Timeline::new(depth) }
    }

    pub fn with_phase(mut self, phase: f32) -> Self {
        self.phase = phase;
        self
    }

    fn value_at(&self, t: f64) -> f32 {
        let cycle = self.rate as f64 * t + self.phase as f64;
        self.depth.value_at(t) * (TAU * cycle).sin() as f32
    }
}

/// Which part of a persistent layer teardown ramps down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeRole {
    /// Output gain plus any gain LFO riding on it.
    Gain,
    /// Gain is carried entirely by an LFO around zero; only its depth ramps.
    ModulationDepth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub base: Timeline,
    pub lfo: Option<Lfo>,
}

impl Param {
    pub fn constant(value: f32) -> Self {
        Self { base: Timeline::new(value), lfo: None }
    }

    /// Start `value` at `time`.
    pub fn starting(value: f32, time: f64) -> Self {
        Self::constant(value).set_at(time, value)
    }

    pub fn set_at(mut self, time: f64, value: f32) -> Self {
        self.base.set_at(time, value);
        self
    }

    pub fn linear_to(mut self, value: f32, end: f64) -> Self {
        self.base.ramp_to(value, end, Curve::Linear);
        self
    }

    pub fn exp_to(mut self, value: f32, end: f64) -> Self {
        self.base.ramp_to(value, end, Curve::Exponential);
        self
    }

    pub fn with_lfo(mut self, lfo: Lfo) -> Self {
        self.lfo = Some(lfo);
        self
    }

    pub fn value_at(&self, t: f64) -> f32 {
        let modulation = self.lfo.as_ref().map_or(0.0, |lfo| lfo.value_at(t));
        self.base.value_at(t) + modulation
    }

    pub fn fade_out(&mut self, at: f64, window: f64, floor: f32, role: FadeRole) {
        if role == FadeRole::Gain {
            self.base.fade_out(at, window, floor);
        }
        if let Some(lfo) = self.lfo.as_mut() {
            lfo.depth.fade_out(at, window, floor);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Sample at `phase` in cycles, `[0, 1)`.
    pub fn sample(self, phase: f64) -> f32 {
        let s = match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => if phase < 0.5 { 1.0 } else { -1.0 },
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        };
        s as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub kind: FilterKind,
    pub frequency: Param,
    pub q: f32,
}

impl Filter {
    pub fn new(kind: FilterKind, frequency: Param) -> Self {
        let q = match kind {
            FilterKind::Bandpass => 1.0,
            _ => std::f32::consts::FRAC_1_SQRT_2,
        };
        Self { kind, frequency, q }
    }

    pub fn lowpass(frequency: Param) -> Self { Self::new(FilterKind::Lowpass, frequency) }
    pub fn highpass(frequency: Param) -> Self { Self::new(FilterKind::Highpass, frequency) }
    pub fn bandpass(frequency: Param) -> Self { Self::new(FilterKind::Bandpass, frequency) }

    pub fn with_q(mut self, q: f32) -> Self {
        self.q = q;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Generator {
    Oscillator { waveform: Waveform, frequency: Param },
    Noise { buffer: Arc<SoundBuffer>, looping: bool },
}

/// Commands a caller can send to a voice that is already playing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceCommand {
    FadeOut { at: f64, window: f64, floor: f32, role: FadeRole },
    /// Disconnect and stop immediately.
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub generator: Generator,
    pub filter: Option<Filter>,
    pub gain: Param,
    /// Equal-power stereo position in [-1, 1]; `None` feeds both channels.
    pub pan: Option<f32>,
    pub start: f64,
    pub stop: Option<f64>,
}

impl Voice {
    fn from_generator(generator: Generator) -> Self {
        Self {
            generator,
            filter: None,
            gain: Param::constant(1.0),
            pan: None,
            start: 0.0,
            stop: None,
        }
    }

    pub fn oscillator(waveform: Waveform, frequency: Param) -> Self {
        Self::from_generator(Generator::Oscillator { waveform, frequency })
    }

    /// One-shot playback of `buffer`; ends with the buffer unless looped.
    pub fn noise(buffer: Arc<SoundBuffer>) -> Self {
        Self::from_generator(Generator::Noise { buffer, looping: false })
    }

    pub fn looping(mut self) -> Self {
        if let Generator::Noise { looping, .. } = &mut self.generator {
            *looping = true;
        }
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn gain(mut self, gain: Param) -> Self {
        self.gain = gain;
        self
    }

    pub fn pan(mut self, pan: f32) -> Self {
        self.pan = Some(pan.clamp(-1.0, 1.0));
        self
    }

    pub fn starting_at(mut self, start: f64) -> Self {
        self.start = start;
        self
    }

    pub fn between(mut self, start: f64, stop: f64) -> Self {
        self.start = start;
        self.stop = Some(stop);
        self
    }

    pub fn frequency(&self) -> Option<&Param> {
        match &self.generator {
            Generator::Oscillator { frequency, .. } => Some(frequency),
            Generator::Noise { .. } => None,
        }
    }

    pub fn waveform(&self) -> Option<Waveform> {
        match &self.generator {
            Generator::Oscillator { waveform, .. } => Some(*waveform),
            Generator::Noise { .. } => None,
        }
    }

    pub fn is_oscillator(&self) -> bool {
        matches!(self.generator, Generator::Oscillator { .. })
    }

    /// Apply `command`; returns false once the voice should stop rendering.
    pub fn apply(&mut self, command: &VoiceCommand) -> bool {
        match *command {
            VoiceCommand::FadeOut { at, window, floor, role } => {
                self.gain.fade_out(at, window, floor, role);
                true
            }
            VoiceCommand::Stop => false,
        }
    }
}
