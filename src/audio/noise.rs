//! Colored noise buffers.
//!
//! Every call draws fresh white noise, so two buffers of the same length are
//! never expected to match. Samples are clamped to [-1, 1] before anything
//! downstream scales them.

use rand::Rng;

/// Immutable mono sample data at a fixed rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundBuffer {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl SoundBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self { sample_rate, samples }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 { self.sample_rate }

    #[inline]
    pub fn samples(&self) -> &[f32] { &self.samples }

    #[inline]
    pub fn len(&self) -> usize { self.samples.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseKind {
    /// Flat spectrum.
    White,
    /// About -3 dB/octave.
    Pink,
    /// About -6 dB/octave.
    Brown,
    /// Sparse random clicks over silence.
    Crackle,
}

/// Chance per sample that the crackle generator emits a click.
pub const CRACKLE_PROBABILITY: f64 = 0.001;

/// Leak coefficient of the brown-noise integrator.
const BROWN_LEAK: f32 = 0.02;
/// Post-integration boost so brown noise sits at roughly pink loudness.
const BROWN_BOOST: f32 = 3.5;

fn frame_count(duration: f64, sample_rate: u32) -> usize {
    if !duration.is_finite() || duration <= 0.0 {
        return 0;
    }
    (duration * sample_rate as f64) as usize
}

#[inline]
fn white_sample(rng: &mut impl Rng) -> f32 {
    rng.gen::<f32>() * 2.0 - 1.0
}

/// Synthesize `duration` seconds of `kind` noise at `sample_rate`.
pub fn generate(kind: NoiseKind, duration: f64, sample_rate: u32, rng: &mut impl Rng) -> SoundBuffer {
    match kind {
        NoiseKind::White => white(duration, sample_rate, rng),
        NoiseKind::Pink => pink(duration, sample_rate, rng),
        NoiseKind::Brown => brown(duration, sample_rate, rng),
        NoiseKind::Crackle => crackle(duration, sample_rate, rng),
    }
}

pub fn white(duration: f64, sample_rate: u32, rng: &mut impl Rng) -> SoundBuffer {
    let samples = (0..frame_count(duration, sample_rate))
        .map(|_| white_sample(rng))
        .collect();
    SoundBuffer::new(sample_rate, samples)
}

/// Paul Kellett's refined pink filter: seven one-pole sections summed over
/// the white input. Filter state starts at zero for every buffer.
pub fn pink(duration: f64, sample_rate: u32, rng: &mut impl Rng) -> SoundBuffer {
    let len = frame_count(duration, sample_rate);
    let mut samples = Vec::with_capacity(len);
    let (mut b0, mut b1, mut b2, mut b3, mut b4, mut b5, mut b6) =
        (0f32, 0f32, 0f32, 0f32, 0f32, 0f32, 0f32);

    for _ in 0..len {
        let white = white_sample(rng);
        b0 = 0.99886 * b0 + white * 0.0555179;
        b1 = 0.99332 * b1 + white * 0.0750759;
        b2 = 0.96900 * b2 + white * 0.1538520;
        b3 = 0.86650 * b3 + white * 0.3104856;
        b4 = 0.55000 * b4 + white * 0.5329522;
        b5 = -0.7616 * b5 - white * 0.0168980;
        let out = (b0 + b1 + b2 + b3 + b4 + b5 + b6 + white * 0.5362) * 0.11;
        samples.push(out.clamp(-1.0, 1.0));
        b6 = white * 0.115926;
    }
    SoundBuffer::new(sample_rate, samples)
}

/// Leaky integration of white noise. The leak keeps the walk from drifting.
pub fn brown(duration: f64, sample_rate: u32, rng: &mut impl Rng) -> SoundBuffer {
    let len = frame_count(duration, sample_rate);
    let mut samples = Vec::with_capacity(len);
    let mut last = 0f32;

    for _ in 0..len {
        let white = white_sample(rng);
        last = (last + BROWN_LEAK * white) / (1.0 + BROWN_LEAK);
        samples.push((last * BROWN_BOOST).clamp(-1.0, 1.0));
    }
    SoundBuffer::new(sample_rate, samples)
}

pub fn crackle(duration: f64, sample_rate: u32, rng: &mut impl Rng) -> SoundBuffer {
    let samples = (0..frame_count(duration, sample_rate))
        .map(|_| {
            if rng.gen_bool(CRACKLE_PROBABILITY) {
                white_sample(rng) * 0.8
            } else {
                0.0
            }
        })
        .collect();
    SoundBuffer::new(sample_rate, samples)
}
