//! One-shot sound effects.
//!
//! Each effect is a handful of voices with fixed envelopes and a finite stop
//! time, played detached: nothing keeps a handle, the mixer drops them when
//! they end. Effects never fail; without a device they do nothing, and a layer
//! whose noise buffer can't be made is skipped on its own.

use std::sync::Arc;

use clap::ValueEnum;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::context::EngineContext;
use super::graph::{Filter, Param, Voice, Waveform};
use super::noise::{NoiseKind, SoundBuffer};

/// Every effect the synthesizer can play on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Effect {
    GemCollect,
    LetterCollect,
    Jump,
    DoubleJump,
    Damage,
    Shatter,
    Seagull,
    ForestBird,
    MagicChime,
    WingFlap,
    CrystalResonance,
    Eruption,
    LavaSplash,
    Sizzle,
    SnowStep,
    SnowLand,
}

impl Effect {
    /// Time from trigger until the last voice of the effect has stopped.
    pub fn duration(self) -> f64 {
        match self {
            Effect::GemCollect | Effect::Jump | Effect::DoubleJump | Effect::WingFlap => 0.15,
            Effect::LetterCollect => 0.38,
            Effect::Damage | Effect::SnowLand => 0.3,
            Effect::Shatter | Effect::Sizzle => 0.2,
            Effect::Seagull => 0.75,
            Effect::ForestBird => 0.24,
            Effect::MagicChime => 1.6,
            Effect::CrystalResonance => 1.2,
            Effect::Eruption => 3.0,
            Effect::LavaSplash => 0.5,
            Effect::SnowStep => 0.1,
        }
    }
}

/// Shape of one ocean wave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WaveClass {
    pub duration: f64,
    pub intensity: f32,
    /// Fraction of the duration spent swelling to the peak.
    pub attack: f64,
    /// Scales every filter frequency.
    pub brightness: f32,
}

impl WaveClass {
    /// 30% rolling swell, 40% standard crash, 30% splash.
    pub fn pick(rng: &mut impl Rng) -> Self {
        let roll: f64 = rng.gen();
        if roll < 0.3 {
            Self { duration: 6.0 + rng.gen::<f64>() * 2.0, intensity: 0.18, attack: 0.4, brightness: 0.8 }
        } else if roll < 0.7 {
            Self { duration: 4.0 + rng.gen::<f64>(), intensity: 0.15, attack: 0.15, brightness: 1.0 }
        } else {
            Self { duration: 2.5 + rng.gen::<f64>(), intensity: 0.12, attack: 0.05, brightness: 1.4 }
        }
    }
}

/// `from` at `t`, exponential decay to `to` at `end`.
fn decay(t: f64, from: f32, to: f32, end: f64) -> Param {
    Param::starting(from, t).exp_to(to, end)
}

/// Silent at `t`, linear attack to `peak`, exponential decay to `floor`.
fn swell(t: f64, peak: f32, peak_at: f64, floor: f32, end: f64) -> Param {
    Param::starting(0.0, t).linear_to(peak, peak_at).exp_to(floor, end)
}

pub struct Synth {
    rng: StdRng,
}

impl Default for Synth {
    fn default() -> Self {
        Self::new()
    }
}

impl Synth {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn play(&mut self, ctx: &mut EngineContext, effect: Effect) {
        debug!("effect {effect:?}");
        match effect {
            Effect::GemCollect => self.play_gem_collect(ctx),
            Effect::LetterCollect => self.play_letter_collect(ctx),
            Effect::Jump => self.play_jump(ctx, false),
            Effect::DoubleJump => self.play_jump(ctx, true),
            Effect::Damage => self.play_damage(ctx),
            Effect::Shatter => self.play_shatter(ctx),
            Effect::Seagull => self.play_seagull(ctx, 1.0, 0.0),
            Effect::ForestBird => self.play_forest_bird(ctx, 0.0),
            Effect::MagicChime => self.play_magic_chime(ctx),
            Effect::WingFlap => self.play_wing_flap(ctx),
            Effect::CrystalResonance => self.play_crystal_resonance(ctx),
            Effect::Eruption => self.play_eruption(ctx),
            Effect::LavaSplash => self.play_lava_splash(ctx),
            Effect::Sizzle => self.play_sizzle(ctx),
            Effect::SnowStep => self.play_snow_step(ctx),
            Effect::SnowLand => self.play_snow_land(ctx),
        }
    }

    fn noise(&mut self, ctx: &EngineContext, kind: NoiseKind, duration: f64) -> Option<Arc<SoundBuffer>> {
        ctx.noise(kind, duration, &mut self.rng)
    }

    /// High sine ding with an upward inflection.
    pub fn play_gem_collect(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        let freq = Param::starting(1200.0, t).exp_to(2000.0, t + 0.1);
        ctx.play(
            Voice::oscillator(Waveform::Sine, freq)
                .gain(decay(t, 0.5, 0.01, t + 0.15))
                .between(t, t + 0.15),
        );
    }

    /// C major arpeggio on triangles, 40 ms apart.
    pub fn play_letter_collect(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        for (i, freq) in [523.25, 659.25, 783.99].into_iter().enumerate() {
            let start = t + i as f64 * 0.04;
            let dur = 0.3;
            ctx.play(
                Voice::oscillator(Waveform::Triangle, Param::constant(freq))
                    .gain(decay(start, 0.3, 0.01, start + dur))
                    .between(start, start + dur),
            );
        }
    }

    /// Rising whoop; the double jump sits an octave-ish higher.
    pub fn play_jump(&mut self, ctx: &mut EngineContext, double: bool) {
        let Some(t) = ctx.ensure_ready() else { return };
        let (from, to) = if double { (400.0, 800.0) } else { (200.0, 450.0) };
        ctx.play(
            Voice::oscillator(Waveform::Sine, Param::starting(from, t).exp_to(to, t + 0.15))
                .gain(decay(t, 0.2, 0.01, t + 0.15))
                .between(t, t + 0.15),
        );
    }

    /// White noise crunch over a falling sawtooth thud.
    pub fn play_damage(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };

        if let Some(buffer) = self.noise(ctx, NoiseKind::White, 0.3) {
            ctx.play(Voice::noise(buffer).gain(decay(t, 0.5, 0.01, t + 0.2)).between(t, t + 0.3));
        }
        ctx.play(
            Voice::oscillator(Waveform::Sawtooth, Param::starting(100.0, t).exp_to(20.0, t + 0.3))
                .gain(decay(t, 0.6, 0.01, t + 0.3))
                .between(t, t + 0.3),
        );
    }

    /// Noise crash plus a falling glassy triangle.
    pub fn play_shatter(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };

        if let Some(buffer) = self.noise(ctx, NoiseKind::White, 0.2) {
            ctx.play(Voice::noise(buffer).gain(decay(t, 0.4, 0.01, t + 0.2)).between(t, t + 0.2));
        }
        ctx.play(
            Voice::oscillator(Waveform::Triangle, Param::starting(2000.0, t).exp_to(800.0, t + 0.15))
                .gain(decay(t, 0.3, 0.01, t + 0.15))
                .between(t, t + 0.15),
        );
    }

    /// Two falling sawtooth calls 0.4 s apart ("kaa-kaa"), each with its own
    /// pitch jitter.
    pub fn play_seagull(&mut self, ctx: &mut EngineContext, volume: f32, pan: f32) {
        let Some(t) = ctx.ensure_ready() else { return };
        let volume = volume.clamp(0.0, 1.0);

        for (i, offset) in [0.0, 0.4].into_iter().enumerate() {
            let jitter = (self.rng.gen::<f32>() - 0.5) * 50.0;
            let (from, to) = if i == 0 { (1100.0, 800.0) } else { (1000.0, 700.0) };
            let start = t + offset;

            ctx.play(
                Voice::oscillator(
                    Waveform::Sawtooth,
                    Param::starting(from + jitter, start).linear_to(to + jitter, start + 0.3),
                )
                .filter(Filter::lowpass(Param::constant(1800.0)))
                .gain(swell(start, 0.05 * volume, start + 0.05, 0.001, start + 0.3))
                .pan(pan)
                .between(start, start + 0.35),
            );
        }
    }

    /// Either a single rising tweet or a falling double chirp.
    pub fn play_forest_bird(&mut self, ctx: &mut EngineContext, pan: f32) {
        let Some(t) = ctx.ensure_ready() else { return };

        if self.rng.gen_range(0..3) == 0 {
            let from = 2000.0 + self.rng.gen::<f32>() * 500.0;
            let to = 2500.0 + self.rng.gen::<f32>() * 500.0;
            ctx.play(
                Voice::oscillator(Waveform::Sine, Param::starting(from, t).linear_to(to, t + 0.1))
                    .gain(swell(t, 0.08, t + 0.02, 0.001, t + 0.1))
                    .pan(pan)
                    .between(t, t + 0.15),
            );
        } else {
            for offset in [0.0, 0.12] {
                let start = t + offset;
                ctx.play(
                    Voice::oscillator(Waveform::Sine, Param::starting(2800.0, start).exp_to(1800.0, start + 0.08))
                        .gain(swell(start, 0.06, start + 0.01, 0.001, start + 0.1))
                        .pan(pan)
                        .between(start, start + 0.12),
                );
            }
        }
    }

    /// Cluster of high sines with staggered attacks.
    pub fn play_magic_chime(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        for (i, freq) in [880.0, 1108.0, 1318.0, 1760.0].into_iter().enumerate() {
            ctx.play(
                Voice::oscillator(Waveform::Sine, Param::constant(freq))
                    .gain(swell(t, 0.05, t + 0.05 + i as f64 * 0.05, 0.001, t + 1.5))
                    .between(t, t + 1.6),
            );
        }
    }

    pub fn play_wing_flap(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        let Some(buffer) = self.noise(ctx, NoiseKind::Pink, 0.15) else { return };
        ctx.play(
            Voice::noise(buffer)
                .filter(Filter::lowpass(Param::starting(300.0, t).linear_to(100.0, t + 0.1)))
                .gain(swell(t, 0.15, t + 0.02, 0.001, t + 0.15))
                .between(t, t + 0.15),
        );
    }

    /// Sine sweep A5 to A4 with a short triangle sparkle on top.
    pub fn play_crystal_resonance(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        ctx.play(
            Voice::oscillator(Waveform::Sine, Param::starting(880.0, t).exp_to(440.0, t + 1.2))
                .gain(swell(t, 0.25, t + 0.1, 0.01, t + 1.2))
                .between(t, t + 1.2),
        );
        ctx.play(
            Voice::oscillator(Waveform::Triangle, Param::constant(1760.0))
                .gain(swell(t, 0.05, t + 0.05, 0.001, t + 0.5))
                .between(t, t + 0.5),
        );
    }

    /// Brown rumble, pink blast and crackle debris over three seconds.
    pub fn play_eruption(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        let duration = 3.0;

        if let Some(brown) = self.noise(ctx, NoiseKind::Brown, duration) {
            ctx.play(
                Voice::noise(brown)
                    .filter(Filter::lowpass(Param::starting(100.0, t).exp_to(40.0, t + duration)))
                    .gain(decay(t, 1.0, 0.01, t + duration))
                    .between(t, t + duration),
            );
        }
        if let Some(pink) = self.noise(ctx, NoiseKind::Pink, 1.0) {
            ctx.play(
                Voice::noise(pink)
                    .filter(Filter::lowpass(Param::starting(800.0, t).linear_to(200.0, t + 0.5)))
                    .gain(decay(t, 0.8, 0.001, t + 0.8))
                    .between(t, t + 1.0),
            );
        }
        if let Some(crackle) = self.noise(ctx, NoiseKind::Crackle, 3.0) {
            ctx.play(
                Voice::noise(crackle)
                    .filter(Filter::highpass(Param::constant(1000.0)))
                    .gain(Param::starting(0.8, t).linear_to(0.0, t + 2.5))
                    .between(t, t + 3.0),
            );
        }
    }

    /// Low sine thud with a brown noise splash.
    pub fn play_lava_splash(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        ctx.play(
            Voice::oscillator(Waveform::Sine, Param::starting(150.0, t).exp_to(40.0, t + 0.4))
                .gain(decay(t, 0.5, 0.01, t + 0.4))
                .between(t, t + 0.4),
        );
        if let Some(brown) = self.noise(ctx, NoiseKind::Brown, 0.5) {
            ctx.play(
                Voice::noise(brown)
                    .filter(Filter::lowpass(Param::starting(400.0, t).linear_to(100.0, t + 0.3)))
                    .gain(decay(t, 0.4, 0.01, t + 0.4))
                    .between(t, t + 0.5),
            );
        }
    }

    pub fn play_sizzle(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        let Some(pink) = self.noise(ctx, NoiseKind::Pink, 0.2) else { return };
        ctx.play(
            Voice::noise(pink)
                .filter(Filter::highpass(Param::constant(2000.0)))
                .gain(decay(t, 0.05, 0.001, t + 0.15))
                .between(t, t + 0.2),
        );
    }

    pub fn play_snow_step(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        let Some(white) = self.noise(ctx, NoiseKind::White, 0.1) else { return };
        ctx.play(
            Voice::noise(white)
                .filter(Filter::lowpass(Param::constant(3000.0)))
                .gain(decay(t, 0.15, 0.001, t + 0.1))
                .between(t, t + 0.1),
        );
    }

    pub fn play_snow_land(&mut self, ctx: &mut EngineContext) {
        let Some(t) = ctx.ensure_ready() else { return };
        let Some(white) = self.noise(ctx, NoiseKind::White, 0.3) else { return };
        ctx.play(
            Voice::noise(white)
                .filter(Filter::lowpass(Param::constant(1500.0)))
                .gain(decay(t, 0.3, 0.001, t + 0.25))
                .between(t, t + 0.3),
        );
    }

    /// One ocean wave: high-passed pink hiss and low-passed brown roar that
    /// swell together, panned to one spot. Returns the wave's duration.
    pub(crate) fn play_wave(
        &mut self,
        ctx: &mut EngineContext,
        pink: &Arc<SoundBuffer>,
        brown: &Arc<SoundBuffer>,
    ) -> Option<f64> {
        let t = ctx.ensure_ready()?;
        let wave = WaveClass::pick(&mut self.rng);
        let pan = self.rng.gen::<f32>() * 1.6 - 0.8;
        let peak = t + wave.duration * wave.attack;
        let end = t + wave.duration;
        let m = wave.brightness;

        ctx.play(
            Voice::noise(pink.clone())
                .looping()
                .filter(Filter::highpass(
                    Param::starting(400.0 * m, t).linear_to(1200.0 * m, peak).exp_to(400.0 * m, end),
                ))
                .gain(swell(t, wave.intensity * 0.8, peak, 0.001, end))
                .pan(pan)
                .between(t, end + 0.1),
        );
        ctx.play(
            Voice::noise(brown.clone())
                .looping()
                .filter(Filter::lowpass(
                    Param::starting(200.0 * m, t).linear_to(600.0 * m, peak).exp_to(150.0 * m, end),
                ))
                .gain(swell(t, wave.intensity, peak, 0.001, end))
                .pan(pan)
                .between(t, end + 0.1),
        );
        Some(wave.duration)
    }

    /// Short wooden click for the chess hall clock.
    pub(crate) fn play_clock_tick(&mut self, ctx: &mut EngineContext, click: &Arc<SoundBuffer>) {
        let Some(t) = ctx.ensure_ready() else { return };
        ctx.play(
            Voice::noise(click.clone())
                .filter(Filter::bandpass(Param::constant(1200.0)).with_q(2.0))
                .gain(decay(t, 0.05, 0.001, t + 0.05))
                .between(t, t + click.duration()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::graph::FilterKind;
    use crate::audio::output::recording::{context, unavailable_context};

    fn ready() -> (EngineContext, crate::audio::output::recording::RecordingOutput) {
        let (mut ctx, out) = context();
        ctx.init();
        out.advance(10.0);
        (ctx, out)
    }

    #[test]
    fn double_jump_is_strictly_higher() {
        let (mut ctx, out) = ready();
        let mut synth = Synth::seeded(1);
        synth.play_jump(&mut ctx, false);
        synth.play_jump(&mut ctx, true);

        let voices = out.voices_since(0);
        let single = voices[0].frequency().unwrap();
        let double = voices[1].frequency().unwrap();
        assert!(double.base.start_value() > single.base.start_value());
        assert!(double.base.end_value() > single.base.end_value());
    }

    #[test]
    fn seagull_is_two_offset_calls() {
        let (mut ctx, out) = ready();
        let mut synth = Synth::seeded(2);
        synth.play_seagull(&mut ctx, 0.5, -0.9);

        let voices = out.voices_since(0);
        assert_eq!(voices.len(), 2);
        assert!(voices.iter().all(|v| v.waveform() == Some(Waveform::Sawtooth)));
        assert!((voices[1].start - voices[0].start - 0.4).abs() < 1e-9);

        for v in &voices {
            assert_eq!(v.pan, Some(-0.9));
            assert!((v.gain.base.peak() - 0.025).abs() < 1e-6);
            assert_eq!(v.filter.as_ref().map(|f| f.kind), Some(FilterKind::Lowpass));
            let freq = v.frequency().unwrap();
            assert!(freq.base.end_value() < freq.base.start_value());
        }
        // independent jitter per call
        let first = voices[0].frequency().unwrap().base.start_value() - 1100.0;
        let second = voices[1].frequency().unwrap().base.start_value() - 1000.0;
        assert_ne!(first, second);
    }

    #[test]
    fn seagull_volume_is_clamped() {
        let (mut ctx, out) = ready();
        Synth::seeded(3).play_seagull(&mut ctx, 4.0, 0.0);
        let voices = out.voices_since(0);
        assert!((voices[0].gain.base.peak() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn every_effect_stops_on_its_own() {
        let (mut ctx, out) = ready();
        let mut synth = Synth::seeded(4);
        for effect in Effect::value_variants() {
            let before = out.voice_count();
            let t = out.now();
            synth.play(&mut ctx, *effect);
            let voices = out.voices_since(before);
            assert!(!voices.is_empty(), "{effect:?} played nothing");
            for v in voices {
                let stop = v.stop.expect("one-shot without stop time");
                assert!(stop <= t + effect.duration() + 1e-9, "{effect:?} outlives its duration");
            }
        }
    }

    #[test]
    fn eruption_has_three_layers() {
        let (mut ctx, out) = ready();
        Synth::seeded(5).play_eruption(&mut ctx);
        let voices = out.voices_since(0);
        assert_eq!(voices.len(), 3);
        assert!(voices.iter().all(|v| !v.is_oscillator()));
    }

    #[test]
    fn unavailable_context_is_a_no_op() {
        let mut ctx = unavailable_context();
        let mut synth = Synth::seeded(6);
        for effect in Effect::value_variants() {
            synth.play(&mut ctx, *effect);
        }
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn wave_classes_cover_documented_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let w = WaveClass::pick(&mut rng);
            match w.intensity {
                i if i == 0.18 => assert!((6.0..8.0).contains(&w.duration)),
                i if i == 0.15 => assert!((4.0..5.0).contains(&w.duration)),
                i if i == 0.12 => assert!((2.5..3.5).contains(&w.duration)),
                other => panic!("unexpected intensity {other}"),
            }
        }
    }

    #[test]
    fn wave_pans_hiss_and_roar_together() {
        let (mut ctx, out) = ready();
        let mut synth = Synth::seeded(8);
        let mut rng = StdRng::seed_from_u64(8);
        let pink = Arc::new(crate::audio::noise::pink(1.0, 8_000, &mut rng));
        let brown = Arc::new(crate::audio::noise::brown(1.0, 8_000, &mut rng));

        let duration = synth.play_wave(&mut ctx, &pink, &brown).unwrap();
        let voices = out.voices_since(0);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].pan, voices[1].pan);
        let pan = voices[0].pan.unwrap();
        assert!((-0.8..0.8).contains(&pan));
        for v in voices {
            assert!((v.stop.unwrap() - (10.0 + duration + 0.1)).abs() < 1e-9);
        }
    }
}
