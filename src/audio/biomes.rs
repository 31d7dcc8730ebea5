//! Persistent layers of each biome's ambience.
//!
//! A builder plays the always-on voices of one biome, tags each with the role
//! teardown will fade, and names the recurring sub-events the session should
//! arm. Layers start silent and ramp in, so a builder never clicks.

use std::sync::Arc;

use rand::Rng;

use super::ambience::{Biome, PersistentNode, SubEvent};
use super::context::EngineContext;
use super::graph::{Curve, FadeRole, Filter, Lfo, Param, Voice, Waveform};
use super::noise::{NoiseKind, SoundBuffer};

const FADE_IN: f64 = 2.0;

/// Buffers a session keeps for its sub-events.
#[derive(Debug, Clone, Default)]
pub struct SessionBuffers {
    pub pink: Option<Arc<SoundBuffer>>,
    pub brown: Option<Arc<SoundBuffer>>,
    /// Clock tick click.
    pub click: Option<Arc<SoundBuffer>>,
}

pub(crate) struct Layers {
    pub nodes: Vec<PersistentNode>,
    pub buffers: SessionBuffers,
    pub sub_events: Vec<SubEvent>,
}

struct Builder<'a> {
    ctx: &'a mut EngineContext,
    t: f64,
    nodes: Vec<PersistentNode>,
}

impl Builder<'_> {
    fn layer(&mut self, voice: Voice, role: FadeRole) {
        if let Some(handle) = self.ctx.play(voice.starting_at(self.t)) {
            self.nodes.push(PersistentNode { voice: handle, role });
        }
    }

    /// Silent now, linear ramp to `level` after `fade_in` seconds.
    fn fade_in(&self, level: f32, fade_in: f64) -> Param {
        Param::starting(0.0, self.t).linear_to(level, self.t + fade_in)
    }

    /// LFO whose depth ramps in alongside the layer gain.
    fn lfo(&self, rate: f32, depth: f32, fade_in: f64) -> Lfo {
        let mut lfo = Lfo::new(rate, 0.0);
        lfo.depth.set_at(self.t, 0.0);
        lfo.depth.ramp_to(depth, self.t + fade_in, Curve::Linear);
        lfo
    }

    fn finish(self, buffers: SessionBuffers, sub_events: Vec<SubEvent>) -> Layers {
        Layers { nodes: self.nodes, buffers, sub_events }
    }
}

/// Build the layers for `biome` at engine time `t`. `None` when a buffer the
/// biome cannot do without is missing.
pub(crate) fn build(biome: Biome, ctx: &mut EngineContext, rng: &mut impl Rng, t: f64) -> Option<Layers> {
    let builder = Builder { ctx, t, nodes: Vec::new() };
    match biome {
        Biome::Coastal => coastal(builder, rng),
        Biome::Volcanic => volcanic(builder, rng),
        Biome::Snow => snow(builder, rng),
        Biome::Forest => forest(builder, rng),
        Biome::Chess => chess(builder, rng),
        Biome::Crystal => crystal(builder, rng),
    }
}

/// Deep brown rumble under two bands of lapping pink water, plus waves and
/// distant gulls.
fn coastal(mut b: Builder<'_>, rng: &mut impl Rng) -> Option<Layers> {
    let pink = b.ctx.noise(NoiseKind::Pink, 6.0, rng)?;
    let brown = b.ctx.noise(NoiseKind::Brown, 6.0, rng)?;

    let rumble = Voice::noise(brown.clone())
        .looping()
        .filter(Filter::lowpass(Param::constant(250.0)))
        .gain(b.fade_in(0.12, FADE_IN));
    b.layer(rumble, FadeRole::Gain);

    let lapping = Voice::noise(pink.clone())
        .looping()
        .filter(Filter::bandpass(Param::constant(600.0).with_lfo(Lfo::new(0.2, 300.0))).with_q(0.5))
        .gain(b.fade_in(0.05, FADE_IN));
    b.layer(lapping, FadeRole::Gain);

    let foam_rate = 0.5 + rng.gen::<f32>() * 0.2;
    let foam = Voice::noise(pink.clone())
        .looping()
        .filter(Filter::bandpass(Param::constant(1200.0).with_lfo(Lfo::new(foam_rate, 400.0))).with_q(1.0))
        .gain(b.fade_in(0.03, FADE_IN));
    b.layer(foam, FadeRole::Gain);

    let buffers = SessionBuffers { pink: Some(pink), brown: Some(brown), click: None };
    Some(b.finish(buffers, vec![SubEvent::Wave, SubEvent::Seagull]))
}

/// Subterranean rumble, churning magma and high crackles.
fn volcanic(mut b: Builder<'_>, rng: &mut impl Rng) -> Option<Layers> {
    let brown = b.ctx.noise(NoiseKind::Brown, 10.0, rng)?;
    let crackle = b.ctx.noise(NoiseKind::Crackle, 5.0, rng)?;

    let rumble = Voice::noise(brown.clone())
        .looping()
        .filter(Filter::lowpass(Param::constant(120.0)))
        .gain(b.fade_in(0.25, FADE_IN));
    b.layer(rumble, FadeRole::Gain);

    let churn = Voice::noise(brown)
        .looping()
        .filter(Filter::bandpass(Param::constant(350.0)).with_q(1.0))
        .gain(b.fade_in(0.1, FADE_IN).with_lfo(b.lfo(0.15, 0.05, FADE_IN)));
    b.layer(churn, FadeRole::Gain);

    let pops = Voice::noise(crackle)
        .looping()
        .filter(Filter::highpass(Param::constant(1500.0)))
        .gain(b.fade_in(0.08, 1.0));
    b.layer(pops, FadeRole::Gain);

    Some(b.finish(SessionBuffers::default(), Vec::new()))
}

/// Low howling wind and a faint shimmer of two breathing sines.
fn snow(mut b: Builder<'_>, rng: &mut impl Rng) -> Option<Layers> {
    let brown = b.ctx.noise(NoiseKind::Brown, 10.0, rng)?;

    let wind = Voice::noise(brown)
        .looping()
        .filter(Filter::lowpass(Param::constant(600.0).with_lfo(Lfo::new(0.15, 150.0))))
        .gain(b.fade_in(0.25, FADE_IN));
    b.layer(wind, FadeRole::Gain);

    for freq in [880.0, 1100.0] {
        let rate = 0.1 + rng.gen::<f32>() * 0.2;
        let gain = b.fade_in(0.015, FADE_IN).with_lfo(b.lfo(rate, 0.015, FADE_IN));
        b.layer(Voice::oscillator(Waveform::Sine, Param::constant(freq)).gain(gain), FadeRole::Gain);
    }

    Some(b.finish(SessionBuffers::default(), Vec::new()))
}

/// Rustling leaves over a low drone; songbirds and the odd magic chime.
fn forest(mut b: Builder<'_>, rng: &mut impl Rng) -> Option<Layers> {
    if let Some(pink) = b.ctx.noise(NoiseKind::Pink, 10.0, rng) {
        let leaves = Voice::noise(pink)
            .looping()
            .filter(Filter::highpass(Param::constant(800.0)))
            .gain(b.fade_in(0.08, FADE_IN).with_lfo(b.lfo(0.2, 0.04, FADE_IN)));
        b.layer(leaves, FadeRole::Gain);
    }

    let drone = Voice::oscillator(Waveform::Sine, Param::constant(150.0)).gain(b.fade_in(0.05, FADE_IN));
    b.layer(drone, FadeRole::Gain);

    Some(b.finish(SessionBuffers::default(), vec![SubEvent::Songbird, SubEvent::Chime]))
}

/// Two detuned sawtooth drones through a low lowpass, and a ticking clock.
fn chess(mut b: Builder<'_>, rng: &mut impl Rng) -> Option<Layers> {
    for freq in [60.0, 60.5] {
        let drone = Voice::oscillator(Waveform::Sawtooth, Param::constant(freq))
            .filter(Filter::lowpass(Param::constant(100.0)))
            .gain(b.fade_in(0.15, FADE_IN));
        b.layer(drone, FadeRole::Gain);
    }

    let click = b.ctx.noise(NoiseKind::Pink, 0.05, rng);
    let sub_events = if click.is_some() { vec![SubEvent::Tick] } else { Vec::new() };
    let buffers = SessionBuffers { click, ..SessionBuffers::default() };
    Some(b.finish(buffers, sub_events))
}

/// A minor add9 stack where each note breathes on its own LFO, over a 55 Hz
/// hum.
fn crystal(mut b: Builder<'_>, rng: &mut impl Rng) -> Option<Layers> {
    for freq in [220.0, 261.63, 329.63, 493.88, 523.25] {
        let rate = 0.1 + rng.gen::<f32>() * 0.1;
        let phase = rng.gen::<f32>();
        let breath = b.lfo(rate, 0.03, FADE_IN).with_phase(phase);
        let note = Voice::oscillator(Waveform::Sine, Param::constant(freq))
            .gain(Param::constant(0.0).with_lfo(breath));
        b.layer(note, FadeRole::ModulationDepth);
    }

    let hum = Voice::oscillator(Waveform::Sine, Param::constant(55.0)).gain(b.fade_in(0.1, 4.0));
    b.layer(hum, FadeRole::Gain);

    Some(b.finish(SessionBuffers::default(), Vec::new()))
}
