//! Public audio surface for the game.
//!
//! `AudioEngine` owns the context, the one-shot synthesizer and the ambience
//! manager. Every operation is infallible and safe to call before `init`:
//! the device opens on first use, and without one everything is silent.
//! The host calls [`AudioEngine::update`] once per frame.

use super::ambience::{AmbienceManager, Biome, SessionState};
use super::context::EngineContext;
use super::effects::{Effect, Synth};
use crate::config::AudioConfig;

pub struct AudioEngine {
    ctx: EngineContext,
    synth: Synth,
    ambience: AmbienceManager,
}

impl AudioEngine {
    pub fn new(config: AudioConfig) -> Self {
        Self::with_context(EngineContext::new(config))
    }

    pub fn with_context(ctx: EngineContext) -> Self {
        Self { ctx, synth: Synth::new(), ambience: AmbienceManager::new() }
    }

    /// Fixed random streams, for reproducible runs.
    pub fn seeded(ctx: EngineContext, seed: u64) -> Self {
        Self {
            ctx,
            synth: Synth::seeded(seed),
            ambience: AmbienceManager::seeded(seed.wrapping_add(1)),
        }
    }

    pub fn context(&self) -> &EngineContext { &self.ctx }

    pub fn ambience(&self) -> &AmbienceManager { &self.ambience }

    /// Warm up the device, typically on the first user interaction.
    pub fn init(&mut self) {
        self.ctx.init();
    }

    /// Host tick: fire due sub-events and retire faded sessions.
    pub fn update(&mut self) {
        self.ambience.update(&mut self.ctx);
    }

    pub fn suspend(&mut self) {
        self.ctx.suspend();
    }

    pub fn play(&mut self, effect: Effect) {
        self.synth.play(&mut self.ctx, effect);
    }

    pub fn play_gem_collect(&mut self) { self.synth.play_gem_collect(&mut self.ctx) }
    pub fn play_letter_collect(&mut self) { self.synth.play_letter_collect(&mut self.ctx) }
    pub fn play_jump(&mut self, double: bool) { self.synth.play_jump(&mut self.ctx, double) }
    pub fn play_damage(&mut self) { self.synth.play_damage(&mut self.ctx) }
    pub fn play_shatter(&mut self) { self.synth.play_shatter(&mut self.ctx) }
    pub fn play_seagull(&mut self, volume: f32, pan: f32) { self.synth.play_seagull(&mut self.ctx, volume, pan) }
    pub fn play_forest_bird(&mut self, pan: f32) { self.synth.play_forest_bird(&mut self.ctx, pan) }
    pub fn play_magic_chime(&mut self) { self.synth.play_magic_chime(&mut self.ctx) }
    pub fn play_wing_flap(&mut self) { self.synth.play_wing_flap(&mut self.ctx) }
    pub fn play_crystal_resonance(&mut self) { self.synth.play_crystal_resonance(&mut self.ctx) }
    pub fn play_eruption(&mut self) { self.synth.play_eruption(&mut self.ctx) }
    pub fn play_lava_splash(&mut self) { self.synth.play_lava_splash(&mut self.ctx) }
    pub fn play_sizzle(&mut self) { self.synth.play_sizzle(&mut self.ctx) }
    pub fn play_snow_step(&mut self) { self.synth.play_snow_step(&mut self.ctx) }
    pub fn play_snow_land(&mut self) { self.synth.play_snow_land(&mut self.ctx) }

    pub fn start_ambience(&mut self, biome: Biome) {
        self.ambience.start(biome, &mut self.ctx);
    }

    pub fn stop_ambience(&mut self, biome: Biome) {
        self.ambience.stop(biome, &mut self.ctx);
    }

    pub fn stop_all_ambience(&mut self) {
        self.ambience.stop_all(&mut self.ctx);
    }

    pub fn ambience_state(&self, biome: Biome) -> SessionState {
        self.ambience.state(biome)
    }

    pub fn start_coastal_ambience(&mut self) { self.start_ambience(Biome::Coastal) }
    pub fn stop_coastal_ambience(&mut self) { self.stop_ambience(Biome::Coastal) }
    pub fn start_volcanic_ambience(&mut self) { self.start_ambience(Biome::Volcanic) }
    pub fn stop_volcanic_ambience(&mut self) { self.stop_ambience(Biome::Volcanic) }
    pub fn start_snow_ambience(&mut self) { self.start_ambience(Biome::Snow) }
    pub fn stop_snow_ambience(&mut self) { self.stop_ambience(Biome::Snow) }
    pub fn start_forest_ambience(&mut self) { self.start_ambience(Biome::Forest) }
    pub fn stop_forest_ambience(&mut self) { self.stop_ambience(Biome::Forest) }
    pub fn start_chess_ambience(&mut self) { self.start_ambience(Biome::Chess) }
    pub fn stop_chess_ambience(&mut self) { self.stop_ambience(Biome::Chess) }
    pub fn start_crystal_ambience(&mut self) { self.start_ambience(Biome::Crystal) }
    pub fn stop_crystal_ambience(&mut self) { self.stop_ambience(Biome::Crystal) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::recording::{context, unavailable_context};

    #[test]
    fn operations_before_init_open_the_device() {
        let (ctx, out) = context();
        let mut engine = AudioEngine::seeded(ctx, 1);
        engine.play_gem_collect();
        assert!(engine.context().is_initialized());
        assert_eq!(out.voice_count(), 1);
    }

    #[test]
    fn silent_without_device() {
        let mut engine = AudioEngine::seeded(unavailable_context(), 2);
        engine.init();
        engine.play_eruption();
        engine.play_seagull(0.5, 0.2);
        engine.start_coastal_ambience();
        engine.update();
        engine.stop_coastal_ambience();
        assert_eq!(engine.ambience_state(Biome::Coastal), SessionState::Inactive);
    }

    #[test]
    fn named_ambience_operations_map_to_biomes() {
        let (ctx, out) = context();
        let mut engine = AudioEngine::seeded(ctx, 3);
        engine.start_volcanic_ambience();
        engine.start_crystal_ambience();
        assert_eq!(engine.ambience_state(Biome::Volcanic), SessionState::Active);
        assert_eq!(engine.ambience_state(Biome::Crystal), SessionState::Active);
        assert_eq!(engine.ambience_state(Biome::Snow), SessionState::Inactive);

        engine.stop_volcanic_ambience();
        assert_eq!(engine.ambience_state(Biome::Volcanic), SessionState::TearingDown);
        out.advance(2.0);
        engine.update();
        assert_eq!(engine.ambience_state(Biome::Volcanic), SessionState::Inactive);
        assert_eq!(engine.ambience_state(Biome::Crystal), SessionState::Active);
    }

    #[test]
    fn suspend_is_undone_by_the_next_sound() {
        let (ctx, out) = context();
        let mut engine = AudioEngine::seeded(ctx, 4);
        engine.init();
        engine.suspend();
        assert!(out.0.borrow().suspended);
        engine.play_jump(true);
        assert!(!out.0.borrow().suspended);
    }

    #[test]
    fn stop_all_tears_everything_down() {
        let (ctx, out) = context();
        let mut engine = AudioEngine::seeded(ctx, 5);
        for biome in Biome::ALL {
            engine.start_ambience(biome);
        }
        engine.stop_all_ambience();
        out.advance(2.0);
        engine.update();
        for biome in Biome::ALL {
            assert_eq!(engine.ambience_state(biome), SessionState::Inactive, "{biome}");
        }
    }
}
