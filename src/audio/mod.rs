// Leaves first: noise and graph description, then rendering and the device
// seam, then the parts that play sounds.
pub mod noise;
pub mod graph;
pub mod render;
pub mod output;
pub mod context;
pub mod effects;
pub mod scheduler;
pub mod ambience;
pub mod biomes;
pub mod engine;

pub use noise::{NoiseKind, SoundBuffer};
pub use graph::{FadeRole, Filter, FilterKind, Lfo, Param, Timeline, Voice, VoiceCommand, Waveform};
pub use output::{list_output_devices, AudioOutput, RodioOutput, VoiceHandle, VoiceId};
pub use context::EngineContext;
pub use effects::{Effect, Synth};
pub use scheduler::{Scheduler, TimerHandle};
pub use ambience::{AmbienceManager, AmbienceSession, Biome, PersistentNode, SessionId, SessionState, SubEvent};
pub use biomes::SessionBuffers;
pub use engine::AudioEngine;
