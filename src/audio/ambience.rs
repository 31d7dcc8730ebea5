//! Per-biome ambience sessions.
//!
//! A session owns the persistent layers of one biome and the timers of its
//! recurring sub-events. At most one session per biome is active. Stopping a
//! session cancels its timers on the spot, fades its layers, and parks the
//! session in a retiring table keyed by its id; a retire timer disconnects
//! exactly those nodes once the teardown window has passed. A new session for
//! the same biome can start while the old one is still fading.

use std::collections::HashMap;
use std::fmt;

use clap::ValueEnum;
use log::{debug, info};
use rand::Rng;

use super::biomes::{self, SessionBuffers};
use super::context::EngineContext;
use super::effects::Synth;
use super::graph::FadeRole;
use super::output::VoiceHandle;
use super::scheduler::{Scheduler, TimerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum Biome {
    Coastal,
    Volcanic,
    Snow,
    Forest,
    Chess,
    Crystal,
}

impl Biome {
    pub const ALL: [Biome; 6] = [
        Biome::Coastal,
        Biome::Volcanic,
        Biome::Snow,
        Biome::Forest,
        Biome::Chess,
        Biome::Crystal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Biome::Coastal => "coastal",
            Biome::Volcanic => "volcanic",
            Biome::Snow => "snow",
            Biome::Forest => "forest",
            Biome::Chess => "chess",
            Biome::Crystal => "crystal",
        }
    }

    /// Seconds from stop until the layers are disconnected.
    pub fn teardown_window(self) -> f64 {
        match self {
            Biome::Chess => 1.0,
            _ => 2.0,
        }
    }

    /// Level the teardown fade decays to.
    pub fn fade_floor(self) -> f32 {
        match self {
            Biome::Crystal => 0.0001,
            _ => 0.001,
        }
    }
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Active,
    TearingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

/// Recurring texture inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubEvent {
    Wave,
    /// Distant gulls on the coast.
    Seagull,
    /// Forest birds.
    Songbird,
    Chime,
    Tick,
}

impl SubEvent {
    pub fn name(self) -> &'static str {
        match self {
            SubEvent::Wave => "wave",
            SubEvent::Seagull | SubEvent::Songbird => "bird",
            SubEvent::Chime => "chime",
            SubEvent::Tick => "tick",
        }
    }

    /// Delay before the first occurrence; `None` fires during start.
    fn first_delay(self, rng: &mut impl Rng) -> Option<f64> {
        match self {
            SubEvent::Wave | SubEvent::Tick => None,
            _ => Some(self.interval(rng)),
        }
    }

    /// Gap to the next occurrence. Waves derive theirs from the wave just
    /// played instead.
    fn interval(self, rng: &mut impl Rng) -> f64 {
        match self {
            SubEvent::Wave => 3.0 * rng.gen::<f64>(),
            SubEvent::Seagull => 8.0 + 15.0 * rng.gen::<f64>(),
            SubEvent::Songbird => 2.0 + 6.0 * rng.gen::<f64>(),
            SubEvent::Chime => 10.0 + 15.0 * rng.gen::<f64>(),
            SubEvent::Tick => 1.0,
        }
    }
}

/// Persistent voice of a session with the part teardown should fade.
#[derive(Debug, Clone)]
pub struct PersistentNode {
    pub voice: VoiceHandle,
    pub role: FadeRole,
}

#[derive(Debug)]
pub struct AmbienceSession {
    id: SessionId,
    biome: Biome,
    state: SessionState,
    started_at: f64,
    nodes: Vec<PersistentNode>,
    timers: HashMap<SubEvent, TimerHandle>,
    buffers: SessionBuffers,
}

impl AmbienceSession {
    pub fn id(&self) -> SessionId { self.id }
    pub fn biome(&self) -> Biome { self.biome }
    pub fn state(&self) -> SessionState { self.state }
    pub fn started_at(&self) -> f64 { self.started_at }
    pub fn nodes(&self) -> &[PersistentNode] { &self.nodes }
    pub fn timers(&self) -> &HashMap<SubEvent, TimerHandle> { &self.timers }
    pub fn buffers(&self) -> &SessionBuffers { &self.buffers }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Task {
    SubEvent { biome: Biome, session: SessionId, kind: SubEvent },
    Retire { session: SessionId },
}

pub struct AmbienceManager {
    synth: Synth,
    scheduler: Scheduler<Task>,
    active: HashMap<Biome, AmbienceSession>,
    retiring: HashMap<SessionId, AmbienceSession>,
    next_session: u64,
}

impl Default for AmbienceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AmbienceManager {
    pub fn new() -> Self {
        Self::with_synth(Synth::new())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_synth(Synth::seeded(seed))
    }

    fn with_synth(synth: Synth) -> Self {
        Self {
            synth,
            scheduler: Scheduler::new(),
            active: HashMap::new(),
            retiring: HashMap::new(),
            next_session: 1,
        }
    }

    /// Start the ambience of `biome`. Does nothing if it is already active,
    /// if no device is available, or if a required buffer can't be made.
    pub fn start(&mut self, biome: Biome, ctx: &mut EngineContext) {
        if self.active.contains_key(&biome) {
            debug!("{biome} ambience already active");
            return;
        }
        let Some(t) = ctx.ensure_ready() else { return };
        let Some(layers) = biomes::build(biome, ctx, self.synth.rng(), t) else {
            debug!("{biome} ambience skipped: buffers unavailable");
            return;
        };

        let id = SessionId(self.next_session);
        self.next_session += 1;
        info!("{biome} ambience started ({} layers)", layers.nodes.len());

        self.active.insert(
            biome,
            AmbienceSession {
                id,
                biome,
                state: SessionState::Active,
                started_at: t,
                nodes: layers.nodes,
                timers: HashMap::new(),
                buffers: layers.buffers,
            },
        );

        for kind in layers.sub_events {
            match kind.first_delay(self.synth.rng()) {
                None => self.fire(biome, id, kind, ctx),
                Some(delay) => self.arm(biome, id, kind, t + delay),
            }
        }
    }

    /// Stop the ambience of `biome`. Timers are cancelled before anything
    /// else happens; layers fade over the biome's teardown window.
    pub fn stop(&mut self, biome: Biome, ctx: &mut EngineContext) {
        let Some(mut session) = self.active.remove(&biome) else { return };

        for (_, timer) in session.timers.drain() {
            self.scheduler.cancel(timer);
        }

        let now = ctx.now().unwrap_or(session.started_at);
        let window = biome.teardown_window();
        let floor = biome.fade_floor();
        for node in &session.nodes {
            node.voice.fade_out(now, window, floor, node.role);
        }

        session.state = SessionState::TearingDown;
        self.scheduler.schedule(now + window, Task::Retire { session: session.id });
        info!("{biome} ambience stopping over {window}s");
        self.retiring.insert(session.id, session);
    }

    pub fn stop_all(&mut self, ctx: &mut EngineContext) {
        for biome in Biome::ALL {
            self.stop(biome, ctx);
        }
    }

    /// Run every timer that has come due by the engine clock.
    pub fn update(&mut self, ctx: &mut EngineContext) {
        let Some(now) = ctx.now() else { return };
        for (_, task) in self.scheduler.poll(now) {
            match task {
                Task::SubEvent { biome, session, kind } => {
                    if let Some(s) = self.active.get_mut(&biome) {
                        if s.id == session {
                            s.timers.remove(&kind);
                        }
                    }
                    self.fire(biome, session, kind, ctx);
                }
                Task::Retire { session } => self.retire(session),
            }
        }
    }

    fn arm(&mut self, biome: Biome, session: SessionId, kind: SubEvent, due: f64) {
        let Some(s) = self.active.get_mut(&biome).filter(|s| s.id == session) else { return };
        let timer = self.scheduler.schedule(due, Task::SubEvent { biome, session, kind });
        s.timers.insert(kind, timer);
    }

    /// Play one sub-event and re-arm it, but only while its own session is
    /// still the active one.
    fn fire(&mut self, biome: Biome, session: SessionId, kind: SubEvent, ctx: &mut EngineContext) {
        let Some(s) = self.active.get(&biome).filter(|s| s.id == session) else { return };
        let buffers = s.buffers.clone();
        debug!("{biome} {}", kind.name());

        let gap = match kind {
            SubEvent::Wave => {
                let (Some(pink), Some(brown)) = (&buffers.pink, &buffers.brown) else { return };
                let Some(duration) = self.synth.play_wave(ctx, pink, brown) else { return };
                duration * 0.6 + kind.interval(self.synth.rng())
            }
            SubEvent::Seagull => {
                let rng = self.synth.rng();
                let volume = 0.3 + rng.gen::<f32>() * 0.3;
                let pan = rng.gen::<f32>() * 1.8 - 0.9;
                self.synth.play_seagull(ctx, volume, pan);
                kind.interval(self.synth.rng())
            }
            SubEvent::Songbird => {
                let pan = (self.synth.rng().gen::<f32>() - 0.5) * 1.5;
                self.synth.play_forest_bird(ctx, pan);
                kind.interval(self.synth.rng())
            }
            SubEvent::Chime => {
                self.synth.play_magic_chime(ctx);
                kind.interval(self.synth.rng())
            }
            SubEvent::Tick => {
                let Some(click) = &buffers.click else { return };
                self.synth.play_clock_tick(ctx, click);
                kind.interval(self.synth.rng())
            }
        };

        let Some(now) = ctx.now() else { return };
        self.arm(biome, session, kind, now + gap);
    }

    fn retire(&mut self, session: SessionId) {
        let Some(mut s) = self.retiring.remove(&session) else { return };
        for node in &s.nodes {
            node.voice.disconnect();
        }
        s.state = SessionState::Inactive;
        info!("{} ambience torn down", s.biome);
    }

    pub fn state(&self, biome: Biome) -> SessionState {
        if self.active.contains_key(&biome) {
            SessionState::Active
        } else if self.retiring.values().any(|s| s.biome == biome) {
            SessionState::TearingDown
        } else {
            SessionState::Inactive
        }
    }

    /// The active session of `biome`, if any.
    pub fn session(&self, biome: Biome) -> Option<&AmbienceSession> {
        self.active.get(&biome)
    }

    /// Sessions fading out but not yet disconnected.
    pub fn retiring(&self) -> impl Iterator<Item = &AmbienceSession> {
        self.retiring.values()
    }

    /// Timers still pending, including retire timers.
    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::graph::VoiceCommand;
    use crate::audio::output::recording::{context, unavailable_context, RecordingOutput};
    use crate::audio::output::VoiceId;

    fn node_ids(session: &AmbienceSession) -> Vec<VoiceId> {
        session.nodes().iter().map(|n| n.voice.id()).collect()
    }

    /// Advance the clock in `step` increments, ticking the manager each time.
    fn run(mgr: &mut AmbienceManager, ctx: &mut EngineContext, out: &RecordingOutput, secs: f64, step: f64) {
        let mut elapsed = 0.0;
        while elapsed < secs {
            out.advance(step);
            elapsed += step;
            mgr.update(ctx);
        }
    }

    #[test]
    fn start_is_idempotent() {
        let (mut ctx, out) = context();
        let mut mgr = AmbienceManager::seeded(1);
        mgr.start(Biome::Forest, &mut ctx);
        let voices = out.voice_count();
        let timers = mgr.pending_timers();
        let id = mgr.session(Biome::Forest).unwrap().id();

        mgr.start(Biome::Forest, &mut ctx);
        assert_eq!(out.voice_count(), voices);
        assert_eq!(mgr.pending_timers(), timers);
        assert_eq!(mgr.session(Biome::Forest).unwrap().id(), id);
        assert_eq!(mgr.session(Biome::Forest).unwrap().timers().len(), 2);
    }

    #[test]
    fn stop_without_session_is_a_no_op() {
        let (mut ctx, out) = context();
        let mut mgr = AmbienceManager::seeded(2);
        mgr.stop(Biome::Snow, &mut ctx);
        assert_eq!(mgr.state(Biome::Snow), SessionState::Inactive);
        assert_eq!(mgr.pending_timers(), 0);
        assert_eq!(out.voice_count(), 0);
    }

    #[test]
    fn unavailable_device_starts_nothing() {
        let mut ctx = unavailable_context();
        let mut mgr = AmbienceManager::seeded(3);
        for biome in Biome::ALL {
            mgr.start(biome, &mut ctx);
            assert_eq!(mgr.state(biome), SessionState::Inactive);
        }
        assert_eq!(mgr.pending_timers(), 0);
    }

    #[test]
    fn coastal_start_then_immediate_stop() {
        let (mut ctx, out) = context();
        let mut mgr = AmbienceManager::seeded(4);
        mgr.start(Biome::Coastal, &mut ctx);
        let session = mgr.session(Biome::Coastal).unwrap();
        let nodes = node_ids(session);
        assert_eq!(nodes.len(), 3);
        // three layers plus the first wave (hiss and roar)
        assert_eq!(out.voice_count(), 5);

        mgr.stop(Biome::Coastal, &mut ctx);
        assert_eq!(mgr.state(Biome::Coastal), SessionState::TearingDown);
        assert!(mgr.session(Biome::Coastal).is_none());
        {
            let mut rec = out.borrow_mut();
            for id in &nodes {
                let v = rec.voice(*id).unwrap();
                assert!(matches!(v.received[..], [VoiceCommand::FadeOut { window, .. }] if window == 2.0));
                assert!(!v.stopped);
            }
        }

        run(&mut mgr, &mut ctx, &out, 1.75, 0.25);
        assert_eq!(out.voice_count(), 5, "sub-event fired during teardown");
        assert_eq!(mgr.state(Biome::Coastal), SessionState::TearingDown);

        run(&mut mgr, &mut ctx, &out, 0.25, 0.25);
        assert_eq!(mgr.state(Biome::Coastal), SessionState::Inactive);
        assert_eq!(mgr.retiring().count(), 0);
        let mut rec = out.borrow_mut();
        for id in &nodes {
            assert!(rec.voice(*id).unwrap().stopped);
        }
        drop(rec);

        run(&mut mgr, &mut ctx, &out, 60.0, 0.5);
        assert_eq!(out.voice_count(), 5);
        assert_eq!(mgr.pending_timers(), 0);
    }

    #[test]
    fn restart_after_teardown_uses_fresh_nodes() {
        let (mut ctx, out) = context();
        let mut mgr = AmbienceManager::seeded(5);
        mgr.start(Biome::Volcanic, &mut ctx);
        let first = mgr.session(Biome::Volcanic).unwrap();
        let (first_id, first_nodes) = (first.id(), node_ids(first));

        mgr.stop(Biome::Volcanic, &mut ctx);
        run(&mut mgr, &mut ctx, &out, 2.0, 0.5);
        assert_eq!(mgr.state(Biome::Volcanic), SessionState::Inactive);

        mgr.start(Biome::Volcanic, &mut ctx);
        let second = mgr.session(Biome::Volcanic).unwrap();
        assert_ne!(second.id(), first_id);
        assert_eq!(second.nodes().len(), 3);
        assert!(node_ids(second).iter().all(|id| !first_nodes.contains(id)));
    }

    #[test]
    fn stop_cancels_every_pending_sub_event() {
        let (mut ctx, out) = context();
        let mut mgr = AmbienceManager::seeded(6);
        mgr.start(Biome::Forest, &mut ctx);
        run(&mut mgr, &mut ctx, &out, 30.0, 0.1);
        assert!(out.voice_count() > 2, "forest birds never sang");

        mgr.stop(Biome::Forest, &mut ctx);
        // only the retire timer is left
        assert_eq!(mgr.pending_timers(), 1);
        let after_stop = out.voice_count();
        run(&mut mgr, &mut ctx, &out, 60.0, 0.1);
        assert_eq!(out.voice_count(), after_stop);
    }

    #[test]
    fn chess_ticks_once_per_second() {
        let (mut ctx, out) = context();
        let mut mgr = AmbienceManager::seeded(7);
        mgr.start(Biome::Chess, &mut ctx);
        // two drones and the first tick
        assert_eq!(out.voice_count(), 3);

        run(&mut mgr, &mut ctx, &out, 5.0, 0.25);
        assert_eq!(out.voice_count(), 8);

        mgr.stop(Biome::Chess, &mut ctx);
        run(&mut mgr, &mut ctx, &out, 1.0, 0.25);
        assert_eq!(mgr.state(Biome::Chess), SessionState::Inactive);
        assert_eq!(out.voice_count(), 8);
    }

    #[test]
    fn crystal_teardown_fades_modulation_to_lower_floor() {
        let (mut ctx, out) = context();
        let mut mgr = AmbienceManager::seeded(8);
        mgr.start(Biome::Crystal, &mut ctx);
        let nodes: Vec<(VoiceId, FadeRole)> = mgr
            .session(Biome::Crystal)
            .unwrap()
            .nodes()
            .iter()
            .map(|n| (n.voice.id(), n.role))
            .collect();
        mgr.stop(Biome::Crystal, &mut ctx);

        let mut rec = out.borrow_mut();
        for (id, role) in nodes {
            let v = rec.voice(id).unwrap();
            assert!(matches!(
                v.received[..],
                [VoiceCommand::FadeOut { floor, role: r, .. }] if floor == 0.0001 && r == role
            ));
        }
    }

    #[test]
    fn start_during_teardown_keeps_sessions_apart() {
        let (mut ctx, out) = context();
        let mut mgr = AmbienceManager::seeded(9);
        mgr.start(Biome::Snow, &mut ctx);
        let old_nodes = node_ids(mgr.session(Biome::Snow).unwrap());
        mgr.stop(Biome::Snow, &mut ctx);

        run(&mut mgr, &mut ctx, &out, 1.0, 0.5);
        mgr.start(Biome::Snow, &mut ctx);
        assert_eq!(mgr.state(Biome::Snow), SessionState::Active);
        let new_nodes = node_ids(mgr.session(Biome::Snow).unwrap());

        // the old session's retire only touches its own nodes
        run(&mut mgr, &mut ctx, &out, 1.0, 0.5);
        assert!(mgr.session(Biome::Snow).is_some());
        let mut rec = out.borrow_mut();
        assert!(old_nodes.iter().all(|id| rec.voice(*id).unwrap().stopped));
        assert!(new_nodes.iter().all(|id| !rec.voice(*id).unwrap().stopped));
    }

    #[test]
    fn coastal_waves_keep_rolling_while_active() {
        let (mut ctx, out) = context();
        let mut mgr = AmbienceManager::seeded(10);
        mgr.start(Biome::Coastal, &mut ctx);
        run(&mut mgr, &mut ctx, &out, 60.0, 0.1);
        // at most one wave every 1.5 s, at least one every 7.8 s
        let extra = out.voice_count() - 5;
        assert!(extra >= 2 * 7, "only {extra} sub-event voices in a minute");
        let timers = mgr.session(Biome::Coastal).unwrap().timers();
        assert!(timers.contains_key(&SubEvent::Wave));
        assert!(timers.contains_key(&SubEvent::Seagull));
    }
}
