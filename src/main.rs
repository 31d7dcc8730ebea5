use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use log::info;

use runner_audio::audio::list_output_devices;
use runner_audio::{AudioConfig, AudioEngine, Biome, Effect, SessionState};

/// Roughly one host frame.
const TICK: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "runner-audio", version, about = "Procedural runner sound effects and ambience")]
struct Cli {
    /// Path to a TOML config file (defaults to ./runner_audio.toml)
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play one sound effect
    Effect {
        #[arg(value_enum)]
        effect: Effect,
    },
    /// Run one biome's ambience, then fade it out
    Ambience {
        #[arg(value_enum)]
        biome: Biome,
        #[arg(long, default_value_t = 20.0)]
        seconds: f64,
    },
    /// Walk through every biome in turn
    Tour {
        #[arg(long, default_value_t = 12.0)]
        seconds_per_biome: f64,
    },
    /// List output devices
    Devices,
}

/// Tick the engine like a game loop would for `secs` of wall time.
fn run_for(engine: &mut AudioEngine, secs: f64) {
    let until = Instant::now() + Duration::from_secs_f64(secs.max(0.0));
    while Instant::now() < until {
        engine.update();
        thread::sleep(TICK);
    }
}

/// Keep ticking until `biome` has finished its teardown.
fn wait_for_teardown(engine: &mut AudioEngine, biome: Biome) {
    run_for(engine, biome.teardown_window());
    while engine.ambience_state(biome) == SessionState::TearingDown {
        engine.update();
        thread::sleep(TICK);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AudioConfig::load(cli.config.as_deref());

    if let Command::Devices = cli.command {
        for name in list_output_devices() {
            println!("{name}");
        }
        return;
    }

    let mut engine = AudioEngine::new(config);
    engine.init();
    if !engine.context().is_initialized() {
        log::warn!("no audio output, nothing will be heard");
    }

    match cli.command {
        Command::Effect { effect } => {
            info!("playing {effect:?}");
            engine.play(effect);
            run_for(&mut engine, effect.duration() + 0.25);
        }
        Command::Ambience { biome, seconds } => {
            engine.start_ambience(biome);
            run_for(&mut engine, seconds);
            engine.stop_ambience(biome);
            wait_for_teardown(&mut engine, biome);
        }
        Command::Tour { seconds_per_biome } => {
            for biome in Biome::ALL {
                info!("entering {biome}");
                engine.start_ambience(biome);
                run_for(&mut engine, seconds_per_biome);
                engine.stop_ambience(biome);
                wait_for_teardown(&mut engine, biome);
            }
        }
        Command::Devices => {}
    }
}
