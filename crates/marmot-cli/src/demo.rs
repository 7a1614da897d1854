use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use marmot_events::{ScriptEvent, Season};
use marmot_script_clockwork::clockwork_factory;
use marmot_script_host::{HostConfig, SaveSegment, ScriptManager};

/// Ticks per season in the demo loop.
const SEASON_LENGTH: u64 = 90;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Script to run (overrides the configured selection)
    #[arg(long)]
    pub script: Option<String>,

    /// Preferred script version (default: newest available)
    #[arg(long)]
    pub version: Option<u32>,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 400)]
    pub ticks: u64,

    /// Pause script execution at this tick
    #[arg(long)]
    pub pause_at: Option<u64>,

    /// Resume script execution at this tick
    #[arg(long)]
    pub resume_at: Option<u64>,

    /// Restore the Game Script segment from this file before running
    #[arg(long)]
    pub load: Option<PathBuf>,

    /// Write the Game Script segment to this file after running
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Deliver an admin "fail" command halfway through, to demonstrate
    /// that a fatal script fault never stops the simulation
    #[arg(long)]
    pub inject_fault: bool,
}

/// Drive a scripted mini-simulation against the clockwork engine.
///
/// This stands in for the real simulation loop: one `game_loop` call per
/// tick, events raised in between, save/load at the edges.
pub fn run(mut config: HostConfig, args: RunArgs) -> anyhow::Result<()> {
    if let Some(script) = &args.script {
        config.script.name = Some(script.clone());
        config.script.version = args.version;
    }

    let mut manager = ScriptManager::new(config, clockwork_factory)?;

    match &args.load {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading savegame {}", path.display()))?;
            let segment: SaveSegment = toml::from_str(&text)
                .with_context(|| format!("parsing savegame {}", path.display()))?;
            if !manager.load_save(&segment) {
                info!("savegame had no restorable script, starting the configured one");
                manager.start_new()?;
            }
        }
        None => manager.start_new()?,
    }

    for tick in 1..=args.ticks {
        if args.pause_at == Some(tick) {
            manager.pause();
        }
        if args.resume_at == Some(tick) {
            manager.unpause();
        }

        raise_demo_events(&mut manager, tick, args.ticks, args.inject_fault);
        manager.game_loop();
    }

    print_summary(&manager);

    if let Some(path) = &args.save {
        let segment = manager.save();
        let text = toml::to_string_pretty(&segment).context("serializing savegame segment")?;
        fs::write(path, text).with_context(|| format!("writing savegame {}", path.display()))?;
        println!("Game Script segment written to {}", path.display());
    }

    Ok(())
}

/// The demo world: a couple of settlements, turning seasons, one admin
/// command, and optionally a poisoned one.
fn raise_demo_events(manager: &mut ScriptManager, tick: u64, total: u64, inject_fault: bool) {
    match tick {
        5 => manager.queue_event(ScriptEvent::SettlementFounded {
            id: 1,
            name: "Whistlepig Hollow".to_string(),
        }),
        25 => manager.queue_event(ScriptEvent::SettlementFounded {
            id: 2,
            name: "Burrowgate".to_string(),
        }),
        60 => manager.queue_event(ScriptEvent::TradeRouteOpened { from: 1, to: 2 }),
        _ => {}
    }

    if tick % SEASON_LENGTH == 0 {
        let seasons = [Season::Summer, Season::Autumn, Season::Winter, Season::Spring];
        let index = ((tick / SEASON_LENGTH) - 1) as usize % seasons.len();
        manager.queue_event(ScriptEvent::SeasonChanged {
            season: seasons[index],
            year: (tick / (SEASON_LENGTH * 4)) as u32 + 1,
        });
    }

    if tick == total / 2 {
        let command = if inject_fault { "fail" } else { "census" };
        manager.queue_event(ScriptEvent::AdminCommand {
            command: command.to_string(),
        });
    }
}

fn print_summary(manager: &ScriptManager) {
    println!("Simulation finished after {} script tick(s).", manager.frame_counter());
    match manager.instance() {
        Some(instance) => println!(
            "Game Script {} is running ({} instance tick(s), {} event(s) still queued).",
            instance.ident(),
            instance.ticks(),
            instance.queued_events()
        ),
        None => println!("No Game Script is running."),
    }
}
