/// Headless harness: loads a level, replays its input script through the
/// simulation and logs every event.
///
/// Usage: `tilestep [LEVEL.toml]`
/// Without an argument the first level in `levels_dir` is used, then the
/// embedded one. `RUST_LOG` overrides the configured log level.

use std::path::PathBuf;

use env_logger::Env;

use tilestep::config::Config;
use tilestep::domain::entity::TickInput;
use tilestep::sim::event::GameEvent;
use tilestep::sim::level::{load_level, ScriptStep};
use tilestep::sim::step::step;
use tilestep::sim::world::WorldState;

fn main() {
    let config = Config::load();
    env_logger::Builder::from_env(Env::default().default_filter_or(config.harness.log_level.as_str()))
        .format_timestamp(None)
        .init();
    log::debug!("levels dir: {}", config.levels_dir.display());

    let level_path = std::env::args().nth(1).map(PathBuf::from);

    match run(&config, level_path) {
        Ok(summary) => summary.print(),
        Err(e) => {
            eprintln!("tilestep: {e}");
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct Summary {
    level: String,
    ticks: u64,
    jumps: u32,
    landings: u32,
    steps: u32,
    wall_sticks: u32,
    died: bool,
    final_pos: (f64, f64),
    final_state: String,
}

impl Summary {
    fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Jumped { .. } | GameEvent::WingJumped { .. } => self.jumps += 1,
            GameEvent::Landed { .. } => self.landings += 1,
            GameEvent::Stepped { .. } => self.steps += 1,
            GameEvent::WallStuck { .. } => self.wall_sticks += 1,
            GameEvent::Died { .. } => self.died = true,
            _ => {}
        }
    }

    fn print(&self) {
        println!("level:        {}", self.level);
        println!("ticks:        {}", self.ticks);
        println!("jumps:        {}", self.jumps);
        println!("landings:     {}", self.landings);
        println!("stair steps:  {}", self.steps);
        println!("wall sticks:  {}", self.wall_sticks);
        println!("final:        ({:.2}, {:.2}) {}", self.final_pos.0, self.final_pos.1, self.final_state);
        if self.died { println!("actor died"); }
    }
}

fn run(config: &Config, level_path: Option<PathBuf>) -> Result<Summary, Box<dyn std::error::Error>> {
    let loaded = load_level(level_path.as_deref(), &config.levels_dir)?;
    let (mut world, script) = WorldState::from_loaded(loaded, config.movement.clone());

    let mut summary = Summary { level: world.level.name.clone(), ..Summary::default() };
    let trace_every = config.harness.trace_every;

    for input in script_inputs(&script).take(config.harness.max_ticks as usize) {
        let events = step(&mut world, input)?;
        for e in &events {
            log::info!("tick {:>4}: {:?}", world.tick, e);
            summary.record(e);
        }
        if trace_every > 0 && world.tick % trace_every == 0 {
            let a = &world.actor;
            log::debug!("tick {:>4}: ({:.2}, {:.2}) {:?}", world.tick, a.x, a.y, a.state);
        }
        if world.actor.is_dead() { break; }
    }

    summary.ticks = world.tick;
    summary.final_pos = (world.actor.x, world.actor.y);
    summary.final_state = format!("{:?}", world.actor.state);
    Ok(summary)
}

/// Expand script segments into per-tick inputs, edge-detecting the
/// jump and down buttons across ticks.
fn script_inputs(script: &[ScriptStep]) -> impl Iterator<Item = TickInput> + '_ {
    let mut prev_jump = false;
    let mut prev_down = false;
    script
        .iter()
        .flat_map(|seg| std::iter::repeat(*seg).take(seg.ticks as usize))
        .map(move |seg| {
            let input = TickInput {
                horizontal: seg.facing(),
                jump_triggered: seg.jump && !prev_jump,
                jump_held: seg.jump,
                down_held: seg.down,
                down_triggered: seg.down && !prev_down,
                plants_reversed: seg.plants_reversed,
            };
            prev_jump = seg.jump;
            prev_down = seg.down;
            input
        })
}
