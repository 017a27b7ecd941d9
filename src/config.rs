/// External configuration loader.
///
/// Reads `tilestep.toml` from the executable's directory (or CWD).
/// Falls back to defaults if the file is missing or incomplete.
/// Collision thresholds are not configurable; only controller tuning is.

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "tilestep.toml";

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct Config {
    pub movement: MovementConfig,
    pub harness: HarnessConfig,
    pub levels_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MovementConfig {
    pub walk_speed: f64,
    pub run_intro_speed: f64,
    pub run_intro_ticks: u32,     // slow start when entering Moving from Idle
    pub jump_speed: f64,
    pub wing_jump_speed: f64,
    pub jump_ticks: u32,
    pub wing_jump_extra_ticks: u32,
    pub jump_buffer_ticks: u32,   // early presses still jump on landing
    pub lenient_jump_ticks: u32,  // late presses after walking off an edge
    pub wing_jump_cooldown_ticks: u32,
    pub wall_stick_hold_ticks: u32,
    pub wall_stick_slide_ticks: u32,
    pub wall_stick_slide_speed: f64,
    pub wall_stick_away_ticks: u16,
}

impl MovementConfig {
    pub fn wing_jump_ticks(&self) -> u32 {
        self.jump_ticks + self.wing_jump_extra_ticks
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        TomlMovement::default().resolve()
    }
}

#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub max_ticks: u64,
    pub log_level: String,
    pub trace_every: u64,  // 0 = no periodic position trace
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    movement: TomlMovement,
    #[serde(default)]
    harness: TomlHarness,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlMovement {
    #[serde(default = "default_walk_speed")]
    walk_speed: f64,
    #[serde(default = "default_run_intro_speed")]
    run_intro_speed: f64,
    #[serde(default = "default_run_intro_ticks")]
    run_intro_ticks: u32,
    #[serde(default = "default_jump_speed")]
    jump_speed: f64,
    #[serde(default = "default_wing_jump_speed")]
    wing_jump_speed: f64,
    #[serde(default = "default_jump_ticks")]
    jump_ticks: u32,
    #[serde(default = "default_wing_jump_extra")]
    wing_jump_extra_ticks: u32,
    #[serde(default = "default_jump_buffer")]
    jump_buffer_ticks: u32,
    #[serde(default = "default_lenient_jump")]
    lenient_jump_ticks: u32,
    #[serde(default = "default_wing_jump_cooldown")]
    wing_jump_cooldown_ticks: u32,
    #[serde(default = "default_wall_stick_hold")]
    wall_stick_hold_ticks: u32,
    #[serde(default = "default_wall_stick_slide")]
    wall_stick_slide_ticks: u32,
    #[serde(default = "default_wall_stick_slide_speed")]
    wall_stick_slide_speed: f64,
    #[serde(default = "default_wall_stick_away")]
    wall_stick_away_ticks: u16,
}

#[derive(Deserialize, Debug)]
struct TomlHarness {
    #[serde(default = "default_max_ticks")]
    max_ticks: u64,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    trace_every: u64,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
}

// ── Defaults ──

fn default_walk_speed() -> f64 { 1.6 }
fn default_run_intro_speed() -> f64 { 1.0 }
fn default_run_intro_ticks() -> u32 { 11 }
fn default_jump_speed() -> f64 { 1.8 }
fn default_wing_jump_speed() -> f64 { 1.9 }
fn default_jump_ticks() -> u32 { 26 }
fn default_wing_jump_extra() -> u32 { 4 }
fn default_jump_buffer() -> u32 { 8 }
fn default_lenient_jump() -> u32 { 6 }
fn default_wing_jump_cooldown() -> u32 { 14 }
fn default_wall_stick_hold() -> u32 { 24 }
fn default_wall_stick_slide() -> u32 { 36 }
fn default_wall_stick_slide_speed() -> f64 { 0.1 }
fn default_wall_stick_away() -> u16 { 32 }

fn default_max_ticks() -> u64 { 600 }  // 10s at 60 tps
fn default_log_level() -> String { "info".into() }
fn default_levels_dir() -> String { "levels".into() }

impl Default for TomlMovement {
    fn default() -> Self {
        TomlMovement {
            walk_speed: default_walk_speed(),
            run_intro_speed: default_run_intro_speed(),
            run_intro_ticks: default_run_intro_ticks(),
            jump_speed: default_jump_speed(),
            wing_jump_speed: default_wing_jump_speed(),
            jump_ticks: default_jump_ticks(),
            wing_jump_extra_ticks: default_wing_jump_extra(),
            jump_buffer_ticks: default_jump_buffer(),
            lenient_jump_ticks: default_lenient_jump(),
            wing_jump_cooldown_ticks: default_wing_jump_cooldown(),
            wall_stick_hold_ticks: default_wall_stick_hold(),
            wall_stick_slide_ticks: default_wall_stick_slide(),
            wall_stick_slide_speed: default_wall_stick_slide_speed(),
            wall_stick_away_ticks: default_wall_stick_away(),
        }
    }
}

impl TomlMovement {
    fn resolve(&self) -> MovementConfig {
        MovementConfig {
            walk_speed: self.walk_speed,
            run_intro_speed: self.run_intro_speed,
            run_intro_ticks: self.run_intro_ticks,
            jump_speed: self.jump_speed,
            wing_jump_speed: self.wing_jump_speed,
            jump_ticks: self.jump_ticks.max(1),
            wing_jump_extra_ticks: self.wing_jump_extra_ticks,
            jump_buffer_ticks: self.jump_buffer_ticks,
            lenient_jump_ticks: self.lenient_jump_ticks,
            wing_jump_cooldown_ticks: self.wing_jump_cooldown_ticks,
            wall_stick_hold_ticks: self.wall_stick_hold_ticks,
            wall_stick_slide_ticks: self.wall_stick_slide_ticks.max(self.wall_stick_hold_ticks),
            wall_stick_slide_speed: self.wall_stick_slide_speed,
            wall_stick_away_ticks: self.wall_stick_away_ticks,
        }
    }
}

impl Default for TomlHarness {
    fn default() -> Self {
        TomlHarness {
            max_ticks: default_max_ticks(),
            log_level: default_log_level(),
            trace_every: 0,
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
        }
    }
}

// ── Loading ──

impl Config {
    /// Load config from `tilestep.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::resolve(toml_cfg, &search_dirs)
    }

    /// Parse a config from TOML text. Used by tests and by `load`.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let toml_cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(Self::resolve(toml_cfg, &[]))
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        // Resolve levels directory
        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if Path::new(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        Config {
            movement: toml_cfg.movement.resolve(),
            harness: HarnessConfig {
                max_ticks: toml_cfg.harness.max_ticks,
                log_level: toml_cfg.harness.log_level,
                trace_every: toml_cfg.harness.trace_every,
            },
            levels_dir,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(TomlConfig::default(), &[])
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for the config file in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() { continue; }
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                Ok(cfg) => {
                    log::info!("config loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    log::warn!("{} parse error: {e}; using default settings", path.display());
                    return TomlConfig::default();
                }
            },
            Err(e) => {
                log::warn!("could not read {}: {e}", path.display());
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.movement, MovementConfig::default());
        assert_eq!(cfg.movement.jump_ticks, 26);
        assert_eq!(cfg.movement.wing_jump_ticks(), 30);
        assert_eq!(cfg.harness.max_ticks, 600);
        assert_eq!(cfg.levels_dir, PathBuf::from("levels"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = Config::from_toml_str("[movement]\nwalk_speed = 2.0\n").unwrap();
        assert_eq!(cfg.movement.walk_speed, 2.0);
        assert_eq!(cfg.movement.jump_speed, 1.8);
        assert_eq!(cfg.harness.log_level, "info");
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let text = "[movement]\njump_ticks = 0\nwall_stick_hold_ticks = 40\nwall_stick_slide_ticks = 10\n";
        let cfg = Config::from_toml_str(text).unwrap();
        assert_eq!(cfg.movement.jump_ticks, 1);
        assert_eq!(cfg.movement.wall_stick_slide_ticks, 40);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Config::from_toml_str("[movement\nwalk_speed = ").is_err());
    }
}
