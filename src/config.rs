//! Configuration system for the MIDI-to-tensor encoder

use crate::context::{MAX_TEMPO, MAX_TICKS_PER_BEAT};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub grid: GridConfig,
    pub encoding: EncodingConfig,
    pub batch: BatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            grid: GridConfig::default(),
            encoding: EncodingConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

/// Time grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Fixed number of timesteps per encoded track
    pub n_timesteps: usize,
    /// Seconds per timestep; derived from tempo and `steps_per_beat` when absent
    pub timestep_seconds: Option<f64>,
    pub steps_per_beat: u32,
    /// Pulses per quarter note used when writing decoded MIDI
    pub ticks_per_beat: u16,
    /// Microseconds per beat
    pub tempo: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            n_timesteps: 160,
            timestep_seconds: None,
            steps_per_beat: 4,
            ticks_per_beat: 96,
            tempo: 500_000,
        }
    }
}

/// Note vector and message encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub max_velocity: u8,
    /// Values at or below this level count as inactive
    pub noise_floor: f32,
    /// Reserve slot 0 as an explicit "nothing sounds" marker
    pub silence_slot: bool,
    pub unclassified: UnclassifiedPolicy,
    pub instruments: InstrumentsConfig,
    pub sustain: SustainConfig,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            max_velocity: 127,
            noise_floor: 0.5,
            silence_slot: false,
            unclassified: UnclassifiedPolicy::Track,
            instruments: InstrumentsConfig::Drums,
            sustain: SustainConfig::default(),
        }
    }
}

/// What to do with a pitch that belongs to no instrument class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiedPolicy {
    /// Write it into a trailing "unclassified" slot
    Track,
    /// Skip the message
    Ignore,
    /// Fail the file
    Reject,
}

/// Instrument class table selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstrumentsConfig {
    /// General MIDI drum kit folded onto 9 classes
    Drums,
    /// One class per pitch in `lowest..=highest`
    Chromatic { lowest: u8, highest: u8 },
    /// Explicit ordered pitch sets
    Custom { classes: Vec<Vec<u8>> },
}

/// Simulated sustain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SustainConfig {
    pub kind: SustainKind,
    /// Number of timesteps written per note-on (including the onset)
    pub padding: usize,
    /// Velocity multiplier applied after every padded step
    pub decay: f32,
}

impl Default for SustainConfig {
    fn default() -> Self {
        Self {
            kind: SustainKind::Geometric,
            padding: 3,
            decay: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SustainKind {
    Geometric,
    Impulse,
}

/// Batch encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub multi_track: bool,
    pub reduce_dims: ReduceDims,
    /// Fixed velocity in [0, 1] replacing message velocities
    pub velocity: Option<f32>,
    pub add_feature_axis: bool,
    /// Reserved; long files are always truncated
    pub split_long_files: bool,
    pub strictness: Strictness,
    pub parallel: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            multi_track: true,
            reduce_dims: ReduceDims::None,
            velocity: None,
            add_feature_axis: true,
            split_long_files: false,
            strictness: Strictness::Abort,
            parallel: true,
        }
    }
}

/// Channel pruning mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceDims {
    None,
    /// Drop inactive channels per file; column identity is lost
    PerFile,
    /// Drop channels inactive across the whole batch
    Global,
}

/// Failure handling for batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// The first failing file aborts the batch
    Abort,
    /// Failing files are left out and reported
    SkipAndReport,
}

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let grid = &config.grid;
    if grid.n_timesteps == 0 {
        anyhow::bail!("grid.n_timesteps must be > 0");
    }
    if grid.ticks_per_beat == 0 || grid.ticks_per_beat > MAX_TICKS_PER_BEAT {
        anyhow::bail!("grid.ticks_per_beat must be in 1..={}", MAX_TICKS_PER_BEAT);
    }
    if grid.tempo == 0 || grid.tempo > MAX_TEMPO {
        anyhow::bail!("grid.tempo must be in 1..={}", MAX_TEMPO);
    }
    match grid.timestep_seconds {
        Some(dt) if !(dt.is_finite() && dt > 0.0) => {
            anyhow::bail!("grid.timestep_seconds must be > 0 (got {})", dt);
        }
        None if grid.steps_per_beat == 0 => {
            anyhow::bail!("grid.steps_per_beat must be > 0");
        }
        _ => {}
    }

    let enc = &config.encoding;
    if enc.max_velocity == 0 {
        anyhow::bail!("encoding.max_velocity must be > 0");
    }
    if !(enc.noise_floor > 0.0 && enc.noise_floor < 1.0) {
        anyhow::bail!("encoding.noise_floor must be in (0, 1)");
    }
    if enc.sustain.padding == 0 {
        anyhow::bail!("encoding.sustain.padding must be > 0");
    }
    if !(0.0..1.0).contains(&enc.sustain.decay) {
        anyhow::bail!("encoding.sustain.decay must be in [0, 1)");
    }
    match &enc.instruments {
        InstrumentsConfig::Drums => {}
        InstrumentsConfig::Chromatic { lowest, highest } => {
            if lowest > highest {
                anyhow::bail!("chromatic range {}..={} is empty", lowest, highest);
            }
        }
        InstrumentsConfig::Custom { classes } => {
            if classes.is_empty() {
                anyhow::bail!("custom instrument table is empty");
            }
            let mut seen = HashSet::new();
            for pitch in classes.iter().flatten() {
                if !seen.insert(*pitch) {
                    anyhow::bail!("pitch {} appears in more than one instrument class", pitch);
                }
            }
        }
    }

    let batch = &config.batch;
    if let Some(v) = batch.velocity {
        if !(0.0..=1.0).contains(&v) {
            anyhow::bail!("batch.velocity must be in [0, 1] (got {})", v);
        }
    }
    if batch.split_long_files {
        anyhow::bail!("batch.split_long_files is not supported; long files are truncated");
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
