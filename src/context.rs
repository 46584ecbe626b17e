//! Time grid shared by every encoding and decoding call

use crate::config::GridConfig;
use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};

/// Default MIDI tempo (120 BPM) in microseconds per beat
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Largest tempo a MIDI tempo meta event can carry (24 bits)
pub const MAX_TEMPO: u32 = 0xFF_FFFF;

/// Largest metrical division a MIDI header can carry (15 bits)
pub const MAX_TICKS_PER_BEAT: u16 = 0x7FFF;

/// Immutable description of the target time grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Context {
    timestep_duration: f64,
    n_timesteps: usize,
    ticks_per_beat: u16,
    tempo: u32,
}

impl Context {
    /// Create a context from an explicit timestep duration (seconds)
    pub fn new(
        n_timesteps: usize,
        timestep_duration: f64,
        ticks_per_beat: u16,
        tempo: u32,
    ) -> Result<Self> {
        if n_timesteps == 0 {
            return Err(CodecError::InvalidContext("n_timesteps must be > 0".into()));
        }
        if !(timestep_duration.is_finite() && timestep_duration > 0.0) {
            return Err(CodecError::InvalidContext(format!(
                "timestep duration must be > 0 (got {})",
                timestep_duration
            )));
        }
        if ticks_per_beat == 0 || tempo == 0 {
            return Err(CodecError::InvalidContext(
                "ticks_per_beat and tempo must be > 0".into(),
            ));
        }
        if ticks_per_beat > MAX_TICKS_PER_BEAT {
            return Err(CodecError::InvalidContext(format!(
                "ticks_per_beat must be <= {} (got {})",
                MAX_TICKS_PER_BEAT, ticks_per_beat
            )));
        }
        if tempo > MAX_TEMPO {
            return Err(CodecError::InvalidContext(format!(
                "tempo must be <= {} (got {})",
                MAX_TEMPO, tempo
            )));
        }
        Ok(Self {
            timestep_duration,
            n_timesteps,
            ticks_per_beat,
            tempo,
        })
    }

    /// Create a context whose timestep is a fixed fraction of a beat
    pub fn from_tempo(
        n_timesteps: usize,
        ticks_per_beat: u16,
        tempo: u32,
        steps_per_beat: u32,
    ) -> Result<Self> {
        if steps_per_beat == 0 {
            return Err(CodecError::InvalidContext("steps_per_beat must be > 0".into()));
        }
        let beat_seconds = tempo as f64 * 1e-6;
        Self::new(
            n_timesteps,
            beat_seconds / steps_per_beat as f64,
            ticks_per_beat,
            tempo,
        )
    }

    pub fn from_config(grid: &GridConfig) -> Result<Self> {
        match grid.timestep_seconds {
            Some(dt) => Self::new(grid.n_timesteps, dt, grid.ticks_per_beat, grid.tempo),
            None => Self::from_tempo(
                grid.n_timesteps,
                grid.ticks_per_beat,
                grid.tempo,
                grid.steps_per_beat,
            ),
        }
    }

    /// Seconds per grid step
    pub fn timestep_duration(&self) -> f64 {
        self.timestep_duration
    }

    pub fn n_timesteps(&self) -> usize {
        self.n_timesteps
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn length_in_seconds(&self) -> f64 {
        self.n_timesteps as f64 * self.timestep_duration
    }

    /// Grid index nearest to `seconds`; may lie beyond the grid
    pub fn timestep_of(&self, seconds: f64) -> usize {
        (seconds / self.timestep_duration).round().max(0.0) as usize
    }

    pub fn second_to_tick(&self, seconds: f64) -> u32 {
        let scale = self.tempo as f64 * 1e-6 / self.ticks_per_beat as f64;
        (seconds / scale).round().max(0.0) as u32
    }

    pub fn tick_to_second(&self, ticks: u32) -> f64 {
        let scale = self.tempo as f64 * 1e-6 / self.ticks_per_beat as f64;
        ticks as f64 * scale
    }
}

impl Default for Context {
    fn default() -> Self {
        // 16th notes at 120 BPM, 10 seconds
        Self {
            timestep_duration: 0.125,
            n_timesteps: 80,
            ticks_per_beat: 96,
            tempo: DEFAULT_TEMPO,
        }
    }
}
