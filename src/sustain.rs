//! Simulated sustain: how one note-on spreads over consecutive timesteps

use crate::config::{SustainConfig, SustainKind};
use std::fmt::Debug;

/// Velocity envelope of a single note-on
pub trait Sustain: Debug + Send + Sync {
    /// Levels written at `t, t + 1, ...` for a note-on of `velocity` at `t`
    fn envelope(&self, velocity: f32) -> Vec<f32>;
}

/// Repeat the note for `padding` steps, scaling by `decay` after each one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricDecay {
    pub padding: usize,
    pub decay: f32,
}

impl Default for GeometricDecay {
    fn default() -> Self {
        Self {
            padding: 3,
            decay: 0.3,
        }
    }
}

impl Sustain for GeometricDecay {
    fn envelope(&self, velocity: f32) -> Vec<f32> {
        std::iter::successors(Some(velocity), |v| Some(v * self.decay))
            .take(self.padding)
            .collect()
    }
}

/// Single-step impulse, no padding
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Impulse;

impl Sustain for Impulse {
    fn envelope(&self, velocity: f32) -> Vec<f32> {
        vec![velocity]
    }
}

pub fn from_config(config: &SustainConfig) -> Box<dyn Sustain> {
    match config.kind {
        SustainKind::Geometric => Box::new(GeometricDecay {
            padding: config.padding,
            decay: config.decay,
        }),
        SustainKind::Impulse => Box::new(Impulse),
    }
}
