//! Event-to-tensor encoding
//!
//! - [`message`]: one note-on into a track buffer (quantization, padding, combination)
//! - [`file`]: one event stream into track buffers
//! - [`batch`]: many streams into one uniformly shaped tensor

pub mod batch;
pub mod file;
pub mod message;

pub use batch::{reduce_batch_dims, BatchOptions, BatchOutput, BatchTensor, FileFailure};
pub use file::FileOptions;

use crate::config::{Config, UnclassifiedPolicy};
use crate::context::Context;
use crate::decode::ThresholdDecoder;
use crate::error::{CodecError, Result};
use crate::note::NoteLayout;
use crate::pitch::InstrumentClasses;
use crate::sustain::{self, GeometricDecay, Sustain};
use std::sync::Arc;

/// Immutable encoder settings shared by every message, file and batch call
#[derive(Debug, Clone)]
pub struct Encoder {
    context: Context,
    classes: Arc<InstrumentClasses>,
    sustain: Arc<dyn Sustain>,
    silence_slot: bool,
    unclassified: UnclassifiedPolicy,
    noise_floor: f32,
    max_velocity: u8,
}

impl Encoder {
    /// Encoder with the default drum-oriented settings
    pub fn new(context: Context, classes: Arc<InstrumentClasses>) -> Self {
        Self {
            context,
            classes,
            sustain: Arc::new(GeometricDecay::default()),
            silence_slot: false,
            unclassified: UnclassifiedPolicy::Track,
            noise_floor: 0.5,
            max_velocity: 127,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        crate::config::validate_config(config)
            .map_err(|e| CodecError::ConfigValidationFailed(e.to_string()))?;
        let enc = &config.encoding;
        Ok(Self {
            context: Context::from_config(&config.grid)?,
            classes: InstrumentClasses::from_config(&enc.instruments)?,
            sustain: Arc::from(sustain::from_config(&enc.sustain)),
            silence_slot: enc.silence_slot,
            unclassified: enc.unclassified,
            noise_floor: enc.noise_floor,
            max_velocity: enc.max_velocity,
        })
    }

    pub fn with_sustain<S: Sustain + 'static>(mut self, sustain: S) -> Self {
        self.sustain = Arc::new(sustain);
        self
    }

    pub fn with_silence_slot(mut self, enabled: bool) -> Self {
        self.silence_slot = enabled;
        self
    }

    pub fn with_unclassified(mut self, policy: UnclassifiedPolicy) -> Self {
        self.unclassified = policy;
        self
    }

    pub fn with_noise_floor(mut self, noise_floor: f32) -> Self {
        self.noise_floor = noise_floor;
        self
    }

    pub fn with_max_velocity(mut self, max_velocity: u8) -> Self {
        self.max_velocity = max_velocity.max(1);
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn classes(&self) -> &Arc<InstrumentClasses> {
        &self.classes
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    pub fn layout(&self) -> NoteLayout {
        NoteLayout::new(
            self.classes.len(),
            self.silence_slot,
            self.unclassified == UnclassifiedPolicy::Track,
        )
    }

    /// Threshold decoder matching this encoder's layout
    pub fn decoder(&self) -> ThresholdDecoder {
        ThresholdDecoder::new(Arc::clone(&self.classes), self.layout())
            .with_noise_floor(self.noise_floor)
            .with_max_velocity(self.max_velocity)
    }
}
