//! Instrument classes: folding raw MIDI pitches onto a small ordered set of slots

use crate::config::InstrumentsConfig;
use crate::error::{CodecError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Drum kit groups of the built-in table, in slot order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrumType {
    BassDrum,
    Snare,
    ClosedHiHat,
    OpenHiHat,
    LowTom,
    MidTom,
    HighTom,
    Crash,
    Ride,
}

impl DrumType {
    pub const ALL: [DrumType; 9] = [
        DrumType::BassDrum,
        DrumType::Snare,
        DrumType::ClosedHiHat,
        DrumType::OpenHiHat,
        DrumType::LowTom,
        DrumType::MidTom,
        DrumType::HighTom,
        DrumType::Crash,
        DrumType::Ride,
    ];

    /// GM1/GM2 pitches folded onto this group; the first is the canonical one
    pub fn pitches(&self) -> &'static [u8] {
        match self {
            DrumType::BassDrum => &[36, 35],
            DrumType::Snare => &[38, 27, 28, 31, 32, 33, 34, 37, 39, 40, 56, 65, 66, 75, 85],
            DrumType::ClosedHiHat => &[42, 44, 54, 68, 69, 70, 71, 73, 78, 80],
            DrumType::OpenHiHat => &[46, 67, 72, 74, 79, 81],
            DrumType::LowTom => &[45, 29, 41, 61, 64, 84],
            DrumType::MidTom => &[48, 47, 60, 63, 77, 86, 87],
            DrumType::HighTom => &[50, 30, 43, 62, 76, 83],
            DrumType::Crash => &[49, 55, 57, 58],
            DrumType::Ride => &[51, 52, 53, 59, 82],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DrumType::BassDrum => "bass drum",
            DrumType::Snare => "snare drum",
            DrumType::ClosedHiHat => "closed hi-hat",
            DrumType::OpenHiHat => "open hi-hat",
            DrumType::LowTom => "low tom",
            DrumType::MidTom => "mid tom",
            DrumType::HighTom => "high tom",
            DrumType::Crash => "crash cymbal",
            DrumType::Ride => "ride cymbal",
        }
    }
}

static DRUM_CLASSES: Lazy<Arc<InstrumentClasses>> = Lazy::new(|| {
    Arc::new(InstrumentClasses {
        classes: DrumType::ALL
            .iter()
            .map(|d| InstrumentClass {
                name: d.name().to_string(),
                pitches: d.pitches().to_vec(),
            })
            .collect(),
    })
});

/// Result of looking a pitch up in the class table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchClass {
    Class(usize),
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentClass {
    pub name: String,
    pub pitches: Vec<u8>,
}

/// Ordered list of disjoint pitch sets; position is the note index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentClasses {
    classes: Vec<InstrumentClass>,
}

impl InstrumentClasses {
    /// Built-in drum table, shared process-wide
    pub fn drums() -> Arc<InstrumentClasses> {
        Arc::clone(&DRUM_CLASSES)
    }

    /// One class per pitch in `lowest..=highest`
    pub fn chromatic(lowest: u8, highest: u8) -> Result<Self> {
        if lowest > highest {
            return Err(CodecError::InvalidOption(format!(
                "chromatic range {}..={} is empty",
                lowest, highest
            )));
        }
        Ok(Self {
            classes: (lowest..=highest)
                .map(|p| InstrumentClass {
                    name: format!("pitch {}", p),
                    pitches: vec![p],
                })
                .collect(),
        })
    }

    /// Build a table from explicit pitch sets; sets must be non-empty and disjoint
    pub fn custom(sets: Vec<Vec<u8>>) -> Result<Self> {
        if sets.is_empty() {
            return Err(CodecError::InvalidOption("instrument table is empty".into()));
        }
        let mut seen = HashSet::new();
        let mut classes = Vec::with_capacity(sets.len());
        for (i, pitches) in sets.into_iter().enumerate() {
            if pitches.is_empty() {
                return Err(CodecError::InvalidOption(format!("class {} has no pitches", i)));
            }
            for p in &pitches {
                if !seen.insert(*p) {
                    return Err(CodecError::InvalidOption(format!(
                        "pitch {} appears in more than one class",
                        p
                    )));
                }
            }
            classes.push(InstrumentClass {
                name: format!("class {}", i),
                pitches,
            });
        }
        Ok(Self { classes })
    }

    pub fn from_config(config: &InstrumentsConfig) -> Result<Arc<Self>> {
        match config {
            InstrumentsConfig::Drums => Ok(Self::drums()),
            InstrumentsConfig::Chromatic { lowest, highest } => {
                Ok(Arc::new(Self::chromatic(*lowest, *highest)?))
            }
            InstrumentsConfig::Custom { classes } => Ok(Arc::new(Self::custom(classes.clone())?)),
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[InstrumentClass] {
        &self.classes
    }

    /// First class whose pitch set contains `pitch`
    pub fn classify(&self, pitch: u8) -> PitchClass {
        self.classes
            .iter()
            .position(|c| c.pitches.contains(&pitch))
            .map_or(PitchClass::Unclassified, PitchClass::Class)
    }

    /// Index reserved for pitches outside every class
    pub fn unclassified_index(&self) -> usize {
        self.classes.len()
    }

    /// Index form of [`classify`](Self::classify)
    pub fn class_index(&self, pitch: u8) -> usize {
        match self.classify(pitch) {
            PitchClass::Class(i) => i,
            PitchClass::Unclassified => self.unclassified_index(),
        }
    }

    /// Pitch a decoder should emit for class `index`
    pub fn representative_pitch(&self, index: usize) -> Option<u8> {
        self.classes.get(index).and_then(|c| c.pitches.first().copied())
    }
}
