//! Abstract event-stream view of a MIDI recording
//!
//! The encoder only needs an ordered list of timed events on a single
//! merged timeline. [`EventStream::from_smf`] builds that view from a
//! parsed Standard MIDI File, converting ticks to seconds through the
//! file's tempo map.

use crate::context::DEFAULT_TEMPO;
use crate::error::Result;
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declared layout of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamFormat {
    /// Type 0
    SingleTrack,
    /// Type 1: simultaneous tracks sharing one timeline
    Parallel,
    /// Type 2: independent sequences; cannot be merged
    Sequential,
}

impl From<Format> for StreamFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::SingleTrack => StreamFormat::SingleTrack,
            Format::Parallel => StreamFormat::Parallel,
            Format::Sequential => StreamFormat::Sequential,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    NoteOn,
    NoteOff,
    /// Any other channel, meta or system event; only its timing matters
    Other,
}

/// One event, timed relative to its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub delta_seconds: f64,
    pub kind: EventKind,
    pub pitch: Option<u8>,
    pub velocity: Option<u8>,
}

impl TimedEvent {
    pub fn note_on(delta_seconds: f64, pitch: u8, velocity: u8) -> Self {
        Self {
            delta_seconds,
            kind: EventKind::NoteOn,
            pitch: Some(pitch),
            velocity: Some(velocity),
        }
    }

    pub fn note_off(delta_seconds: f64, pitch: u8) -> Self {
        Self {
            delta_seconds,
            kind: EventKind::NoteOff,
            pitch: Some(pitch),
            velocity: Some(0),
        }
    }

    pub fn other(delta_seconds: f64) -> Self {
        Self {
            delta_seconds,
            kind: EventKind::Other,
            pitch: None,
            velocity: None,
        }
    }

    pub fn is_note_on(&self) -> bool {
        self.kind == EventKind::NoteOn
    }
}

/// Ordered events of one recording on a single timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStream {
    /// File identity used in logs and error reports
    pub name: String,
    pub format: StreamFormat,
    pub ticks_per_beat: Option<u16>,
    pub events: Vec<TimedEvent>,
}

impl EventStream {
    pub fn new(name: impl Into<String>, events: Vec<TimedEvent>) -> Self {
        Self {
            name: name.into(),
            format: StreamFormat::SingleTrack,
            ticks_per_beat: None,
            events,
        }
    }

    pub fn with_format(mut self, format: StreamFormat) -> Self {
        self.format = format;
        self
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Absolute time of the last event in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.events.iter().map(|e| e.delta_seconds).sum()
    }

    /// Merge all tracks of a parsed SMF into one timeline
    pub fn from_smf(name: impl Into<String>, smf: &Smf<'_>) -> Self {
        // (absolute tick, track, position in track) keeps merge order stable
        let mut merged = Vec::new();
        for (track_idx, track) in smf.tracks.iter().enumerate() {
            let mut tick = 0u64;
            for (pos, event) in track.iter().enumerate() {
                tick += u64::from(event.delta.as_int());
                merged.push((tick, track_idx, pos, event.kind));
            }
        }
        merged.sort_by_key(|(tick, track_idx, pos, _)| (*tick, *track_idx, *pos));

        let (ticks_per_beat, timecode_tick) = match smf.header.timing {
            Timing::Metrical(tpb) => (Some(tpb.as_int()), None),
            Timing::Timecode(fps, subframes) => {
                (None, Some(1.0 / (fps.as_f32() as f64 * subframes as f64)))
            }
        };

        let mut tempo = DEFAULT_TEMPO;
        let mut prev_tick = 0u64;
        let mut events = Vec::with_capacity(merged.len());
        for (tick, _, _, kind) in merged {
            let ticks = (tick - prev_tick) as f64;
            prev_tick = tick;
            let delta_seconds = match (ticks_per_beat, timecode_tick) {
                (Some(tpb), _) => ticks * tempo as f64 * 1e-6 / tpb as f64,
                (None, Some(seconds_per_tick)) => ticks * seconds_per_tick,
                (None, None) => 0.0,
            };

            let event = match kind {
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        TimedEvent::note_on(delta_seconds, key.as_int(), vel.as_int())
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        TimedEvent::note_off(delta_seconds, key.as_int())
                    }
                    _ => TimedEvent::other(delta_seconds),
                },
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    tempo = t.as_int();
                    TimedEvent::other(delta_seconds)
                }
                _ => TimedEvent::other(delta_seconds),
            };
            events.push(event);
        }

        Self {
            name: name.into(),
            format: smf.header.format.into(),
            ticks_per_beat,
            events,
        }
    }

    /// Parse SMF bytes
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let smf = Smf::parse(bytes)?;
        Ok(Self::from_smf(name, &smf))
    }
}

/// Read and parse a MIDI file from disk
pub fn load_midi_file<P: AsRef<Path>>(path: P) -> Result<EventStream> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    EventStream::from_bytes(name, &bytes)
}

/// Check a path has a MIDI file extension
pub fn is_midi_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"))
        .unwrap_or(false)
}
