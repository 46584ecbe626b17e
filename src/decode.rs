//! Tensor-to-event decoding and MIDI export
//!
//! Encoding is lossy, so decoding only approximates the source: note-ons
//! are re-derived from thresholded note vectors and every note gets a
//! synthesized note-off after a fixed duration.

use crate::context::{Context, MAX_TEMPO, MAX_TICKS_PER_BEAT};
use crate::encode::BatchTensor;
use crate::error::{CodecError, Result};
use crate::events::{EventKind, EventStream, StreamFormat, TimedEvent};
use crate::note::{NoteLayout, TrackBuffer};
use crate::pitch::InstrumentClasses;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::sync::Arc;

/// General MIDI percussion channel (10), zero based
const DRUM_CHANNEL: u8 = 9;

/// Reconstructs event streams from encoded tracks
pub trait Decoder {
    fn decode_track(&self, context: &Context, track: &TrackBuffer) -> Result<EventStream>;

    fn decode_batch(&self, context: &Context, batch: &BatchTensor) -> Result<Vec<EventStream>> {
        (0..batch.n_tracks())
            .map(|i| self.decode_track(context, &batch.track(i)))
            .collect()
    }
}

/// Emits a note-on wherever a class column rises above the noise floor
#[derive(Debug, Clone)]
pub struct ThresholdDecoder {
    classes: Arc<InstrumentClasses>,
    layout: NoteLayout,
    noise_floor: f32,
    max_velocity: u8,
    /// Seconds between a note-on and its synthesized note-off
    note_duration: f64,
}

impl ThresholdDecoder {
    pub fn new(classes: Arc<InstrumentClasses>, layout: NoteLayout) -> Self {
        Self {
            classes,
            layout,
            noise_floor: 0.5,
            max_velocity: 127,
            note_duration: 0.1,
        }
    }

    pub fn with_noise_floor(mut self, noise_floor: f32) -> Self {
        self.noise_floor = noise_floor;
        self
    }

    pub fn with_max_velocity(mut self, max_velocity: u8) -> Self {
        self.max_velocity = max_velocity.max(1);
        self
    }

    pub fn with_note_duration(mut self, seconds: f64) -> Self {
        self.note_duration = seconds.max(0.0);
        self
    }

    fn velocity_of(&self, value: f32) -> u8 {
        let v = (value.clamp(0.0, 1.0) * self.max_velocity as f32).round() as u8;
        v.max(1)
    }
}

impl Decoder for ThresholdDecoder {
    fn decode_track(&self, context: &Context, track: &TrackBuffer) -> Result<EventStream> {
        let dt = context.timestep_duration();
        // (absolute seconds, note-off first at equal times, event)
        let mut timeline: Vec<(f64, u8, TimedEvent)> = Vec::new();

        for slot in 0..track.n_channels() {
            let Some(class) = self.layout.class_of_slot(slot) else {
                continue;
            };
            let Some(pitch) = self.classes.representative_pitch(class) else {
                continue;
            };
            let column = track.column(slot);
            let mut prev = 0.0_f32;
            for (t, &value) in column.iter().enumerate() {
                if value > self.noise_floor && value > prev {
                    let start = t as f64 * dt;
                    timeline.push((start, 1, TimedEvent::note_on(0.0, pitch, self.velocity_of(value))));
                    timeline.push((start + self.note_duration, 0, TimedEvent::note_off(0.0, pitch)));
                }
                prev = value;
            }
        }

        timeline.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let mut now = 0.0;
        let events = timeline
            .into_iter()
            .map(|(time, _, mut event)| {
                event.delta_seconds = time - now;
                now = time;
                event
            })
            .collect();

        Ok(EventStream {
            name: "decoded".to_string(),
            format: StreamFormat::SingleTrack,
            ticks_per_beat: Some(context.ticks_per_beat()),
            events,
        })
    }
}

/// Write a stream as a single-track SMF on the drum channel
pub fn write_smf(context: &Context, stream: &EventStream) -> Result<Vec<u8>> {
    if context.tempo() > MAX_TEMPO || context.ticks_per_beat() > MAX_TICKS_PER_BEAT {
        return Err(CodecError::Export(format!(
            "tempo {} or ticks_per_beat {} does not fit a MIDI file",
            context.tempo(),
            context.ticks_per_beat()
        )));
    }
    let mut track_events = vec![TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(context.tempo()))),
    }];

    // ticks are derived from absolute time so rounding does not drift
    let mut seconds = 0.0;
    let mut current_tick = 0u32;
    for event in &stream.events {
        seconds += event.delta_seconds;
        let message = match (event.kind, event.pitch) {
            (EventKind::NoteOn, Some(pitch)) => MidiMessage::NoteOn {
                key: u7::from(pitch),
                vel: u7::from(event.velocity.unwrap_or(0)),
            },
            (EventKind::NoteOff, Some(pitch)) => MidiMessage::NoteOff {
                key: u7::from(pitch),
                vel: u7::from(0),
            },
            _ => continue,
        };
        let event_tick = context.second_to_tick(seconds).max(current_tick);
        track_events.push(TrackEvent {
            delta: u28::from(event_tick - current_tick),
            kind: TrackEventKind::Midi {
                channel: u4::from(DRUM_CHANNEL),
                message,
            },
        });
        current_tick = event_tick;
    }

    track_events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::from(context.ticks_per_beat())),
        ),
        tracks: vec![track_events],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| CodecError::Export(format!("Failed to write MIDI data: {:?}", e)))?;
    Ok(bytes)
}
