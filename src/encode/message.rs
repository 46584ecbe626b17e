//! Message encoder: one note-on written into a track buffer

use super::Encoder;
use crate::config::UnclassifiedPolicy;
use crate::error::{CodecError, Result};
use crate::events::TimedEvent;
use crate::note::{combine_notes, NoteVector, TrackBuffer};
use crate::pitch::PitchClass;

impl Encoder {
    /// Velocity in [0, 1]: the override when given, else the message velocity normalized
    pub fn resolve_velocity(&self, event: &TimedEvent, velocity: Option<f32>) -> Result<f32> {
        if let Some(v) = velocity {
            if !(0.0..=1.0).contains(&v) {
                return Err(CodecError::InvalidOption(format!(
                    "velocity override {} outside [0, 1]",
                    v
                )));
            }
            return Ok(v);
        }
        let raw = event
            .velocity
            .ok_or_else(|| CodecError::MalformedEvent("note-on without velocity".into()))?;
        let max = self.max_velocity as f32;
        Ok((raw.min(self.max_velocity) as f32 / max).clamp(0.0, 1.0))
    }

    /// Vector slot addressed by a note-on, or `None` when the message writes nothing
    fn note_slot(&self, event: &TimedEvent) -> Result<Option<usize>> {
        if !event.is_note_on() {
            return Ok(None);
        }
        let pitch = event
            .pitch
            .ok_or_else(|| CodecError::MalformedEvent("note-on without pitch".into()))?;

        let index = match self.classes.classify(pitch) {
            PitchClass::Class(i) => i,
            PitchClass::Unclassified => match self.unclassified {
                UnclassifiedPolicy::Track => self.classes.unclassified_index(),
                UnclassifiedPolicy::Ignore => return Ok(None),
                UnclassifiedPolicy::Reject => return Err(CodecError::UnclassifiedPitch(pitch)),
            },
        };
        Ok(self.layout().slot(index))
    }

    /// Note vector for a single note-on, or `None` when the message writes nothing
    pub fn single_msg(&self, event: &TimedEvent, velocity: f32) -> Result<Option<NoteVector>> {
        Ok(self.note_slot(event)?.map(|slot| {
            // fresh vectors have the silence slot cleared
            let mut notes = NoteVector::zeros(self.layout().width());
            notes.set(slot, velocity);
            notes
        }))
    }

    /// Write one message at `timestep`, padded by the sustain envelope.
    ///
    /// Steps at or beyond the end of the grid are skipped. Overlapping
    /// writes combine by elementwise maximum.
    pub fn encode_message(
        &self,
        event: &TimedEvent,
        timestep: usize,
        track: &mut TrackBuffer,
        velocity: Option<f32>,
    ) -> Result<()> {
        if !event.is_note_on() {
            return Ok(());
        }
        let layout = self.layout();
        if track.n_channels() != layout.width() {
            return Err(CodecError::type_mismatch(
                format!("track with {} channels", layout.width()),
                format!("track with {} channels", track.n_channels()),
            ));
        }

        let velocity = self.resolve_velocity(event, velocity)?;
        let Some(slot) = self.note_slot(event)? else {
            return Ok(());
        };

        for (step, level) in self.sustain.envelope(velocity).into_iter().enumerate() {
            let t = timestep + step;
            if t >= track.n_timesteps() {
                break;
            }
            let mut notes = NoteVector::zeros(layout.width());
            notes.set(slot, level);
            let combined = combine_notes(&track.row(t), &notes, &layout, self.noise_floor);
            track.set_row(t, &combined);
        }
        Ok(())
    }
}
