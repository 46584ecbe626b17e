//! File encoder: one event stream into track buffers

use super::batch::BatchOptions;
use super::Encoder;
use crate::config::ReduceDims;
use crate::error::{CodecError, Result};
use crate::events::{EventStream, StreamFormat};
use crate::note::{reduce_dims, split_channels, TrackBuffer};
use tracing::debug;

/// Per-file encoding options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileOptions {
    /// Keep one multi-channel buffer instead of splitting per active channel
    pub multi_track: bool,
    /// Drop channels that never rise above the noise floor
    pub reduce_dims: bool,
    pub velocity: Option<f32>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            multi_track: true,
            reduce_dims: false,
            velocity: None,
        }
    }
}

impl From<&BatchOptions> for FileOptions {
    fn from(options: &BatchOptions) -> Self {
        Self {
            multi_track: options.multi_track,
            reduce_dims: options.reduce_dims == ReduceDims::PerFile,
            velocity: options.velocity,
        }
    }
}

impl Encoder {
    /// Encode one stream; events past the end of the grid are dropped
    pub fn encode_file(&self, stream: &EventStream, options: &FileOptions) -> Result<Vec<TrackBuffer>> {
        if stream.format == StreamFormat::Sequential {
            return Err(CodecError::type_mismatch(
                "single-track or parallel stream (MIDI type 0 | 1)",
                "sequential stream (MIDI type 2)",
            ));
        }
        if let Some(tpb) = stream.ticks_per_beat {
            if tpb != 96 {
                debug!("{}: PPQ is not 96 but {}", stream.name, tpb);
            }
        }

        let mut track = TrackBuffer::new(self.context.n_timesteps(), &self.layout());
        let consumed = self.extend_track(&mut track, stream, options.velocity)?;
        debug!(
            "{}: encoded {} of {} events into {} timesteps",
            stream.name,
            consumed,
            stream.len(),
            track.n_timesteps()
        );

        if options.reduce_dims {
            track = reduce_dims(&track, self.noise_floor);
        }
        if options.multi_track {
            Ok(vec![track])
        } else {
            Ok(split_channels(&track, self.noise_floor))
        }
    }

    /// Walk the events, writing note-ons until the grid is exhausted.
    ///
    /// Returns the number of events consumed.
    fn extend_track(
        &self,
        track: &mut TrackBuffer,
        stream: &EventStream,
        velocity: Option<f32>,
    ) -> Result<usize> {
        let mut time = 0.0_f64;
        for (index, event) in stream.events.iter().enumerate() {
            if !event.delta_seconds.is_finite() {
                return Err(CodecError::MalformedEvent(format!(
                    "event #{}: non-finite delta time {}",
                    index, event.delta_seconds
                )));
            }
            time += event.delta_seconds;
            let timestep = self.context.timestep_of(time);
            if timestep >= self.context.n_timesteps() {
                return Ok(index);
            }
            self.encode_message(event, timestep, track, velocity)
                .map_err(|e| match e {
                    CodecError::MalformedEvent(reason) => {
                        CodecError::MalformedEvent(format!("event #{}: {}", index, reason))
                    }
                    other => other,
                })?;
        }
        Ok(stream.len())
    }
}
