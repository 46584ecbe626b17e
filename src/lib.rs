//! MIDI-to-Tensor Encoding
//!
//! A lossy codec that turns symbolic note-on streams into fixed-shape
//! `f32` tensors for model consumption. Time is quantized onto a uniform
//! grid, note-offs and meta events are discarded and pitches are folded
//! onto a small ordered set of instrument classes.

pub mod config;
pub mod context;
pub mod decode;
pub mod encode;
pub mod error;
pub mod events;
pub mod note;
pub mod pitch;
pub mod sustain;

pub use config::Config;
pub use context::Context;
pub use decode::{Decoder, ThresholdDecoder};
pub use encode::{BatchOutput, BatchTensor, Encoder, FileOptions};
pub use error::{CodecError, Result as CodecResult};
pub use events::{EventKind, EventStream, TimedEvent};
pub use note::{NoteLayout, NoteVector, TrackBuffer};
pub use pitch::{InstrumentClasses, PitchClass};

use config::{ReduceDims, Strictness};
use encode::{BatchOptions, FileFailure};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Main entry point: configuration-driven batch encoding of MIDI files
pub struct MidiToTensor {
    config: Config,
    encoder: Encoder,
}

impl MidiToTensor {
    /// Create a processor with the given configuration
    pub fn new(config: Config) -> CodecResult<Self> {
        let encoder = Encoder::from_config(&config)?;
        Ok(Self { config, encoder })
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Encode already-loaded streams with the configured batch options
    pub fn encode_streams(&self, streams: &[EventStream]) -> CodecResult<BatchOutput> {
        self.encoder.encode_batch(streams, &self.config.batch)
    }

    /// Load and encode MIDI files; directories are scanned recursively.
    ///
    /// Files that cannot be read or parsed follow the configured strictness,
    /// like files that fail to encode.
    pub fn encode_paths<P: AsRef<Path>>(&self, inputs: &[P]) -> CodecResult<BatchOutput> {
        let files = collect_midi_files(inputs);
        info!("Encoding {} MIDI files", files.len());

        let mut streams = Vec::with_capacity(files.len());
        let mut load_failures = Vec::new();
        for path in &files {
            let file = path.display().to_string();
            match events::load_midi_file(path) {
                Ok(stream) => streams.push(stream),
                Err(e) => match self.config.batch.strictness {
                    Strictness::Abort => return Err(e.in_file(file)),
                    Strictness::SkipAndReport => {
                        let error = e.in_file(file.clone());
                        warn!("Skipping {}: {}", file, error);
                        load_failures.push(FileFailure { file, error });
                    }
                },
            }
        }

        let mut output = self.encode_streams(&streams)?;
        load_failures.append(&mut output.failures);
        output.failures = load_failures;
        Ok(output)
    }

    /// Encode then decode one stream (lossy round trip)
    pub fn identity(&self, stream: &EventStream) -> CodecResult<EventStream> {
        let tracks = self.encoder.encode_file(stream, &FileOptions::default())?;
        let decoder = self.encoder.decoder();
        let mut decoded = match tracks.first() {
            Some(track) => decoder.decode_track(self.encoder.context(), track)?,
            None => EventStream::new(stream.name.clone(), Vec::new()),
        };
        decoded.name = stream.name.clone();
        Ok(decoded)
    }

    /// Round trip a whole batch, one decoded stream per encoded file.
    ///
    /// Channel identity is kept regardless of the configured reduction so
    /// the decoder can map columns back to pitches.
    pub fn identity_batch(&self, streams: &[EventStream]) -> CodecResult<Vec<EventStream>> {
        let options = BatchOptions {
            multi_track: true,
            reduce_dims: ReduceDims::None,
            ..self.config.batch.clone()
        };
        let output = self.encoder.encode_batch(streams, &options)?;
        let mut decoded = self
            .encoder
            .decoder()
            .decode_batch(self.encoder.context(), &output.tensor)?;
        for (stream, source) in decoded.iter_mut().zip(&output.sources) {
            stream.name = source.clone();
        }
        Ok(decoded)
    }
}

/// Expand inputs into MIDI file paths, sorted per directory
pub fn collect_midi_files<P: AsRef<Path>>(inputs: &[P]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && events::is_midi_file(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.to_path_buf());
        }
    }
    files
}
