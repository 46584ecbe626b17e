//! Batch encoder: many streams stacked into one tensor of uniform shape

use super::file::FileOptions;
use super::Encoder;
use crate::config::{BatchConfig, ReduceDims, Strictness};
use crate::error::{CodecError, Result};
use crate::events::EventStream;
use crate::note::{fit_dimensions, TrackBuffer};
use ndarray::{s, Array3, ArrayD, Axis};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

/// Batch options are the `batch` section of the configuration
pub type BatchOptions = BatchConfig;

/// Stacked tracks `(tracks, timesteps, channels[, 1])`
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTensor {
    tracks: Array3<f32>,
    feature_axis: bool,
}

impl BatchTensor {
    pub fn new(tracks: Array3<f32>, feature_axis: bool) -> Self {
        Self {
            tracks,
            feature_axis,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        let mut shape = self.tracks.shape().to_vec();
        if self.feature_axis {
            shape.push(1);
        }
        shape
    }

    pub fn n_tracks(&self) -> usize {
        self.tracks.len_of(Axis(0))
    }

    pub fn n_timesteps(&self) -> usize {
        self.tracks.len_of(Axis(1))
    }

    pub fn n_channels(&self) -> usize {
        self.tracks.len_of(Axis(2))
    }

    pub fn has_feature_axis(&self) -> bool {
        self.feature_axis
    }

    /// Copy of track `i` as `(timesteps, channels)`
    pub fn track(&self, i: usize) -> TrackBuffer {
        TrackBuffer::from_array(self.tracks.index_axis(Axis(0), i).to_owned())
    }

    pub fn tracks(&self) -> &Array3<f32> {
        &self.tracks
    }

    /// Tensor in its final rank, including the feature axis when requested
    pub fn to_array(&self) -> ArrayD<f32> {
        let arr = self.tracks.clone().into_dyn();
        if self.feature_axis {
            arr.insert_axis(Axis(3))
        } else {
            arr
        }
    }

    /// Values in row-major order
    pub fn to_vec(&self) -> Vec<f32> {
        self.tracks.iter().copied().collect()
    }
}

/// A file left out of a batch under [`Strictness::SkipAndReport`]
#[derive(Debug)]
pub struct FileFailure {
    pub file: String,
    pub error: CodecError,
}

/// Result of a batch encode
#[derive(Debug)]
pub struct BatchOutput {
    pub tensor: BatchTensor,
    /// Source file of every track, in tensor order
    pub sources: Vec<String>,
    pub failures: Vec<FileFailure>,
}

/// Serializable form of a [`BatchOutput`]
#[derive(Debug, Serialize)]
pub struct TensorExport {
    pub shape: Vec<usize>,
    pub files: Vec<String>,
    pub failures: Vec<String>,
    pub data: Vec<f32>,
}

impl From<&BatchOutput> for TensorExport {
    fn from(output: &BatchOutput) -> Self {
        Self {
            shape: output.tensor.shape(),
            files: output.sources.clone(),
            failures: output
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.file, f.error))
                .collect(),
            data: output.tensor.to_vec(),
        }
    }
}

/// Drop channels inactive in every track of the batch
pub fn reduce_batch_dims(tracks: &Array3<f32>, noise_floor: f32) -> Array3<f32> {
    let used: Vec<usize> = (0..tracks.len_of(Axis(2)))
        .filter(|&c| {
            tracks
                .index_axis(Axis(2), c)
                .iter()
                .any(|&x| x > noise_floor)
        })
        .collect();
    tracks.select(Axis(2), &used)
}

fn validate_options(options: &BatchOptions) -> Result<()> {
    if options.split_long_files {
        return Err(CodecError::InvalidOption(
            "split_long_files is not supported; long files are truncated".into(),
        ));
    }
    if let Some(v) = options.velocity {
        if !(0.0..=1.0).contains(&v) {
            return Err(CodecError::InvalidOption(format!(
                "velocity override {} outside [0, 1]",
                v
            )));
        }
    }
    Ok(())
}

impl Encoder {
    /// Encode every stream and stack the results into one tensor.
    ///
    /// All tracks are zero padded to the widest channel count before
    /// stacking, so the output shape is uniform.
    pub fn encode_batch(&self, streams: &[EventStream], options: &BatchOptions) -> Result<BatchOutput> {
        validate_options(options)?;
        let file_options = FileOptions::from(options);

        let encode_one = |stream: &EventStream| {
            self.encode_file(stream, &file_options)
                .map_err(|e| e.in_file(stream.name.clone()))
        };
        // every file must be encoded before the channel count is known
        let results: Vec<Result<Vec<TrackBuffer>>> = if options.parallel {
            streams.par_iter().map(encode_one).collect()
        } else {
            streams.iter().map(encode_one).collect()
        };

        let mut tracks = Vec::new();
        let mut sources = Vec::new();
        let mut failures = Vec::new();
        let mut n_channels = 1;
        for (stream, result) in streams.iter().zip(results) {
            match result {
                Ok(encoded) => {
                    for track in encoded {
                        n_channels = n_channels.max(track.n_channels());
                        tracks.push(track);
                        sources.push(stream.name.clone());
                    }
                }
                Err(error) => match options.strictness {
                    Strictness::Abort => return Err(error),
                    Strictness::SkipAndReport => {
                        warn!("Skipping {}: {}", stream.name, error);
                        failures.push(FileFailure {
                            file: stream.name.clone(),
                            error,
                        });
                    }
                },
            }
        }

        let n_timesteps = self.context.n_timesteps();
        let mut stacked = Array3::zeros((tracks.len(), n_timesteps, n_channels));
        for (i, track) in tracks.into_iter().enumerate() {
            let track = fit_dimensions(track, n_timesteps, n_channels);
            stacked
                .slice_mut(s![i, .., ..])
                .assign(&track.as_array().slice(s![..n_timesteps, ..]));
        }
        info!(
            "Stacked {} tracks from {} files into ({}, {}, {})",
            stacked.len_of(Axis(0)),
            streams.len() - failures.len(),
            stacked.len_of(Axis(0)),
            n_timesteps,
            n_channels
        );

        if options.reduce_dims == ReduceDims::Global {
            stacked = reduce_batch_dims(&stacked, self.noise_floor);
            info!("Reduced batch channels to {}", stacked.len_of(Axis(2)));
        }

        Ok(BatchOutput {
            tensor: BatchTensor::new(stacked, options.add_feature_axis),
            sources,
            failures,
        })
    }
}
