//! Note vectors and track buffers
//!
//! A [`NoteVector`] holds the note-on intensities of a single instant, one
//! slot per instrument class. A [`TrackBuffer`] is the time-major stack of
//! note vectors for one recording, shaped `(timesteps, channels)`.
//!
//! Both are thin newtypes over `ndarray` buffers. Domain operations are
//! free functions so that the arithmetic of the underlying arrays never
//! leaks into the probability-like values.

use crate::context::Context;
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Slot arrangement of a note vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteLayout {
    pub n_classes: usize,
    /// Slot 0 marks "no note sounds"; classes shift by one
    pub silence_slot: bool,
    /// A trailing slot collects pitches outside every class
    pub unclassified_slot: bool,
}

impl NoteLayout {
    pub fn new(n_classes: usize, silence_slot: bool, unclassified_slot: bool) -> Self {
        Self {
            n_classes,
            silence_slot,
            unclassified_slot,
        }
    }

    /// Number of silence slots preceding the class slots
    pub fn offset(&self) -> usize {
        usize::from(self.silence_slot)
    }

    pub fn width(&self) -> usize {
        self.offset() + self.n_classes + usize::from(self.unclassified_slot)
    }

    /// Vector slot of class `index`; `index == n_classes` addresses the unclassified slot
    pub fn slot(&self, index: usize) -> Option<usize> {
        if index < self.n_classes || (index == self.n_classes && self.unclassified_slot) {
            Some(self.offset() + index)
        } else {
            None
        }
    }

    /// Class index stored in vector slot `slot`, if it holds one
    pub fn class_of_slot(&self, slot: usize) -> Option<usize> {
        let index = slot.checked_sub(self.offset())?;
        (index < self.n_classes).then_some(index)
    }
}

/// Note-on intensities in [0, 1] at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct NoteVector(Array1<f32>);

impl NoteVector {
    /// All-zero vector
    pub fn zeros(width: usize) -> Self {
        Self(Array1::zeros(width))
    }

    /// Vector with nothing sounding: silence slot set when the layout has one
    pub fn silent(layout: &NoteLayout) -> Self {
        let mut v = Array1::zeros(layout.width());
        v.slice_mut(s![..layout.offset()]).fill(1.0);
        Self(v)
    }

    pub fn from_array(values: Array1<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<f32> {
        self.0.get(slot).copied()
    }

    pub fn set(&mut self, slot: usize, value: f32) {
        self.0[slot] = value;
    }

    pub fn values(&self) -> ArrayView1<'_, f32> {
        self.0.view()
    }

    pub fn into_array(self) -> Array1<f32> {
        self.0
    }

    /// Loudest value outside the first `offset` (silence) slots
    fn peak_after(&self, offset: usize) -> f32 {
        self.0
            .slice(s![offset..])
            .fold(0.0_f32, |m, &x| m.max(x))
    }
}

/// Combine two vectors at the same instant: elementwise maximum.
///
/// With a silence slot, it is set only when neither input has a class
/// slot above `noise_floor`.
pub fn combine_notes(
    a: &NoteVector,
    b: &NoteVector,
    layout: &NoteLayout,
    noise_floor: f32,
) -> NoteVector {
    let mut v = NoteVector(ndarray::Zip::from(&a.0).and(&b.0).map_collect(|&x, &y| x.max(y)));
    let offset = layout.offset();
    if offset > 0 {
        let silent = a.peak_after(offset) < noise_floor && b.peak_after(offset) < noise_floor;
        v.0.slice_mut(s![..offset])
            .fill(if silent { 1.0 } else { 0.0 });
    }
    v
}

/// One recording as `(timesteps, channels)`
#[derive(Debug, Clone, PartialEq)]
pub struct TrackBuffer(Array2<f32>);

impl TrackBuffer {
    /// Empty track: silence slots set at every timestep
    pub fn new(n_timesteps: usize, layout: &NoteLayout) -> Self {
        let mut arr = Array2::zeros((n_timesteps, layout.width()));
        arr.slice_mut(s![.., ..layout.offset()]).fill(1.0);
        Self(arr)
    }

    pub fn zeros(n_timesteps: usize, n_channels: usize) -> Self {
        Self(Array2::zeros((n_timesteps, n_channels)))
    }

    pub fn from_array(values: Array2<f32>) -> Self {
        Self(values)
    }

    pub fn n_timesteps(&self) -> usize {
        self.0.nrows()
    }

    pub fn n_channels(&self) -> usize {
        self.0.ncols()
    }

    pub fn is_single_channel(&self) -> bool {
        self.n_channels() == 1
    }

    pub fn length_in_seconds(&self, context: &Context) -> f64 {
        self.n_timesteps() as f64 * context.timestep_duration()
    }

    /// Copy of the note vector at timestep `t`
    pub fn row(&self, t: usize) -> NoteVector {
        NoteVector(self.0.row(t).to_owned())
    }

    pub fn set_row(&mut self, t: usize, notes: &NoteVector) {
        self.0.row_mut(t).assign(&notes.0);
    }

    pub fn column(&self, channel: usize) -> ArrayView1<'_, f32> {
        self.0.column(channel)
    }

    pub fn get(&self, t: usize, channel: usize) -> Option<f32> {
        self.0.get((t, channel)).copied()
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.0
    }

    pub fn into_array(self) -> Array2<f32> {
        self.0
    }
}

/// True when some value of `values` rises above the noise floor
pub fn is_active(values: ArrayView1<'_, f32>, noise_floor: f32) -> bool {
    values.iter().any(|&x| x > noise_floor)
}

/// Channels whose peak over the whole timeline exceeds `noise_floor`
pub fn active_channels(track: &TrackBuffer, noise_floor: f32) -> Vec<usize> {
    (0..track.n_channels())
        .filter(|&c| is_active(track.column(c), noise_floor))
        .collect()
}

/// Grow `track` to at least `(n_timesteps, n_channels)` by zero padding; never crops
pub fn fit_dimensions(track: TrackBuffer, n_timesteps: usize, n_channels: usize) -> TrackBuffer {
    let (t, c) = (track.n_timesteps(), track.n_channels());
    if t >= n_timesteps && c >= n_channels {
        return track;
    }
    let mut grown = Array2::zeros((t.max(n_timesteps), c.max(n_channels)));
    grown.slice_mut(s![..t, ..c]).assign(&track.0);
    TrackBuffer(grown)
}

/// Drop channels that never rise above `noise_floor`.
///
/// Column order no longer maps to instrument classes afterwards.
pub fn reduce_dims(track: &TrackBuffer, noise_floor: f32) -> TrackBuffer {
    let used = active_channels(track, noise_floor);
    TrackBuffer(track.0.select(Axis(1), &used))
}

/// Split into one single-channel track per active channel
pub fn split_channels(track: &TrackBuffer, noise_floor: f32) -> Vec<TrackBuffer> {
    active_channels(track, noise_floor)
        .into_iter()
        .map(|c| TrackBuffer(track.0.slice(s![.., c..c + 1]).to_owned()))
        .collect()
}
