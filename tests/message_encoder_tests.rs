//! Validation tests for the message encoder: velocity, padding and combination

use midi2tensor::config::UnclassifiedPolicy;
use midi2tensor::note::combine_notes;
use midi2tensor::sustain::{GeometricDecay, Impulse};
use midi2tensor::{CodecError, Context, Encoder, InstrumentClasses, NoteVector, TimedEvent, TrackBuffer};
use std::sync::Arc;

/// Bass drum only, 4 steps, padding 2 with decay 0.5
fn bass_drum_encoder() -> Encoder {
    let context = Context::new(4, 0.1, 96, 500_000).unwrap();
    let classes = Arc::new(InstrumentClasses::custom(vec![vec![36]]).unwrap());
    Encoder::new(context, classes)
        .with_sustain(GeometricDecay {
            padding: 2,
            decay: 0.5,
        })
        .with_noise_floor(0.5)
}

fn kick_snare_encoder(n_timesteps: usize) -> Encoder {
    let context = Context::new(n_timesteps, 0.1, 96, 500_000).unwrap();
    let classes = Arc::new(InstrumentClasses::custom(vec![vec![36, 35], vec![38, 40]]).unwrap());
    Encoder::new(context, classes)
}

fn empty_track(encoder: &Encoder) -> TrackBuffer {
    TrackBuffer::new(encoder.context().n_timesteps(), &encoder.layout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bass_drum_padding() {
        let encoder = bass_drum_encoder();
        let mut track = empty_track(&encoder);
        encoder
            .encode_message(&TimedEvent::note_on(0.0, 36, 127), 0, &mut track, None)
            .unwrap();
        assert_eq!(track.column(0).to_vec(), vec![1.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_padding_is_strictly_decreasing_geometric() {
        let encoder = kick_snare_encoder(12).with_sustain(GeometricDecay {
            padding: 4,
            decay: 0.3,
        });
        let mut track = empty_track(&encoder);
        encoder
            .encode_message(&TimedEvent::note_on(0.0, 38, 100), 5, &mut track, None)
            .unwrap();

        let column = track.column(1).to_vec();
        let v = 100.0 / 127.0;
        for k in 0..4 {
            let expected = v * 0.3_f32.powi(k as i32);
            assert!((column[5 + k] - expected).abs() < 1e-6);
        }
        for k in 1..4 {
            assert!(column[5 + k] < column[5 + k - 1]);
        }
        // untouched before and after the envelope
        assert!(column[..5].iter().all(|&x| x == 0.0));
        assert!(column[9..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_padding_truncated_at_grid_end() {
        let encoder = bass_drum_encoder();
        let mut track = empty_track(&encoder);
        encoder
            .encode_message(&TimedEvent::note_on(0.0, 36, 127), 3, &mut track, None)
            .unwrap();
        assert_eq!(track.column(0).to_vec(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_same_timestep_combines_by_max() {
        let encoder = kick_snare_encoder(4).with_sustain(Impulse);
        let mut track = empty_track(&encoder);
        encoder
            .encode_message(&TimedEvent::note_on(0.0, 36, 10), 1, &mut track, Some(0.8))
            .unwrap();
        encoder
            .encode_message(&TimedEvent::note_on(0.0, 38, 10), 1, &mut track, Some(0.8))
            .unwrap();

        assert!((track.get(1, 0).unwrap() - 0.8).abs() < 1e-6);
        assert!((track.get(1, 1).unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_overlapping_same_class_keeps_loudest() {
        let encoder = kick_snare_encoder(4).with_sustain(Impulse);
        let mut track = empty_track(&encoder);
        encoder
            .encode_message(&TimedEvent::note_on(0.0, 36, 0), 2, &mut track, Some(0.9))
            .unwrap();
        encoder
            .encode_message(&TimedEvent::note_on(0.0, 35, 0), 2, &mut track, Some(0.4))
            .unwrap();
        assert!((track.get(2, 0).unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_velocity_is_normalized_and_clamped() {
        let encoder = kick_snare_encoder(4).with_max_velocity(100);
        let over = TimedEvent::note_on(0.0, 36, 127);
        assert_eq!(encoder.resolve_velocity(&over, None).unwrap(), 1.0);
        let half = TimedEvent::note_on(0.0, 36, 50);
        assert!((encoder.resolve_velocity(&half, None).unwrap() - 0.5).abs() < 1e-6);
        assert!(encoder.resolve_velocity(&half, Some(1.5)).is_err());
    }

    #[test]
    fn test_note_off_and_other_events_are_ignored() {
        let encoder = kick_snare_encoder(4);
        let mut track = empty_track(&encoder);
        let before = track.clone();
        encoder
            .encode_message(&TimedEvent::note_off(0.0, 36), 0, &mut track, None)
            .unwrap();
        encoder
            .encode_message(&TimedEvent::other(0.0), 0, &mut track, None)
            .unwrap();
        assert_eq!(track, before);
    }

    #[test]
    fn test_note_on_without_pitch_is_malformed() {
        let encoder = kick_snare_encoder(4);
        let mut track = empty_track(&encoder);
        let mut event = TimedEvent::note_on(0.0, 36, 100);
        event.pitch = None;
        let err = encoder.encode_message(&event, 0, &mut track, None).unwrap_err();
        assert!(matches!(err, CodecError::MalformedEvent(_)));

        let mut event = TimedEvent::note_on(0.0, 36, 100);
        event.velocity = None;
        let err = encoder.encode_message(&event, 0, &mut track, None).unwrap_err();
        assert!(matches!(err, CodecError::MalformedEvent(_)));
        // an override supplies the missing velocity
        encoder.encode_message(&event, 0, &mut track, Some(0.7)).unwrap();
    }

    #[test]
    fn test_unclassified_policies() {
        let encoder = kick_snare_encoder(4).with_sustain(Impulse);
        let event = TimedEvent::note_on(0.0, 60, 127);

        let mut track = empty_track(&encoder);
        encoder.encode_message(&event, 0, &mut track, None).unwrap();
        assert_eq!(track.n_channels(), 3);
        assert_eq!(track.get(0, 2), Some(1.0));

        let ignoring = encoder.clone().with_unclassified(UnclassifiedPolicy::Ignore);
        let mut track = empty_track(&ignoring);
        assert_eq!(track.n_channels(), 2);
        ignoring.encode_message(&event, 0, &mut track, None).unwrap();
        assert!(track.as_array().iter().all(|&x| x == 0.0));

        let rejecting = encoder.with_unclassified(UnclassifiedPolicy::Reject);
        let mut track = empty_track(&rejecting);
        let err = rejecting.encode_message(&event, 0, &mut track, None).unwrap_err();
        assert!(matches!(err, CodecError::UnclassifiedPitch(60)));
    }

    #[test]
    fn test_track_width_mismatch_is_type_error() {
        let encoder = kick_snare_encoder(4);
        let mut track = TrackBuffer::zeros(4, 7);
        let err = encoder
            .encode_message(&TimedEvent::note_on(0.0, 36, 100), 0, &mut track, None)
            .unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn test_silence_slot_cleared_by_loud_note() {
        let encoder = kick_snare_encoder(4)
            .with_silence_slot(true)
            .with_sustain(Impulse);
        let mut track = empty_track(&encoder);
        assert_eq!(track.column(0).to_vec(), vec![1.0; 4]);

        encoder
            .encode_message(&TimedEvent::note_on(0.0, 38, 127), 1, &mut track, None)
            .unwrap();
        assert_eq!(track.get(1, 0), Some(0.0));
        assert_eq!(track.get(1, 2), Some(1.0));
        assert_eq!(track.get(0, 0), Some(1.0));

        // a note below the noise floor leaves the instant silent
        encoder
            .encode_message(&TimedEvent::note_on(0.0, 36, 20), 2, &mut track, None)
            .unwrap();
        assert_eq!(track.get(2, 0), Some(1.0));
    }

    #[test]
    fn test_combine_notes_is_idempotent() {
        let encoder = kick_snare_encoder(4);
        let layout = encoder.layout();
        let v = encoder
            .single_msg(&TimedEvent::note_on(0.0, 38, 90), 0.6)
            .unwrap()
            .unwrap();
        assert_eq!(combine_notes(&v, &v, &layout, 0.5), v);

        let z = NoteVector::zeros(layout.width());
        assert_eq!(combine_notes(&z, &z, &layout, 0.5), z);
    }

    #[test]
    fn test_written_values_stay_in_unit_range() {
        let encoder = kick_snare_encoder(32);
        let mut track = empty_track(&encoder);
        for i in 0..200 {
            let pitch = [35, 36, 38, 40, 60][i % 5];
            let velocity = (i * 37 % 128) as u8;
            encoder
                .encode_message(&TimedEvent::note_on(0.0, pitch, velocity), i % 32, &mut track, None)
                .unwrap();
        }
        assert!(track.as_array().iter().all(|&x| (0.0..=1.0).contains(&x)));
    }
}
