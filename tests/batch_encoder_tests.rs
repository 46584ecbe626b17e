//! Validation tests for the batch encoder: shape reconciliation, reduction and strictness

use midi2tensor::config::{ReduceDims, Strictness};
use midi2tensor::decode::write_smf;
use midi2tensor::encode::batch::TensorExport;
use midi2tensor::encode::BatchOptions;
use midi2tensor::events::StreamFormat;
use midi2tensor::sustain::Impulse;
use midi2tensor::{
    collect_midi_files, CodecError, Config, Context, Encoder, EventStream, InstrumentClasses,
    MidiToTensor, TimedEvent,
};
use std::path::Path;
use std::sync::Arc;

fn two_class_encoder() -> Encoder {
    let context = Context::new(8, 0.1, 96, 500_000).unwrap();
    let classes = Arc::new(InstrumentClasses::custom(vec![vec![36], vec![38]]).unwrap());
    Encoder::new(context, classes).with_sustain(Impulse)
}

fn hits(name: &str, pitch: u8, times: &[usize]) -> EventStream {
    let mut prev = 0;
    let events = times
        .iter()
        .map(|&t| {
            let e = TimedEvent::note_on((t - prev) as f64 * 0.1, pitch, 127);
            prev = t;
            e
        })
        .collect();
    EventStream::new(name, events)
}

fn options() -> BatchOptions {
    BatchOptions {
        add_feature_axis: false,
        ..Default::default()
    }
}

/// Directory holding one valid and one corrupt MIDI file, plus a non-MIDI file
fn write_corpus(dir: &Path) {
    let groove = EventStream::new(
        "groove",
        vec![
            TimedEvent::note_on(0.0, 36, 100),
            TimedEvent::note_off(0.25, 36),
            TimedEvent::note_on(0.25, 38, 100),
        ],
    );
    let bytes = write_smf(&Context::default(), &groove).unwrap();
    std::fs::write(dir.join("a_good.mid"), bytes).unwrap();
    std::fs::write(dir.join("b_bad.mid"), b"not a midi file").unwrap();
    std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();
}

fn processor(strictness: Strictness) -> MidiToTensor {
    let mut config = Config::default();
    config.grid.n_timesteps = 16;
    config.batch.strictness = strictness;
    MidiToTensor::new(config).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_shape_with_feature_axis() {
        let encoder = two_class_encoder();
        let streams = vec![hits("a", 36, &[0, 2]), hits("b", 38, &[1])];
        let out = encoder
            .encode_batch(&streams, &BatchOptions::default())
            .unwrap();
        // 2 classes + unclassified slot
        assert_eq!(out.tensor.shape(), vec![2, 8, 3, 1]);
        assert_eq!(out.tensor.to_array().shape(), &[2, 8, 3, 1]);
        assert_eq!(out.sources, vec!["a".to_string(), "b".to_string()]);
        assert!(out.failures.is_empty());
    }

    #[test]
    fn test_global_reduction_keeps_union_of_activity() {
        let encoder = two_class_encoder();
        let streams = vec![hits("a", 36, &[0, 4]), hits("b", 38, &[2])];
        let out = encoder
            .encode_batch(
                &streams,
                &BatchOptions {
                    reduce_dims: ReduceDims::Global,
                    ..options()
                },
            )
            .unwrap();
        assert_eq!(out.tensor.shape(), vec![2, 8, 2]);
        let a = out.tensor.track(0);
        let b = out.tensor.track(1);
        assert_eq!(a.get(4, 0), Some(1.0));
        assert_eq!(b.get(2, 1), Some(1.0));
    }

    #[test]
    fn test_per_file_reduction_fits_to_widest_file() {
        let encoder = two_class_encoder();
        let mut both = hits("both", 36, &[0]);
        both.events.push(TimedEvent::note_on(0.1, 38, 127));
        let streams = vec![hits("a", 36, &[0, 4]), both];
        let out = encoder
            .encode_batch(
                &streams,
                &BatchOptions {
                    reduce_dims: ReduceDims::PerFile,
                    ..options()
                },
            )
            .unwrap();
        // file a keeps 1 channel, zero padded to 2
        assert_eq!(out.tensor.shape(), vec![2, 8, 2]);
        let a = out.tensor.track(0);
        assert!(a.column(1).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_split_tracks_are_stacked_individually() {
        let encoder = two_class_encoder();
        let mut both = hits("both", 36, &[0]);
        both.events.push(TimedEvent::note_on(0.3, 38, 127));
        let streams = vec![both, hits("kick", 36, &[5])];
        let out = encoder
            .encode_batch(
                &streams,
                &BatchOptions {
                    multi_track: false,
                    ..options()
                },
            )
            .unwrap();
        assert_eq!(out.tensor.shape(), vec![3, 8, 1]);
        assert_eq!(out.sources, vec!["both", "both", "kick"]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let encoder = two_class_encoder();
        let streams: Vec<EventStream> = (0..12)
            .map(|i| hits(&format!("f{}", i), if i % 2 == 0 { 36 } else { 38 }, &[i % 8]))
            .collect();
        let par = encoder
            .encode_batch(&streams, &BatchOptions { parallel: true, ..options() })
            .unwrap();
        let seq = encoder
            .encode_batch(&streams, &BatchOptions { parallel: false, ..options() })
            .unwrap();
        assert_eq!(par.tensor, seq.tensor);
        assert_eq!(par.sources, seq.sources);
    }

    #[test]
    fn test_abort_on_failed_file_names_it() {
        let encoder = two_class_encoder();
        let bad = hits("type2.mid", 36, &[0]).with_format(StreamFormat::Sequential);
        let streams = vec![hits("a", 36, &[0]), bad];
        match encoder.encode_batch(&streams, &options()) {
            Err(CodecError::FileFailed { file, source }) => {
                assert_eq!(file, "type2.mid");
                assert!(matches!(*source, CodecError::TypeMismatch { .. }));
            }
            other => panic!("expected file failure, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_and_report_isolates_failures() {
        let encoder = two_class_encoder();
        let bad = hits("type2.mid", 36, &[0]).with_format(StreamFormat::Sequential);
        let streams = vec![hits("a", 36, &[0]), bad, hits("b", 38, &[3])];
        let out = encoder
            .encode_batch(
                &streams,
                &BatchOptions {
                    strictness: Strictness::SkipAndReport,
                    ..options()
                },
            )
            .unwrap();
        assert_eq!(out.tensor.shape(), vec![2, 8, 3]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].file, "type2.mid");
        assert_eq!(out.tensor.track(1).get(3, 1), Some(1.0));
    }

    #[test]
    fn test_reserved_split_option_rejected() {
        let encoder = two_class_encoder();
        let err = encoder
            .encode_batch(
                &[hits("a", 36, &[0])],
                &BatchOptions {
                    split_long_files: true,
                    ..options()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidOption(_)));
    }

    #[test]
    fn test_velocity_override_applies_to_all_files() {
        let encoder = two_class_encoder();
        let out = encoder
            .encode_batch(
                &[hits("a", 36, &[1])],
                &BatchOptions {
                    velocity: Some(0.75),
                    ..options()
                },
            )
            .unwrap();
        assert_eq!(out.tensor.track(0).get(1, 0), Some(0.75));
    }

    #[test]
    fn test_export_flattens_row_major() {
        let encoder = two_class_encoder();
        let out = encoder
            .encode_batch(&[hits("a", 38, &[0])], &options())
            .unwrap();
        let export = TensorExport::from(&out);
        assert_eq!(export.shape, vec![1, 8, 3]);
        assert_eq!(export.data.len(), 24);
        assert_eq!(export.data[1], 1.0);
    }

    #[test]
    fn test_empty_batch() {
        let encoder = two_class_encoder();
        let out = encoder.encode_batch(&[], &options()).unwrap();
        assert_eq!(out.tensor.n_tracks(), 0);
        assert_eq!(out.tensor.n_timesteps(), 8);
    }

    #[test]
    fn test_collect_midi_files_scans_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let files = collect_midi_files(&[dir.path()]);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_good.mid", "b_bad.mid"]);
    }

    #[test]
    fn test_unreadable_file_skipped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let out = processor(Strictness::SkipAndReport)
            .encode_paths(&[dir.path()])
            .unwrap();
        assert_eq!(out.tensor.n_tracks(), 1);
        assert_eq!(out.sources, vec!["a_good.mid".to_string()]);
        assert_eq!(out.failures.len(), 1);
        assert!(out.failures[0].file.ends_with("b_bad.mid"));
        match &out.failures[0].error {
            CodecError::FileFailed { source, .. } => {
                assert!(matches!(**source, CodecError::MidiParse(_)))
            }
            other => panic!("expected file failure, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_file_aborts_by_default() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        match processor(Strictness::Abort).encode_paths(&[dir.path()]) {
            Err(CodecError::FileFailed { file, .. }) => assert!(file.ends_with("b_bad.mid")),
            other => panic!("expected file failure, got {:?}", other),
        }
    }
}
