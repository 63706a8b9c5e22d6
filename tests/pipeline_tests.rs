// Frame pipeline integration tests
// End-to-end behaviour of configure / deliver_frame / present / teardown

mod common;

use common::*;
use frameband::display::{CapturePresenter, SnapshotPresenter};
use frameband::pipeline::partition;
use frameband::*;

#[test]
fn test_identity_160x144_worker_counts() {
    let source = filled_frame(160, 144, 0xAABB_CCDD);

    for workers in [0, 1, 2, 4, 8] {
        let mut pipeline = pipeline(PipelineSettings::new(160, 144).with_workers(workers));
        let frame = pipeline.deliver_frame(&source).unwrap();

        assert_eq!(frame.output_width(), 160);
        assert_eq!(frame.output_height(), 144);
        assert_eq!(frame.pixels(), source.as_slice(), "workers = {}", workers);
        assert!(!pipeline.is_filtered());
    }
}

#[test]
fn test_identity_is_byte_identical_for_noise() {
    let mut rng = seeded_rng(1);
    let mut pipeline = pipeline(PipelineSettings::new(SOAK_WIDTH, SOAK_HEIGHT).with_workers(3));

    for _ in 0..50 {
        let source = noise_frame(&mut rng, SOAK_WIDTH, SOAK_HEIGHT);
        assert_eq!(deliver(&mut pipeline, &source), source);
    }
}

#[test]
fn test_output_size_for_every_filter() {
    let source = filled_frame(30, 20, 0xFF12_3456);

    for id in FilterId::ALL {
        let scale = filter::enlarge_factor_of(id);
        let mut pipeline = pipeline(
            PipelineSettings::new(30, 20)
                .with_filter(id)
                .with_workers(4),
        );
        let frame = pipeline.deliver_frame(&source).unwrap();

        assert_eq!(frame.output_width(), 30 * scale, "{}", id);
        assert_eq!(frame.output_height(), 20 * scale, "{}", id);
        assert_eq!(frame.pixels().len(), 30 * scale * 20 * scale * 4);
        assert_eq!(pipeline.scale(), scale);
    }
}

#[test]
fn test_every_destination_pixel_written() {
    // A uniform opaque source must come out with no zeroed pixels left over
    let source = filled_frame(37, 29, 0xFF80_8080);

    for id in FilterId::ALL {
        for workers in [1, 2, 3, 7] {
            let mut pipeline = pipeline(
                PipelineSettings::new(37, 29)
                    .with_filter(id)
                    .with_workers(workers),
            );
            let frame = pipeline.deliver_frame(&source).unwrap();
            assert!(
                frame
                    .pixels()
                    .chunks_exact(4)
                    .all(|p| u32::from_ne_bytes([p[0], p[1], p[2], p[3]]) >> 24 == 0xFF),
                "{} with {} workers left pixels unwritten",
                id,
                workers
            );
        }
    }
}

#[test]
fn test_parallel_matches_inline_over_many_frames() {
    for workers in [1, 2, 4] {
        let settings = PipelineSettings::new(SOAK_WIDTH, SOAK_HEIGHT)
            .with_filter(FilterId::TvMode)
            .with_blend(BlendId::Smart);
        let mut inline = pipeline(settings);
        let mut pooled = pipeline(settings.with_workers(workers));
        let mut rng = seeded_rng(workers as u64);

        for n in 0..1000 {
            let source = noise_frame(&mut rng, SOAK_WIDTH, SOAK_HEIGHT);
            let expected = deliver(&mut inline, &source);
            let actual = deliver(&mut pooled, &source);
            assert!(
                expected == actual,
                "frame {} differs with {} workers",
                n,
                workers
            );
        }
        assert_eq!(pooled.frames_delivered(), 1000);
    }
}

#[test]
fn test_row_local_filters_independent_of_band_split() {
    let mut rng = seeded_rng(7);
    let frames: Vec<_> = (0..5)
        .map(|_| noise_frame(&mut rng, SOAK_WIDTH, SOAK_HEIGHT))
        .collect();

    for id in ROW_LOCAL_FILTERS {
        for blend in BlendId::ALL {
            let settings = PipelineSettings::new(SOAK_WIDTH, SOAK_HEIGHT)
                .with_filter(id)
                .with_blend(blend);
            let mut inline = pipeline(settings);
            let mut pooled = pipeline(settings.with_workers(5));

            for source in &frames {
                assert!(
                    deliver(&mut inline, source) == deliver(&mut pooled, source),
                    "{} / {} differs across bands",
                    id,
                    blend
                );
            }
        }
    }
}

#[test]
fn test_single_worker_matches_inline_for_neighbourhood_filters() {
    let mut rng = seeded_rng(11);
    let source = noise_frame(&mut rng, SOAK_WIDTH, SOAK_HEIGHT);

    for id in [FilterId::Bilinear, FilterId::Scale2x] {
        let settings = PipelineSettings::new(SOAK_WIDTH, SOAK_HEIGHT).with_filter(id);
        let expected = deliver(&mut pipeline(settings), &source);
        let actual = deliver(&mut pipeline(settings.with_workers(1)), &source);
        assert!(expected == actual, "{} differs", id);
    }
}

#[test]
fn test_representation_is_idempotent() {
    let mut rng = seeded_rng(3);
    let mut pipeline = pipeline(
        PipelineSettings::new(SOAK_WIDTH, SOAK_HEIGHT)
            .with_filter(FilterId::Scale2x)
            .with_workers(2),
    );
    pipeline.deliver_frame(&noise_frame(&mut rng, SOAK_WIDTH, SOAK_HEIGHT)).unwrap();

    let mut capture = CapturePresenter::new();
    pipeline.present(&mut capture).unwrap();
    let first = capture.last().unwrap().clone();
    pipeline.present(&mut capture).unwrap();

    assert_eq!(capture.last().unwrap(), &first);
    assert_eq!(capture.presented(), 2);
    assert_eq!(first.scale, 2);
}

#[test]
fn test_teardown_leaves_workers_stopped() {
    for workers in [0, 1, 2, 8] {
        let mut pipeline = pipeline(PipelineSettings::new(64, 64).with_workers(workers));
        pipeline.deliver_frame(&filled_frame(64, 64, 0)).unwrap();

        let lifecycles = pipeline.worker_lifecycles();
        assert_eq!(lifecycles.len(), workers);
        assert!(pipeline
            .worker_states()
            .iter()
            .all(|&s| s == LifecycleState::Running));

        pipeline.teardown();
        assert!(
            lifecycles
                .iter()
                .all(|l| l.state() == LifecycleState::Stopped),
            "workers = {}",
            workers
        );
        assert!(matches!(
            pipeline.deliver_frame(&filled_frame(64, 64, 0)),
            Err(PipelineError::NotConfigured)
        ));
    }
}

#[test]
fn test_drop_joins_workers() {
    let pipeline = pipeline(PipelineSettings::new(16, 16).with_workers(4));
    let lifecycles = pipeline.worker_lifecycles();
    drop(pipeline);
    assert!(lifecycles
        .iter()
        .all(|l| l.state() == LifecycleState::Stopped));
}

#[test]
fn test_band_split_of_100_rows() {
    let pipeline = pipeline(PipelineSettings::new(10, 100).with_workers(3));
    let rows: Vec<_> = pipeline.bands().iter().map(|b| b.rows()).collect();
    assert_eq!(rows, vec![0..33, 33..66, 66..100]);
    assert_eq!(pipeline.bands(), partition(100, 3).unwrap().as_slice());
}

#[test]
fn test_too_many_workers_rejected() {
    let mut pipeline = FramePipeline::new();
    assert!(matches!(
        pipeline.configure(PipelineSettings::new(10, 4).with_workers(5)),
        Err(ConfigError::TooManyWorkers {
            workers: 5,
            height: 4
        })
    ));
    assert!(pipeline.settings().is_none());
}

#[test]
fn test_reconfigure_error_keeps_previous_configuration() {
    let mut pipeline = pipeline(
        PipelineSettings::new(20, 20)
            .with_filter(FilterId::Stretch2x)
            .with_workers(2),
    );
    let source = filled_frame(20, 20, 0xFF00_FF00);
    let before = deliver(&mut pipeline, &source);

    // Real filters only accept 32-bit pixels
    let err = pipeline
        .configure(
            PipelineSettings::new(20, 20)
                .with_filter(FilterId::Scale2x)
                .with_depth(ColorDepth::Bits16),
        )
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedDepth { .. }));

    assert_eq!(pipeline.scale(), 2);
    assert_eq!(pipeline.worker_count(), 2);
    assert_eq!(pipeline.retained().unwrap().pixels(), before.as_slice());
    assert_eq!(deliver(&mut pipeline, &source), before);
}

#[test]
fn test_reconfigure_replaces_workers() {
    let mut pipeline = pipeline(PipelineSettings::new(32, 32).with_workers(4));
    let old = pipeline.worker_lifecycles();

    pipeline
        .configure(
            PipelineSettings::new(32, 32)
                .with_filter(FilterId::Stretch3x)
                .with_workers(2),
        )
        .unwrap();

    assert!(old.iter().all(|l| l.state() == LifecycleState::Stopped));
    assert_eq!(pipeline.worker_count(), 2);
    assert!(pipeline.retained().is_none());
    let frame = pipeline.deliver_frame(&filled_frame(32, 32, 1)).unwrap();
    assert_eq!(frame.output_width(), 96);
}

#[test]
fn test_16_bit_blend_path() {
    let mut pipeline = pipeline(
        PipelineSettings::new(8, 8)
            .with_depth(ColorDepth::Bits16)
            .with_blend(BlendId::MotionBlur)
            .with_workers(2),
    );
    let white = 0xFFFFu16.to_ne_bytes().repeat(64);
    let black = vec![0u8; 128];

    // first frame seeds the history
    assert_eq!(deliver(&mut pipeline, &white), white);
    let mixed = deliver(&mut pipeline, &black);
    assert!(mixed
        .chunks_exact(2)
        .all(|p| u16::from_ne_bytes([p[0], p[1]]) == 0x7BEF));
}

#[test]
fn test_24_bit_identity_copies() {
    let mut pipeline = pipeline(
        PipelineSettings::new(5, 6)
            .with_depth(ColorDepth::Bits24)
            .with_workers(3),
    );
    let source: Vec<u8> = (0..5 * 6 * 3).map(|i| i as u8).collect();
    assert_eq!(deliver(&mut pipeline, &source), source);
}

#[test]
fn test_osd_message_is_composited() {
    let mut pipeline = pipeline(PipelineSettings::new(64, 32).with_workers(2));
    let source = filled_frame(64, 32, 0xFF20_2020);

    assert_eq!(deliver(&mut pipeline, &source), source);
    pipeline.osd_mut().show_message("HELLO");
    assert_ne!(deliver(&mut pipeline, &source), source);
}

#[test]
fn test_snapshot_backend_writes_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(
        PipelineSettings::new(16, 16)
            .with_filter(FilterId::Scanlines)
            .with_workers(2),
    );
    let mut backend = Backend::Snapshot(SnapshotPresenter::new(dir.path()));

    for value in [0xFF00_0000, 0xFFFF_FFFF] {
        pipeline.deliver_frame(&filled_frame(16, 16, value)).unwrap();
        pipeline.present(&mut backend).unwrap();
    }

    match backend {
        Backend::Snapshot(snapshot) => {
            assert_eq!(snapshot.written().len(), 2);
            assert!(snapshot.written().iter().all(|p| p.exists()));
        }
        _ => unreachable!(),
    }
}
