//! Integration tests for the pipeline driver

mod mocks;

use std::time::Duration;

use conduit_core::config::DriverConfig;
use conduit_core::error::ConduitError;
use conduit_core::format::{FormatKind, VideoFormat};
use conduit_core::nodes::{Gain, Passthrough};
use conduit_core::pipeline::{Pipeline, PumpOutcome};
use conduit_core::source::Source;
use conduit_core::sources::{QueueSource, TS_PACKET_SIZE};
use conduit_core::status::{Pull, ReadStatus};
use conduit_core::unit::UnitBuffer;
use conduit_core::AudioFormat;
use mocks::{ts_source, video_source, ScriptedFill, ScriptedProduce, Step};

fn chain(source: Source, passthroughs: usize) -> Pipeline {
    let mut pipeline = Pipeline::new("test");
    pipeline.add_source(source);
    for _ in 0..passthroughs {
        pipeline.append(Passthrough::new()).unwrap();
    }
    pipeline.negotiate().unwrap();
    pipeline
}

fn fast_driver() -> DriverConfig {
    DriverConfig::default().with_poll_interval(Duration::from_millis(1))
}

#[test]
fn test_ts_scenario_five_packets_then_eof() {
    let mut pipeline = chain(ts_source(5), 1);
    let mut dst = UnitBuffer::with_capacity(TS_PACKET_SIZE);

    for i in 0..5 {
        assert_eq!(pipeline.read_into(&mut dst), ReadStatus::Ok);
        assert_eq!(dst.len(), TS_PACKET_SIZE);
        assert_eq!(dst.data()[0], 0x47);
        assert_eq!(dst.data()[1], i as u8);
    }

    let before = dst.clone();
    assert_eq!(pipeline.read_into(&mut dst), ReadStatus::Eof);
    assert_eq!(dst.data(), before.data());
    assert_eq!(dst.meta(), before.meta());

    let stats = pipeline.stats();
    assert_eq!(stats.units, 5);
    assert_eq!(stats.bytes, 5 * TS_PACKET_SIZE as u64);
}

#[test]
fn test_origin_eof_and_error_propagate_unchanged() {
    for terminal in [ReadStatus::Eof, ReadStatus::Error] {
        for length in 2..=4 {
            let source = Source::filling(
                "scripted",
                ScriptedFill::new([Step::Unit(b"payload".to_vec()), Step::Status(terminal)]),
            )
            .with_format(VideoFormat::default());
            let mut pipeline = chain(source, length);
            let mut dst = UnitBuffer::new();

            assert_eq!(pipeline.read_into(&mut dst), ReadStatus::Ok);
            assert_eq!(pipeline.read_into(&mut dst), terminal);
            assert_eq!(dst.data(), b"payload");
            assert_eq!(dst.meta().pts, Some(0));
        }
    }
}

#[test]
fn test_again_is_transient() {
    let source = Source::producing(
        "scripted",
        ScriptedProduce::new([
            Step::Status(ReadStatus::Again),
            Step::Unit(vec![1, 2, 3]),
            Step::Status(ReadStatus::Again),
            Step::Unit(vec![4]),
        ]),
    )
    .with_format(VideoFormat::default());
    let mut pipeline = chain(source, 2);

    let statuses: Vec<ReadStatus> = (0..5).map(|_| pipeline.read().status()).collect();
    assert_eq!(
        statuses,
        vec![
            ReadStatus::Again,
            ReadStatus::Ok,
            ReadStatus::Again,
            ReadStatus::Ok,
            ReadStatus::Eof
        ]
    );
    assert_eq!(pipeline.stats().again, 2);
}

#[test]
fn test_pump_stops_at_again() {
    let (queue, handle) = QueueSource::new();
    let source = Source::filling("queue", queue).with_format(VideoFormat::default());
    let mut pipeline = chain(source, 1);

    handle.push_slice(b"a");
    handle.push_slice(b"b");

    let mut seen = Vec::new();
    let outcome = pipeline
        .pump(10, |unit| {
            seen.push(unit.data().to_vec());
            Ok(())
        })
        .unwrap();
    assert_eq!(outcome, PumpOutcome { units: 2, status: ReadStatus::Again });
    assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn test_pipeline_feeds_another_pipeline() {
    let inner = chain(video_source(320, 240, 25, 3), 1);
    let mut outer = Pipeline::new("outer");
    outer.add_source(Source::filling("inner", inner).with_format(VideoFormat::new(320, 240, 25)));
    outer.append(Passthrough::new()).unwrap();
    outer.negotiate().unwrap();

    let outcome = outer.pump(10, |_| Ok(())).unwrap();
    assert_eq!(outcome, PumpOutcome { units: 3, status: ReadStatus::Eof });
}

#[test]
fn test_multiplexed_origin_selects_stream() {
    let mut pipeline = Pipeline::new("mux");
    let origin = pipeline.add_multiplexed(vec![
        video_source(640, 480, 30, 2),
        Source::filling(
            "audio",
            ScriptedFill::new([Step::Unit(vec![0x10, 0x00, 0x20, 0x00])]),
        )
        .with_format(AudioFormat::default()),
    ]);
    let gain = pipeline.add_node(Gain::new(0.0));
    pipeline.connect(gain, 0, origin, 1).unwrap();
    pipeline.negotiate().unwrap();

    assert_eq!(
        pipeline.input_format(gain, 0).map(|f| f.kind()),
        Some(FormatKind::Audio)
    );
    match pipeline.read() {
        Pull::Unit(unit) => assert_eq!(unit.data(), &[0x10, 0x00, 0x20, 0x00]),
        other => panic!("expected a unit, got {:?}", other.status()),
    }
    assert_eq!(pipeline.read().status(), ReadStatus::Eof);
    assert!(pipeline.source(origin, 0).is_some());
    assert!(pipeline.source(origin, 2).is_none());
}

#[test]
fn test_run_completes_on_eof() {
    let mut pipeline = chain(ts_source(8), 2);
    let mut total = 0;
    let summary = tokio_test::block_on(pipeline.run(&fast_driver(), |unit| {
        total += unit.len();
        Ok(())
    }))
    .unwrap();

    assert_eq!(summary.units, 8);
    assert_eq!(summary.bytes, 8 * TS_PACKET_SIZE as u64);
    assert_eq!(total, 8 * TS_PACKET_SIZE);
}

#[tokio::test]
async fn test_run_waits_for_queue_producer() {
    let (queue, handle) = QueueSource::new();
    let source = Source::filling("queue", queue).with_format(VideoFormat::default());
    let mut pipeline = chain(source, 1);

    let producer = std::thread::spawn(move || {
        for i in 0..10u8 {
            handle.push_slice(&[i; 32]);
            std::thread::sleep(Duration::from_millis(2));
        }
        handle.close();
    });

    let mut order = Vec::new();
    let summary = pipeline
        .run(&fast_driver(), |unit| {
            order.push(unit.data()[0]);
            Ok(())
        })
        .await
        .unwrap();
    producer.join().unwrap();

    assert_eq!(summary.units, 10);
    assert_eq!(order, (0..10u8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_run_idle_timeout() {
    let (queue, _handle) = QueueSource::new();
    let source = Source::filling("queue", queue).with_format(VideoFormat::default());
    let mut pipeline = chain(source, 1);

    let config = fast_driver().with_max_idle_polls(3);
    let err = pipeline.run(&config, |_| Ok(())).await.unwrap_err();
    assert!(matches!(err, ConduitError::IdleTimeout { polls: 3 }));
}

#[tokio::test]
async fn test_run_surfaces_stream_error() {
    let source = Source::filling(
        "broken",
        ScriptedFill::new([Step::Unit(vec![1]), Step::Status(ReadStatus::Error)]),
    )
    .with_format(VideoFormat::default());
    let mut pipeline = chain(source, 1);

    let mut units = 0;
    let err = pipeline
        .run(&fast_driver(), |_| {
            units += 1;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Stream(_)));
    assert_eq!(units, 1);
}

#[tokio::test]
async fn test_run_requires_negotiation() {
    let mut pipeline = Pipeline::new("raw");
    pipeline.add_source(video_source(320, 240, 30, 1));
    pipeline.append(Passthrough::new()).unwrap();

    let err = pipeline.run(&fast_driver(), |_| Ok(())).await.unwrap_err();
    assert!(matches!(err, ConduitError::NotNegotiated));
}

#[test]
fn test_pipeline_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Pipeline>();
}
