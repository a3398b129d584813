use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use hmi_telemetry::ingest::catalog::{SignalCatalog, SignalSpec};
use hmi_telemetry::ingest::{
    BusError, BusFrame, ChannelSource, FrameError, IngestExit, IngestLoop, LineSource, SimulatedVehicle,
};
use hmi_telemetry::kernel::telemetry::{LinkState, RejectReason, StatusAggregator};
use hmi_telemetry::kernel::time::{Clock, Millis};
use hmi_telemetry::{IngestRecorder, TelemetryBuffer};

const STALE: Duration = Duration::from_millis(500);

struct Harness {
    buffer: Arc<TelemetryBuffer>,
    recorder: Arc<IngestRecorder>,
    clock: Clock,
    cancel: CancellationToken,
}

impl Harness {
    fn new() -> Self {
        let clock = Clock::new();
        Self {
            buffer: Arc::new(TelemetryBuffer::new()),
            recorder: Arc::new(IngestRecorder::new(clock.now(), Duration::from_secs(5))),
            clock,
            cancel: CancellationToken::new(),
        }
    }

    fn ingest<S: hmi_telemetry::ingest::BusSource>(&self, source: S, catalog: SignalCatalog) -> IngestLoop<S> {
        IngestLoop::new(
            source,
            catalog,
            self.buffer.clone(),
            self.recorder.clone(),
            self.clock.clone(),
            self.cancel.clone(),
        )
    }
}

#[test]
fn test_ingest_at_decodes_raw_and_stamps_receipt_time() {
    let h = Harness::new();
    let catalog = SignalCatalog::vehicle_default();
    let speed = catalog.spec("speed").unwrap().clone();
    let ingest = h.ingest(ChannelSource::pair(1).1, catalog);

    ingest.ingest_at(&BusFrame::raw("speed", speed.encode_raw(88.5)), Millis(1234)).unwrap();

    let view = h.buffer.get("speed", Millis(1234), STALE).unwrap();
    assert!((view.record.value - 88.5).abs() < 1e-9);
    assert_eq!(view.record.unit, "km/h");
    assert_eq!(view.record.observed_at, Millis(1234));
    assert_eq!(h.recorder.snapshot().messages_total, 1);
    assert_eq!(h.recorder.snapshot().last_message_at, Some(Millis(1234)));
}

#[test]
fn test_invalid_frames_are_counted_and_dropped() {
    let h = Harness::new();
    let ingest = h.ingest(ChannelSource::pair(1).1, SignalCatalog::vehicle_default());

    let bad = [
        (BusFrame::value("speed", f64::NAN), RejectReason::NonFinite),
        (BusFrame::value("speed", 900.0), RejectReason::OutOfRange),
        (BusFrame::value("tyre_pressure", 2.2), RejectReason::UnknownSignal),
        (BusFrame::raw("speed", vec![0x01]), RejectReason::Undecodable),
    ];
    for (frame, reason) in &bad {
        let err = ingest.ingest_at(frame, Millis(10)).unwrap_err();
        assert_eq!(err.reason(), *reason);
    }

    assert!(h.buffer.is_empty(), "Rejected frames must not reach the buffer");
    let counters = h.recorder.snapshot();
    assert_eq!(counters.errors_total, 4);
    assert_eq!(counters.messages_total, 0);

    // A good frame afterwards still goes through
    ingest.ingest_at(&BusFrame::value("speed", 30.0), Millis(20)).unwrap();
    assert_eq!(h.buffer.len(), 1);
}

#[test]
fn test_open_catalog_accepts_unknown_values() {
    let h = Harness::new();
    let ingest = h.ingest(ChannelSource::pair(1).1, SignalCatalog::new(vec![], false));

    ingest
        .ingest_at(&BusFrame::value("cabin_temp", 21.5).with_unit("°C"), Millis(5))
        .unwrap();
    assert_eq!(h.buffer.get("cabin_temp", Millis(5), STALE).unwrap().record.unit, "°C");

    let err = ingest.ingest_at(&BusFrame::raw("cabin_temp", vec![1, 2]), Millis(6)).unwrap_err();
    assert!(matches!(err, FrameError::Undecodable { .. }));
}

#[tokio::test]
async fn test_source_close_marks_link_down() {
    let h = Harness::new();
    let (tx, source) = ChannelSource::pair(16);
    let ingest = h.ingest(source, SignalCatalog::vehicle_default());
    let task = tokio::spawn(ingest.run());

    tx.send(BusFrame::value("speed", 42.0)).await.unwrap();
    tx.send(BusFrame::value("speed", f64::INFINITY)).await.unwrap();
    tx.send(BusFrame::value("battery_voltage", 12.4)).await.unwrap();
    drop(tx);

    let exit = task.await.unwrap();
    assert!(matches!(exit, IngestExit::SourceClosed));

    let counters = h.recorder.snapshot();
    assert_eq!(counters.messages_total, 2);
    assert_eq!(counters.errors_total, 1);
    assert_eq!(counters.link, LinkState::Down);

    // Values survive the disconnect; status reports it
    assert_eq!(h.buffer.len(), 2);
    let status = StatusAggregator::new(Duration::from_secs(60)).evaluate(&counters, h.clock.now());
    assert!(!status.connected());
}

#[tokio::test]
async fn test_line_source_skips_malformed_lines() {
    let h = Harness::new();
    let input: &'static [u8] = b"{\"signal_id\":\"speed\",\"value\":42.0}\n\
                         this is not json\n\
                         \n\
                         {\"signal_id\":\"battery_voltage\",\"value\":12.4}\n";
    let source = LineSource::spawn(input, "test", 8).unwrap();
    let exit = h.ingest(source, SignalCatalog::vehicle_default()).run().await;

    assert!(matches!(exit, IngestExit::SourceClosed));
    let counters = h.recorder.snapshot();
    assert_eq!(counters.messages_total, 2);
    assert_eq!(counters.errors_total, 1);
    assert_eq!(h.recorder.rejected(RejectReason::Undecodable), 1);

    let snap = h.buffer.snapshot(h.clock.now(), STALE);
    assert_eq!(snap.get("speed").unwrap().record.value, 42.0);
    assert_eq!(snap.get("battery_voltage").unwrap().record.unit, "V");
}

#[tokio::test]
async fn test_simulated_dropout_stops_ingest() {
    let h = Harness::new();
    let source = SimulatedVehicle::new(Duration::from_millis(5)).with_dropout(3);
    let exit = h.ingest(source, SignalCatalog::vehicle_default()).run().await;

    assert!(matches!(exit, IngestExit::LinkFailed(BusError::Disconnected(_))));
    let counters = h.recorder.snapshot();
    assert_eq!(counters.messages_total, 9, "3 rounds of 3 signals");
    assert_eq!(counters.errors_total, 0);
    assert_eq!(counters.link, LinkState::Down);
    assert_eq!(h.buffer.len(), 3);
}

#[tokio::test]
async fn test_cancel_stops_idle_loop() {
    let h = Harness::new();
    let (_tx, source) = ChannelSource::pair(1);
    let task = tokio::spawn(h.ingest(source, SignalCatalog::vehicle_default()).run());

    tokio::time::sleep(Duration::from_millis(20)).await;
    h.cancel.cancel();

    let exit = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("loop should observe cancellation")
        .unwrap();
    assert!(matches!(exit, IngestExit::Cancelled));
    // Cancellation is not a link failure
    assert_eq!(h.recorder.snapshot().link, LinkState::Up);
}

/// Never yields a byte, like an idle terminal on stdin.
struct StalledReader;

impl std::io::Read for StalledReader {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        std::thread::sleep(Duration::from_secs(3600));
        Ok(0)
    }
}

struct BrokenReader;

impl std::io::Read for BrokenReader {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "device gone"))
    }
}

#[tokio::test]
async fn test_cancel_does_not_wait_on_blocked_line_reader() {
    let h = Harness::new();
    let source = LineSource::spawn(std::io::BufReader::new(StalledReader), "stalled", 4).unwrap();
    let task = tokio::spawn(h.ingest(source, SignalCatalog::vehicle_default()).run());

    tokio::time::sleep(Duration::from_millis(20)).await;
    h.cancel.cancel();

    let exit = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("a blocked read must not hold up shutdown")
        .unwrap();
    assert!(matches!(exit, IngestExit::Cancelled));
}

#[tokio::test]
async fn test_line_read_error_is_fatal() {
    let h = Harness::new();
    let source = LineSource::spawn(std::io::BufReader::new(BrokenReader), "broken", 4).unwrap();
    let exit = h.ingest(source, SignalCatalog::vehicle_default()).run().await;

    assert!(matches!(exit, IngestExit::LinkFailed(BusError::Io(_))));
    assert_eq!(h.recorder.snapshot().link, LinkState::Down);
    assert!(h.recorder.last_link_error().unwrap().contains("device gone"));
}

#[test]
fn test_custom_spec_signed_offset() {
    let h = Harness::new();
    let spec = SignalSpec::new("coolant", "°C").scaled(0.5, -40.0).bits(4, 8, false).range(-40.0, 87.5);
    let ingest = h.ingest(ChannelSource::pair(1).1, SignalCatalog::new(vec![spec.clone()], true));

    let bytes = spec.encode_raw(20.0);
    ingest.ingest_at(&BusFrame::raw("coolant", bytes), Millis(1)).unwrap();
    assert_eq!(h.buffer.get("coolant", Millis(1), STALE).unwrap().record.value, 20.0);
}
