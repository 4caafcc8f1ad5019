use std::sync::Arc;
use std::time::{Duration, Instant};

use optrack::infrastructure::mocks::{
    CaptureErrorListener, CaptureLogListener, FailingSink, PanickingErrorListener, RecordingSink,
};
use optrack::{
    ConditionalSelector, Message, MessageError, OpType, RateLimiter, Record, Severity, Sink,
    SinkDispatch, SourceType, SystemClock, TextFormatter, Tracker, TrackerError, TrackerIdentity,
    TrackerStats,
};

fn build_tracker(sink: Arc<dyn Sink>) -> Tracker {
    Tracker::builder(TrackerIdentity::new("orders", SourceType::Application))
        .with_sink(sink)
        .with_clock(Arc::new(SystemClock::new()))
        .with_formatter(Arc::new(TextFormatter::new()))
        .build()
        .unwrap()
}

fn pipeline(sink: Arc<dyn Sink>) -> (SinkDispatch, TrackerStats) {
    let stats = TrackerStats::new();
    let dispatch = SinkDispatch::new(
        sink,
        Arc::new(TextFormatter::new()),
        Arc::new(ConditionalSelector::new()),
        Arc::new(RateLimiter::unlimited(Arc::new(SystemClock::new()))),
        stats.clone(),
    );
    (dispatch, stats)
}

#[test]
fn test_severity_floor_filters_and_counts() {
    let sink = Arc::new(RecordingSink::new());
    let tracker = build_tracker(sink.clone());
    tracker.selector().set_floor(Severity::Warning);

    tracker.log(Severity::Info, Message::new("routine")).unwrap();
    tracker.log(Severity::Error, Message::new("disk full")).unwrap();

    let writes = sink.writes();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].contains("disk full"));

    let stats = tracker.stats();
    assert_eq!(stats.messages_logged(), 2);
    assert_eq!(stats.records_filtered(), 1);
    assert_eq!(stats.records_delivered(), 1);
}

#[test]
fn test_rate_limited_tracker_paces_logs() {
    let started = Instant::now();
    // 50 msgs/sec leaves 20ms between messages; the first one rides free.
    let tracker = Tracker::builder(TrackerIdentity::new("orders", SourceType::Application))
        .with_sink(Arc::new(RecordingSink::new()))
        .with_clock(Arc::new(SystemClock::new()))
        .with_formatter(Arc::new(TextFormatter::new()))
        .with_rate_limits(50, 0)
        .build()
        .unwrap();

    for i in 0..3 {
        tracker
            .log(Severity::Info, Message::new(format!("message {}", i)))
            .unwrap();
    }

    assert!(started.elapsed() >= Duration::from_millis(35));
    assert_eq!(tracker.limiter().total_msgs(), 3);
}

#[test]
fn test_write_failure_reaches_listeners_not_caller() {
    let sink = Arc::new(FailingSink::new());
    sink.set_fail_writes(true);
    let (dispatch, stats) = pipeline(sink);

    let errors = Arc::new(CaptureErrorListener::new());
    dispatch.add_error_listener(errors.clone());

    let message = Message::new("lost");
    dispatch.dispatch(Record::Message(Severity::Info, &message));

    // The caller never sees the failure; the listener does.
    let captured = errors.captured();
    assert_eq!(captured.len(), 1);
    assert!(captured[0].contains("write refused"));
    assert_eq!(stats.delivery_errors(), 1);
    assert_eq!(stats.records_delivered(), 0);
}

#[test]
fn test_open_failure_counts_as_delivery_error() {
    let sink = Arc::new(FailingSink::new());
    sink.set_fail_open(true);
    let (dispatch, stats) = pipeline(sink.clone());

    let message = Message::new("lost");
    dispatch.dispatch(Record::Message(Severity::Info, &message));

    assert!(!sink.is_open());
    assert_eq!(stats.delivery_errors(), 1);
}

#[test]
fn test_panicking_error_listener_is_contained() {
    let sink = Arc::new(FailingSink::new());
    sink.set_fail_writes(true);
    let (dispatch, stats) = pipeline(sink);

    let errors = Arc::new(CaptureErrorListener::new());
    dispatch.add_error_listener(Arc::new(PanickingErrorListener));
    dispatch.add_error_listener(errors.clone());

    let message = Message::new("lost");
    dispatch.dispatch(Record::Message(Severity::Info, &message));

    // The listener behind the panicking one still hears about the failure.
    assert_eq!(errors.captured().len(), 1);
    assert_eq!(stats.delivery_errors(), 1);
}

#[test]
fn test_log_listener_sees_delivered_records_only() {
    let sink = Arc::new(RecordingSink::new());
    let (dispatch, _stats) = pipeline(sink);

    let deliveries = Arc::new(CaptureLogListener::new());
    dispatch.add_log_listener(deliveries.clone());

    let message = Message::new("delivered");
    dispatch.dispatch(Record::Message(Severity::Info, &message));

    let sink = Arc::new(FailingSink::new());
    sink.set_fail_writes(true);
    let (failing_dispatch, _stats) = pipeline(sink);
    failing_dispatch.add_log_listener(deliveries.clone());
    let lost = Message::new("lost");
    failing_dispatch.dispatch(Record::Message(Severity::Info, &lost));

    assert_eq!(deliveries.count(), 1);
}

#[test]
fn test_message_signature_and_tag_rules() {
    // Signatures are bounded; over-long and empty ones are refused.
    let err = Message::with_signature("x".repeat(37), "body").unwrap_err();
    assert_eq!(err, MessageError::SignatureTooLong { length: 37 });
    let err = Message::with_signature("", "body").unwrap_err();
    assert_eq!(err, MessageError::EmptySignature);

    let message = Message::with_signature("corr-17", "body").unwrap();
    assert_eq!(message.signature(), "corr-17");

    // Empty tags collapse to none; long tags are cut at the length cap.
    let message = Message::new("body").with_tag("");
    assert!(message.tag().is_none());

    let exact = "t".repeat(256);
    let message = Message::new("body").with_tag(exact.clone());
    assert_eq!(message.tag(), Some(exact.as_str()));

    let message = Message::new("body").with_tag("t".repeat(300));
    assert_eq!(message.tag().map(str::len), Some(256));
}

#[test]
fn test_message_text_substitutes_placeholders() {
    let message = Message::new("order {} took {} ms")
        .with_args(vec!["A-17".to_string(), "42".to_string()]);
    assert_eq!(message.text(), "order A-17 took 42 ms");

    // Missing args leave the placeholder visible.
    let message = Message::new("order {} took {} ms").with_args(vec!["A-17".to_string()]);
    assert_eq!(message.text(), "order A-17 took {} ms");
}

#[test]
fn test_formatted_event_line_reaches_sink() {
    let sink = Arc::new(RecordingSink::new());
    let tracker = build_tracker(sink.clone());

    let mut event = optrack::Event::new("reserve-stock", OpType::Call);
    tracker.start_event(&mut event).unwrap();
    tracker.stop_event(&mut event).unwrap();
    tracker.record_event(event).unwrap();

    let writes = sink.writes();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].contains("EVENT | reserve-stock"));
    assert!(writes[0].contains("type=CALL"));
    assert!(writes[0].contains("completion=SUCCESS"));
}

#[test]
fn test_flush_failure_surfaces_to_caller() {
    let sink = Arc::new(FailingSink::new());
    sink.set_fail_flush(true);
    let tracker = build_tracker(sink);

    let err = tracker.flush().unwrap_err();
    assert!(matches!(err, TrackerError::Delivery(_)));
}

#[test]
fn test_close_releases_the_sink() {
    let sink = Arc::new(RecordingSink::new());
    let tracker = build_tracker(sink.clone());

    tracker.log(Severity::Info, Message::new("hello")).unwrap();
    assert!(sink.is_open());

    tracker.close().unwrap();
    assert!(!sink.is_open());
    assert!(tracker.is_closed());

    // Closed trackers refuse further instrumentation.
    assert!(matches!(
        tracker.log(Severity::Info, Message::new("late")),
        Err(TrackerError::Closed)
    ));

    // Closing again is a no-op.
    tracker.close().unwrap();
    assert_eq!(sink.open_count(), 1);
}