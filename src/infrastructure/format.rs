//! Text rendering for deliverable records.
//!
//! [`TextFormatter`] is the default formatter wired by the runtime: one
//! pipe-separated line per record, wall timestamps as microseconds since the
//! Unix epoch, and an activity's owned events on indented continuation lines.

use crate::application::ports::{Formatter, Record};
use crate::domain::event::Event;
use std::time::{SystemTime, UNIX_EPOCH};

/// Pipe-separated plain-text formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl TextFormatter {
    /// Create a text formatter.
    pub fn new() -> Self {
        Self
    }
}

fn epoch_micros(wall: Option<SystemTime>) -> String {
    match wall.and_then(|wall| wall.duration_since(UNIX_EPOCH).ok()) {
        Some(since_epoch) => since_epoch.as_micros().to_string(),
        None => "-".to_string(),
    }
}

fn join(values: &[String]) -> String {
    values.join(",")
}

fn event_line(event: &Event) -> String {
    let mut line = format!(
        "{} | {} | EVENT | {} | type={} | elapsed.usec={} | completion={}",
        epoch_micros(event.start_wall()),
        event.severity(),
        event.name(),
        event.op_type(),
        event
            .elapsed_micros()
            .map_or_else(|| "-".to_string(), |micros| micros.to_string()),
        event.completion(),
    );
    if !event.correlators().is_empty() {
        line.push_str(&format!(" | corrid={}", join(event.correlators())));
    }
    if !event.tags().is_empty() {
        line.push_str(&format!(" | tag={}", join(event.tags())));
    }
    if let Some(fault) = event.fault() {
        line.push_str(&format!(" | fault='{}'", fault));
    }
    if let Some(message) = event.message() {
        line.push_str(&format!(" | msg='{}'", message.text()));
    }
    line
}

impl Formatter for TextFormatter {
    fn format(&self, record: Record<'_>) -> String {
        match record {
            Record::Message(severity, message) => {
                let mut line = format!(
                    "{} | {} | MESSAGE | sig={}",
                    epoch_micros(Some(message.origin_wall())),
                    severity,
                    message.signature(),
                );
                if let Some(tag) = message.tag() {
                    line.push_str(&format!(" | tag={}", tag));
                }
                line.push_str(&format!(" | {}", message.text()));
                line
            }
            Record::Event(event) => event_line(event),
            Record::Snapshot(snapshot) => {
                let mut line = format!(
                    "{} | {} | SNAPSHOT | {}/{}",
                    epoch_micros(snapshot.timestamp()),
                    snapshot.severity(),
                    snapshot.category(),
                    snapshot.name(),
                );
                for (key, value) in snapshot.properties() {
                    line.push_str(&format!(" | {}={}", key, value));
                }
                line
            }
            Record::Activity(activity) => {
                let mut text = format!(
                    "{} | {} | ACTIVITY | {} | id={} | events={} | elapsed.usec={} | completion={}",
                    epoch_micros(activity.start_wall()),
                    activity.severity(),
                    activity.name(),
                    activity.id(),
                    activity.events().len(),
                    activity
                        .elapsed_micros()
                        .map_or_else(|| "-".to_string(), |micros| micros.to_string()),
                    activity.completion(),
                );
                if !activity.correlators().is_empty() {
                    text.push_str(&format!(" | corrid={}", join(activity.correlators())));
                }
                for event in activity.events() {
                    text.push_str("\n\t");
                    text.push_str(&event_line(event));
                }
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::Clock;
    use crate::domain::activity::Activity;
    use crate::domain::event::OpType;
    use crate::domain::message::Message;
    use crate::domain::severity::Severity;
    use crate::domain::snapshot::Snapshot;
    use crate::infrastructure::mocks::MockClock;

    #[test]
    fn test_message_line_substitutes_args() {
        let formatter = TextFormatter::new();
        let message = Message::new("order {} finished in {} ms")
            .with_args(vec!["A-17".to_string(), "42".to_string()])
            .with_tag("checkout");

        let line = formatter.format(Record::Message(Severity::Info, &message));

        assert!(line.contains("| INFO |"));
        assert!(line.contains("MESSAGE"));
        assert!(line.contains("tag=checkout"));
        assert!(line.contains("order A-17 finished in 42 ms"));
    }

    #[test]
    fn test_event_line_reports_fault_and_completion() {
        let formatter = TextFormatter::new();
        let clock = MockClock::new();

        let mut event = Event::new("charge", OpType::Call);
        event.start_at(clock.now(), clock.wall_now()).unwrap();
        clock.advance(std::time::Duration::from_millis(5));
        event
            .stop_faulted_at(clock.now(), clock.wall_now(), "card declined")
            .unwrap();

        let line = formatter.format(Record::Event(&event));

        assert!(line.contains("EVENT | charge"));
        assert!(line.contains("type=CALL"));
        assert!(line.contains("elapsed.usec=5000"));
        assert!(line.contains("completion=WARNING"));
        assert!(line.contains("fault='card declined'"));
    }

    #[test]
    fn test_unstarted_event_renders_placeholder_times() {
        let formatter = TextFormatter::new();
        let event = Event::new("pending", OpType::Other);

        let line = formatter.format(Record::Event(&event));

        assert!(line.starts_with("- |"));
        assert!(line.contains("elapsed.usec=-"));
    }

    #[test]
    fn test_activity_renders_owned_events_on_continuation_lines() {
        let formatter = TextFormatter::new();
        let clock = MockClock::new();

        let mut activity = Activity::new("job");
        activity.start_at(clock.now(), clock.wall_now()).unwrap();

        for name in ["first", "second"] {
            let mut event = Event::new(name, OpType::Call);
            event.start_at(clock.now(), clock.wall_now()).unwrap();
            event.stop_at(clock.now(), clock.wall_now()).unwrap();
            activity.add_event(event).unwrap();
        }
        activity.stop_at(clock.now(), clock.wall_now()).unwrap();

        let text = formatter.format(Record::Activity(&activity));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("ACTIVITY | job"));
        assert!(lines[0].contains("events=2"));
        assert!(lines[1].contains("EVENT | first"));
        assert!(lines[2].contains("EVENT | second"));
    }

    #[test]
    fn test_snapshot_properties_render_in_key_order() {
        let formatter = TextFormatter::new();
        let mut snapshot = Snapshot::new("gc", "memory", Severity::Info);
        snapshot.set_timestamp(SystemTime::now());
        snapshot.set_property("used", "512");
        snapshot.set_property("free", "128");

        let line = formatter.format(Record::Snapshot(&snapshot));

        assert!(line.contains("SNAPSHOT | memory/gc"));
        let free = line.find("free=128").unwrap();
        let used = line.find("used=512").unwrap();
        assert!(free < used);
    }
}
