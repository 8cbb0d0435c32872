//! System notifications.

use notify_rust::Notification;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::{APP_NAME, APP_NAME_PRETTY};

/// Send a system notification with a summary and body.
pub fn show(summary: &str, body: &str) -> Result<(), notify_rust::error::Error> {
    Notification::new()
        .appname(APP_NAME)
        .summary(&format!("{} - {}", APP_NAME_PRETTY, summary))
        .body(body)
        .show()
        .map(|_| ())
}

/// Visitor to extract the message field from tracing events.
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }
}

/// Tracing layer that sends notifications for warnings and errors.
///
/// Cycles repeat the same warning every tick while a device stays unplugged
/// or the probe keeps failing, so a message is only shown again once a
/// different one went out in between.
#[derive(Debug, Default)]
pub struct NotificationLayer {
    last: Mutex<Option<String>>,
}

impl NotificationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `message` differs from the last one shown, remembering it.
    fn is_news(&self, message: &str) -> bool {
        let mut last = self.last.lock();
        if last.as_deref() == Some(message) {
            return false;
        }
        *last = Some(message.to_string());
        true
    }
}

fn should_notify(level: Level) -> Option<&'static str> {
    match level {
        Level::ERROR => Some("error"),
        Level::WARN => Some("warning"),
        _ => None,
    }
}

impl<S: Subscriber> Layer<S> for NotificationLayer {
    fn on_event(&self, event: &Event<'_>, _: Context<'_, S>) {
        let Some(summary) = should_notify(*event.metadata().level()) else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(message) = visitor.message {
            if self.is_news(&message) {
                // Logging the failure here would feed back into this layer.
                show(summary, &message).ok();
            }
        }
    }
}
