//! Operator-facing output
//!
//! Everything the operator is meant to read goes through a
//! [`NotificationHandler`]. Diagnostics go through `log` instead.

use std::error::Error;
use std::io::{self, Write};

use super::error::SessionError;
use crate::transport::Notification;

/// Receives session events as they happen
///
/// Each call must return promptly; the next notification is not pulled
/// from the transport until the previous one has been handled.
pub trait NotificationHandler {
    /// One value delivered by the peripheral
    fn on_notification(&mut self, notification: &Notification);

    /// Liveness tick while idling
    fn on_heartbeat(&mut self);

    /// The session ended with this error, after teardown
    fn on_failure(&mut self, error: &SessionError);
}

/// Error text followed by each cause, `: ` separated
pub fn render_error(error: &SessionError) -> String {
    let mut text = error.to_string();
    let mut cause = error.source();
    while let Some(e) = cause {
        text.push_str(": ");
        text.push_str(&e.to_string());
        cause = e.source();
    }
    text
}

/// Render a payload as space-separated lowercase hex octets
pub fn render_payload(value: &[u8]) -> String {
    if value.is_empty() {
        return "<empty>".to_string();
    }

    value
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes one line per event
pub struct ConsoleHandler<W: Write> {
    out: W,
}

impl ConsoleHandler<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleHandler<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// The underlying writer
    pub fn output(&self) -> &W {
        &self.out
    }

    fn line(&mut self, args: core::fmt::Arguments) {
        // Output errors (closed pipe) must not end the session
        let _ = self.out.write_fmt(args);
        let _ = self.out.write_all(b"\n");
        let _ = self.out.flush();
    }
}

impl<W: Write> NotificationHandler for ConsoleHandler<W> {
    fn on_notification(&mut self, notification: &Notification) {
        self.line(format_args!("received: {}", render_payload(&notification.value)));
    }

    fn on_heartbeat(&mut self) {
        self.line(format_args!("hello"));
    }

    fn on_failure(&mut self, error: &SessionError) {
        self.line(format_args!("error: {}", render_error(error)));
    }
}
