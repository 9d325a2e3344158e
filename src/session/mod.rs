//! Probe session
//!
//! One [`SessionRunner`] owns the connection for the whole session and
//! hands every notification to a [`NotificationHandler`].

pub mod error;
pub mod handler;
pub mod runner;

pub use error::{SelectionError, SessionError};
pub use handler::{render_error, render_payload, ConsoleHandler, NotificationHandler};
pub use runner::{SessionRunner, SessionSummary};
