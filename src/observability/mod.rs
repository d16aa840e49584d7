//! Observability for the binding engine
//!
//! - Structured events emitted through `tracing`
//! - Lock-free counters per registry
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No background threads
//!
//! ```ignore
//! use bindery::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::QueryExecuted, &[("type", "Dog"), ("rows", "3")]);
//! ```

mod events;
mod metrics;

pub use events::{Event, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

use std::fmt;

/// Key/value pairs rendered as `k=v` in deterministic (sorted) order
struct Fields<'a>(&'a [(&'a str, &'a str)]);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted: Vec<_> = self.0.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (i, (key, value)) in sorted.into_iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Log an event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log an event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let name = event.as_str();
    let fields = Fields(fields);
    match event.severity() {
        Severity::Trace => tracing::trace!(event = name, "{}", fields),
        Severity::Debug => tracing::debug!(event = name, "{}", fields),
        Severity::Info => tracing::info!(event = name, "{}", fields),
        Severity::Warn => tracing::warn!(event = name, "{}", fields),
        Severity::Error => tracing::error!(event = name, "{}", fields),
    }
}
