//! Error sink shared by every asset operation of a generation session.
//!
//! Operations never abort the pass: each failure is appended as one
//! source-qualified message and the caller checks [`StatusCollector::has_errors`]
//! at a checkpoint. Dropping a collector that still holds messages is a
//! programmer error (asserted in debug builds) so nothing escapes unreported.

use crate::error::AssetError;

/// Append-only, ordered list of error messages.
#[derive(Debug, Default)]
pub struct StatusCollector {
    messages: Vec<String>,
}

impl StatusCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "asset error recorded");
        self.messages.push(message);
    }

    /// Append one message describing `error`, qualified with `context`.
    pub fn report(&mut self, context: &str, error: &AssetError) {
        self.record(format!("{context}: {}: {error}", error.kind()));
    }

    /// Messages in the order they were recorded.
    #[must_use]
    pub fn list(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.messages.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Discard all messages.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Drain all messages, leaving the collector empty.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}

impl Drop for StatusCollector {
    fn drop(&mut self) {
        debug_assert!(
            self.messages.is_empty() || std::thread::panicking(),
            "status collector dropped with {} unreported error(s): {:?}",
            self.messages.len(),
            self.messages
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_record_preserves_order() {
        let mut status = StatusCollector::new();
        status.record("first");
        status.record("second");

        assert!(status.has_errors());
        assert_eq!(status.list(), ["first", "second"]);
        status.clear();
    }

    #[test]
    fn test_clear_empties() {
        let mut status = StatusCollector::new();
        status.record("oops");
        status.clear();

        assert!(!status.has_errors());
        assert!(status.is_empty());
    }

    #[test]
    fn test_take_drains() {
        let mut status = StatusCollector::new();
        status.record("a");
        status.record("b");

        let taken = status.take();

        assert_eq!(taken, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(status.len(), 0);
    }

    #[test]
    fn test_report_qualifies_message() {
        let mut status = StatusCollector::new();
        status.report(
            "img/photos/scan.bmp",
            &AssetError::UnsupportedFormat(PathBuf::from("/site/img/photos/scan.bmp")),
        );

        assert_eq!(
            status.take(),
            vec![
                "img/photos/scan.bmp: format error: unsupported image format: /site/img/photos/scan.bmp"
                    .to_owned()
            ]
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unreported error")]
    fn test_drop_with_errors_panics_in_debug() {
        let mut status = StatusCollector::new();
        status.record("never inspected");
    }
}
