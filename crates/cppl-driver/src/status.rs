//! Shared build status.
//!
//! Phases and codegen tasks record failures and warnings here; the first
//! failure message wins and later phases short-circuit on it. Warnings
//! accumulate and are surfaced at the end of the run without affecting the
//! exit code.

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct Status {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    error: Option<String>,
    warnings: Vec<String>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no failure has been recorded yet.
    pub fn is_valid(&self) -> bool {
        self.inner.lock().error.is_none()
    }

    /// Record a failure; only the first one is kept.
    pub fn set_failure(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        if inner.error.is_none() {
            inner.error = Some(message.into());
        }
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.inner.lock().warnings.push(message.into());
    }

    pub fn error_message(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    /// Drain accumulated warnings.
    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_wins() {
        let status = Status::new();
        assert!(status.is_valid());
        status.set_failure("first");
        status.set_failure("second");
        assert!(!status.is_valid());
        assert_eq!(status.error_message().as_deref(), Some("first"));
    }

    #[test]
    fn warnings_do_not_invalidate() {
        let status = Status::new();
        status.warn("child wrote to stderr");
        assert!(status.is_valid());
        assert_eq!(status.take_warnings().len(), 1);
        assert!(status.take_warnings().is_empty());
    }
}
