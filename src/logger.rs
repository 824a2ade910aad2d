//! Logger sink handed to the reconciliation passes.
//!
//! The library never configures output itself: it reports through this trait
//! and the caller decides where the lines go. [`TracingLogger`] forwards to
//! `tracing`; [`MemoryLogger`] keeps everything in memory.

use std::cell::{Cell, RefCell};

pub trait Logger {
    /// A line the user should see.
    fn message(&self, message: &str);
    /// Verbose detail.
    fn information(&self, message: &str);
    /// One unit of work done.
    fn progress(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn message(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn information(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn progress(&self) {
        tracing::trace!("progress");
    }
}

/// Collects messages instead of printing them.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    messages: RefCell<Vec<String>>,
    information: RefCell<Vec<String>>,
    ticks: Cell<usize>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn information_lines(&self) -> Vec<String> {
        self.information.borrow().clone()
    }

    pub fn ticks(&self) -> usize {
        self.ticks.get()
    }

    /// True when any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.borrow().iter().any(|m| m.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn message(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }

    fn information(&self, message: &str) {
        self.information.borrow_mut().push(message.to_string());
    }

    fn progress(&self) {
        self.ticks.set(self.ticks.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_logger_keeps_severities_apart() {
        let log = MemoryLogger::new();
        log.message("kept Foo 2.0");
        log.information("scanning");
        log.progress();
        log.progress();

        assert_eq!(log.messages(), vec!["kept Foo 2.0".to_string()]);
        assert_eq!(log.information_lines(), vec!["scanning".to_string()]);
        assert_eq!(log.ticks(), 2);
        assert!(log.contains("Foo"));
        assert!(!log.contains("scanning"));
    }
}
