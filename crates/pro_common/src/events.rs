//! Operator notifications
//!
//! Fire-and-forget: the engine never inspects what a sink does with a
//! message.

use std::sync::Mutex;

pub trait EventSink: Send + Sync {
    fn info(&self, message: &str);
}

/// Prints notifications to stdout, or drops them when quiet
#[derive(Debug, Clone, Default)]
pub struct ConsoleEvents {
    quiet: bool,
}

impl ConsoleEvents {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl EventSink for ConsoleEvents {
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingEvents {
    messages: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl EventSink for RecordingEvents {
    fn info(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}
