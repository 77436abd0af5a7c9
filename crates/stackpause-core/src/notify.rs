//! Notifier sink: where operator-facing progress messages go.
//!
//! Delivery is somebody else's problem: the orchestrator only knows a
//! level and a string. `TracingNotifier` routes both levels into the
//! tracing subscriber; `BufferNotifier` keeps them in memory.

use std::sync::Mutex;

use tracing::{error, info};

pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn fatal(&self, message: &str);
}

/// Forwards notifications to `tracing` at info/error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn info(&self, message: &str) {
        info!(target: "stackpause::notify", "{message}");
    }

    fn fatal(&self, message: &str) {
        error!(target: "stackpause::notify", "{message}");
    }
}

/// Level of a buffered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Fatal,
}

/// In-memory notifier (for testing and for callers that render the
/// transcript themselves).
#[derive(Debug, Default)]
pub struct BufferNotifier {
    messages: Mutex<Vec<(Level, String)>>,
}

impl BufferNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages recorded so far, oldest first.
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.lock().clone()
    }

    /// Info-level messages only.
    pub fn infos(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(level, _)| *level == Level::Info)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|(_, m)| m.contains(needle))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Level, String)>> {
        // A poisoned buffer still holds valid messages.
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Notifier for BufferNotifier {
    fn info(&self, message: &str) {
        self.lock().push((Level::Info, message.to_string()));
    }

    fn fatal(&self, message: &str) {
        self.lock().push((Level::Fatal, message.to_string()));
    }
}
