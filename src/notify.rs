//! User-visible notifications.
//!
//! Code that needs to tell the operator something takes a `&dyn Notifier`
//! instead of reaching for a global message queue.

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

pub trait Notifier {
    fn notify(&self, level: Level, message: &str);

    fn error(&self, message: &str) {
        self.notify(Level::Error, message);
    }

    fn success(&self, message: &str) {
        self.notify(Level::Success, message);
    }
}

/// Prints to the terminal and mirrors into the log.
pub struct ConsoleNotifier {
    pub quiet: bool,
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: Level, message: &str) {
        match level {
            Level::Info => {
                info!("{}", message);
                if !self.quiet {
                    println!("ℹ️  {}", message);
                }
            }
            Level::Success => {
                info!("{}", message);
                if !self.quiet {
                    println!("✅ {}", message);
                }
            }
            Level::Warning => {
                warn!("{}", message);
                eprintln!("⚠️  {}", message);
            }
            Level::Error => {
                error!("{}", message);
                eprintln!("❌ {}", message);
            }
        }
    }
}

/// Collects messages so tests can inspect what the operator was told.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryNotifier {
    messages: std::sync::Mutex<Vec<(Level, String)>>,
}

#[cfg(test)]
impl MemoryNotifier {
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl Notifier for MemoryNotifier {
    fn notify(&self, level: Level, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_notifier_records_in_order() {
        let sink = MemoryNotifier::default();
        sink.success("saved");
        sink.error("failed");

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], (Level::Success, "saved".to_string()));
        assert_eq!(messages[1].0, Level::Error);
    }
}
