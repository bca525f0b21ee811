//! Atomic assistant status.
//!
//! Shared between the command loop (mic toggles) and the dispatcher
//! (thinking / searching / answering) via `Arc`.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// What the assistant is doing, as shown in the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AssistantStatus {
    Available = 0,
    Listening = 1,
    Thinking = 2,
    Searching = 3,
    Answering = 4,
}

impl AssistantStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Listening,
            2 => Self::Thinking,
            3 => Self::Searching,
            4 => Self::Answering,
            _ => Self::Available,
        }
    }

    /// Status line label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Available => "Available ...",
            Self::Listening => "Listening ...",
            Self::Thinking => "Thinking ...",
            Self::Searching => "Searching ...",
            Self::Answering => "Answering ...",
        }
    }
}

impl std::fmt::Display for AssistantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Thread-safe status plus the listening flag.
///
/// The listening flag is the only thing that decides whether the next loop
/// iteration captures a query; the status is display state.
#[derive(Debug)]
pub struct StatusMachine {
    status: AtomicU8,
    listening: AtomicBool,
}

impl StatusMachine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn current(&self) -> AssistantStatus {
        AssistantStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Store a new status. Returns `true` if it differs from the old one.
    pub fn set(&self, status: AssistantStatus) -> bool {
        self.status.swap(status as u8, Ordering::AcqRel) != status as u8
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Flip the listening flag and move the status to match.
    /// Returns the new flag value.
    pub fn toggle_listening(&self) -> bool {
        let now_listening = !self.listening.fetch_xor(true, Ordering::AcqRel);
        self.set(if now_listening {
            AssistantStatus::Listening
        } else {
            AssistantStatus::Available
        });
        now_listening
    }

    /// Clear the listening flag without touching the status.
    pub fn stop_listening(&self) {
        self.listening.store(false, Ordering::Release);
    }

    /// Force back to Available and not listening (e.g. on error or shutdown).
    pub fn reset(&self) {
        self.listening.store(false, Ordering::Release);
        self.status
            .store(AssistantStatus::Available as u8, Ordering::Release);
    }
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self {
            status: AtomicU8::new(AssistantStatus::Available as u8),
            listening: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_listening_flips_flag_and_status() {
        let sm = StatusMachine::new();
        assert!(!sm.is_listening());
        assert_eq!(sm.current(), AssistantStatus::Available);

        assert!(sm.toggle_listening());
        assert!(sm.is_listening());
        assert_eq!(sm.current(), AssistantStatus::Listening);

        assert!(!sm.toggle_listening());
        assert!(!sm.is_listening());
        assert_eq!(sm.current(), AssistantStatus::Available);
    }

    #[test]
    fn test_set_reports_changes() {
        let sm = StatusMachine::default();
        assert!(!sm.set(AssistantStatus::Available));
        assert!(sm.set(AssistantStatus::Thinking));
        assert!(!sm.set(AssistantStatus::Thinking));
        assert_eq!(sm.current().to_string(), "Thinking ...");
    }

    #[test]
    fn test_stop_listening_keeps_status() {
        let sm = StatusMachine::default();
        sm.toggle_listening();
        sm.set(AssistantStatus::Thinking);
        sm.stop_listening();
        assert!(!sm.is_listening());
        assert_eq!(sm.current(), AssistantStatus::Thinking);

        sm.reset();
        assert_eq!(sm.current(), AssistantStatus::Available);
    }
}
