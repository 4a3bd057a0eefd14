//! Double-interrupt gate.
//!
//! Ctrl-C with a half-typed line clears that line. Ctrl-C on an empty line
//! (or while a turn is running) shows a hint and arms the gate; a second
//! Ctrl-C inside the window exits.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Discard the pending input line only.
    ClearLine,
    /// Tell the user how to exit; the gate is now armed.
    Hint,
    /// Second interrupt inside the window: shut down.
    Exit,
}

#[derive(Debug, Clone)]
pub struct InterruptGate {
    window: Duration,
    armed_at: Option<Instant>,
}

impl InterruptGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            armed_at: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Feed one interrupt observed at `now`.
    pub fn on_interrupt(&mut self, pending_input: bool, now: Instant) -> InterruptAction {
        if self.is_armed(now) {
            self.armed_at = None;
            return InterruptAction::Exit;
        }
        if pending_input {
            return InterruptAction::ClearLine;
        }
        self.armed_at = Some(now);
        InterruptAction::Hint
    }

    /// Whether an interrupt at `now` would exit.
    pub fn is_armed(&self, now: Instant) -> bool {
        self.armed_at
            .is_some_and(|at| now.saturating_duration_since(at) <= self.window)
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
    }
}

impl Default for InterruptGate {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}
