//! Terminal input for the interactive OpsClaw session.
//!
//! - [`LineEditor`]: raw-mode prompt that reports Ctrl-C/Ctrl-D as events
//! - [`InterruptGate`]: turns those interrupts into clear/hint/exit

pub mod editor;
pub mod interrupt;

pub use editor::{EditorHandle, LineEditor, LineEvent, restore_terminal};
pub use interrupt::{InterruptAction, InterruptGate};
