//! Terminal line editor.
//!
//! On a TTY the editor reads keys in raw mode so Ctrl-C and Ctrl-D arrive as
//! key events and the caller can tell "interrupt with half a line typed"
//! apart from "interrupt on an empty prompt". Otherwise (pipes, tests) it
//! falls back to plain line reads.
//!
//! Reading happens on a dedicated thread. The async side asks for one line
//! at a time with [`EditorHandle::request`] and receives [`LineEvent`]s.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::mpsc as std_mpsc;
use std::thread;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, ClearType, disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, queue, style::Print};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What came back from one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A submitted line, without its terminator.
    Line(String),
    /// Ctrl-C; `pending` is true when text had been typed.
    Interrupted { pending: bool },
    /// Ctrl-D on an empty line, or end of input.
    Eof,
}

/// The in-progress line and the key bindings that edit it.
#[derive(Debug, Default)]
pub struct LineBuffer {
    text: String,
}

/// The screen effect of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Insert(char),
    Erase,
    /// Ctrl-U: the whole line was discarded.
    Clear,
    Done(LineEvent),
    Ignore,
}

impl LineBuffer {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn handle(&mut self, key: &KeyEvent) -> Edit {
        if key.kind == KeyEventKind::Release {
            return Edit::Ignore;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') if ctrl => {
                let pending = !self.text.is_empty();
                self.text.clear();
                Edit::Done(LineEvent::Interrupted { pending })
            }
            KeyCode::Char('d') if ctrl => {
                if self.text.is_empty() {
                    Edit::Done(LineEvent::Eof)
                } else {
                    Edit::Ignore
                }
            }
            KeyCode::Char('u') if ctrl => {
                self.text.clear();
                Edit::Clear
            }
            KeyCode::Char(_) if ctrl => Edit::Ignore,
            KeyCode::Char(c) => {
                self.text.push(c);
                Edit::Insert(c)
            }
            KeyCode::Tab => {
                self.text.push(' ');
                Edit::Insert(' ')
            }
            KeyCode::Backspace => match self.text.pop() {
                Some(_) => Edit::Erase,
                None => Edit::Ignore,
            },
            KeyCode::Enter => Edit::Done(LineEvent::Line(std::mem::take(&mut self.text))),
            _ => Edit::Ignore,
        }
    }
}

/// Restores cooked mode when dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal mode: {e}");
        }
    }
}

pub struct LineEditor {
    prompt: String,
    raw: bool,
}

impl LineEditor {
    /// Raw-mode editing is used only when stdin is a terminal.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            raw: io::stdin().is_terminal(),
        }
    }

    /// Start the reader thread.
    pub fn spawn(self) -> EditorHandle {
        let (request_tx, request_rx) = std_mpsc::channel::<()>();
        let (event_tx, event_rx) = mpsc::channel(4);

        thread::spawn(move || {
            while request_rx.recv().is_ok() {
                let result = if self.raw {
                    read_raw(&self.prompt)
                } else {
                    read_plain(&self.prompt)
                };
                let event = result.unwrap_or_else(|e| {
                    warn!("Input error: {e}");
                    LineEvent::Eof
                });
                let done = event == LineEvent::Eof;
                if event_tx.blocking_send(event).is_err() || done {
                    break;
                }
            }
            debug!("Line editor stopped");
        });

        EditorHandle {
            requests: request_tx,
            events: event_rx,
            outstanding: false,
        }
    }
}

/// The async side of a [`LineEditor`].
pub struct EditorHandle {
    requests: std_mpsc::Sender<()>,
    events: mpsc::Receiver<LineEvent>,
    outstanding: bool,
}

impl EditorHandle {
    /// Show the prompt and start reading, unless a read is already pending.
    pub fn request(&mut self) {
        if self.outstanding {
            return;
        }
        self.outstanding = self.requests.send(()).is_ok();
    }

    /// Wait for the next event. `None` once the reader thread is gone.
    pub async fn next_event(&mut self) -> Option<LineEvent> {
        let event = self.events.recv().await;
        self.outstanding = false;
        event
    }
}

/// Leave raw mode if a read was cut short by process exit.
pub fn restore_terminal() {
    if io::stdin().is_terminal() {
        let _ = disable_raw_mode();
    }
}

fn read_plain(prompt: &str) -> io::Result<LineEvent> {
    let mut out = io::stdout();
    write!(out, "{prompt}")?;
    out.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(LineEvent::Eof);
    }
    Ok(LineEvent::Line(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn read_raw(prompt: &str) -> io::Result<LineEvent> {
    let _raw = RawModeGuard::enable()?;
    let mut out = io::stdout();
    queue!(out, Print(prompt))?;
    out.flush()?;

    let mut buffer = LineBuffer::default();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match buffer.handle(&key) {
            Edit::Insert(c) => queue!(out, Print(c))?,
            Edit::Erase => queue!(
                out,
                cursor::MoveLeft(1),
                terminal::Clear(ClearType::UntilNewLine)
            )?,
            Edit::Clear => queue!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print(prompt)
            )?,
            Edit::Done(event) => {
                if matches!(event, LineEvent::Interrupted { .. }) {
                    queue!(out, Print("^C"))?;
                }
                queue!(out, Print("\r\n"))?;
                out.flush()?;
                return Ok(event);
            }
            Edit::Ignore => continue,
        }
        out.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_str(buffer: &mut LineBuffer, text: &str) {
        for c in text.chars() {
            buffer.handle(&key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn enter_submits_and_resets() {
        let mut buffer = LineBuffer::default();
        type_str(&mut buffer, "pods ns-a");
        assert_eq!(
            buffer.handle(&key(KeyCode::Enter)),
            Edit::Done(LineEvent::Line("pods ns-a".into()))
        );
        assert_eq!(buffer.text(), "");
    }

    #[test]
    fn ctrl_c_reports_pending_text() {
        let mut buffer = LineBuffer::default();
        type_str(&mut buffer, "desc");
        assert_eq!(
            buffer.handle(&ctrl('c')),
            Edit::Done(LineEvent::Interrupted { pending: true })
        );
        assert_eq!(buffer.text(), "");
        assert_eq!(
            buffer.handle(&ctrl('c')),
            Edit::Done(LineEvent::Interrupted { pending: false })
        );
    }

    #[test]
    fn ctrl_d_only_ends_an_empty_line() {
        let mut buffer = LineBuffer::default();
        type_str(&mut buffer, "x");
        assert_eq!(buffer.handle(&ctrl('d')), Edit::Ignore);
        buffer.handle(&key(KeyCode::Backspace));
        assert_eq!(buffer.handle(&ctrl('d')), Edit::Done(LineEvent::Eof));
    }

    #[test]
    fn editing_keys() {
        let mut buffer = LineBuffer::default();
        type_str(&mut buffer, "podz");
        assert_eq!(buffer.handle(&key(KeyCode::Backspace)), Edit::Erase);
        type_str(&mut buffer, "s");
        assert_eq!(buffer.text(), "pods");
        assert_eq!(buffer.handle(&ctrl('u')), Edit::Clear);
        assert_eq!(buffer.text(), "");
        assert_eq!(buffer.handle(&key(KeyCode::Backspace)), Edit::Ignore);
        assert_eq!(buffer.handle(&key(KeyCode::Up)), Edit::Ignore);
    }

    #[test]
    fn shifted_characters_are_text() {
        let mut buffer = LineBuffer::default();
        buffer.handle(&KeyEvent::new(KeyCode::Char('N'), KeyModifiers::SHIFT));
        assert_eq!(buffer.text(), "N");
    }

    #[test]
    fn key_release_is_ignored() {
        let mut buffer = LineBuffer::default();
        let mut release = key(KeyCode::Char('a'));
        release.kind = KeyEventKind::Release;
        assert_eq!(buffer.handle(&release), Edit::Ignore);
        assert_eq!(buffer.text(), "");
    }
}
