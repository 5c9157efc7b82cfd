//! Interactive terminal for the simulator: raw-mode key reader thread,
//! Ctrl-C/SIGTERM handling and live frame output.
//!
//! Keys are read on a background thread and handed to the UI loop through a
//! bounded crossbeam channel, so the loop never blocks on the terminal.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use colored::Colorize;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::errors::{Result, RuiError};
use crate::platform::pal::{Key, KeyPress};
use crate::platform::sim::{HostConsole, RecordedFrame};

const KEY_QUEUE_DEPTH: usize = 64;
const READER_POLL: Duration = Duration::from_millis(50);

/// Function keys stand in for the hardware buttons.
pub const BUTTON_HELP: &str =
    "F1 vol-up  F2 vol-down  F3 power  F5 vol-up-long  F6 vol-down-long  F7 vol-combo  Ctrl-C quit";

/// Translate a terminal key event into a firmware key.
pub fn map_key(event: &KeyEvent) -> Option<Key> {
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char(c) if c.is_ascii_alphabetic() => Some(Key::Ctrl(c.to_ascii_lowercase())),
            _ => None,
        };
    }
    let key = match event.code {
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Tab => Key::Tab,
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::F(1) => Key::VolUpShort,
        KeyCode::F(2) => Key::VolDownShort,
        KeyCode::F(3) => Key::PowerShort,
        KeyCode::F(5) => Key::VolUpLong,
        KeyCode::F(6) => Key::VolDownLong,
        KeyCode::F(7) => Key::VolUpDownCombo,
        _ => return None,
    };
    Some(key)
}

/// Raw-mode terminal session. Dropping it stops the reader thread and
/// restores the terminal.
pub struct TerminalConsole {
    keys: Receiver<KeyPress>,
    interrupt: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl TerminalConsole {
    pub fn open() -> Result<Self> {
        let interrupt = Arc::new(AtomicBool::new(false));
        for signal in [SIGINT, SIGTERM] {
            if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&interrupt)) {
                eprintln!("[RUI-SIGNAL] failed to register signal {signal}: {e}");
            }
        }

        terminal::enable_raw_mode().map_err(|e| RuiError::Runtime {
            details: format!("enable raw mode: {e}"),
        })?;

        let (tx, rx) = bounded(KEY_QUEUE_DEPTH);
        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let stop = Arc::clone(&stop);
            let interrupt = Arc::clone(&interrupt);
            thread::Builder::new()
                .name("rui-keys".to_string())
                .spawn(move || read_keys(&tx, &stop, &interrupt))
                .map_err(|e| {
                    let _ = terminal::disable_raw_mode();
                    RuiError::Runtime {
                        details: format!("spawn key reader: {e}"),
                    }
                })?
        };

        let mut stdout = io::stdout();
        let _ = write!(stdout, "{}\r\n", BUTTON_HELP.dimmed());
        let _ = stdout.flush();

        Ok(Self {
            keys: rx,
            interrupt,
            stop,
            reader: Some(reader),
        })
    }
}

fn read_keys(tx: &Sender<KeyPress>, stop: &AtomicBool, interrupt: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        match event::poll(READER_POLL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                eprintln!("[RUI-CONSOLE] terminal poll failed: {e}\r");
                interrupt.store(true, Ordering::Relaxed);
                return;
            }
        }
        let Ok(Event::Key(key)) = event::read() else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        // Raw mode swallows SIGINT; Ctrl-C arrives as a key.
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            interrupt.store(true, Ordering::Relaxed);
            return;
        }
        let Some(mapped) = map_key(&key) else {
            continue;
        };
        match tx.try_send(KeyPress::trusted(mapped)) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

impl HostConsole for TerminalConsole {
    fn poll_key(&mut self) -> Option<KeyPress> {
        self.keys.try_recv().ok()
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    fn show(&mut self, frame: &RecordedFrame) {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{}\r\n", render_frame(frame).replace('\n', "\r\n"));
        let _ = stdout.flush();
    }
}

impl Drop for TerminalConsole {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        let _ = terminal::disable_raw_mode();
    }
}

/// Text rendering of one frame: a summary line, then the visible content.
pub fn render_frame(frame: &RecordedFrame) -> String {
    let mut out = frame.summary().bold().to_string();
    for name in frame.bitmaps() {
        if name.starts_with("btn_bg") || name == "footer.bmp" {
            continue;
        }
        out.push_str("\n  ");
        out.push_str(name);
    }
    for text in frame.texts() {
        for line in text.lines() {
            out.push_str("\n  | ");
            out.push_str(line);
        }
    }
    out
}
