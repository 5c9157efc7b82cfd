//! Activity sink for the UI loop.
//!
//! The loop is single-threaded, so there is no logger thread here: events are
//! converted to [`LogEntry`] values on the spot, appended to the JSONL file
//! when one is configured, and kept in a bounded in-memory tail that tests
//! and the CLI summary read back.

#![allow(missing_docs)]

use std::collections::VecDeque;

use crate::core::config::PathsConfig;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Number of entries retained in memory.
const RECENT_CAPACITY: usize = 256;

/// Events emitted by the navigation engine and the diagnostics flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    UiStarted {
        root: &'static str,
        mode: &'static str,
    },
    UiExited {
        outcome: String,
    },
    ScreenChanged {
        screen: &'static str,
    },
    ScreenBack {
        screen: &'static str,
    },
    UiErrorRaised {
        error: &'static str,
        screen: &'static str,
        /// Another error was already pending; this one is only logged.
        suppressed: bool,
    },
    ErrorDismissed {
        error: &'static str,
    },
    ShutdownRequested {
        source: &'static str,
    },
    BootAttempted {
        target: String,
        result: String,
    },
    TestStarted {
        test: &'static str,
    },
    TestFinished {
        test: &'static str,
        result: &'static str,
        elapsed_s: u16,
    },
    ReportDumped {
        bytes: usize,
    },
    ConfigLoaded {
        config_hash: String,
    },
    Warning {
        details: String,
    },
}

/// Owned by the loop; writes through to JSONL when configured.
pub struct ActivityLog {
    writer: Option<JsonlWriter>,
    recent: VecDeque<LogEntry>,
}

impl ActivityLog {
    /// In-memory only.
    pub fn memory() -> Self {
        Self {
            writer: None,
            recent: VecDeque::with_capacity(RECENT_CAPACITY),
        }
    }

    /// Log to the JSONL path in `paths` when one is set.
    pub fn from_paths(paths: &PathsConfig) -> Self {
        let writer = paths.jsonl_log.as_ref().map(|path| {
            JsonlWriter::open(JsonlConfig::at(path.clone(), paths.jsonl_fallback.clone()))
        });
        Self {
            writer,
            recent: VecDeque::with_capacity(RECENT_CAPACITY),
        }
    }

    /// Record one event.
    pub fn record(&mut self, event: ActivityEvent) {
        let entry = event_to_log_entry(event);
        if let Some(writer) = self.writer.as_mut() {
            writer.write_entry(&entry);
        }
        if self.recent.len() == RECENT_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(entry);
    }

    /// Entries recorded so far, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &LogEntry> {
        self.recent.iter()
    }

    /// Entries of one event type, oldest first.
    pub fn of_type(&self, event: EventType) -> Vec<&LogEntry> {
        self.recent.iter().filter(|e| e.event == event).collect()
    }

    /// Writer degradation state, if a file is configured.
    pub fn writer_state(&self) -> Option<&str> {
        self.writer.as_ref().map(JsonlWriter::state)
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush();
        }
    }
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::UiStarted { root, mode } => {
            let mut e = LogEntry::new(EventType::UiStart, Severity::Info);
            e.screen = Some(root.to_string());
            e.details = Some(format!("mode={mode}"));
            e
        }
        ActivityEvent::UiExited { outcome } => {
            let mut e = LogEntry::new(EventType::UiExit, Severity::Info);
            e.outcome = Some(outcome);
            e
        }
        ActivityEvent::ScreenChanged { screen } => {
            let mut e = LogEntry::new(EventType::ScreenChange, Severity::Info);
            e.screen = Some(screen.to_string());
            e
        }
        ActivityEvent::ScreenBack { screen } => {
            let mut e = LogEntry::new(EventType::ScreenBack, Severity::Info);
            e.screen = Some(screen.to_string());
            e
        }
        ActivityEvent::UiErrorRaised {
            error,
            screen,
            suppressed,
        } => {
            let mut e = LogEntry::new(EventType::UiError, Severity::Warning);
            e.error = Some(error.to_string());
            e.screen = Some(screen.to_string());
            if suppressed {
                e.details = Some("suppressed: another error is pending".to_string());
            }
            e
        }
        ActivityEvent::ErrorDismissed { error } => {
            let mut e = LogEntry::new(EventType::ErrorDismissed, Severity::Info);
            e.error = Some(error.to_string());
            e
        }
        ActivityEvent::ShutdownRequested { source } => {
            let mut e = LogEntry::new(EventType::ShutdownRequest, Severity::Info);
            e.details = Some(format!("source={source}"));
            e
        }
        ActivityEvent::BootAttempted { target, result } => {
            let severity = if result == "ok" {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut e = LogEntry::new(EventType::BootAttempt, severity);
            e.details = Some(format!("target={target}"));
            e.result = Some(result);
            e
        }
        ActivityEvent::TestStarted { test } => {
            let mut e = LogEntry::new(EventType::TestStart, Severity::Info);
            e.test = Some(test.to_string());
            e
        }
        ActivityEvent::TestFinished {
            test,
            result,
            elapsed_s,
        } => {
            let severity = if result == "passed" {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut e = LogEntry::new(EventType::TestResult, severity);
            e.test = Some(test.to_string());
            e.result = Some(result.to_string());
            e.elapsed_s = Some(elapsed_s);
            e
        }
        ActivityEvent::ReportDumped { bytes } => {
            let mut e = LogEntry::new(EventType::ReportDump, Severity::Info);
            e.details = Some(format!("bytes={bytes}"));
            e
        }
        ActivityEvent::ConfigLoaded { config_hash } => {
            let mut e = LogEntry::new(EventType::ConfigLoaded, Severity::Info);
            e.details = Some(format!("config_hash={config_hash}"));
            e
        }
        ActivityEvent::Warning { details } => {
            let mut e = LogEntry::new(EventType::Warning, Severity::Warning);
            e.details = Some(details);
            e
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_keeps_entries_in_order() {
        let mut log = ActivityLog::memory();
        log.record(ActivityEvent::ScreenChanged {
            screen: "recovery_select",
        });
        log.record(ActivityEvent::ScreenBack {
            screen: "recovery_select",
        });
        let events: Vec<EventType> = log.recent().map(|e| e.event).collect();
        assert_eq!(events, vec![EventType::ScreenChange, EventType::ScreenBack]);
        assert!(log.writer_state().is_none());
    }

    #[test]
    fn recent_tail_is_bounded() {
        let mut log = ActivityLog::memory();
        for _ in 0..(RECENT_CAPACITY + 10) {
            log.record(ActivityEvent::ReportDumped { bytes: 4 });
        }
        assert_eq!(log.recent().count(), RECENT_CAPACITY);
    }

    #[test]
    fn failed_test_is_a_warning() {
        let mut log = ActivityLog::memory();
        log.record(ActivityEvent::TestFinished {
            test: "storage_test_short",
            result: "failed",
            elapsed_s: 3,
        });
        let entry = &log.of_type(EventType::TestResult)[0];
        assert_eq!(entry.severity, Severity::Warning);
        assert_eq!(entry.elapsed_s, Some(3));
    }

    #[test]
    fn file_backed_log_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathsConfig {
            config_file: dir.path().join("config.toml"),
            jsonl_log: Some(dir.path().join("activity.jsonl")),
            jsonl_fallback: None,
        };
        let mut log = ActivityLog::from_paths(&paths);
        log.record(ActivityEvent::UiErrorRaised {
            error: "dev_mode_already_enabled",
            screen: "recovery_to_dev",
            suppressed: false,
        });
        log.flush();
        assert_eq!(log.writer_state(), Some("normal"));

        let contents = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(parsed["event"], "ui_error");
        assert_eq!(parsed["error"], "dev_mode_already_enabled");
    }
}
