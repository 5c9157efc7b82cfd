//! JSONL logger: append-only line-delimited JSON record of UI activity.
//!
//! Each line is a self-contained JSON object assembled in memory and written
//! with a single `write_all`, so a tailing reader never sees a partial line.
//!
//! Four-level fallback chain:
//! 1. Primary file path
//! 2. Fallback path (e.g. a RAM-backed location)
//! 3. stderr with `[RUI-JSONL]` prefix
//! 4. Silent discard (the UI loop must never stall on logging)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, RuiError};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Log event types matching the UI activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UiStart,
    UiExit,
    ScreenChange,
    ScreenBack,
    UiError,
    ErrorDismissed,
    ShutdownRequest,
    BootAttempt,
    TestStart,
    TestResult,
    ReportDump,
    ConfigLoaded,
    Warning,
}

/// A single JSONL log entry; all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: EventType,
    /// Severity level.
    pub severity: Severity,
    /// Screen involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    /// Menu item index involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<u8>,
    /// UI error name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Diagnostic test name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    /// Diagnostic or boot result label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Elapsed seconds of a finished test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_s: Option<u16>,
    /// Final loop outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            screen: None,
            item: None,
            error: None,
            test: None,
            result: None,
            elapsed_s: None,
            outcome: None,
            details: None,
        }
    }
}

/// Where lines currently go. Each failure moves one step down the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

impl Tier {
    const fn label(self) -> &'static str {
        match self {
            Self::Primary => "normal",
            Self::Fallback => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Primary log file path.
    pub path: PathBuf,
    /// Optional fallback path.
    pub fallback_path: Option<PathBuf>,
    /// Maximum file size before rotation (bytes). Default: 4 MiB.
    pub max_size_bytes: u64,
    /// Number of rotated files to keep. Default: 3.
    pub max_rotated_files: u32,
    /// Seconds between forced fsync calls. Default: 5.
    pub fsync_interval_secs: u64,
}

impl JsonlConfig {
    /// Writer settings for `path` with the default rotation policy.
    pub fn at(path: impl Into<PathBuf>, fallback_path: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback_path,
            max_size_bytes: 4 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 5,
        }
    }

    fn file_for(&self, tier: Tier) -> Option<&Path> {
        match tier {
            Tier::Primary => Some(&self.path),
            Tier::Fallback => self.fallback_path.as_deref(),
            Tier::Stderr | Tier::Discard => None,
        }
    }
}

/// An open log file and how much of it is used.
struct OpenLog {
    out: BufWriter<File>,
    size: u64,
}

impl OpenLog {
    fn open(path: &Path) -> Result<Self> {
        let (file, size) = open_append(path)?;
        Ok(Self {
            out: BufWriter::with_capacity(16 * 1024, file),
            size,
        })
    }
}

/// Append-only JSONL log writer with rotation and multi-level fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    tier: Tier,
    file: Option<OpenLog>,
    last_fsync: SystemTime,
}

impl JsonlWriter {
    /// Open the primary file, stepping down the fallback chain as needed.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            tier: Tier::Primary,
            file: None,
            last_fsync: SystemTime::now(),
        };
        w.settle(Tier::Primary);
        w
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(mut line) => {
                line.push('\n');
                self.write_line(&line);
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[RUI-JSONL] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(log) = self.file.as_mut() {
            let _ = log.out.flush();
        }
    }

    /// Flush and sync the current file to disk.
    pub fn fsync(&mut self) {
        if let Some(log) = self.file.as_mut() {
            let _ = log.out.flush();
            let _ = log.out.get_ref().sync_data();
        }
        self.last_fsync = SystemTime::now();
    }

    /// Current degradation state: `normal`, `fallback`, `stderr` or `discard`.
    pub fn state(&self) -> &str {
        self.tier.label()
    }

    /// Bytes in the current file.
    pub fn bytes_written(&self) -> u64 {
        self.file.as_ref().map_or(0, |log| log.size)
    }

    // ──────────────────────── internals ────────────────────────

    /// Land on the first usable tier at or below `from`.
    fn settle(&mut self, from: Tier) {
        self.file = None;
        let mut tier = from;
        while tier < Tier::Stderr {
            let opened = self.config.file_for(tier).map(OpenLog::open);
            match opened {
                Some(Ok(log)) => {
                    if let (Tier::Fallback, Some(path)) = (tier, self.config.file_for(tier)) {
                        let _ = writeln!(
                            io::stderr(),
                            "[RUI-JSONL] primary path failed, using fallback: {}",
                            path.display()
                        );
                    }
                    self.file = Some(log);
                    self.tier = tier;
                    return;
                }
                Some(Err(_)) | None => tier = next_tier(tier),
            }
        }
        if tier == Tier::Stderr && self.tier != Tier::Stderr {
            let _ = writeln!(io::stderr(), "[RUI-JSONL] log files unavailable, using stderr");
        }
        self.tier = tier;
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        let full = self
            .file
            .as_ref()
            .is_some_and(|log| log.size + len > self.config.max_size_bytes);
        if full {
            self.rotate();
        }

        loop {
            match self.tier {
                Tier::Primary | Tier::Fallback => {
                    let written = self
                        .file
                        .as_mut()
                        .is_some_and(|log| log.out.write_all(line.as_bytes()).is_ok());
                    if written {
                        if let Some(log) = self.file.as_mut() {
                            log.size += len;
                        }
                        self.maybe_fsync();
                        return;
                    }
                    self.settle(next_tier(self.tier));
                }
                Tier::Stderr => {
                    if write!(io::stderr(), "[RUI-JSONL] {line}").is_err() {
                        self.tier = Tier::Discard;
                    }
                    return;
                }
                Tier::Discard => return,
            }
        }
    }

    fn maybe_fsync(&mut self) {
        let elapsed = SystemTime::now()
            .duration_since(self.last_fsync)
            .unwrap_or(Duration::ZERO);
        if elapsed.as_secs() >= self.config.fsync_interval_secs {
            self.fsync();
        }
    }

    /// `log` becomes `log.1`, `log.1` becomes `log.2`, and the oldest beyond
    /// `max_rotated_files` is removed.
    fn rotate(&mut self) {
        self.flush();
        self.file = None;
        let Some(base) = self.config.file_for(self.tier).map(Path::to_path_buf) else {
            return;
        };

        let keep = self.config.max_rotated_files;
        let _ = fs::remove_file(rotated_name(&base, keep));
        for i in (1..keep).rev() {
            let _ = rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = rename(&base, rotated_name(&base, 1));

        match OpenLog::open(&base) {
            Ok(log) => self.file = Some(log),
            Err(_) => self.settle(next_tier(self.tier)),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

const fn next_tier(tier: Tier) -> Tier {
    match tier {
        Tier::Primary => Tier::Fallback,
        Tier::Fallback => Tier::Stderr,
        Tier::Stderr | Tier::Discard => Tier::Discard,
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create `path` for appending, creating parent directories.
/// Returns the file and its current length.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RuiError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RuiError::io(path, source))?;
    let size = file.metadata().map_or(0, |m| m.len());
    Ok((file, size))
}

/// `activity.jsonl` → `activity.jsonl.3`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config_at(path: PathBuf, max_size_bytes: u64) -> JsonlConfig {
        JsonlConfig {
            path,
            fallback_path: None,
            max_size_bytes,
            max_rotated_files: 3,
            fsync_interval_secs: 60,
        }
    }

    #[test]
    fn write_entry_produces_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        let mut writer = JsonlWriter::open(config_at(path.clone(), 1024 * 1024));

        let mut entry = LogEntry::new(EventType::ScreenChange, Severity::Info);
        entry.screen = Some("recovery_select".to_string());
        writer.write_entry(&entry);
        writer.flush();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event"], "screen_change");
        assert_eq!(parsed["severity"], "info");
        assert_eq!(parsed["screen"], "recovery_select");
    }

    #[test]
    fn rotation_shifts_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let mut writer = JsonlWriter::open(config_at(path.clone(), 100));

        for _ in 0..10 {
            writer.write_entry(&LogEntry::new(EventType::TestResult, Severity::Info));
        }
        writer.flush();

        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
        assert!(!rotated_name(&path, 4).exists());
    }

    #[test]
    fn fallback_when_primary_dir_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        // A regular file where the primary's parent directory should be.
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        let config = JsonlConfig::at(blocker.join("primary.jsonl"), Some(fallback.clone()));
        let mut writer = JsonlWriter::open(config);

        assert_eq!(writer.state(), "fallback");
        writer.write_entry(&LogEntry::new(EventType::UiError, Severity::Warning));
        writer.flush();

        let contents = fs::read_to_string(&fallback).unwrap();
        assert!(contents.contains("ui_error"));
    }

    #[test]
    fn stderr_when_no_file_is_usable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        let writer = JsonlWriter::open(JsonlConfig::at(blocker.join("primary.jsonl"), None));
        assert_eq!(writer.state(), "stderr");
        assert_eq!(writer.bytes_written(), 0);
    }

    #[test]
    fn entry_optional_fields_omitted_when_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut writer = JsonlWriter::open(config_at(path.clone(), 1024 * 1024));

        writer.write_entry(&LogEntry::new(EventType::UiStart, Severity::Info));
        writer.flush();

        let line = fs::read_to_string(&path).unwrap();
        assert!(!line.contains("\"screen\""));
        assert!(!line.contains("\"elapsed_s\""));
        assert!(writer.bytes_written() > 0);
    }
}
