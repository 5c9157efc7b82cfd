//! Configuration system: TOML file + env var overrides + firmware defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, RuiError};

/// Full recovery UI configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub ui: UiConfig,
    pub developer: DeveloperConfig,
    pub diagnostics: DiagnosticsConfig,
    pub log_view: LogViewConfig,
    pub paths: PathsConfig,
}

/// Event loop cadence and input hardware traits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UiConfig {
    /// Minimum period of one loop iteration.
    pub key_delay_ms: u64,
    pub error_beep_ms: u32,
    pub error_beep_hz: u32,
    /// Physical presence is confirmed from the keyboard rather than a
    /// dedicated button.
    pub physical_presence_keyboard: bool,
    /// Button-only hardware: volume keys navigate, power selects.
    pub detachable: bool,
}

/// Developer-mode countdown timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeveloperConfig {
    pub delay_normal_ms: u64,
    pub delay_short_ms: u64,
    pub first_beep_ms: u64,
    pub second_beep_ms: u64,
    pub beep_ms: u32,
    pub beep_hz: u32,
}

/// Diagnostics polling and report sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub short_poll_interval_ms: u64,
    pub extended_poll_interval_ms: u64,
    pub default_poll_interval_ms: u64,
    pub event_capacity: usize,
    pub elog_payload_bytes: usize,
    pub memory_output_bytes: usize,
    pub memory_chunk_bytes: u64,
}

/// Log viewer geometry and anchors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogViewConfig {
    pub lines_per_page: usize,
    pub chars_per_line: usize,
    pub firmware_log_anchors: Vec<String>,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: Option<PathBuf>,
    pub jsonl_fallback: Option<PathBuf>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            key_delay_ms: 20,
            error_beep_ms: 250,
            error_beep_hz: 400,
            physical_presence_keyboard: true,
            detachable: false,
        }
    }
}

impl Default for DeveloperConfig {
    fn default() -> Self {
        Self {
            delay_normal_ms: 30_000,
            delay_short_ms: 2_000,
            first_beep_ms: 20_000,
            second_beep_ms: 20_500,
            beep_ms: 250,
            beep_hz: 400,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            short_poll_interval_ms: 200,
            extended_poll_interval_ms: 3_000,
            default_poll_interval_ms: 1_000,
            event_capacity: 50,
            elog_payload_bytes: 117,
            memory_output_bytes: 64 * 1024,
            memory_chunk_bytes: 32 * 1024 * 1024,
        }
    }
}

impl Default for LogViewConfig {
    fn default() -> Self {
        Self {
            lines_per_page: 18,
            chars_per_line: 72,
            firmware_log_anchors: vec![
                "coreboot-".to_string(),
                "Starting depthcharge".to_string(),
            ],
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let config_root = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|| {
                eprintln!("[RUI-CONFIG] WARNING: HOME not set, falling back to /tmp");
                PathBuf::from("/tmp")
            });
        Self {
            config_file: config_root.join("rui").join("config.toml"),
            jsonl_log: None,
            jsonl_fallback: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| RuiError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(RuiError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // ui
        set_u64(&mut lookup, "RUI_UI_KEY_DELAY_MS", &mut self.ui.key_delay_ms)?;
        set_u32(&mut lookup, "RUI_UI_ERROR_BEEP_MS", &mut self.ui.error_beep_ms)?;
        set_u32(&mut lookup, "RUI_UI_ERROR_BEEP_HZ", &mut self.ui.error_beep_hz)?;
        set_bool(
            &mut lookup,
            "RUI_UI_PHYSICAL_PRESENCE_KEYBOARD",
            &mut self.ui.physical_presence_keyboard,
        )?;
        set_bool(&mut lookup, "RUI_UI_DETACHABLE", &mut self.ui.detachable)?;

        // developer
        set_u64(
            &mut lookup,
            "RUI_DEVELOPER_DELAY_NORMAL_MS",
            &mut self.developer.delay_normal_ms,
        )?;
        set_u64(
            &mut lookup,
            "RUI_DEVELOPER_DELAY_SHORT_MS",
            &mut self.developer.delay_short_ms,
        )?;

        // diagnostics
        set_u64(
            &mut lookup,
            "RUI_DIAG_SHORT_POLL_INTERVAL_MS",
            &mut self.diagnostics.short_poll_interval_ms,
        )?;
        set_u64(
            &mut lookup,
            "RUI_DIAG_EXTENDED_POLL_INTERVAL_MS",
            &mut self.diagnostics.extended_poll_interval_ms,
        )?;
        set_u64(
            &mut lookup,
            "RUI_DIAG_DEFAULT_POLL_INTERVAL_MS",
            &mut self.diagnostics.default_poll_interval_ms,
        )?;
        set_usize(
            &mut lookup,
            "RUI_DIAG_EVENT_CAPACITY",
            &mut self.diagnostics.event_capacity,
        )?;

        // log view
        set_usize(
            &mut lookup,
            "RUI_LOG_LINES_PER_PAGE",
            &mut self.log_view.lines_per_page,
        )?;
        set_usize(
            &mut lookup,
            "RUI_LOG_CHARS_PER_LINE",
            &mut self.log_view.chars_per_line,
        )?;

        // paths
        if let Some(raw) = lookup("RUI_JSONL_LOG") {
            self.paths.jsonl_log = Some(PathBuf::from(raw));
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.ui.key_delay_ms == 0 {
            return invalid("ui.key_delay_ms must be > 0".to_string());
        }

        let dev = &self.developer;
        if dev.delay_short_ms == 0 || dev.delay_short_ms > dev.delay_normal_ms {
            return invalid(format!(
                "developer.delay_short_ms ({}) must be in (0, delay_normal_ms={}]",
                dev.delay_short_ms, dev.delay_normal_ms
            ));
        }
        if !(dev.first_beep_ms < dev.second_beep_ms && dev.second_beep_ms < dev.delay_normal_ms) {
            return invalid(format!(
                "developer beeps must satisfy first_beep_ms ({}) < second_beep_ms ({}) < delay_normal_ms ({})",
                dev.first_beep_ms, dev.second_beep_ms, dev.delay_normal_ms
            ));
        }

        let diag = &self.diagnostics;
        for (name, value) in [
            ("short_poll_interval_ms", diag.short_poll_interval_ms),
            ("extended_poll_interval_ms", diag.extended_poll_interval_ms),
            ("default_poll_interval_ms", diag.default_poll_interval_ms),
            ("memory_chunk_bytes", diag.memory_chunk_bytes),
        ] {
            if value == 0 {
                return invalid(format!("diagnostics.{name} must be > 0"));
            }
        }
        if !(1..=255).contains(&diag.event_capacity) {
            return invalid(format!(
                "diagnostics.event_capacity must be in [1,255], got {}",
                diag.event_capacity
            ));
        }
        if diag.elog_payload_bytes < 4 {
            return invalid(format!(
                "diagnostics.elog_payload_bytes must hold at least one 4-byte record, got {}",
                diag.elog_payload_bytes
            ));
        }
        if diag.memory_output_bytes < 256 {
            return invalid(format!(
                "diagnostics.memory_output_bytes must be >= 256, got {}",
                diag.memory_output_bytes
            ));
        }

        if self.log_view.lines_per_page == 0 || self.log_view.chars_per_line == 0 {
            return invalid("log_view dimensions must be > 0".to_string());
        }
        if self.log_view.firmware_log_anchors.iter().any(String::is_empty) {
            return invalid("log_view.firmware_log_anchors must not contain empty strings".into());
        }

        Ok(())
    }
}

fn invalid(details: String) -> Result<()> {
    Err(RuiError::InvalidConfig { details })
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| RuiError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn set_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

fn set_u32<F>(lookup: &mut F, name: &str, slot: &mut u32) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

fn set_usize<F>(lookup: &mut F, name: &str, slot: &mut usize) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, RuiError};
    use std::collections::HashMap;
    use std::path::Path;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn defaults_match_firmware_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.ui.key_delay_ms, 20);
        assert_eq!(cfg.diagnostics.short_poll_interval_ms, 200);
        assert_eq!(cfg.diagnostics.extended_poll_interval_ms, 3_000);
        assert_eq!(cfg.diagnostics.default_poll_interval_ms, 1_000);
        assert_eq!(cfg.diagnostics.event_capacity, 50);
        assert_eq!(cfg.diagnostics.elog_payload_bytes, 117);
        assert_eq!(cfg.developer.delay_normal_ms, 30_000);
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut cfg = Config::default();
        cfg.diagnostics.short_poll_interval_ms = 0;
        let err = cfg.validate().expect_err("expected invalid interval");
        match err {
            RuiError::InvalidConfig { details } => {
                assert!(details.contains("short_poll_interval_ms"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn event_capacity_bounds_enforced() {
        let mut cfg = Config::default();
        cfg.diagnostics.event_capacity = 0;
        assert!(cfg.validate().is_err());
        cfg.diagnostics.event_capacity = 256;
        assert!(cfg.validate().is_err());
        cfg.diagnostics.event_capacity = 255;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn developer_beep_ordering_enforced() {
        let mut cfg = Config::default();
        cfg.developer.second_beep_ms = cfg.developer.first_beep_ms;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("second_beep_ms"));
    }

    #[test]
    fn short_delay_cannot_exceed_normal_delay() {
        let mut cfg = Config::default();
        cfg.developer.delay_short_ms = cfg.developer.delay_normal_ms + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_pager_dimensions_rejected() {
        let mut cfg = Config::default();
        cfg.log_view.chars_per_line = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_apply_to_sections() {
        let env = vars(&[
            ("RUI_UI_DETACHABLE", "true"),
            ("RUI_DIAG_SHORT_POLL_INTERVAL_MS", "150"),
            ("RUI_LOG_LINES_PER_PAGE", " 4 "),
            ("RUI_JSONL_LOG", "/tmp/rui.jsonl"),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .expect("overrides apply");
        assert!(cfg.ui.detachable);
        assert_eq!(cfg.diagnostics.short_poll_interval_ms, 150);
        assert_eq!(cfg.log_view.lines_per_page, 4);
        assert_eq!(
            cfg.paths.jsonl_log.as_deref(),
            Some(Path::new("/tmp/rui.jsonl"))
        );
    }

    #[test]
    fn env_invalid_boolean_rejected() {
        let env = vars(&[("RUI_UI_DETACHABLE", "sometimes")]);
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .expect_err("bad bool");
        match err {
            RuiError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("RUI_UI_DETACHABLE"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str("[log_view]\nlines_per_page = 3\n").expect("parse");
        assert_eq!(cfg.log_view.lines_per_page, 3);
        assert_eq!(cfg.log_view.chars_per_line, 72);
        assert_eq!(cfg.ui.key_delay_ms, 20);
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[diagnostics]\nevent_capacity = 8\n").unwrap();
        let cfg = Config::load(Some(&path)).expect("load");
        assert_eq!(cfg.diagnostics.event_capacity, 8);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/rui/config.toml")));
        assert!(matches!(result, Err(RuiError::MissingConfig { .. })));
    }

    #[test]
    fn stable_hash_deterministic() {
        let cfg = Config::default();
        let h1 = cfg.stable_hash().expect("hash");
        let h2 = cfg.stable_hash().expect("hash");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 16);
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let mut changed = cfg.clone();
        changed.ui.detachable = true;
        assert_ne!(
            cfg.stable_hash().expect("hash"),
            changed.stable_hash().expect("hash")
        );
    }
}
