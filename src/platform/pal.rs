//! Platform abstraction: the collaborator contracts the UI engine and the
//! diagnostics producers are written against.
//!
//! Every concern is its own small trait so fakes in unit tests only implement
//! what they exercise. [`Platform`] bundles them and is blanket-implemented;
//! the engine holds a `&mut dyn Platform`.

#![allow(missing_docs)]

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::errors::Result;
use crate::diag::health::HealthInfo;
use crate::diag::storage_test::{StorageTestLog, TestOp, TestSupport};
use crate::ui::error::UiError;
use crate::ui::screen::ScreenId;
use crate::ui::state::ItemMask;

// ──────────────────── boot context ────────────────────

/// Why the payload is showing UI at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootMode {
    Normal,
    ManualRecovery,
    BrokenScreen,
    Diagnostics,
    Developer,
}

impl BootMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::ManualRecovery => "manual_recovery",
            Self::BrokenScreen => "broken_screen",
            Self::Diagnostics => "diagnostics",
            Self::Developer => "developer",
        }
    }
}

/// Verified-boot context flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextFlags {
    pub developer_mode: bool,
    pub dev_boot_allowed: bool,
    pub dev_boot_external_allowed: bool,
    pub dev_boot_altfw_allowed: bool,
    /// The firmware believes no bootable kernel exists on this device.
    pub no_boot: bool,
}

/// Google binary block flags the UI honours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GbbFlags {
    pub disable_lid_shutdown: bool,
    pub force_dev_switch_on: bool,
    pub dev_screen_short_delay: bool,
}

/// Developer-mode default boot target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevDefaultBoot {
    #[default]
    Internal,
    External,
    Altfw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskKind {
    Fixed,
    Removable,
}

/// Why a kernel could not be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("no disk found")]
    NoDisk,
    #[error("no valid kernel found (code {0:#x})")]
    Invalid(u32),
}

/// Outcome of one kernel load attempt.
pub type LoadResult = std::result::Result<(), LoadError>;

/// Raw shutdown inputs sampled once per loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownSignals {
    pub power_button_held: bool,
    pub lid_closed: bool,
    /// Host-side stop (signal, iteration budget). Never masked.
    pub interrupt: bool,
}

pub trait BootContext {
    fn boot_mode(&self) -> BootMode;
    fn flags(&self) -> ContextFlags;
    fn gbb_flags(&self) -> GbbFlags;

    fn locale_id(&self) -> u32;
    fn set_locale_id(&mut self, id: u32);
    /// Persist NV data (locale and mode requests).
    fn commit_nvdata(&mut self) -> Result<()>;

    fn dev_default_boot(&self) -> DevDefaultBoot;
    fn enable_developer_mode(&mut self) -> Result<()>;
    fn disable_developer_mode(&mut self) -> Result<()>;
    /// Ask the next boot to land in the diagnostics UI.
    fn request_diagnostics(&mut self);
    fn phone_recovery_enabled(&self) -> bool;
    fn diagnostic_ui_enabled(&self) -> bool;

    fn load_kernel(&mut self, disk: DiskKind) -> LoadResult;
    /// Boot the MiniOS recovery image. Returning means the boot failed.
    fn load_minios(&mut self, non_active_only: bool) -> Result<()>;

    fn debug_info(&mut self) -> Result<String>;
    /// Firmware console log; `reset` rewinds the read cursor first.
    fn firmware_log(&mut self, reset: bool) -> Result<String>;

    /// `None` when the battery cannot be read.
    fn battery_percent(&self) -> Option<u8>;
    /// Dedicated physical presence button state.
    fn physical_presence_pressed(&self) -> bool;
    fn shutdown_request(&mut self) -> ShutdownSignals;
}

// ──────────────────── input ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Esc,
    Tab,
    Space,
    Char(char),
    /// Ctrl plus an ASCII letter, stored lowercase.
    Ctrl(char),
    VolUpShort,
    VolDownShort,
    PowerShort,
    VolUpLong,
    VolDownLong,
    VolUpDownCombo,
}

/// One key event and whether it came from a trusted source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub trusted: bool,
}

impl KeyPress {
    pub const fn trusted(key: Key) -> Self {
        Self { key, trusted: true }
    }

    pub const fn untrusted(key: Key) -> Self {
        Self {
            key,
            trusted: false,
        }
    }
}

pub trait Keyboard {
    fn read_key(&mut self) -> Option<KeyPress>;
}

// ──────────────────── display ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A bitmap handle; the engine only needs its extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub name: String,
    pub width: i32,
    pub height: i32,
}

/// Everything that identifies what a frame shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub screen: ScreenId,
    pub locale_id: u32,
    pub selected: usize,
    pub hidden: ItemMask,
    pub disabled: ItemMask,
    pub timer_disabled: bool,
    pub current_page: usize,
    pub error: Option<UiError>,
}

pub trait Display {
    fn begin_frame(&mut self, frame: &FrameInfo);
    fn end_frame(&mut self);
    fn get_bitmap(&mut self, name: &str, locale_id: u32) -> Result<Bitmap>;
    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i32, y: i32, dimmed: bool) -> Result<()>;
    /// Draw `text` inside `rect`; returns the height used.
    fn draw_text_box(&mut self, text: &str, rect: Rect) -> Result<i32>;
    fn beep(&mut self, ms: u32, hz: u32);
    fn locale_count(&self) -> u32;
    fn locale_code(&self, id: u32) -> Option<String>;
}

// ──────────────────── storage and memory ────────────────────

/// One block device that may support self-test and health reporting.
pub trait StorageDevice {
    fn name(&self) -> &str;
    fn test_support(&self) -> TestSupport;
    fn test_control(&mut self, op: TestOp) -> Result<()>;
    fn test_log(&mut self) -> Result<StorageTestLog>;
    /// `None` when the device type has no health report.
    fn health_info(&mut self) -> Option<Result<HealthInfo>>;
}

pub trait Storage {
    fn fixed_device_count(&self) -> usize;
    fn fixed_device(&mut self, index: usize) -> Option<&mut dyn StorageDevice>;
}

/// Physical memory the payload does not use, accessed in chunks.
pub trait MemoryBus {
    fn unused_ranges(&mut self) -> Result<Vec<Range<u64>>>;
    /// Fill `range` with `pattern` repeated.
    fn write_chunk(&mut self, range: Range<u64>, pattern: &[u32]) -> Result<()>;
    /// Verify `range` against `pattern`; returns the first mismatching address.
    fn check_chunk(&mut self, range: Range<u64>, pattern: &[u32]) -> Result<Option<u64>>;
}

// ──────────────────── alternate firmware, event log, clock ────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AltFwEntry {
    pub seqnum: u32,
    pub filename: String,
    pub name: String,
    pub desc: String,
}

pub trait AltFirmware {
    fn altfw_list(&mut self) -> Result<Vec<AltFwEntry>>;
    /// Chain-load bootloader `id` (0 = default). `Ok` means it was launched.
    fn run_altfw(&mut self, id: u32) -> Result<()>;
}

pub trait EventLog {
    fn append_event(&mut self, event_type: u8, payload: &[u8]) -> Result<()>;
}

pub trait Clock {
    fn monotonic_us(&self) -> u64;
    fn sleep_ms(&mut self, ms: u64);
}

/// Everything the UI loop talks to.
pub trait Platform:
    BootContext + Keyboard + Display + Storage + MemoryBus + AltFirmware + EventLog + Clock
{
}

impl<T> Platform for T where
    T: BootContext
        + Keyboard
        + Display
        + Storage
        + MemoryBus
        + AltFirmware
        + EventLog
        + Clock
        + ?Sized
{
}
