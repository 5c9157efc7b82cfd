//! Simulated device: a [`Platform`] driven by a TOML profile and a key
//! script, with a virtual clock and a recording display.
//!
//! Time only moves when the UI sleeps. Storage self-tests complete after
//! their configured duration (optionally jittered by a seeded RNG) and the
//! removable disk follows a timeline keyed on virtual milliseconds.

#![allow(missing_docs)]

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::fs;
use std::ops::Range;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, RuiError};
use crate::diag::health::{HealthInfo, MmcHealth, NvmeSmartLog, UfsHealth};
use crate::diag::storage_test::{
    NvmeTestLog, NvmeTestResult, StorageTestLog, TestOp, TestSupport,
};
use crate::platform::pal::{
    AltFirmware, AltFwEntry, Bitmap, BootContext, BootMode, Clock, ContextFlags, DevDefaultBoot,
    DiskKind, Display, EventLog, FrameInfo, GbbFlags, Key, KeyPress, Keyboard, LoadError,
    LoadResult, MemoryBus, Rect, ShutdownSignals, Storage, StorageDevice,
};

const MIB: u64 = 1 << 20;

/// Iteration budget when the caller does not set one.
pub const DEFAULT_MAX_ITERATIONS: u64 = 100_000;

// ──────────────────── profile ────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub mode: BootMode,
    pub flags: ContextFlags,
    pub gbb: GbbFlags,
    pub dev_default_boot: DevDefaultBoot,
    pub phone_recovery: bool,
    pub diagnostic_ui: bool,
    pub battery_percent: Option<u8>,
    pub locales: Vec<String>,
    pub locale_id: u32,
    pub nvdata_writable: bool,
    pub debug_info: Option<String>,
    pub firmware_log: Option<String>,
    /// Removable disk state changes, in virtual time order.
    pub removable: Vec<RemovableEvent>,
    pub fixed_disk_valid: bool,
    pub minios_ok: bool,
    pub storage: Vec<StorageProfile>,
    pub memory: MemoryProfile,
    pub altfw: Vec<AltFwEntry>,
    pub altfw_launch_ok: bool,
    pub elog_writable: bool,
    /// Bitmaps the display cannot find, to exercise the fallback renderer.
    pub missing_bitmaps: Vec<String>,
    /// Close the lid after this many loop iterations.
    pub lid_close_after: Option<u64>,
    pub seed: u64,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            mode: BootMode::ManualRecovery,
            flags: ContextFlags::default(),
            gbb: GbbFlags::default(),
            dev_default_boot: DevDefaultBoot::Internal,
            phone_recovery: true,
            diagnostic_ui: true,
            battery_percent: Some(80),
            locales: vec!["en".into(), "es-419".into(), "fr".into()],
            locale_id: 0,
            nvdata_writable: true,
            debug_info: Some(default_debug_info()),
            firmware_log: Some(default_firmware_log()),
            removable: Vec::new(),
            fixed_disk_valid: true,
            minios_ok: true,
            storage: vec![StorageProfile::default()],
            memory: MemoryProfile::default(),
            altfw: vec![
                AltFwEntry {
                    seqnum: 1,
                    filename: "tianocore.efi".into(),
                    name: "TianoCore".into(),
                    desc: "UEFI payload".into(),
                },
                AltFwEntry {
                    seqnum: 2,
                    filename: "seabios.elf".into(),
                    name: String::new(),
                    desc: "Legacy BIOS".into(),
                },
            ],
            altfw_launch_ok: true,
            elog_writable: true,
            missing_bitmaps: Vec::new(),
            lid_close_after: None,
            seed: 0,
        }
    }
}

impl DeviceProfile {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RuiError::ConfigParse {
            context: "device profile",
            details: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| RuiError::io(path, e))?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovableState {
    #[default]
    Absent,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovableEvent {
    pub at_ms: u64,
    pub state: RemovableState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Nvme,
    Mmc,
    Ufs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageProfile {
    pub name: String,
    pub kind: StorageKind,
    pub support: TestSupport,
    pub short_test_ms: u64,
    pub extended_test_ms: u64,
    /// Duration spread in percent, drawn once per test start.
    pub jitter_pct: u8,
    /// NVMe result code reported when a test completes (0 = passed).
    pub result_code: u8,
    pub failing_segment: u8,
    pub failing_lba: Option<u64>,
    /// Fault code returned by every test log read.
    pub fault: Option<i32>,
    pub health_fault: Option<i32>,
    pub temperature_k: u16,
    pub percent_used: u8,
    pub power_on_hours: u64,
    pub power_cycles: u64,
    pub data_units_read: u64,
    pub data_units_written: u64,
    pub media_errors: u64,
    pub csd_rev: u8,
    pub life_time_est_a: u8,
    pub life_time_est_b: u8,
    pub pre_eol_info: u8,
}

impl Default for StorageProfile {
    fn default() -> Self {
        Self {
            name: "nvme0n1".into(),
            kind: StorageKind::Nvme,
            support: TestSupport::ALL,
            short_test_ms: 2_000,
            extended_test_ms: 12_000,
            jitter_pct: 0,
            result_code: 0,
            failing_segment: 0,
            failing_lba: None,
            fault: None,
            health_fault: None,
            temperature_k: 308,
            percent_used: 3,
            power_on_hours: 1_234,
            power_cycles: 456,
            data_units_read: 9_876_543,
            data_units_written: 5_432_109,
            media_errors: 0,
            csd_rev: 8,
            life_time_est_a: 1,
            life_time_est_b: 1,
            pre_eol_info: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryProfile {
    /// Unused ranges as `[start, end)` pairs.
    pub ranges: Vec<[u64; 2]>,
    /// An address whose cell never holds what was written.
    pub stuck_at: Option<u64>,
    pub fault: Option<i32>,
}

impl Default for MemoryProfile {
    fn default() -> Self {
        Self {
            ranges: vec![[0x1000_0000, 0x1000_0000 + 64 * MIB]],
            stuck_at: None,
            fault: None,
        }
    }
}

fn default_debug_info() -> String {
    let mut text = String::from("firmware version: Google_Sim.13606.0.0\n");
    text.push_str("recovery reason: 0x02 (recovery button pressed)\n");
    text.push_str("gbb flags: 0x00000000\n");
    for i in 0..40 {
        let _ = writeln!(text, "tpm nv space {i:#06x}: ok");
    }
    text
}

fn default_firmware_log() -> String {
    let mut text = String::new();
    for boot in 0..3 {
        let _ = writeln!(text, "\ncoreboot-4.{boot} Sim Mon Jan 1 00:00:00 UTC 2024 romstage starting");
        for line in 0..25 {
            let _ = writeln!(text, "[INFO ] init step {line} of boot {boot}");
        }
        text.push_str("Starting depthcharge on sim...\n");
    }
    text
}

// ──────────────────── key script ────────────────────

/// One scripted loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    Key(KeyPress),
    Idle,
    PresencePress,
    PresenceRelease,
    PowerPress,
    PowerRelease,
    LidClose,
}

/// Parse a whitespace or comma separated key script.
///
/// Tokens: `up down left right enter esc tab space`, `ctrl-<letter>`,
/// `vol-up vol-down power vol-up-long vol-down-long vol-combo`, a single
/// character, `idle` or `idle:<n>`, `presence-down presence-up`,
/// `power-down power-up`, `lid-close`. A `u:` prefix makes a key untrusted.
pub fn parse_script(script: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for token in script
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        if let Some(count) = token.strip_prefix("idle:") {
            let n: usize = count.parse().map_err(|_| script_error(token))?;
            steps.extend(std::iter::repeat_n(ScriptStep::Idle, n));
            continue;
        }
        let step = match token {
            "idle" => ScriptStep::Idle,
            "presence-down" => ScriptStep::PresencePress,
            "presence-up" => ScriptStep::PresenceRelease,
            "power-down" => ScriptStep::PowerPress,
            "power-up" => ScriptStep::PowerRelease,
            "lid-close" => ScriptStep::LidClose,
            _ => {
                let (trusted, name) = match token.strip_prefix("u:") {
                    Some(rest) => (false, rest),
                    None => (true, token),
                };
                let key = parse_key(name).ok_or_else(|| script_error(token))?;
                ScriptStep::Key(KeyPress { key, trusted })
            }
        };
        steps.push(step);
    }
    Ok(steps)
}

fn parse_key(name: &str) -> Option<Key> {
    let key = match name {
        "up" => Key::Up,
        "down" => Key::Down,
        "left" => Key::Left,
        "right" => Key::Right,
        "enter" => Key::Enter,
        "esc" => Key::Esc,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "vol-up" => Key::VolUpShort,
        "vol-down" => Key::VolDownShort,
        "power" => Key::PowerShort,
        "vol-up-long" => Key::VolUpLong,
        "vol-down-long" => Key::VolDownLong,
        "vol-combo" => Key::VolUpDownCombo,
        other => {
            if let Some(letter) = other.strip_prefix("ctrl-") {
                let mut chars = letter.chars();
                return match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphabetic() => {
                        Some(Key::Ctrl(c.to_ascii_lowercase()))
                    }
                    _ => None,
                };
            }
            let mut chars = other.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Key::Char(c)),
                _ => None,
            };
        }
    };
    Some(key)
}

fn script_error(token: &str) -> RuiError {
    RuiError::ConfigParse {
        context: "key script",
        details: format!("unknown token {token:?}"),
    }
}

// ──────────────────── recorded output ────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Bitmap {
        name: String,
        x: i32,
        y: i32,
        dimmed: bool,
    },
    Text {
        text: String,
        x: i32,
        y: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFrame {
    pub info: FrameInfo,
    pub ops: Vec<DrawOp>,
    pub at_us: u64,
}

impl RecordedFrame {
    pub fn bitmaps(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Bitmap { name, .. } => Some(name.as_str()),
            DrawOp::Text { .. } => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::Bitmap { .. } => None,
        })
    }

    pub fn has_bitmap(&self, name: &str) -> bool {
        self.bitmaps().any(|b| b == name)
    }

    /// One-line summary used by the script front end.
    pub fn summary(&self) -> String {
        let info = &self.info;
        let mut line = format!(
            "[{:>8.3}s] {} sel={} hidden={:#x} disabled={:#x} page={}",
            self.at_us as f64 / 1e6,
            info.screen.name(),
            info.selected,
            info.hidden,
            info.disabled,
            info.current_page
        );
        if let Some(error) = info.error {
            let _ = write!(line, " error={}", error.name());
        }
        line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Beep {
    pub ms: u32,
    pub hz: u32,
    pub at_us: u64,
}

/// What the UI asked the firmware to persist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NvRequests {
    pub commits: u32,
    pub enable_developer_mode: bool,
    pub disable_developer_mode: bool,
    pub diagnostics: bool,
}

// ──────────────────── storage device ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunningTest {
    op: TestOp,
    start_us: u64,
    duration_us: u64,
}

#[derive(Debug, Clone)]
pub struct SimStorageDevice {
    profile: StorageProfile,
    now_us: u64,
    running: Option<RunningTest>,
    newest: NvmeTestResult,
    rng: StdRng,
    pub controls: Vec<TestOp>,
}

impl SimStorageDevice {
    pub fn new(profile: StorageProfile, seed: u64) -> Self {
        Self {
            profile,
            now_us: 0,
            running: None,
            newest: NvmeTestResult {
                // No self-test has been run.
                status: 0xf,
                ..NvmeTestResult::default()
            },
            rng: StdRng::seed_from_u64(seed),
            controls: Vec::new(),
        }
    }

    fn duration_us(&mut self, op: TestOp) -> u64 {
        let base_ms = match op {
            TestOp::Extended => self.profile.extended_test_ms,
            TestOp::Short | TestOp::Stop => self.profile.short_test_ms,
        };
        let spread = base_ms * u64::from(self.profile.jitter_pct.min(100)) / 100;
        let ms = if spread == 0 {
            base_ms
        } else {
            self.rng
                .random_range(base_ms.saturating_sub(spread)..=base_ms + spread)
        };
        ms.max(1) * 1_000
    }

    const fn op_code(op: TestOp) -> u8 {
        match op {
            TestOp::Short => 1,
            TestOp::Extended => 2,
            TestOp::Stop => 0,
        }
    }

    fn finish(&mut self, test: RunningTest, result: u8) {
        self.running = None;
        let mut newest = NvmeTestResult {
            status: (Self::op_code(test.op) << 4) | (result & 0xf),
            power_on_hours: self.profile.power_on_hours,
            ..NvmeTestResult::default()
        };
        if result >= 5 {
            newest.segment_number = self.profile.failing_segment;
            newest.nsid = 1;
            newest.valid_diag_info = 1;
            if let Some(lba) = self.profile.failing_lba {
                newest.failing_lba = lba;
                newest.valid_diag_info |= 1 << 1;
            }
        }
        self.newest = newest;
    }

    fn nvme_log(&mut self) -> NvmeTestLog {
        if let Some(test) = self.running {
            let elapsed = self.now_us.saturating_sub(test.start_us);
            if elapsed < test.duration_us {
                let completion = elapsed * 100 / test.duration_us;
                return NvmeTestLog {
                    current_operation: Self::op_code(test.op),
                    current_completion: u8::try_from(completion).unwrap_or(99),
                    newest: self.newest,
                };
            }
            self.finish(test, self.profile.result_code);
        }
        NvmeTestLog {
            current_operation: 0,
            current_completion: 0,
            newest: self.newest,
        }
    }

    fn nvme_health(&self) -> NvmeSmartLog {
        let p = &self.profile;
        let mut sensors = [0u16; 8];
        sensors[0] = p.temperature_k;
        sensors[1] = p.temperature_k.saturating_add(4);
        NvmeSmartLog {
            temperature: p.temperature_k,
            avail_spare: 100,
            spare_thresh: 10,
            percent_used: p.percent_used,
            data_units_read: u128::from(p.data_units_read),
            data_units_written: u128::from(p.data_units_written),
            host_reads: u128::from(p.data_units_read) * 7,
            host_writes: u128::from(p.data_units_written) * 5,
            ctrl_busy_time: 321,
            power_cycles: u128::from(p.power_cycles),
            power_on_hours: u128::from(p.power_on_hours),
            unsafe_shutdowns: 12,
            media_errors: u128::from(p.media_errors),
            temp_sensor: sensors,
            ..NvmeSmartLog::default()
        }
    }
}

impl StorageDevice for SimStorageDevice {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn test_support(&self) -> TestSupport {
        match self.profile.kind {
            StorageKind::Nvme => self.profile.support,
            StorageKind::Mmc | StorageKind::Ufs => TestSupport::NONE,
        }
    }

    fn test_control(&mut self, op: TestOp) -> Result<()> {
        self.controls.push(op);
        if let Some(code) = self.profile.fault {
            return Err(RuiError::hardware(self.profile.name.clone(), code));
        }
        match op {
            TestOp::Stop => {
                if let Some(test) = self.running {
                    // Aborted by a self-test command.
                    self.finish(test, 1);
                }
            }
            TestOp::Short | TestOp::Extended => {
                let duration_us = self.duration_us(op);
                self.running = Some(RunningTest {
                    op,
                    start_us: self.now_us,
                    duration_us,
                });
            }
        }
        Ok(())
    }

    fn test_log(&mut self) -> Result<StorageTestLog> {
        if let Some(code) = self.profile.fault {
            return Err(RuiError::hardware(self.profile.name.clone(), code));
        }
        Ok(match self.profile.kind {
            StorageKind::Nvme => StorageTestLog::Nvme(self.nvme_log()),
            StorageKind::Mmc => StorageTestLog::Mmc,
            StorageKind::Ufs => StorageTestLog::Ufs,
        })
    }

    fn health_info(&mut self) -> Option<Result<HealthInfo>> {
        if let Some(code) = self.profile.health_fault {
            return Some(Err(RuiError::hardware(self.profile.name.clone(), code)));
        }
        let p = &self.profile;
        Some(Ok(match p.kind {
            StorageKind::Nvme => HealthInfo::Nvme(Box::new(self.nvme_health())),
            StorageKind::Mmc => HealthInfo::Mmc(MmcHealth {
                csd_rev: p.csd_rev,
                life_time_est_a: p.life_time_est_a,
                life_time_est_b: p.life_time_est_b,
                pre_eol_info: p.pre_eol_info,
            }),
            StorageKind::Ufs => {
                let mut vendor_info = [0u8; 32];
                for (i, b) in vendor_info.iter_mut().enumerate() {
                    *b = u8::try_from(i).unwrap_or(0).wrapping_mul(7);
                }
                HealthInfo::Ufs(UfsHealth {
                    life_time_est_a: p.life_time_est_a,
                    life_time_est_b: p.life_time_est_b,
                    pre_eol_info: p.pre_eol_info,
                    vendor_info,
                })
            }
        }))
    }
}

// ──────────────────── platform ────────────────────

/// A live terminal attached to the simulator: keys once the script runs
/// out, host interrupts, and frame output. Sleeping becomes real time.
pub trait HostConsole {
    fn poll_key(&mut self) -> Option<KeyPress>;
    fn interrupted(&self) -> bool;
    fn show(&mut self, frame: &RecordedFrame);
}

pub struct SimPlatform {
    profile: DeviceProfile,
    flags: ContextFlags,
    locale_id: u32,
    now_us: u64,
    script: VecDeque<ScriptStep>,
    presence_held: bool,
    power_held: bool,
    lid_closed: bool,
    iterations: u64,
    max_iterations: u64,
    devices: Vec<SimStorageDevice>,
    /// Pattern last written per chunk start.
    memory: HashMap<u64, Vec<u32>>,
    log_cursor_reset: u32,

    pub frames: Vec<RecordedFrame>,
    current: Option<RecordedFrame>,
    pub beeps: Vec<Beep>,
    pub elog: Vec<(u8, Vec<u8>)>,
    pub nv: NvRequests,
    pub kernel_loads: Vec<(DiskKind, LoadResult)>,
    pub altfw_launches: Vec<u32>,
    pub minios_boots: Vec<bool>,
    console: Option<Box<dyn HostConsole>>,
}

impl SimPlatform {
    pub fn new(profile: DeviceProfile) -> Self {
        let devices = profile
            .storage
            .iter()
            .enumerate()
            .map(|(i, p)| SimStorageDevice::new(p.clone(), profile.seed.wrapping_add(i as u64)))
            .collect();
        Self {
            flags: profile.flags,
            locale_id: profile.locale_id,
            profile,
            now_us: 0,
            script: VecDeque::new(),
            presence_held: false,
            power_held: false,
            lid_closed: false,
            iterations: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            devices,
            memory: HashMap::new(),
            log_cursor_reset: 0,
            frames: Vec::new(),
            current: None,
            beeps: Vec::new(),
            elog: Vec::new(),
            nv: NvRequests::default(),
            kernel_loads: Vec::new(),
            altfw_launches: Vec::new(),
            minios_boots: Vec::new(),
            console: None,
        }
    }

    #[must_use]
    pub fn with_console(mut self, console: Box<dyn HostConsole>) -> Self {
        self.console = Some(console);
        self
    }

    #[must_use]
    pub fn with_script(mut self, steps: Vec<ScriptStep>) -> Self {
        self.script = steps.into();
        self
    }

    #[must_use]
    pub fn with_keys(self, keys: &[Key]) -> Self {
        let steps = keys
            .iter()
            .map(|k| ScriptStep::Key(KeyPress::trusted(*k)))
            .collect();
        self.with_script(steps)
    }

    /// Stop the loop (as an interrupt) after `n` iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, n: u64) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn script_remaining(&self) -> usize {
        self.script.len()
    }

    pub fn device(&self, index: usize) -> Option<&SimStorageDevice> {
        self.devices.get(index)
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    /// Screens in the order they were first drawn after each change.
    pub fn screen_trail(&self) -> Vec<crate::ui::screen::ScreenId> {
        let mut trail: Vec<crate::ui::screen::ScreenId> = Vec::new();
        for frame in &self.frames {
            if trail.last() != Some(&frame.info.screen) {
                trail.push(frame.info.screen);
            }
        }
        trail
    }

    fn removable_state(&self) -> RemovableState {
        let now_ms = self.now_us / 1_000;
        self.profile
            .removable
            .iter()
            .filter(|e| e.at_ms <= now_ms)
            .last()
            .map_or(RemovableState::Absent, |e| e.state)
    }

    fn memory_fault(&self) -> Result<()> {
        match self.profile.memory.fault {
            Some(code) => Err(RuiError::hardware("memory", code)),
            None => Ok(()),
        }
    }
}

impl BootContext for SimPlatform {
    fn boot_mode(&self) -> BootMode {
        self.profile.mode
    }

    fn flags(&self) -> ContextFlags {
        self.flags
    }

    fn gbb_flags(&self) -> GbbFlags {
        self.profile.gbb
    }

    fn locale_id(&self) -> u32 {
        self.locale_id
    }

    fn set_locale_id(&mut self, id: u32) {
        self.locale_id = id;
    }

    fn commit_nvdata(&mut self) -> Result<()> {
        if !self.profile.nvdata_writable {
            return Err(RuiError::hardware("nvdata", -5));
        }
        self.nv.commits += 1;
        Ok(())
    }

    fn dev_default_boot(&self) -> DevDefaultBoot {
        self.profile.dev_default_boot
    }

    fn enable_developer_mode(&mut self) -> Result<()> {
        self.nv.enable_developer_mode = true;
        self.flags.developer_mode = true;
        Ok(())
    }

    fn disable_developer_mode(&mut self) -> Result<()> {
        self.nv.disable_developer_mode = true;
        self.flags.developer_mode = false;
        Ok(())
    }

    fn request_diagnostics(&mut self) {
        self.nv.diagnostics = true;
    }

    fn phone_recovery_enabled(&self) -> bool {
        self.profile.phone_recovery
    }

    fn diagnostic_ui_enabled(&self) -> bool {
        self.profile.diagnostic_ui
    }

    fn load_kernel(&mut self, disk: DiskKind) -> LoadResult {
        let result = match disk {
            DiskKind::Fixed if self.profile.fixed_disk_valid => Ok(()),
            DiskKind::Fixed => Err(LoadError::Invalid(0x1003)),
            DiskKind::Removable => match self.removable_state() {
                RemovableState::Absent => Err(LoadError::NoDisk),
                RemovableState::Valid => Ok(()),
                RemovableState::Invalid => Err(LoadError::Invalid(0x1003)),
            },
        };
        self.kernel_loads.push((disk, result));
        result
    }

    fn load_minios(&mut self, non_active_only: bool) -> Result<()> {
        self.minios_boots.push(non_active_only);
        if self.profile.minios_ok {
            Ok(())
        } else {
            Err(RuiError::BootFailed {
                details: "no MiniOS image on the fixed disk".to_string(),
            })
        }
    }

    fn debug_info(&mut self) -> Result<String> {
        self.profile
            .debug_info
            .clone()
            .ok_or_else(|| RuiError::unimplemented("debug info"))
    }

    fn firmware_log(&mut self, reset: bool) -> Result<String> {
        if reset {
            self.log_cursor_reset += 1;
        }
        self.profile
            .firmware_log
            .clone()
            .ok_or_else(|| RuiError::unimplemented("firmware log"))
    }

    fn battery_percent(&self) -> Option<u8> {
        self.profile.battery_percent
    }

    fn physical_presence_pressed(&self) -> bool {
        self.presence_held
    }

    fn shutdown_request(&mut self) -> ShutdownSignals {
        self.iterations += 1;
        if self
            .profile
            .lid_close_after
            .is_some_and(|n| self.iterations >= n)
        {
            self.lid_closed = true;
        }
        ShutdownSignals {
            power_button_held: self.power_held,
            lid_closed: self.lid_closed,
            interrupt: self.iterations >= self.max_iterations
                || self.console.as_ref().is_some_and(|c| c.interrupted()),
        }
    }
}

impl Keyboard for SimPlatform {
    fn read_key(&mut self) -> Option<KeyPress> {
        let Some(step) = self.script.pop_front() else {
            return self.console.as_mut().and_then(|c| c.poll_key());
        };
        match step {
            ScriptStep::Key(press) => return Some(press),
            ScriptStep::Idle => {}
            ScriptStep::PresencePress => self.presence_held = true,
            ScriptStep::PresenceRelease => self.presence_held = false,
            ScriptStep::PowerPress => self.power_held = true,
            ScriptStep::PowerRelease => self.power_held = false,
            ScriptStep::LidClose => self.lid_closed = true,
        }
        None
    }
}

impl Display for SimPlatform {
    fn begin_frame(&mut self, frame: &FrameInfo) {
        self.current = Some(RecordedFrame {
            info: *frame,
            ops: Vec::new(),
            at_us: self.now_us,
        });
    }

    fn end_frame(&mut self) {
        if let Some(frame) = self.current.take() {
            if let Some(console) = self.console.as_mut() {
                console.show(&frame);
            }
            self.frames.push(frame);
        }
    }

    fn get_bitmap(&mut self, name: &str, _locale_id: u32) -> Result<Bitmap> {
        if self.profile.missing_bitmaps.iter().any(|m| m == name) {
            return Err(RuiError::unimplemented(format!("bitmap {name}")));
        }
        Ok(Bitmap {
            name: name.to_string(),
            width: 40,
            height: 24,
        })
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i32, y: i32, dimmed: bool) -> Result<()> {
        if let Some(frame) = self.current.as_mut() {
            frame.ops.push(DrawOp::Bitmap {
                name: bitmap.name.clone(),
                x,
                y,
                dimmed,
            });
        }
        Ok(())
    }

    fn draw_text_box(&mut self, text: &str, rect: Rect) -> Result<i32> {
        if let Some(frame) = self.current.as_mut() {
            frame.ops.push(DrawOp::Text {
                text: text.to_string(),
                x: rect.x,
                y: rect.y,
            });
        }
        let lines = i32::try_from(text.lines().count()).unwrap_or(i32::MAX);
        Ok(lines.saturating_mul(12).min(rect.height))
    }

    fn beep(&mut self, ms: u32, hz: u32) {
        self.beeps.push(Beep {
            ms,
            hz,
            at_us: self.now_us,
        });
    }

    fn locale_count(&self) -> u32 {
        u32::try_from(self.profile.locales.len()).unwrap_or(u32::MAX)
    }

    fn locale_code(&self, id: u32) -> Option<String> {
        let index = usize::try_from(id).ok()?;
        self.profile.locales.get(index).cloned()
    }
}

impl Storage for SimPlatform {
    fn fixed_device_count(&self) -> usize {
        self.devices.len()
    }

    fn fixed_device(&mut self, index: usize) -> Option<&mut dyn StorageDevice> {
        self.devices
            .get_mut(index)
            .map(|d| d as &mut dyn StorageDevice)
    }
}

impl MemoryBus for SimPlatform {
    fn unused_ranges(&mut self) -> Result<Vec<Range<u64>>> {
        self.memory_fault()?;
        Ok(self
            .profile
            .memory
            .ranges
            .iter()
            .map(|[start, end]| *start..*end)
            .collect())
    }

    fn write_chunk(&mut self, range: Range<u64>, pattern: &[u32]) -> Result<()> {
        self.memory_fault()?;
        self.memory.insert(range.start, pattern.to_vec());
        Ok(())
    }

    fn check_chunk(&mut self, range: Range<u64>, pattern: &[u32]) -> Result<Option<u64>> {
        self.memory_fault()?;
        if let Some(addr) = self.profile.memory.stuck_at.filter(|a| range.contains(a)) {
            return Ok(Some(addr));
        }
        let intact = self
            .memory
            .get(&range.start)
            .is_some_and(|written| written.as_slice() == pattern);
        Ok(if intact { None } else { Some(range.start) })
    }
}

impl AltFirmware for SimPlatform {
    fn altfw_list(&mut self) -> Result<Vec<AltFwEntry>> {
        Ok(self.profile.altfw.clone())
    }

    fn run_altfw(&mut self, id: u32) -> Result<()> {
        self.altfw_launches.push(id);
        if self.profile.altfw_launch_ok {
            Ok(())
        } else {
            Err(RuiError::hardware("altfw", -1))
        }
    }
}

impl EventLog for SimPlatform {
    fn append_event(&mut self, event_type: u8, payload: &[u8]) -> Result<()> {
        if !self.profile.elog_writable {
            return Err(RuiError::hardware("elog", -28));
        }
        self.elog.push((event_type, payload.to_vec()));
        Ok(())
    }
}

impl Clock for SimPlatform {
    fn monotonic_us(&self) -> u64 {
        self.now_us
    }

    fn sleep_ms(&mut self, ms: u64) {
        if self.console.is_some() {
            std::thread::sleep(std::time::Duration::from_millis(ms));
        }
        self.now_us += ms * 1_000;
        for dev in &mut self.devices {
            dev.now_us = self.now_us;
        }
    }
}
