#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use recovery_ui::logger::jsonl::EventType;
use recovery_ui::prelude::*;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_rui") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "rui.exe" } else { "rui" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve rui binary path for integration test"),
    }
}

/// Run the binary with JSON output forced and a throwaway config home, and
/// keep a transcript next to the other test logs.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("rui-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let config_home = root.join(format!("{}-config", sanitize(case_name)));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("XDG_CONFIG_HOME", &config_home)
        .env("RUI_OUTPUT_FORMAT", "json")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute rui command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Parse the single JSON document a `--json` command printed.
pub fn stdout_json(result: &CmdResult) -> serde_json::Value {
    serde_json::from_str(result.stdout.trim()).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}); log at {}",
            result.log_path.display()
        )
    })
}

// ──────────────────── in-process simulator runs ────────────────────

/// A finished boot on the simulator, with everything it recorded.
pub struct SimRun {
    pub report: BootReport,
    pub sim: SimPlatform,
    pub activity: ActivityLog,
}

impl SimRun {
    pub fn events(&self, event: EventType) -> usize {
        self.activity.of_type(event).len()
    }

    pub fn shutdown_source(&self) -> Option<String> {
        self.activity
            .of_type(EventType::ShutdownRequest)
            .last()
            .and_then(|e| e.details.clone())
    }

    pub fn saw_screen(&self, screen: ScreenId) -> bool {
        self.sim.frames.iter().any(|f| f.info.screen == screen)
    }

    pub fn saw_error(&self, error: recovery_ui::ui::error::UiError) -> bool {
        self.sim.frames.iter().any(|f| f.info.error == Some(error))
    }
}

/// Boot `profile` with the default config, feeding `script` one step per
/// loop iteration and interrupting after `max_iterations`.
pub fn boot(profile: DeviceProfile, script: &str, max_iterations: u64) -> SimRun {
    boot_with(profile, &Config::default(), script, max_iterations)
}

pub fn boot_with(
    profile: DeviceProfile,
    config: &Config,
    script: &str,
    max_iterations: u64,
) -> SimRun {
    let steps = parse_script(script).expect("valid key script");
    let mut sim = SimPlatform::new(profile)
        .with_script(steps)
        .with_max_iterations(max_iterations);
    let mut activity = ActivityLog::memory();
    let report =
        select_and_load_kernel(&mut sim, config, &mut activity).expect("boot returns a report");
    SimRun {
        report,
        sim,
        activity,
    }
}

pub fn recovery_profile() -> DeviceProfile {
    DeviceProfile::default()
}

pub fn developer_profile() -> DeviceProfile {
    let mut profile = DeviceProfile {
        mode: BootMode::Developer,
        ..DeviceProfile::default()
    };
    profile.flags.developer_mode = true;
    profile.flags.dev_boot_allowed = true;
    profile
}

pub fn diagnostics_profile() -> DeviceProfile {
    DeviceProfile {
        mode: BootMode::Diagnostics,
        ..DeviceProfile::default()
    }
}
