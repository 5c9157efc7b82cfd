//! Top-level CLI definition and dispatch.

use std::fmt::Write as _;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use recovery_ui::cli::console::{TerminalConsole, render_frame};
use recovery_ui::core::config::Config;
use recovery_ui::diag::report::decode_payload;
use recovery_ui::logger::activity::{ActivityEvent, ActivityLog};
use recovery_ui::platform::pal::BootMode;
use recovery_ui::platform::sim::{DEFAULT_MAX_ITERATIONS, DeviceProfile, SimPlatform, parse_script};
use recovery_ui::ui::flows::{BootReport, select_and_load_kernel, show_firmware_sync};
use recovery_ui::ui::log_pager::LogPager;
use recovery_ui::ui::screen::{MenuSource, ScreenId};
use recovery_ui::ui::screens;

/// Recovery UI: firmware recovery and developer-mode menus on a simulated device.
#[derive(Debug, Parser)]
#[command(
    name = "rui",
    author,
    version,
    about = "Recovery UI - firmware menu engine and diagnostics",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Boot a simulated device and run its UI.
    Run(RunArgs),
    /// Page through a log file the way the firmware log screen does.
    Paginate(PaginateArgs),
    /// Diagnostics report tools.
    Report(ReportArgs),
    /// List the screen registry.
    Screens,
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Normal,
    Recovery,
    Broken,
    Diagnostics,
    Developer,
}

impl From<ModeArg> for BootMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Normal => Self::Normal,
            ModeArg::Recovery => Self::ManualRecovery,
            ModeArg::Broken => Self::BrokenScreen,
            ModeArg::Diagnostics => Self::Diagnostics,
            ModeArg::Developer => Self::Developer,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Device profile (TOML). Defaults to a stock recovery device.
    #[arg(long, value_name = "PATH")]
    profile: Option<PathBuf>,
    /// Override the profile's boot mode.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Key script, e.g. "down down enter idle:50". Omit for interactive use.
    #[arg(long, value_name = "KEYS")]
    script: Option<String>,
    /// Stop after this many loop iterations.
    #[arg(long, value_name = "N")]
    max_iterations: Option<u64>,
    /// Show the firmware sync notice before booting.
    #[arg(long)]
    firmware_sync: bool,
}

#[derive(Debug, Clone, Args)]
struct PaginateArgs {
    /// Log file, or `-` for stdin.
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Lines per page (defaults to the configured value).
    #[arg(long, value_name = "N")]
    lines: Option<usize>,
    /// Characters per line (defaults to the configured value).
    #[arg(long, value_name = "N")]
    chars: Option<usize>,
    /// Page to print (0-based).
    #[arg(long, default_value_t = 0, value_name = "N")]
    page: usize,
    /// Anchor strings; defaults to the configured firmware log anchors.
    #[arg(long = "anchor", value_name = "TEXT")]
    anchors: Vec<String>,
}

#[derive(Debug, Clone, Args)]
struct ReportArgs {
    #[command(subcommand)]
    command: ReportCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum ReportCommand {
    /// Decode a diagnostics event-log payload given as hex.
    Decode {
        /// Hex bytes; whitespace and `0x` prefixes are ignored.
        hex: String,
    },
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_device(cli, args),
        Command::Paginate(args) => run_paginate(cli, args),
        Command::Report(args) => match &args.command {
            ReportCommand::Decode { hex } => run_report_decode(cli, hex),
        },
        Command::Screens => run_screens(cli),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| CliError::User(e.to_string()))
}

fn run_device(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mut profile = match &args.profile {
        Some(path) => DeviceProfile::load(path).map_err(|e| CliError::User(e.to_string()))?,
        None => DeviceProfile::default(),
    };
    if let Some(mode) = args.mode {
        profile.mode = mode.into();
    }

    let mut device = SimPlatform::new(profile)
        .with_max_iterations(args.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS));
    let interactive = match &args.script {
        Some(script) => {
            let steps = parse_script(script).map_err(|e| CliError::User(e.to_string()))?;
            device = device.with_script(steps);
            false
        }
        None => {
            if !io::stdin().is_terminal() {
                return Err(CliError::User(
                    "no --script given and stdin is not a terminal".to_string(),
                ));
            }
            let console = TerminalConsole::open().map_err(|e| CliError::Runtime(e.to_string()))?;
            device = device.with_console(Box::new(console));
            true
        }
    };

    let mut activity = ActivityLog::from_paths(&config.paths);
    if let Ok(config_hash) = config.stable_hash() {
        activity.record(ActivityEvent::ConfigLoaded { config_hash });
    }

    if args.firmware_sync {
        show_firmware_sync(&mut device, &config, &mut activity);
    }
    let result = select_and_load_kernel(&mut device, &config, &mut activity);
    activity.flush();
    // Restores the terminal before anything else is printed.
    let frames = std::mem::take(&mut device.frames);
    let iterations = device.iterations();
    let beeps = device.beeps.len();
    drop(device);

    let report = result.map_err(|e| CliError::Runtime(e.to_string()))?;

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet && !interactive {
                for frame in &frames {
                    println!("{}", render_frame(frame));
                }
            }
            print_boot_report(&report, iterations, beeps);
            if cli.verbose {
                println!("{}", "activity:".bold());
                for entry in activity.recent() {
                    println!("  {}", serde_json::to_string(entry)?);
                }
            }
        }
        OutputMode::Json => {
            let frame_lines: Vec<String> = frames.iter().map(|f| f.summary()).collect();
            let payload = json!({
                "command": "run",
                "report": serde_json::to_value(&report)?,
                "elog_payload_hex": report.elog_payload.as_deref().map(to_hex),
                "iterations": iterations,
                "beeps": beeps,
                "frames": frame_lines,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn print_boot_report(report: &BootReport, iterations: u64, beeps: usize) {
    println!(
        "{} {} ({})",
        "outcome:".bold(),
        report.outcome.to_string().green(),
        report.mode.name()
    );
    println!("  iterations: {iterations}, beeps: {beeps}");
    if let Some(payload) = &report.elog_payload {
        println!("  event log payload: {}", to_hex(payload));
    }
    if !report.diag_events.is_empty() {
        println!("{}", "diagnostic events (newest first):".bold());
        for event in &report.diag_events {
            println!(
                "  {:<22} {:<8} {}s",
                event.test.name(),
                event.result.name(),
                event.elapsed_s
            );
        }
    }
}

// ---------------------------------------------------------------------------
// paginate
// ---------------------------------------------------------------------------

fn run_paginate(cli: &Cli, args: &PaginateArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let text = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.file)
            .map_err(|e| CliError::User(format!("read {}: {e}", args.file.display())))?
    };

    let mut pager = LogPager::new(
        args.lines.unwrap_or(config.log_view.lines_per_page),
        args.chars.unwrap_or(config.log_view.chars_per_line),
    );
    let pages = pager.load(&text).map_err(|e| CliError::User(e.to_string()))?;
    if args.anchors.is_empty() {
        pager.set_anchors(config.log_view.firmware_log_anchors.as_slice());
    } else {
        pager.set_anchors(args.anchors.as_slice());
    }
    if args.page >= pages {
        return Err(CliError::User(format!(
            "page {} out of range (log has {pages} pages)",
            args.page
        )));
    }
    pager.set_page(args.page);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", pager.current_text());
            println!(
                "{}",
                format!(
                    "-- page {}/{pages}, {} anchors ({} on this page)",
                    args.page + 1,
                    pager.anchor_total(),
                    pager.anchor_count(args.page)
                )
                .dimmed()
            );
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "paginate",
                "page": args.page,
                "page_count": pages,
                "text": pager.current_text(),
                "anchor_counts": pager.anchor_counts(),
                "anchor_total": pager.anchor_total(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// report decode
// ---------------------------------------------------------------------------

fn parse_hex(input: &str) -> Result<Vec<u8>, CliError> {
    let digits: String = input
        .split_whitespace()
        .map(|tok| tok.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(CliError::User(format!("invalid hex digit {bad:?}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::User("hex input has an odd number of digits".to_string()));
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair)
                .map_err(|_| CliError::User("hex input is not ASCII".to_string()))?;
            u8::from_str_radix(text, 16)
                .map_err(|_| CliError::User(format!("invalid hex byte {text:?}")))
        })
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

fn run_report_decode(cli: &Cli, hex: &str) -> Result<(), CliError> {
    let bytes = parse_hex(hex)?;
    let events = decode_payload(&bytes).map_err(|e| CliError::User(e.to_string()))?;
    match output_mode(cli) {
        OutputMode::Human => {
            if events.is_empty() {
                println!("no diagnostic events");
            }
            for (i, event) in events.iter().enumerate() {
                println!(
                    "{i:>3}  {:<22} {:<8} {}s",
                    event.test.name(),
                    event.result.name(),
                    event.elapsed_s
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "report decode",
                "events": serde_json::to_value(&events)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// screens
// ---------------------------------------------------------------------------

fn run_screens(cli: &Cli) -> Result<(), CliError> {
    let rows: Vec<Value> = ScreenId::ALL
        .iter()
        .map(|&id| {
            let screen = screens::get(id);
            let items = match screen.menu {
                MenuSource::None => json!(0),
                MenuSource::Static(items) => json!(items.len()),
                MenuSource::Dynamic => json!("dynamic"),
            };
            json!({
                "id": format!("{:#x}", id.code()),
                "name": id.name(),
                "items": items,
                "hooks": screen.hook_names(),
            })
        })
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{:<7} {:<28} {:<8} hooks", "id", "screen", "items");
            for row in &rows {
                println!(
                    "{:<7} {:<28} {:<8} {}",
                    row["id"].as_str().unwrap_or_default(),
                    row["name"].as_str().unwrap_or_default(),
                    row["items"].to_string().trim_matches('"'),
                    row["hooks"]
                        .as_array()
                        .map(|hooks| hooks
                            .iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(","))
                        .unwrap_or_default()
                );
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({ "command": "screens", "screens": rows }))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;
            let hash = config
                .stable_hash()
                .map_err(|e| CliError::Internal(e.to_string()))?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("# hash: {hash}");
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "hash": hash,
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Internal(e.to_string()))?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// output
// ---------------------------------------------------------------------------

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("RUI_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
