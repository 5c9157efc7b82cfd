//! Boot-mode flows: root screen, global shortcuts and per-tick work, plus
//! the top-level kernel selection entry point.

#![allow(missing_docs)]

use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::{Result, RuiError};
use crate::diag::report::{DiagEvent, ELOG_TYPE_CROS_DIAGNOSTICS};
use crate::logger::activity::{ActivityEvent, ActivityLog};
use crate::platform::pal::{BootMode, DiskKind, Key, LoadError, Platform};
use crate::ui::actions;
use crate::ui::directive::{BootTarget, Directive, UiOutcome};
use crate::ui::draw::display_ui;
use crate::ui::engine::UiContext;
use crate::ui::event_loop::ui_loop;
use crate::ui::screen::ScreenId;

/// Global behaviour layered over the screens of one boot mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    ManualRecovery,
    Broken,
    Developer,
}

impl Flow {
    /// Handle a global shortcut. `Some` means the key was consumed.
    pub fn shortcut(self, ctx: &mut UiContext<'_>) -> Option<Directive> {
        let key = ctx.key?.key;
        let detachable = ctx.config.ui.detachable;
        match self {
            Self::ManualRecovery => match key {
                Key::Ctrl('d') => Some(Directive::ChangeScreen(ScreenId::RecoveryToDev)),
                Key::VolUpDownCombo if detachable => {
                    Some(Directive::ChangeScreen(ScreenId::RecoveryToDev))
                }
                Key::Ctrl('r') => Some(actions::boot_minios(ctx, false)),
                Key::Tab => Some(Directive::ChangeScreen(ScreenId::DebugInfo)),
                _ => None,
            },
            Self::Broken => {
                (key == Key::Tab).then_some(Directive::ChangeScreen(ScreenId::DebugInfo))
            }
            Self::Developer => {
                if key == Key::Tab {
                    return Some(Directive::ChangeScreen(ScreenId::DebugInfo));
                }
                if !ctx.platform.flags().dev_boot_allowed {
                    return None;
                }
                match key {
                    Key::Ctrl('s') => Some(Directive::ChangeScreen(ScreenId::DeveloperToNorm)),
                    Key::Ctrl('u') => Some(actions::boot_external(ctx)),
                    Key::VolUpLong if detachable => Some(actions::boot_external(ctx)),
                    Key::Ctrl('d') => Some(actions::boot_internal(ctx)),
                    Key::VolDownLong if detachable => Some(actions::boot_internal(ctx)),
                    Key::Ctrl('l') => Some(actions::boot_altfw(ctx, 0)),
                    _ => None,
                }
            }
        }
    }

    /// Work done once per loop iteration after the screen action.
    pub fn tick(self, ctx: &mut UiContext<'_>) -> Directive {
        match self {
            Self::ManualRecovery => poll_recovery_disk(ctx),
            Self::Broken | Self::Developer => Directive::Continue,
        }
    }
}

/// Boot a recovery disk as soon as one shows up; otherwise follow the
/// validity of whatever is inserted.
fn poll_recovery_disk(ctx: &mut UiContext<'_>) -> Directive {
    let result = ctx.platform.load_kernel(DiskKind::Removable);
    if result.is_ok() {
        actions::record_boot(ctx, "recovery_disk", &result);
        return Directive::Exit(BootTarget::RecoveryDisk);
    }
    if ctx.recovery_rv == Some(result) {
        return Directive::Continue;
    }
    actions::record_boot(ctx, "recovery_disk", &result);
    ctx.recovery_rv = Some(result);
    Directive::ChangeScreen(if result == Err(LoadError::NoDisk) {
        ScreenId::RecoverySelect
    } else {
        ScreenId::RecoveryInvalid
    })
}

/// What a boot attempt produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootReport {
    pub mode: BootMode,
    pub outcome: UiOutcome,
    /// Diagnostic events recorded this session, newest first.
    pub diag_events: Vec<DiagEvent>,
    /// Payload appended to the event log, if any.
    pub elog_payload: Option<Vec<u8>>,
}

impl BootReport {
    fn new(mode: BootMode, outcome: UiOutcome) -> Self {
        Self {
            mode,
            outcome,
            diag_events: Vec::new(),
            elog_payload: None,
        }
    }
}

/// Pick what to boot for the platform's boot mode, running the UI when the
/// mode has one.
pub fn select_and_load_kernel(
    platform: &mut dyn Platform,
    config: &Config,
    activity: &mut ActivityLog,
) -> Result<BootReport> {
    let mode = platform.boot_mode();
    match mode {
        BootMode::Normal => {
            let result = platform.load_kernel(DiskKind::Fixed);
            activity.record(ActivityEvent::BootAttempted {
                target: BootTarget::InternalDisk.to_string(),
                result: result.map_or_else(|e| e.to_string(), |()| "ok".to_string()),
            });
            result.map_err(|e| RuiError::BootFailed {
                details: e.to_string(),
            })?;
            Ok(BootReport::new(
                mode,
                UiOutcome::Booted(BootTarget::InternalDisk),
            ))
        }
        BootMode::ManualRecovery => Ok(run_flow(
            platform,
            config,
            activity,
            ScreenId::RecoverySelect,
            Flow::ManualRecovery,
        )),
        BootMode::BrokenScreen => {
            if platform.flags().no_boot {
                activity.record(ActivityEvent::Warning {
                    details: "no_boot set; only the broken screen is available".to_string(),
                });
            }
            Ok(run_flow(
                platform,
                config,
                activity,
                ScreenId::RecoveryBroken,
                Flow::Broken,
            ))
        }
        BootMode::Developer => {
            let root = if platform.flags().dev_boot_allowed {
                ScreenId::DeveloperMode
            } else {
                activity.record(ActivityEvent::Warning {
                    details: "developer boot not allowed; showing to-norm screen".to_string(),
                });
                ScreenId::DeveloperToNorm
            };
            Ok(run_flow(platform, config, activity, root, Flow::Developer))
        }
        BootMode::Diagnostics => Ok(run_diagnostics(platform, config, activity)),
    }
}

fn run_flow(
    platform: &mut dyn Platform,
    config: &Config,
    activity: &mut ActivityLog,
    root: ScreenId,
    flow: Flow,
) -> BootReport {
    let mode = platform.boot_mode();
    let mut ctx = UiContext::new(platform, config, activity, root);
    let outcome = ui_loop(&mut ctx, Some(flow));
    BootReport::new(mode, outcome)
}

/// The diagnostics UI never boots; its results go to the event log.
fn run_diagnostics(
    platform: &mut dyn Platform,
    config: &Config,
    activity: &mut ActivityLog,
) -> BootReport {
    let mut ctx = UiContext::new(platform, config, activity, ScreenId::Diagnostics);
    let outcome = match ui_loop(&mut ctx, None) {
        UiOutcome::Booted(_) => UiOutcome::Reboot,
        other => other,
    };

    let now = ctx.now_us();
    let payload = ctx
        .report
        .elog_payload(config.diagnostics.elog_payload_bytes, now);
    let diag_events: Vec<DiagEvent> = ctx.report.events().newest_first().copied().collect();
    if let Err(err) = ctx
        .platform
        .append_event(ELOG_TYPE_CROS_DIAGNOSTICS, &payload)
    {
        ctx.warn(format!("diagnostics event log append failed: {err}"));
    }
    ctx.activity.record(ActivityEvent::ReportDumped {
        bytes: payload.len(),
    });
    ctx.report.clear();

    BootReport {
        mode: BootMode::Diagnostics,
        outcome,
        diag_events,
        elog_payload: Some(payload),
    }
}

/// Show the firmware sync notice once, without a loop.
pub fn show_firmware_sync(
    platform: &mut dyn Platform,
    config: &Config,
    activity: &mut ActivityLog,
) {
    let mut ctx = UiContext::new(platform, config, activity, ScreenId::FirmwareSync);
    if let Some(outcome) = ctx.start() {
        ctx.warn(format!("firmware sync notice ended before drawing: {outcome:?}"));
        return;
    }
    display_ui(&mut ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::jsonl::EventType;
    use crate::platform::pal::{ContextFlags, KeyPress};
    use crate::platform::sim::{DeviceProfile, SimPlatform};

    fn ctx_for<R>(
        profile: DeviceProfile,
        root: ScreenId,
        key: Key,
        f: impl FnOnce(&mut UiContext<'_>) -> R,
    ) -> R {
        let mut sim = SimPlatform::new(profile);
        let config = Config::default();
        let mut activity = ActivityLog::memory();
        let mut ctx = UiContext::new(&mut sim, &config, &mut activity, root);
        let _ = ctx.start();
        ctx.key = Some(KeyPress::trusted(key));
        f(&mut ctx)
    }

    #[test]
    fn recovery_shortcuts() {
        let profile = DeviceProfile {
            mode: BootMode::ManualRecovery,
            ..DeviceProfile::default()
        };
        let d = ctx_for(profile.clone(), ScreenId::RecoverySelect, Key::Ctrl('d'), |ctx| {
            Flow::ManualRecovery.shortcut(ctx)
        });
        assert_eq!(d, Some(Directive::ChangeScreen(ScreenId::RecoveryToDev)));

        let d = ctx_for(profile.clone(), ScreenId::RecoverySelect, Key::Tab, |ctx| {
            Flow::ManualRecovery.shortcut(ctx)
        });
        assert_eq!(d, Some(Directive::ChangeScreen(ScreenId::DebugInfo)));

        let d = ctx_for(profile, ScreenId::RecoverySelect, Key::VolUpDownCombo, |ctx| {
            Flow::ManualRecovery.shortcut(ctx)
        });
        assert_eq!(d, None);
    }

    #[test]
    fn developer_shortcuts_need_dev_boot() {
        let profile = DeviceProfile {
            mode: BootMode::Developer,
            flags: ContextFlags {
                developer_mode: true,
                dev_boot_allowed: false,
                ..ContextFlags::default()
            },
            ..DeviceProfile::default()
        };
        let d = ctx_for(profile.clone(), ScreenId::DeveloperToNorm, Key::Ctrl('s'), |ctx| {
            Flow::Developer.shortcut(ctx)
        });
        assert_eq!(d, None);
        let d = ctx_for(profile, ScreenId::DeveloperToNorm, Key::Tab, |ctx| {
            Flow::Developer.shortcut(ctx)
        });
        assert_eq!(d, Some(Directive::ChangeScreen(ScreenId::DebugInfo)));
    }

    #[test]
    fn firmware_sync_notice_is_drawn_once() {
        let mut sim = SimPlatform::new(DeviceProfile::default());
        let mut activity = ActivityLog::memory();
        show_firmware_sync(&mut sim, &Config::default(), &mut activity);
        assert_eq!(sim.frames.len(), 1);
        assert_eq!(sim.frames[0].info.screen, ScreenId::FirmwareSync);
        assert!(activity.of_type(EventType::Warning).is_empty());
        assert_eq!(sim.iterations(), 0);
    }

    #[test]
    fn broken_flow_only_knows_tab() {
        let profile = DeviceProfile {
            mode: BootMode::BrokenScreen,
            ..DeviceProfile::default()
        };
        let d = ctx_for(profile, ScreenId::RecoveryBroken, Key::Ctrl('d'), |ctx| {
            Flow::Broken.shortcut(ctx)
        });
        assert_eq!(d, None);
    }
}
