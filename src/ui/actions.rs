//! Menu item actions and the boot actions shared with global shortcuts.

#![allow(missing_docs)]

use crate::logger::activity::ActivityEvent;
use crate::platform::pal::{BootMode, DiskKind, LoadError, LoadResult};
use crate::ui::directive::{BootTarget, Directive};
use crate::ui::engine::UiContext;
use crate::ui::error::UiError;
use crate::ui::log_pager::Direction;
use crate::ui::screen::ScreenId;
use crate::ui::screens;

/// Everything a menu item can do besides changing screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SelectLanguage,
    PageUp,
    PageDown,
    Back,
    PowerOff,
    BootMinios { non_active_only: bool },
    RecoveryToDevConfirm,
    LaunchDiagnostics,
    BootInternal,
    BootExternal,
    BootAltfw(u32),
    DeveloperToNormConfirm,
    CancelTest,
}

pub fn run(ctx: &mut UiContext<'_>, action: Action) -> Directive {
    match action {
        Action::SelectLanguage => select_language(ctx),
        Action::PageUp => log_page_step(ctx, Direction::Backward),
        Action::PageDown => log_page_step(ctx, Direction::Forward),
        Action::Back => Directive::GoBack,
        Action::PowerOff => Directive::Shutdown,
        Action::BootMinios { non_active_only } => boot_minios(ctx, non_active_only),
        Action::RecoveryToDevConfirm => screens::recovery_to_dev_confirm(ctx),
        Action::LaunchDiagnostics => {
            ctx.platform.request_diagnostics();
            Directive::Reboot { ec_to_ro: false }
        }
        Action::BootInternal => boot_internal(ctx),
        Action::BootExternal => boot_external(ctx),
        Action::BootAltfw(id) => boot_altfw(ctx, id),
        Action::DeveloperToNormConfirm => screens::developer_to_norm_confirm(ctx),
        Action::CancelTest => {
            screens::stop_running_test(ctx);
            Directive::GoBack
        }
    }
}

fn select_language(ctx: &mut UiContext<'_>) -> Directive {
    let Ok(id) = u32::try_from(ctx.state.selected) else {
        return Directive::Continue;
    };
    ctx.locale_id = id;
    ctx.platform.set_locale_id(id);
    if let Err(err) = ctx.platform.commit_nvdata() {
        if ctx.mode != BootMode::ManualRecovery {
            ctx.warn(format!("locale {id} not persisted: {err}"));
        }
    }
    Directive::GoBack
}

fn log_page_step(ctx: &mut UiContext<'_>, dir: Direction) -> Directive {
    let moved = ctx.state.pager.as_mut().is_some_and(|p| p.step(dir));
    if moved {
        if let Err(err) = ctx.log_page_update(None) {
            ctx.warn(format!("log page refresh failed: {err}"));
        }
    }
    Directive::Continue
}

pub fn record_boot(ctx: &mut UiContext<'_>, target: &str, result: &LoadResult) {
    let result = match result {
        Ok(()) => "ok".to_string(),
        Err(LoadError::NoDisk) => "no_disk".to_string(),
        Err(LoadError::Invalid(code)) => format!("invalid:{code:#x}"),
    };
    ctx.activity.record(ActivityEvent::BootAttempted {
        target: target.to_string(),
        result,
    });
}

/// Internet recovery. Only offered in manual recovery.
pub fn boot_minios(ctx: &mut UiContext<'_>, non_active_only: bool) -> Directive {
    if ctx.mode != BootMode::ManualRecovery {
        return Directive::Continue;
    }
    match ctx.platform.load_minios(non_active_only) {
        Ok(()) => {
            record_boot(ctx, "minios", &Ok(()));
            Directive::Exit(BootTarget::MiniOs)
        }
        Err(err) => {
            ctx.activity.record(ActivityEvent::BootAttempted {
                target: "minios".to_string(),
                result: err.to_string(),
            });
            ctx.set_error(UiError::MiniosBootFailed);
            Directive::Continue
        }
    }
}

pub fn boot_internal(ctx: &mut UiContext<'_>) -> Directive {
    let flags = ctx.platform.flags();
    if !flags.developer_mode || !flags.dev_boot_allowed {
        return Directive::Continue;
    }
    let result = ctx.platform.load_kernel(DiskKind::Fixed);
    record_boot(ctx, "internal_disk", &result);
    if result.is_ok() {
        return Directive::Exit(BootTarget::InternalDisk);
    }
    ctx.error_beep = true;
    ctx.set_error(UiError::InternalBootFailed);
    Directive::Continue
}

pub fn external_boot_allowed(ctx: &UiContext<'_>) -> bool {
    let flags = ctx.platform.flags();
    flags.developer_mode && flags.dev_boot_allowed && flags.dev_boot_external_allowed
}

pub fn boot_external(ctx: &mut UiContext<'_>) -> Directive {
    if !external_boot_allowed(ctx) {
        ctx.error_beep = true;
        ctx.set_error(UiError::ExternalBootDisabled);
        return Directive::Continue;
    }
    let result = ctx.platform.load_kernel(DiskKind::Removable);
    record_boot(ctx, "external_disk", &result);
    let target = match result {
        Ok(()) => return Directive::Exit(BootTarget::ExternalDisk),
        Err(LoadError::NoDisk) => ScreenId::DeveloperBootExternal,
        Err(LoadError::Invalid(_)) => ScreenId::DeveloperInvalidDisk,
    };
    if ctx.state.screen == target {
        return Directive::Continue;
    }
    let beep = &ctx.config.developer;
    ctx.platform.beep(beep.beep_ms, beep.beep_hz);
    Directive::ChangeScreen(target)
}

/// Launch bootloader `id`; 0 is the default one.
pub fn boot_altfw(ctx: &mut UiContext<'_>, id: u32) -> Directive {
    let flags = ctx.platform.flags();
    if !(flags.developer_mode && flags.dev_boot_allowed && flags.dev_boot_altfw_allowed) {
        ctx.error_beep = true;
        ctx.set_error(UiError::AltfwDisabled);
        return Directive::Continue;
    }
    if ctx.altfw_count() == 0 {
        ctx.error_beep = true;
        ctx.set_error(UiError::AltfwEmpty);
        return Directive::Continue;
    }
    let launched = ctx.platform.run_altfw(id);
    ctx.activity.record(ActivityEvent::BootAttempted {
        target: format!("altfw:{id}"),
        result: launched
            .as_ref()
            .map_or_else(ToString::to_string, |_| "ok".to_string()),
    });
    if launched.is_ok() {
        return Directive::Exit(BootTarget::AltFirmware(id));
    }
    ctx.error_beep = true;
    ctx.set_error(UiError::AltfwFailed);
    Directive::Continue
}
