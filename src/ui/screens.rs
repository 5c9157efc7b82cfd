//! The screen catalogue: static descriptors, their menus and hooks.

#![allow(missing_docs)]

use crate::core::errors::RuiError;
use crate::diag::health::dump_all_health_info;
use crate::diag::memory::{MemoryTest, MemoryTestMode};
use crate::diag::report::{DiagTestResult, DiagTestType};
use crate::diag::storage_test::{PollStatus, TestKind, test_device, test_support};
use crate::diag::TextBuffer;
use crate::logger::activity::ActivityEvent;
use crate::platform::pal::{
    AltFwEntry, BootMode, DevDefaultBoot, DiskKind, Key, LoadError, LoadResult, Platform,
};
use crate::ui::actions::{self, Action};
use crate::ui::directive::Directive;
use crate::ui::engine::UiContext;
use crate::ui::error::UiError;
use crate::ui::log_pager::Direction;
use crate::ui::screen::{Icon, ItemTarget, MenuItem, MenuSource, Screen, ScreenId, Step};

/// Battery level below which the step-1 screens warn about charging.
const LOW_BATTERY_PERCENT: u8 = 10;

// ──────────────────── shared items ────────────────────

const LANGUAGE: MenuItem =
    MenuItem::to_screen("Language", "language.bmp", ScreenId::LanguageSelect).language();
const NEXT_PHONE: MenuItem = MenuItem::to_screen("Next", "btn_next.bmp", ScreenId::PhoneStep2);
const NEXT_DISK2: MenuItem = MenuItem::to_screen("Next", "btn_next.bmp", ScreenId::DiskStep2);
const NEXT_DISK3: MenuItem = MenuItem::to_screen("Next", "btn_next.bmp", ScreenId::DiskStep3);
const BACK: MenuItem = MenuItem::action("Back", "btn_back.bmp", Action::Back);
const CANCEL_TEST: MenuItem = MenuItem::action("Cancel", "btn_cancel.bmp", Action::CancelTest);
const PAGE_UP: MenuItem = MenuItem::action("Page up", "btn_page_up.bmp", Action::PageUp)
    .with_disabled_help("btn_page_up_disabled.bmp");
const PAGE_DOWN: MenuItem = MenuItem::action("Page down", "btn_page_down.bmp", Action::PageDown)
    .with_disabled_help("btn_page_down_disabled.bmp");
const ADVANCED_OPTIONS: MenuItem = MenuItem::to_screen(
    "Advanced options",
    "btn_adv_options.bmp",
    ScreenId::AdvancedOptions,
)
.secondary("ic_settings.bmp");
const POWER_OFF: MenuItem = MenuItem::action("Power off", "btn_power_off.bmp", Action::PowerOff)
    .secondary("ic_power.bmp")
    .without_arrow();

// ──────────────────── menus ────────────────────

const RECOVERY_BROKEN_ITEMS: &[MenuItem] = &[LANGUAGE, ADVANCED_OPTIONS, POWER_OFF];

const ADVANCED_OPTIONS_ITEMS: &[MenuItem] = &[
    LANGUAGE,
    MenuItem::to_screen("Enable developer mode", "btn_dev_mode.bmp", ScreenId::RecoveryToDev),
    MenuItem::to_screen("Debug info", "btn_debug_info.bmp", ScreenId::DebugInfo),
    MenuItem::to_screen("Firmware log", "btn_firmware_log.bmp", ScreenId::FirmwareLog),
    MenuItem::action(
        "Internet recovery (older version)",
        "btn_rec_by_internet_old.bmp",
        Action::BootMinios { non_active_only: true },
    ),
    BACK,
    POWER_OFF,
];

const LOG_ITEMS: &[MenuItem] = &[LANGUAGE, PAGE_UP, PAGE_DOWN, BACK, POWER_OFF];

const RECOVERY_TO_DEV_ITEMS: &[MenuItem] = &[
    LANGUAGE,
    MenuItem::action("Confirm", "btn_confirm.bmp", Action::RecoveryToDevConfirm),
    MenuItem::action("Cancel", "btn_cancel.bmp", Action::Back),
    POWER_OFF,
];

const RECOVERY_SELECT_ITEMS: &[MenuItem] = &[
    LANGUAGE,
    MenuItem::to_screen("Recovery using phone", "btn_rec_by_phone.bmp", ScreenId::PhoneStep1),
    MenuItem::to_screen("Recovery using disk", "btn_rec_by_disk.bmp", ScreenId::DiskStep1),
    MenuItem::action(
        "Internet recovery",
        "btn_rec_by_internet.bmp",
        Action::BootMinios { non_active_only: false },
    ),
    MenuItem::action("Launch diagnostics", "btn_launch_diag.bmp", Action::LaunchDiagnostics)
        .secondary("ic_search.bmp")
        .without_arrow(),
    ADVANCED_OPTIONS,
    POWER_OFF,
];

const PHONE_STEP1_ITEMS: &[MenuItem] = &[LANGUAGE, NEXT_PHONE, BACK, POWER_OFF];
const DISK_STEP1_ITEMS: &[MenuItem] = &[LANGUAGE, NEXT_DISK2, BACK, POWER_OFF];
const DISK_STEP2_ITEMS: &[MenuItem] = &[LANGUAGE, NEXT_DISK3, BACK, POWER_OFF];
const STEP_END_ITEMS: &[MenuItem] = &[LANGUAGE, BACK, POWER_OFF];
const RECOVERY_INVALID_ITEMS: &[MenuItem] = &[LANGUAGE, POWER_OFF];

const DEVELOPER_MODE_ITEMS: &[MenuItem] = &[
    LANGUAGE,
    MenuItem::to_screen("Return to secure mode", "btn_secure_mode.bmp", ScreenId::DeveloperToNorm),
    MenuItem::action("Boot from internal disk", "btn_int_disk.bmp", Action::BootInternal),
    MenuItem::action("Boot from external disk", "btn_ext_disk.bmp", Action::BootExternal),
    MenuItem::to_screen(
        "Select alternate bootloader",
        "btn_alt_bootloader.bmp",
        ScreenId::SelectAltfw,
    ),
    ADVANCED_OPTIONS,
    POWER_OFF,
];

const DEVELOPER_TO_NORM_ITEMS: &[MenuItem] = &[
    LANGUAGE,
    MenuItem::action("Confirm", "btn_confirm.bmp", Action::DeveloperToNormConfirm),
    MenuItem::action("Cancel", "btn_cancel.bmp", Action::Back),
    POWER_OFF,
];

const DIAGNOSTICS_ITEMS: &[MenuItem] = &[
    LANGUAGE,
    MenuItem::to_screen("Storage health info", "btn_diag_storage_health.bmp", ScreenId::StorageHealth),
    MenuItem::to_screen(
        "Storage self-test (short)",
        "btn_diag_storage_short_test.bmp",
        ScreenId::StorageTestShort,
    ),
    MenuItem::to_screen(
        "Storage self-test (extended)",
        "btn_diag_storage_ext_test.bmp",
        ScreenId::StorageTestExtended,
    ),
    MenuItem::to_screen("Memory check (quick)", "btn_diag_memory_quick.bmp", ScreenId::MemoryQuick),
    MenuItem::to_screen("Memory check (full)", "btn_diag_memory_full.bmp", ScreenId::MemoryFull),
    POWER_OFF,
];

const STORAGE_HEALTH_ITEMS: &[MenuItem] = &[PAGE_UP, PAGE_DOWN, BACK, POWER_OFF];
const TEST_ITEMS: &[MenuItem] = &[PAGE_UP, PAGE_DOWN, BACK, CANCEL_TEST, POWER_OFF];

/// One item per locale. Labels come from the display's locale table.
pub fn language_menu(platform: &dyn Platform) -> Vec<MenuItem> {
    (0..platform.locale_count())
        .map(|id| {
            let label = platform
                .locale_code(id)
                .unwrap_or_else(|| format!("locale {id}"));
            MenuItem::dynamic(label, ItemTarget::Action(Action::SelectLanguage))
        })
        .collect()
}

/// Bootloader menu plus the number of bootloaders in it. Entries with a
/// zero sequence number are not bootable and are skipped.
pub fn altfw_menu(entries: &[AltFwEntry]) -> (Vec<MenuItem>, usize) {
    let mut items = vec![LANGUAGE];
    let mut id: u32 = 0;
    for entry in entries.iter().filter(|e| e.seqnum != 0) {
        id += 1;
        let label = if entry.name.is_empty() {
            entry.filename.clone()
        } else {
            entry.name.clone()
        };
        items.push(MenuItem::dynamic(
            label,
            ItemTarget::Action(Action::BootAltfw(id)),
        ));
    }
    let count = items.len() - 1;
    items.push(BACK);
    items.push(POWER_OFF);
    (items, count)
}

// ──────────────────── registry ────────────────────

static FIRMWARE_SYNC: Screen = Screen {
    title: Some("firmware_sync_title.bmp"),
    desc: &["firmware_sync_desc.bmp"],
    no_footer: true,
    ..Screen::base(
        ScreenId::FirmwareSync,
        "Firmware sync",
        "Please do not power off your device.\nYour system is applying a critical update.",
    )
};

static LANGUAGE_SELECT: Screen = Screen {
    menu: MenuSource::Dynamic,
    init: Some(language_select_init),
    ..Screen::base(ScreenId::LanguageSelect, "Language selection", "Language selection")
};

static RECOVERY_BROKEN: Screen = Screen {
    icon: Icon::Info,
    title: Some("broken_title.bmp"),
    desc: &["broken_desc.bmp"],
    menu: MenuSource::Static(RECOVERY_BROKEN_ITEMS),
    ..Screen::base(
        ScreenId::RecoveryBroken,
        "Recover broken device",
        "Something is wrong. Please remove all connected devices.\nTo initiate recovery on a:\n* Chromebook: Hold down Escape, Refresh, and Power buttons\n* Chromebox/Chromebit: Hold down the Recovery button, press Power, release the Recovery button\n* Tablet: Hold down Power, Volume Up, Volume Down buttons for 10s",
    )
};

static ADVANCED_OPTIONS_SCREEN: Screen = Screen {
    icon: Icon::Info,
    title: Some("adv_options_title.bmp"),
    menu: MenuSource::Static(ADVANCED_OPTIONS_ITEMS),
    init: Some(advanced_options_init),
    ..Screen::base(ScreenId::AdvancedOptions, "Advanced options", "Advanced options")
};

static DEBUG_INFO: Screen = Screen {
    title: Some("debug_info_title.bmp"),
    menu: MenuSource::Static(LOG_ITEMS),
    init: Some(debug_info_init),
    reinit: Some(debug_info_reinit),
    action: Some(log_anchor_action),
    ..Screen::base(ScreenId::DebugInfo, "Debug info", "Debug info")
};

static FIRMWARE_LOG: Screen = Screen {
    title: Some("firmware_log_title.bmp"),
    menu: MenuSource::Static(LOG_ITEMS),
    init: Some(firmware_log_init),
    reinit: Some(firmware_log_reinit),
    action: Some(log_anchor_action),
    ..Screen::base(ScreenId::FirmwareLog, "Firmware log", "Firmware log")
};

static RECOVERY_TO_DEV: Screen = Screen {
    icon: Icon::DevMode,
    title: Some("rec_to_dev_title.bmp"),
    menu: MenuSource::Static(RECOVERY_TO_DEV_ITEMS),
    init: Some(recovery_to_dev_init),
    action: Some(recovery_to_dev_action),
    draw_desc: Some(recovery_to_dev_desc),
    ..Screen::base(
        ScreenId::RecoveryToDev,
        "Transition to developer mode",
        "You are attempting to enable developer mode\nThis involves erasing all data from your device,\nand will make your device insecure.\nSelect \"Confirm\" or press the RECOVERY/POWER button to\nenable developer mode,\nor select \"Cancel\" to remain protected",
    )
};

static RECOVERY_SELECT: Screen = Screen {
    icon: Icon::Info,
    title: Some("rec_sel_title.bmp"),
    menu: MenuSource::Static(RECOVERY_SELECT_ITEMS),
    init: Some(recovery_select_init),
    draw_desc: Some(recovery_select_desc),
    ..Screen::base(
        ScreenId::RecoverySelect,
        "Recovery method selection",
        "Select how you'd like to recover.\nYou can recover using a USB drive or an SD card.",
    )
};

static PHONE_STEP1: Screen = Screen {
    title: Some("rec_phone_step1_title.bmp"),
    step: Some(Step { current: 1, total: 3 }),
    menu: MenuSource::Static(PHONE_STEP1_ITEMS),
    draw_desc: Some(phone_step1_desc),
    ..Screen::base(
        ScreenId::PhoneStep1,
        "Phone recovery step 1",
        "To proceed with the recovery process, you'll need\n1. An Android phone with internet access\n2. A USB cable which connects your phone and this device\nWe also recommend that you connect to a power source during\nthe recovery process.",
    )
};

static PHONE_STEP2: Screen = Screen {
    title: Some("rec_phone_step2_title.bmp"),
    desc: &["rec_phone_step2_desc.bmp"],
    step: Some(Step { current: 2, total: 3 }),
    menu: MenuSource::Static(STEP_END_ITEMS),
    ..Screen::base(
        ScreenId::PhoneStep2,
        "Phone recovery step 2",
        "Download the Chrome OS recovery app on your Android phone\nby plugging in your phone or by scanning the QR code on the\nright. Once you launch the app, connect your phone to your\ndevice and recovery will start automatically.",
    )
};

static DISK_STEP1: Screen = Screen {
    title: Some("rec_disk_step1_title.bmp"),
    step: Some(Step { current: 1, total: 3 }),
    menu: MenuSource::Static(DISK_STEP1_ITEMS),
    draw_desc: Some(disk_step1_desc),
    ..Screen::base(
        ScreenId::DiskStep1,
        "Disk recovery step 1",
        "To proceed with the recovery process, you'll need\n1. An external storage disk such as a USB drive or an SD card\n2. An additional device with internet access\nWe also recommend that you connect to a power source during\nthe recovery process.",
    )
};

static DISK_STEP2: Screen = Screen {
    title: Some("rec_disk_step2_title.bmp"),
    desc: &["rec_disk_step2_desc0.bmp", "rec_disk_step2_desc1.bmp", "rec_disk_step2_desc2.bmp"],
    step: Some(Step { current: 2, total: 3 }),
    menu: MenuSource::Static(DISK_STEP2_ITEMS),
    ..Screen::base(
        ScreenId::DiskStep2,
        "Disk recovery step 2",
        "External disk setup.\nGo to google.com/chromeos/recovery on another computer and install\nthe Chrome extension. Follow instructions on the Chrome extension, and\ndownload the recovery image onto an external disk.",
    )
};

static DISK_STEP3: Screen = Screen {
    title: Some("rec_disk_step3_title.bmp"),
    desc: &["rec_disk_step3_desc0.bmp"],
    step: Some(Step { current: 3, total: 3 }),
    menu: MenuSource::Static(STEP_END_ITEMS),
    ..Screen::base(
        ScreenId::DiskStep3,
        "Disk recovery step 3",
        "Do you have your external disk ready?\nIf your external disk is ready with a recovery image, plug it into the device to start the recovery process.",
    )
};

static RECOVERY_INVALID: Screen = Screen {
    icon: Icon::Error,
    title: Some("rec_invalid_title.bmp"),
    step: Some(Step { current: -3, total: 3 }),
    menu: MenuSource::Static(RECOVERY_INVALID_ITEMS),
    draw_desc: Some(recovery_invalid_desc),
    ..Screen::base(
        ScreenId::RecoveryInvalid,
        "Invalid external disk inserted",
        "No valid image detected.\nMake sure your external disk has a valid recovery image,\nand re-insert the disk when ready.",
    )
};

static DEVELOPER_MODE: Screen = Screen {
    icon: Icon::DevMode,
    title: Some("dev_title.bmp"),
    menu: MenuSource::Static(DEVELOPER_MODE_ITEMS),
    init: Some(developer_mode_init),
    action: Some(developer_mode_action),
    draw_desc: Some(developer_mode_desc),
    ..Screen::base(
        ScreenId::DeveloperMode,
        "Developer mode",
        "You are in developer mode\nTo return to the recommended secure mode,\nselect \"Return to secure mode\" below.\nAfter timeout, the device will automatically boot from\nthe default boot target.",
    )
};

static DEVELOPER_TO_NORM: Screen = Screen {
    icon: Icon::Restart,
    title: Some("dev_to_norm_title.bmp"),
    desc: &["dev_to_norm_desc0.bmp", "dev_to_norm_desc1.bmp"],
    menu: MenuSource::Static(DEVELOPER_TO_NORM_ITEMS),
    init: Some(developer_to_norm_init),
    ..Screen::base(
        ScreenId::DeveloperToNorm,
        "Transition to normal mode",
        "Confirm returning to secure mode.\nThis option will disable developer mode and restore your device to its\noriginal state.\nYour user data will be wiped in the process.",
    )
};

static DEVELOPER_BOOT_EXTERNAL: Screen = Screen {
    title: Some("dev_boot_ext_title.bmp"),
    desc: &["dev_boot_ext_desc0.bmp"],
    menu: MenuSource::Static(STEP_END_ITEMS),
    init: Some(developer_boot_external_init),
    reinit: Some(developer_boot_external_init),
    action: Some(actions::boot_external),
    ..Screen::base(
        ScreenId::DeveloperBootExternal,
        "Developer boot from external disk",
        "Plug in your external disk\nIf your external disk is ready with a Chrome OS image,\nplug it into the device to boot.",
    )
};

static DEVELOPER_INVALID_DISK: Screen = Screen {
    icon: Icon::Error,
    title: Some("dev_invalid_disk_title.bmp"),
    desc: &["dev_invalid_disk_desc0.bmp"],
    menu: MenuSource::Static(STEP_END_ITEMS),
    init: Some(developer_invalid_disk_init),
    reinit: Some(developer_invalid_disk_init),
    action: Some(actions::boot_external),
    ..Screen::base(
        ScreenId::DeveloperInvalidDisk,
        "Invalid external disk inserted",
        "No valid image detected.\nMake sure your external disk has a valid Chrome OS image,\nand re-insert the disk when ready.",
    )
};

static SELECT_ALTFW: Screen = Screen {
    icon: Icon::DevMode,
    title: Some("dev_select_bootloader_title.bmp"),
    menu: MenuSource::Dynamic,
    init: Some(select_altfw_init),
    ..Screen::base(ScreenId::SelectAltfw, "Select alternate bootloader", "Select an alternate bootloader")
};

static DIAGNOSTICS: Screen = Screen {
    title: Some("diag_menu_title.bmp"),
    desc: &["diag_menu_desc0.bmp"],
    menu: MenuSource::Static(DIAGNOSTICS_ITEMS),
    init: Some(diagnostics_init),
    ..Screen::base(ScreenId::Diagnostics, "Diagnostic tools", "Diagnostic tools")
};

static STORAGE_HEALTH: Screen = Screen {
    title: Some("diag_storage_health_title.bmp"),
    menu: MenuSource::Static(STORAGE_HEALTH_ITEMS),
    init: Some(storage_health_init),
    ..Screen::base(ScreenId::StorageHealth, "Storage health info", "Storage health info")
};

static STORAGE_TEST_SHORT: Screen = Screen {
    title: Some("diag_storage_srt_test_title.bmp"),
    menu: MenuSource::Static(TEST_ITEMS),
    init: Some(storage_test_short_init),
    action: Some(storage_test_update),
    exit: Some(stop_running_test),
    ..Screen::base(ScreenId::StorageTestShort, "Storage self-test (short)", "Storage self test (short)")
};

static STORAGE_TEST_EXTENDED: Screen = Screen {
    title: Some("diag_storage_ext_test_title.bmp"),
    menu: MenuSource::Static(TEST_ITEMS),
    init: Some(storage_test_extended_init),
    action: Some(storage_test_update),
    exit: Some(stop_running_test),
    ..Screen::base(
        ScreenId::StorageTestExtended,
        "Storage self-test (extended)",
        "Storage self test (extended)",
    )
};

static MEMORY_QUICK: Screen = Screen {
    title: Some("diag_memory_quick_title.bmp"),
    menu: MenuSource::Static(TEST_ITEMS),
    init: Some(memory_quick_init),
    action: Some(memory_test_update),
    exit: Some(stop_running_test),
    ..Screen::base(ScreenId::MemoryQuick, "Memory check (quick)", "Memory check (quick)")
};

static MEMORY_FULL: Screen = Screen {
    title: Some("diag_memory_full_title.bmp"),
    menu: MenuSource::Static(TEST_ITEMS),
    init: Some(memory_full_init),
    action: Some(memory_test_update),
    exit: Some(stop_running_test),
    ..Screen::base(ScreenId::MemoryFull, "Memory check (full)", "Memory check (full)")
};

pub fn get(id: ScreenId) -> &'static Screen {
    match id {
        ScreenId::FirmwareSync => &FIRMWARE_SYNC,
        ScreenId::LanguageSelect => &LANGUAGE_SELECT,
        ScreenId::RecoveryBroken => &RECOVERY_BROKEN,
        ScreenId::AdvancedOptions => &ADVANCED_OPTIONS_SCREEN,
        ScreenId::DebugInfo => &DEBUG_INFO,
        ScreenId::FirmwareLog => &FIRMWARE_LOG,
        ScreenId::RecoveryToDev => &RECOVERY_TO_DEV,
        ScreenId::RecoverySelect => &RECOVERY_SELECT,
        ScreenId::PhoneStep1 => &PHONE_STEP1,
        ScreenId::PhoneStep2 => &PHONE_STEP2,
        ScreenId::DiskStep1 => &DISK_STEP1,
        ScreenId::DiskStep2 => &DISK_STEP2,
        ScreenId::DiskStep3 => &DISK_STEP3,
        ScreenId::RecoveryInvalid => &RECOVERY_INVALID,
        ScreenId::DeveloperMode => &DEVELOPER_MODE,
        ScreenId::DeveloperToNorm => &DEVELOPER_TO_NORM,
        ScreenId::DeveloperBootExternal => &DEVELOPER_BOOT_EXTERNAL,
        ScreenId::DeveloperInvalidDisk => &DEVELOPER_INVALID_DISK,
        ScreenId::SelectAltfw => &SELECT_ALTFW,
        ScreenId::Diagnostics => &DIAGNOSTICS,
        ScreenId::StorageHealth => &STORAGE_HEALTH,
        ScreenId::StorageTestShort => &STORAGE_TEST_SHORT,
        ScreenId::StorageTestExtended => &STORAGE_TEST_EXTENDED,
        ScreenId::MemoryQuick => &MEMORY_QUICK,
        ScreenId::MemoryFull => &MEMORY_FULL,
    }
}

// ──────────────────── language / advanced options ────────────────────

fn language_select_init(ctx: &mut UiContext<'_>) -> Directive {
    let count = ctx.menu().len();
    let Ok(current) = usize::try_from(ctx.locale_id) else {
        return Directive::Continue;
    };
    if current < count {
        ctx.state.selected = current;
    }
    Directive::Continue
}

fn advanced_options_init(ctx: &mut UiContext<'_>) -> Directive {
    ctx.state.selected = 1;
    if ctx.platform.flags().developer_mode || ctx.mode != BootMode::ManualRecovery {
        ctx.state.hidden.insert(1);
        ctx.state.selected = 2;
    }
    if ctx.mode != BootMode::ManualRecovery {
        ctx.state.hidden.insert(4);
    }
    Directive::Continue
}

// ──────────────────── log screens ────────────────────

fn show_log(ctx: &mut UiContext<'_>, text: Option<String>, error: UiError) -> Directive {
    let Some(text) = text else {
        return ctx.set_error_and_back(error);
    };
    if let Err(err) = ctx.log_page_update(Some(&text)) {
        ctx.warn(format!("{}: {err}", ctx.state.screen.name()));
        return ctx.set_error_and_back(error);
    }
    Directive::Continue
}

fn fetch_debug_info(ctx: &mut UiContext<'_>) -> Option<String> {
    match ctx.platform.debug_info() {
        Ok(text) => Some(text),
        Err(err) => {
            ctx.warn(format!("debug info unavailable: {err}"));
            None
        }
    }
}

fn fetch_firmware_log(ctx: &mut UiContext<'_>, reset: bool) -> Option<String> {
    match ctx.platform.firmware_log(reset) {
        Ok(text) => Some(text),
        Err(err) => {
            ctx.warn(format!("firmware log unavailable: {err}"));
            None
        }
    }
}

fn reset_log_to_top(ctx: &mut UiContext<'_>, error: UiError) -> Directive {
    match ctx.log_page_reset_to_top() {
        Ok(()) => Directive::Continue,
        Err(_) => ctx.set_error_and_back(error),
    }
}

fn debug_info_init(ctx: &mut UiContext<'_>) -> Directive {
    let text = fetch_debug_info(ctx);
    let d = show_log(ctx, text, UiError::DebugLog);
    if d != Directive::Continue {
        return d;
    }
    reset_log_to_top(ctx, UiError::DebugLog)
}

fn debug_info_reinit(ctx: &mut UiContext<'_>) -> Directive {
    let text = fetch_debug_info(ctx);
    show_log(ctx, text, UiError::DebugLog)
}

fn firmware_log_init(ctx: &mut UiContext<'_>) -> Directive {
    let text = fetch_firmware_log(ctx, true);
    let d = show_log(ctx, text, UiError::FirmwareLog);
    if d != Directive::Continue {
        return d;
    }
    apply_log_anchors(ctx);
    reset_log_to_top(ctx, UiError::FirmwareLog)
}

fn firmware_log_reinit(ctx: &mut UiContext<'_>) -> Directive {
    let text = fetch_firmware_log(ctx, false);
    let d = show_log(ctx, text, UiError::FirmwareLog);
    apply_log_anchors(ctx);
    d
}

fn apply_log_anchors(ctx: &mut UiContext<'_>) {
    let anchors = &ctx.config.log_view.firmware_log_anchors;
    if let Some(pager) = ctx.state.pager.as_mut() {
        pager.set_anchors(anchors.as_slice());
    }
}

/// Left and right jump between pages that carry an anchor.
fn log_anchor_action(ctx: &mut UiContext<'_>) -> Directive {
    let dir = match ctx.key.map(|k| k.key) {
        Some(Key::Left) => Direction::Backward,
        Some(Key::Right) => Direction::Forward,
        _ => return Directive::Continue,
    };
    let jumped = ctx
        .state
        .pager
        .as_mut()
        .and_then(|p| p.jump_anchor(dir))
        .is_some();
    if jumped {
        if let Err(err) = ctx.log_page_update(None) {
            ctx.warn(format!("log page refresh failed: {err}"));
        }
    }
    Directive::Continue
}

// ──────────────────── recovery ────────────────────

fn recovery_to_dev_init(ctx: &mut UiContext<'_>) -> Directive {
    if ctx.platform.flags().developer_mode {
        return ctx.set_error_and_back(UiError::DevModeAlreadyEnabled);
    }
    let keyboard = ctx.config.ui.physical_presence_keyboard;
    if !keyboard && ctx.platform.physical_presence_pressed() {
        ctx.warn("presence button held on entry; release it and try again");
        return Directive::GoBack;
    }
    if keyboard {
        ctx.state.selected = 1;
    } else {
        ctx.state.hidden.insert(1);
        ctx.state.selected = 2;
    }
    ctx.presence_pressed = false;
    Directive::Continue
}

fn recovery_to_dev_finalize(ctx: &mut UiContext<'_>) -> Directive {
    if ctx.state.screen != ScreenId::RecoveryToDev
        || ctx.mode != BootMode::ManualRecovery
        || ctx.platform.flags().developer_mode
    {
        return Directive::Continue;
    }
    match ctx.platform.enable_developer_mode() {
        Ok(()) => Directive::Reboot { ec_to_ro: true },
        Err(err) => {
            ctx.warn(format!("enabling developer mode failed: {err}"));
            Directive::Continue
        }
    }
}

pub fn recovery_to_dev_confirm(ctx: &mut UiContext<'_>) -> Directive {
    let Some(press) = ctx.key else {
        return Directive::Continue;
    };
    if !press.trusted {
        if ctx.config.ui.physical_presence_keyboard && press.key == Key::Enter {
            ctx.set_error(UiError::UntrustedConfirmation);
        }
        return Directive::Continue;
    }
    recovery_to_dev_finalize(ctx)
}

fn recovery_to_dev_action(ctx: &mut UiContext<'_>) -> Directive {
    if ctx.key.map(|k| k.key) == Some(Key::Space) {
        return Directive::GoBack;
    }
    if ctx.config.ui.physical_presence_keyboard {
        return Directive::Continue;
    }
    if ctx.platform.physical_presence_pressed() {
        ctx.presence_pressed = true;
        return Directive::Continue;
    }
    if ctx.presence_pressed {
        ctx.presence_pressed = false;
        return recovery_to_dev_finalize(ctx);
    }
    Directive::Continue
}

fn recovery_to_dev_desc(ctx: &UiContext<'_>) -> Vec<&'static str> {
    if ctx.config.ui.physical_presence_keyboard {
        vec!["rec_to_dev_desc0.bmp", "rec_to_dev_desc1.bmp"]
    } else {
        vec!["rec_to_dev_desc0.bmp", "rec_to_dev_desc1_phyrec.bmp"]
    }
}

fn recovery_select_init(ctx: &mut UiContext<'_>) -> Directive {
    ctx.state.selected = 1;
    if !ctx.platform.phone_recovery_enabled() {
        ctx.state.hidden.insert(1);
        ctx.state.selected = 2;
    }
    if !ctx.platform.diagnostic_ui_enabled() {
        ctx.state.hidden.insert(4);
    }
    Directive::Continue
}

fn recovery_select_desc(ctx: &UiContext<'_>) -> Vec<&'static str> {
    if ctx.platform.phone_recovery_enabled() {
        vec!["rec_sel_desc0.bmp", "rec_sel_desc1.bmp"]
    } else {
        vec!["rec_sel_desc0.bmp", "rec_sel_desc1_no_phone.bmp"]
    }
}

fn low_battery(ctx: &UiContext<'_>) -> bool {
    ctx.platform
        .battery_percent()
        .is_some_and(|p| p < LOW_BATTERY_PERCENT)
}

fn phone_step1_desc(ctx: &UiContext<'_>) -> Vec<&'static str> {
    let mut files = vec![
        "rec_phone_step1_desc0.bmp",
        "rec_phone_step1_desc1.bmp",
        "rec_phone_step1_desc2.bmp",
    ];
    if low_battery(ctx) {
        files.push("rec_step1_desc_low_battery.bmp");
    }
    files
}

fn disk_step1_desc(ctx: &UiContext<'_>) -> Vec<&'static str> {
    let mut files = vec!["rec_disk_step1_desc0.bmp", "rec_disk_step1_desc1.bmp"];
    if low_battery(ctx) {
        files.push("rec_step1_desc_low_battery.bmp");
    }
    files
}

fn recovery_invalid_desc(ctx: &UiContext<'_>) -> Vec<&'static str> {
    if ctx.platform.phone_recovery_enabled() {
        vec!["rec_invalid_desc.bmp"]
    } else {
        vec!["rec_invalid_disk_desc.bmp"]
    }
}

// ──────────────────── developer ────────────────────

fn developer_mode_init(ctx: &mut UiContext<'_>) -> Directive {
    let flags = ctx.platform.flags();
    if ctx.platform.gbb_flags().force_dev_switch_on {
        ctx.state.hidden.insert(1);
    }
    let external = actions::external_boot_allowed(ctx);
    let altfw = flags.dev_boot_allowed && flags.dev_boot_altfw_allowed;
    if !external {
        ctx.state.hidden.insert(3);
    }
    if !altfw {
        ctx.state.hidden.insert(4);
    }
    ctx.state.selected = match ctx.platform.dev_default_boot() {
        DevDefaultBoot::External if external => 3,
        DevDefaultBoot::Altfw if altfw => 4,
        _ => 2,
    };
    ctx.start_time_us = ctx.now_us();
    ctx.beep_count = 0;
    Directive::Continue
}

fn developer_mode_action(ctx: &mut UiContext<'_>) -> Directive {
    if ctx.key.is_some() {
        ctx.disable_timer = true;
    }
    if ctx.disable_timer {
        return Directive::Continue;
    }
    let dev = &ctx.config.developer;
    let elapsed_ms = ctx.now_us().saturating_sub(ctx.start_time_us) / 1_000;
    let delay_ms = if ctx.platform.gbb_flags().dev_screen_short_delay {
        dev.delay_short_ms
    } else {
        dev.delay_normal_ms
    };
    if elapsed_ms >= delay_ms {
        ctx.disable_timer = true;
        return boot_default_target(ctx);
    }
    let due = match ctx.beep_count {
        0 => elapsed_ms >= dev.first_beep_ms,
        1 => elapsed_ms >= dev.second_beep_ms,
        _ => false,
    };
    if due {
        let (ms, hz) = (dev.beep_ms, dev.beep_hz);
        ctx.platform.beep(ms, hz);
        ctx.beep_count += 1;
    }
    Directive::Continue
}

fn boot_default_target(ctx: &mut UiContext<'_>) -> Directive {
    match ctx.platform.dev_default_boot() {
        DevDefaultBoot::External => actions::boot_external(ctx),
        DevDefaultBoot::Altfw => actions::boot_altfw(ctx, 0),
        DevDefaultBoot::Internal => actions::boot_internal(ctx),
    }
}

fn developer_mode_desc(ctx: &UiContext<'_>) -> Vec<&'static str> {
    let mut files = Vec::new();
    if !ctx.state.hidden.contains(1) {
        files.push("dev_desc0.bmp");
    }
    if !ctx.disable_timer {
        files.push("dev_desc1.bmp");
    }
    files
}

fn developer_to_norm_init(ctx: &mut UiContext<'_>) -> Directive {
    if ctx.platform.gbb_flags().force_dev_switch_on {
        return ctx.set_error_and_back(UiError::ToNormNotAllowed);
    }
    ctx.state.selected = 1;
    if !ctx.platform.flags().dev_boot_allowed {
        ctx.state.hidden.insert(2);
    }
    Directive::Continue
}

pub fn developer_to_norm_confirm(ctx: &mut UiContext<'_>) -> Directive {
    if ctx.platform.gbb_flags().force_dev_switch_on {
        return Directive::Continue;
    }
    match ctx.platform.disable_developer_mode() {
        Ok(()) => Directive::Reboot { ec_to_ro: false },
        Err(err) => {
            ctx.warn(format!("disabling developer mode failed: {err}"));
            Directive::Continue
        }
    }
}

/// Shared entry check for the external disk screens. Returns the load
/// result when the screen may stay.
fn external_disk_probe(ctx: &mut UiContext<'_>) -> Result<LoadResult, Directive> {
    ctx.state.selected = 1;
    if !actions::external_boot_allowed(ctx) {
        ctx.error_beep = true;
        return Err(ctx.set_error_and_back(UiError::ExternalBootDisabled));
    }
    let result = ctx.platform.load_kernel(DiskKind::Removable);
    actions::record_boot(ctx, "external_disk", &result);
    Ok(result)
}

fn developer_boot_external_init(ctx: &mut UiContext<'_>) -> Directive {
    match external_disk_probe(ctx) {
        Err(d) => d,
        Ok(Err(LoadError::NoDisk)) => Directive::Continue,
        Ok(_) => Directive::GoBack,
    }
}

fn developer_invalid_disk_init(ctx: &mut UiContext<'_>) -> Directive {
    match external_disk_probe(ctx) {
        Err(d) => d,
        Ok(Err(LoadError::Invalid(_))) => Directive::Continue,
        Ok(_) => Directive::GoBack,
    }
}

fn select_altfw_init(ctx: &mut UiContext<'_>) -> Directive {
    if ctx.altfw_count() == 0 {
        ctx.error_beep = true;
        return ctx.set_error_and_back(UiError::AltfwEmpty);
    }
    ctx.state.selected = 1;
    Directive::Continue
}

// ──────────────────── diagnostics ────────────────────

fn diagnostics_init(ctx: &mut UiContext<'_>) -> Directive {
    let support = test_support(&mut *ctx.platform);
    ctx.state.disabled.set(2, !support.supports(TestKind::Short));
    ctx.state.disabled.set(3, !support.supports(TestKind::Extended));
    ctx.state.selected = 1;
    Directive::Continue
}

fn record_test_started(ctx: &mut UiContext<'_>, test: DiagTestType) {
    ctx.state.test_finished = false;
    ctx.activity
        .record(ActivityEvent::TestStarted { test: test.name() });
}

/// Log the newest report event as the outcome of the test that just ended.
fn record_test_finished(ctx: &mut UiContext<'_>) {
    ctx.state.test_finished = true;
    if let Some(event) = ctx.report.events().newest_first().next().copied() {
        ctx.activity.record(ActivityEvent::TestFinished {
            test: event.test.name(),
            result: event.result.name(),
            elapsed_s: event.elapsed_s,
        });
    }
}

fn storage_health_init(ctx: &mut UiContext<'_>) -> Directive {
    let now = ctx.now_us();
    ctx.report.start_test(DiagTestType::StorageHealth, now);
    record_test_started(ctx, DiagTestType::StorageHealth);

    let mut text = TextBuffer::new(ctx.config.diagnostics.memory_output_bytes);
    let dumped = dump_all_health_info(&mut *ctx.platform, &mut text);
    let result = if dumped.is_ok() {
        DiagTestResult::Passed
    } else {
        DiagTestResult::Error
    };
    let now = ctx.now_us();
    ctx.report.end_test(result, now);
    record_test_finished(ctx);

    if let Err(err) = dumped {
        ctx.warn(format!("storage health: {err}"));
        return ctx.set_error_and_back(UiError::Diagnostics);
    }
    if let Err(err) = ctx.log_page_update(Some(text.as_str())) {
        ctx.warn(format!("storage health: {err}"));
        return ctx.set_error_and_back(UiError::Diagnostics);
    }
    reset_log_to_top(ctx, UiError::Diagnostics)
}

fn storage_test_init(ctx: &mut UiContext<'_>, kind: TestKind) -> Directive {
    let now = ctx.now_us();
    let started = match test_device(&mut *ctx.platform) {
        Some(dev) => ctx.storage_test.start(dev, kind, now, &mut ctx.report),
        None => Err(RuiError::unimplemented(
            "self-test needs exactly one fixed device",
        )),
    };
    if let Err(err) = started {
        ctx.warn(format!("{}: {err}", kind.name()));
        return ctx.set_error_and_back(UiError::Diagnostics);
    }
    record_test_started(ctx, kind.diag_type());
    ctx.storage_text.clear();

    let d = storage_test_update(ctx);
    if d != Directive::Continue {
        return d;
    }
    reset_log_to_top(ctx, UiError::Diagnostics)
}

fn storage_test_short_init(ctx: &mut UiContext<'_>) -> Directive {
    storage_test_init(ctx, TestKind::Short)
}

fn storage_test_extended_init(ctx: &mut UiContext<'_>) -> Directive {
    storage_test_init(ctx, TestKind::Extended)
}

/// Poll the running self-test and refresh its page.
fn storage_test_update(ctx: &mut UiContext<'_>) -> Directive {
    if ctx.state.test_finished {
        return Directive::Continue;
    }
    let now = ctx.now_us();
    let Some(dev) = test_device(&mut *ctx.platform) else {
        ctx.state.test_finished = true;
        return ctx.set_error_and_back(UiError::Diagnostics);
    };
    let status = ctx
        .storage_test
        .poll(dev, now, &mut ctx.report, &mut ctx.storage_text);
    let text = ctx.storage_text.as_str().to_owned();
    show_test_status(ctx, status, &text)
}

fn memory_test_init(ctx: &mut UiContext<'_>, mode: MemoryTestMode) -> Directive {
    let now = ctx.now_us();
    if let Some(mut previous) = ctx.memory_test.take() {
        previous.cancel(now, &mut ctx.report);
    }
    match MemoryTest::start(
        &mut *ctx.platform,
        mode,
        &ctx.config.diagnostics,
        now,
        &mut ctx.report,
    ) {
        Ok(test) => ctx.memory_test = Some(test),
        Err(err) => {
            ctx.warn(format!("memory test: {err}"));
            return ctx.set_error_and_back(UiError::Diagnostics);
        }
    }
    record_test_started(ctx, mode.diag_type());

    let d = memory_test_update(ctx);
    if d != Directive::Continue {
        return d;
    }
    reset_log_to_top(ctx, UiError::Diagnostics)
}

fn memory_quick_init(ctx: &mut UiContext<'_>) -> Directive {
    memory_test_init(ctx, MemoryTestMode::Quick)
}

fn memory_full_init(ctx: &mut UiContext<'_>) -> Directive {
    memory_test_init(ctx, MemoryTestMode::Full)
}

/// Run one chunk of the memory test and refresh its page.
fn memory_test_update(ctx: &mut UiContext<'_>) -> Directive {
    if ctx.state.test_finished {
        return Directive::Continue;
    }
    let now = ctx.now_us();
    let Some(test) = ctx.memory_test.as_mut() else {
        ctx.state.test_finished = true;
        return ctx.set_error_and_back(UiError::Diagnostics);
    };
    let status = test.poll(&mut *ctx.platform, now, &mut ctx.report);
    let text = test.text().to_owned();
    show_test_status(ctx, status, &text)
}

fn show_test_status(ctx: &mut UiContext<'_>, status: PollStatus, text: &str) -> Directive {
    match status {
        PollStatus::Idle | PollStatus::Running => return Directive::Continue,
        PollStatus::Updated => {}
        PollStatus::Passed | PollStatus::Failed | PollStatus::Aborted => record_test_finished(ctx),
        PollStatus::Error => {
            record_test_finished(ctx);
            return ctx.set_error_and_back(UiError::Diagnostics);
        }
    }
    ctx.show_back_or_cancel(!ctx.state.test_finished);
    if let Err(err) = ctx.log_page_update(Some(text)) {
        ctx.warn(format!("{}: {err}", ctx.state.screen.name()));
        return ctx.set_error_and_back(UiError::Diagnostics);
    }
    Directive::Continue
}

/// Abort whichever diagnostic is still running. Runs when a test screen
/// leaves the stack.
pub fn stop_running_test(ctx: &mut UiContext<'_>) {
    let now = ctx.now_us();
    if ctx.storage_test.kind().is_some() {
        let stopped = test_device(&mut *ctx.platform)
            .map(|dev| ctx.storage_test.cancel(dev, now, &mut ctx.report));
        match stopped {
            Some(Ok(())) => record_test_finished(ctx),
            Some(Err(err)) => {
                record_test_finished(ctx);
                ctx.warn(format!("stopping self-test: {err}"));
            }
            None => ctx.warn("self-test device disappeared"),
        }
    }
    let memory_running = ctx.memory_test.as_ref().is_some_and(MemoryTest::is_running);
    if memory_running {
        if let Some(test) = ctx.memory_test.as_mut() {
            test.cancel(now, &mut ctx.report);
        }
        record_test_finished(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::state::ItemMask;

    #[test]
    fn registry_is_consistent() {
        for id in ScreenId::ALL {
            let screen = get(id);
            assert_eq!(screen.id, id);
            assert!(!screen.mesg.is_empty());
            if let MenuSource::Static(items) = screen.menu {
                assert!(items.len() <= ItemMask::CAPACITY);
            }
        }
    }

    #[test]
    fn screens_with_a_menu_end_in_power_off() {
        for id in ScreenId::ALL {
            if let MenuSource::Static(items) = get(id).menu {
                let last = items.last().unwrap();
                assert_eq!(last.target, ItemTarget::Action(Action::PowerOff), "{id:?}");
            }
        }
    }

    #[test]
    fn firmware_sync_has_no_menu_or_footer() {
        let screen = get(ScreenId::FirmwareSync);
        assert!(screen.no_footer);
        assert!(matches!(screen.menu, MenuSource::None));
    }

    #[test]
    fn test_screens_cancel_on_exit() {
        for id in [
            ScreenId::StorageTestShort,
            ScreenId::StorageTestExtended,
            ScreenId::MemoryQuick,
            ScreenId::MemoryFull,
        ] {
            assert!(get(id).hook_names().contains(&"exit"), "{id:?}");
        }
    }

    #[test]
    fn altfw_menu_skips_unbootable_entries() {
        let entries = vec![
            AltFwEntry {
                seqnum: 1,
                filename: "tianocore.efi".into(),
                name: "TianoCore".into(),
                ..AltFwEntry::default()
            },
            AltFwEntry {
                seqnum: 0,
                filename: "hidden.efi".into(),
                ..AltFwEntry::default()
            },
            AltFwEntry {
                seqnum: 2,
                filename: "seabios.elf".into(),
                ..AltFwEntry::default()
            },
        ];
        let (items, count) = altfw_menu(&entries);
        assert_eq!(count, 2);
        assert_eq!(items.len(), 5);
        assert_eq!(items[1].text, "TianoCore");
        assert_eq!(items[2].text, "seabios.elf");
        assert_eq!(items[2].target, ItemTarget::Action(Action::BootAltfw(2)));
        assert_eq!(items[3].target, ItemTarget::Action(Action::Back));
    }

    #[test]
    fn empty_altfw_list_still_has_navigation_items() {
        let (items, count) = altfw_menu(&[]);
        assert_eq!(count, 0);
        assert_eq!(items.len(), 3);
    }
}
