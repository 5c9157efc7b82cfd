//! Screen descriptors and menu items.
//!
//! Descriptors are immutable statics looked up by [`ScreenId`]; the only
//! per-session menu data (language list, alternate bootloaders) lives in the
//! session's menu cache.

#![allow(missing_docs)]

use std::borrow::Cow;

use serde::Serialize;

use crate::ui::actions::Action;
use crate::ui::directive::Directive;
use crate::ui::engine::UiContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenId {
    FirmwareSync,
    LanguageSelect,
    RecoveryBroken,
    AdvancedOptions,
    DebugInfo,
    FirmwareLog,
    RecoveryToDev,
    RecoverySelect,
    PhoneStep1,
    PhoneStep2,
    DiskStep1,
    DiskStep2,
    DiskStep3,
    RecoveryInvalid,
    DeveloperMode,
    DeveloperToNorm,
    DeveloperBootExternal,
    DeveloperInvalidDisk,
    SelectAltfw,
    Diagnostics,
    StorageHealth,
    StorageTestShort,
    StorageTestExtended,
    MemoryQuick,
    MemoryFull,
}

impl ScreenId {
    pub const ALL: [Self; 25] = [
        Self::FirmwareSync,
        Self::LanguageSelect,
        Self::RecoveryBroken,
        Self::AdvancedOptions,
        Self::DebugInfo,
        Self::FirmwareLog,
        Self::RecoveryToDev,
        Self::RecoverySelect,
        Self::PhoneStep1,
        Self::PhoneStep2,
        Self::DiskStep1,
        Self::DiskStep2,
        Self::DiskStep3,
        Self::RecoveryInvalid,
        Self::DeveloperMode,
        Self::DeveloperToNorm,
        Self::DeveloperBootExternal,
        Self::DeveloperInvalidDisk,
        Self::SelectAltfw,
        Self::Diagnostics,
        Self::StorageHealth,
        Self::StorageTestShort,
        Self::StorageTestExtended,
        Self::MemoryQuick,
        Self::MemoryFull,
    ];

    /// Numeric id shown in frame logs.
    pub const fn code(self) -> u32 {
        match self {
            Self::FirmwareSync => 0x90,
            Self::LanguageSelect => 0x100,
            Self::RecoveryBroken => 0x110,
            Self::AdvancedOptions => 0x120,
            Self::DebugInfo => 0x130,
            Self::FirmwareLog => 0x140,
            Self::RecoveryToDev => 0x200,
            Self::RecoverySelect => 0x210,
            Self::PhoneStep1 => 0x220,
            Self::PhoneStep2 => 0x221,
            Self::DiskStep1 => 0x230,
            Self::DiskStep2 => 0x231,
            Self::DiskStep3 => 0x232,
            Self::RecoveryInvalid => 0x240,
            Self::DeveloperMode => 0x300,
            Self::DeveloperToNorm => 0x310,
            Self::DeveloperBootExternal => 0x320,
            Self::DeveloperInvalidDisk => 0x330,
            Self::SelectAltfw => 0x340,
            Self::Diagnostics => 0x400,
            Self::StorageHealth => 0x410,
            Self::StorageTestShort => 0x420,
            Self::StorageTestExtended => 0x421,
            Self::MemoryQuick => 0x430,
            Self::MemoryFull => 0x431,
        }
    }

    /// Stable snake_case name used in activity logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::FirmwareSync => "firmware_sync",
            Self::LanguageSelect => "language_select",
            Self::RecoveryBroken => "recovery_broken",
            Self::AdvancedOptions => "advanced_options",
            Self::DebugInfo => "debug_info",
            Self::FirmwareLog => "firmware_log",
            Self::RecoveryToDev => "recovery_to_dev",
            Self::RecoverySelect => "recovery_select",
            Self::PhoneStep1 => "recovery_phone_step1",
            Self::PhoneStep2 => "recovery_phone_step2",
            Self::DiskStep1 => "recovery_disk_step1",
            Self::DiskStep2 => "recovery_disk_step2",
            Self::DiskStep3 => "recovery_disk_step3",
            Self::RecoveryInvalid => "recovery_invalid",
            Self::DeveloperMode => "developer_mode",
            Self::DeveloperToNorm => "developer_to_norm",
            Self::DeveloperBootExternal => "developer_boot_external",
            Self::DeveloperInvalidDisk => "developer_invalid_disk",
            Self::SelectAltfw => "developer_select_altfw",
            Self::Diagnostics => "diagnostics",
            Self::StorageHealth => "diagnostics_storage_health",
            Self::StorageTestShort => "diagnostics_storage_test_short",
            Self::StorageTestExtended => "diagnostics_storage_test_extended",
            Self::MemoryQuick => "diagnostics_memory_quick",
            Self::MemoryFull => "diagnostics_memory_full",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Primary,
    Secondary,
    /// The header language picker.
    Language,
}

/// What selecting an item does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTarget {
    Screen(ScreenId),
    Action(Action),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub text: Cow<'static, str>,
    /// Button bitmap; `None` renders `text` instead.
    pub file: Option<&'static str>,
    pub kind: ItemType,
    pub icon: Option<&'static str>,
    pub no_arrow: bool,
    /// Help bitmap drawn when the item is disabled.
    pub disabled_help: Option<&'static str>,
    pub target: ItemTarget,
}

impl MenuItem {
    pub const fn primary(text: &'static str, file: &'static str, target: ItemTarget) -> Self {
        Self {
            text: Cow::Borrowed(text),
            file: Some(file),
            kind: ItemType::Primary,
            icon: None,
            no_arrow: false,
            disabled_help: None,
            target,
        }
    }

    pub const fn to_screen(text: &'static str, file: &'static str, id: ScreenId) -> Self {
        Self::primary(text, file, ItemTarget::Screen(id))
    }

    pub const fn action(text: &'static str, file: &'static str, action: Action) -> Self {
        Self::primary(text, file, ItemTarget::Action(action))
    }

    /// A text-only item generated at runtime.
    pub fn dynamic(text: impl Into<Cow<'static, str>>, target: ItemTarget) -> Self {
        Self {
            text: text.into(),
            file: None,
            kind: ItemType::Primary,
            icon: None,
            no_arrow: false,
            disabled_help: None,
            target,
        }
    }

    pub const fn secondary(mut self, icon: &'static str) -> Self {
        self.kind = ItemType::Secondary;
        self.icon = Some(icon);
        self
    }

    /// Mark as the header language picker.
    pub const fn language(mut self) -> Self {
        self.kind = ItemType::Language;
        self
    }

    pub const fn without_arrow(mut self) -> Self {
        self.no_arrow = true;
        self
    }

    pub const fn with_disabled_help(mut self, file: &'static str) -> Self {
        self.disabled_help = Some(file);
        self
    }

    pub const fn action_target(&self) -> Option<Action> {
        match self.target {
            ItemTarget::Action(action) => Some(action),
            ItemTarget::Screen(_) | ItemTarget::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    None,
    Info,
    Error,
    DevMode,
    Restart,
}

impl Icon {
    pub const fn file(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Info => Some("ic_info.bmp"),
            Self::Error => Some("ic_error.bmp"),
            Self::DevMode => Some("ic_dev_mode.bmp"),
            Self::Restart => Some("ic_restart.bmp"),
        }
    }
}

/// Where a screen's menu comes from.
#[derive(Debug, Clone, Copy)]
pub enum MenuSource {
    None,
    Static(&'static [MenuItem]),
    /// Built once per session from platform data.
    Dynamic,
}

/// Step indicator; a negative `current` marks that step as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub current: i8,
    pub total: u8,
}

pub type Hook = fn(&mut UiContext<'_>) -> Directive;
pub type DescHook = fn(&UiContext<'_>) -> Vec<&'static str>;

/// Immutable description of one screen.
pub struct Screen {
    pub id: ScreenId,
    /// Human-readable name.
    pub name: &'static str,
    /// Plain-text message for the fallback renderer.
    pub mesg: &'static str,
    pub icon: Icon,
    pub title: Option<&'static str>,
    pub desc: &'static [&'static str],
    pub step: Option<Step>,
    pub no_footer: bool,
    pub menu: MenuSource,
    pub init: Option<Hook>,
    pub reinit: Option<Hook>,
    pub action: Option<Hook>,
    /// Runs whenever the screen's state leaves the navigation stack.
    pub exit: Option<fn(&mut UiContext<'_>)>,
    /// Replaces `desc` with a list computed from the session.
    pub draw_desc: Option<DescHook>,
}

impl Screen {
    /// Defaults for everything but identity and message.
    pub const fn base(id: ScreenId, name: &'static str, mesg: &'static str) -> Self {
        Self {
            id,
            name,
            mesg,
            icon: Icon::None,
            title: None,
            desc: &[],
            step: None,
            no_footer: false,
            menu: MenuSource::None,
            init: None,
            reinit: None,
            action: None,
            exit: None,
            draw_desc: None,
        }
    }

    /// Names of the hooks this screen provides.
    pub fn hook_names(&self) -> Vec<&'static str> {
        let mut hooks = Vec::new();
        if self.init.is_some() {
            hooks.push("init");
        }
        if self.reinit.is_some() {
            hooks.push("reinit");
        }
        if self.action.is_some() {
            hooks.push("action");
        }
        if self.exit.is_some() {
            hooks.push("exit");
        }
        if self.draw_desc.is_some() {
            hooks.push("draw_desc");
        }
        hooks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_codes_are_unique() {
        let mut codes = std::collections::HashSet::new();
        for id in ScreenId::ALL {
            assert_eq!(ScreenId::from_name(id.name()), Some(id));
            assert!(codes.insert(id.code()), "duplicate code for {id:?}");
        }
        assert_eq!(ScreenId::from_name("nope"), None);
    }

    #[test]
    fn item_builders_compose() {
        const ITEM: MenuItem = MenuItem::action("Power off", "btn_power_off.bmp", Action::PowerOff)
            .secondary("ic_power.bmp")
            .without_arrow();
        assert_eq!(ITEM.kind, ItemType::Secondary);
        assert_eq!(ITEM.icon, Some("ic_power.bmp"));
        assert!(ITEM.no_arrow);
        assert_eq!(ITEM.action_target(), Some(Action::PowerOff));
    }
}
