//! What hooks and actions ask the engine to do next, and how a UI run ends.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

use crate::ui::screen::ScreenId;

/// What was booted when the UI handed control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "target", content = "id")]
pub enum BootTarget {
    InternalDisk,
    ExternalDisk,
    RecoveryDisk,
    MiniOs,
    AltFirmware(u32),
}

impl fmt::Display for BootTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InternalDisk => f.write_str("internal_disk"),
            Self::ExternalDisk => f.write_str("external_disk"),
            Self::RecoveryDisk => f.write_str("recovery_disk"),
            Self::MiniOs => f.write_str("minios"),
            Self::AltFirmware(id) => write!(f, "altfw:{id}"),
        }
    }
}

/// Returned by every hook and menu action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Directive {
    Continue,
    ChangeScreen(ScreenId),
    GoBack,
    Exit(BootTarget),
    Reboot { ec_to_ro: bool },
    Shutdown,
}

impl Directive {
    /// The loop result this directive ends the UI with, if any.
    pub const fn outcome(self) -> Option<UiOutcome> {
        match self {
            Self::Continue | Self::ChangeScreen(_) | Self::GoBack => None,
            Self::Exit(target) => Some(UiOutcome::Booted(target)),
            Self::Reboot { ec_to_ro: false } => Some(UiOutcome::Reboot),
            Self::Reboot { ec_to_ro: true } => Some(UiOutcome::RebootEcToRo),
            Self::Shutdown => Some(UiOutcome::Shutdown),
        }
    }
}

/// How one UI run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiOutcome {
    Booted(BootTarget),
    Reboot,
    RebootEcToRo,
    Shutdown,
}

impl fmt::Display for UiOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Booted(target) => write!(f, "booted {target}"),
            Self::Reboot => f.write_str("reboot"),
            Self::RebootEcToRo => f.write_str("reboot (EC to RO)"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}
