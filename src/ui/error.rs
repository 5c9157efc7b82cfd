//! User-facing UI errors shown as a dismissible overlay.

#![allow(missing_docs)]

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiError {
    MiniosBootFailed,
    DevModeAlreadyEnabled,
    UntrustedConfirmation,
    ToNormNotAllowed,
    DevBootNotAllowed,
    InternalBootFailed,
    ExternalBootDisabled,
    AltfwDisabled,
    AltfwEmpty,
    AltfwFailed,
    DebugLog,
    FirmwareLog,
    Diagnostics,
    MenuEmpty,
}

impl UiError {
    pub const ALL: [Self; 14] = [
        Self::MiniosBootFailed,
        Self::DevModeAlreadyEnabled,
        Self::UntrustedConfirmation,
        Self::ToNormNotAllowed,
        Self::DevBootNotAllowed,
        Self::InternalBootFailed,
        Self::ExternalBootDisabled,
        Self::AltfwDisabled,
        Self::AltfwEmpty,
        Self::AltfwFailed,
        Self::DebugLog,
        Self::FirmwareLog,
        Self::Diagnostics,
        Self::MenuEmpty,
    ];

    /// Numeric code used in frame logs.
    pub const fn code(self) -> u32 {
        self as u32 + 1
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::MiniosBootFailed => "minios_boot_failed",
            Self::DevModeAlreadyEnabled => "dev_mode_already_enabled",
            Self::UntrustedConfirmation => "untrusted_confirmation",
            Self::ToNormNotAllowed => "to_norm_not_allowed",
            Self::DevBootNotAllowed => "dev_boot_not_allowed",
            Self::InternalBootFailed => "internal_boot_failed",
            Self::ExternalBootDisabled => "external_boot_disabled",
            Self::AltfwDisabled => "altfw_disabled",
            Self::AltfwEmpty => "altfw_empty",
            Self::AltfwFailed => "altfw_failed",
            Self::DebugLog => "debug_log",
            Self::FirmwareLog => "firmware_log",
            Self::Diagnostics => "diagnostics",
            Self::MenuEmpty => "menu_empty",
        }
    }

    /// Localized bitmap for the error box.
    pub const fn file(self) -> &'static str {
        match self {
            Self::MiniosBootFailed => "error_internet_recovery.bmp",
            Self::DevModeAlreadyEnabled => "error_dev_mode_enabled.bmp",
            Self::UntrustedConfirmation => "error_untrusted_confirm.bmp",
            Self::ToNormNotAllowed => "error_to_norm_not_allowed.bmp",
            Self::DevBootNotAllowed => "error_dev_boot_not_allowed.bmp",
            Self::InternalBootFailed => "error_int_boot_failed.bmp",
            Self::ExternalBootDisabled => "error_ext_boot_disabled.bmp",
            Self::AltfwDisabled => "error_alt_boot_disabled.bmp",
            Self::AltfwEmpty => "error_no_alt_bootloader.bmp",
            Self::AltfwFailed => "error_alt_boot_failed.bmp",
            Self::DebugLog => "error_debug_info.bmp",
            Self::FirmwareLog => "error_firmware_log.bmp",
            Self::Diagnostics => "error_diagnostics.bmp",
            Self::MenuEmpty => "error_menu_empty.bmp",
        }
    }

    /// Plain-text message for the fallback renderer.
    pub const fn message(self) -> &'static str {
        match self {
            Self::MiniosBootFailed => {
                "Internet recovery partition corrupted or missing.\n\
                 Please recover using external storage instead."
            }
            Self::DevModeAlreadyEnabled => "Developer mode is already turned on.",
            Self::UntrustedConfirmation => {
                "You cannot use an external keyboard to turn on\n\
                 developer mode. Please use the on-device buttons\n\
                 noted in the navigation instructions."
            }
            Self::ToNormNotAllowed => "Returning to secure mode disallowed by GBB flags.",
            Self::DevBootNotAllowed => {
                "Booting in developer mode is not allowed. For more\n\
                 info, visit: google.com/chromeos/devmode"
            }
            Self::InternalBootFailed => {
                "Something went wrong booting from internal disk.\n\
                 View firmware log for details."
            }
            Self::ExternalBootDisabled => {
                "Booting from an external disk is disabled. For more\n\
                 info, visit: google.com/chromeos/devmode"
            }
            Self::AltfwDisabled => {
                "Alternate bootloaders are disabled. For more info\n\
                 visit: google.com/chromeos/devmode"
            }
            Self::AltfwEmpty => {
                "Could not find an alternate bootloader. To learn how\n\
                 to install one, visit: google.com/chromeos/devmode"
            }
            Self::AltfwFailed => {
                "Something went wrong launching the alternate\n\
                 bootloader. View firmware log for details."
            }
            Self::DebugLog => "Could not get debug info.",
            Self::FirmwareLog => "Could not get firmware log.",
            Self::Diagnostics => "Could not get diagnostic information.",
            Self::MenuEmpty => "Nothing to choose from on this screen.",
        }
    }

    /// The error box also shows the developer-mode help URL.
    pub const fn show_dev_url(self) -> bool {
        matches!(
            self,
            Self::DevBootNotAllowed
                | Self::ExternalBootDisabled
                | Self::AltfwDisabled
                | Self::AltfwEmpty
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_files_are_unique() {
        let codes: std::collections::HashSet<u32> = UiError::ALL.iter().map(|e| e.code()).collect();
        let files: std::collections::HashSet<&str> =
            UiError::ALL.iter().map(|e| e.file()).collect();
        assert_eq!(codes.len(), UiError::ALL.len());
        assert_eq!(files.len(), UiError::ALL.len());
        assert!(!codes.contains(&0), "zero means no error in frame logs");
    }

    #[test]
    fn dev_url_only_on_policy_errors() {
        let with_url: Vec<UiError> = UiError::ALL
            .into_iter()
            .filter(|e| e.show_dev_url())
            .collect();
        assert_eq!(
            with_url,
            vec![
                UiError::DevBootNotAllowed,
                UiError::ExternalBootDisabled,
                UiError::AltfwDisabled,
                UiError::AltfwEmpty,
            ]
        );
    }

    #[test]
    fn multi_line_messages_keep_their_breaks() {
        assert_eq!(
            UiError::MiniosBootFailed.message(),
            "Internet recovery partition corrupted or missing.\nPlease recover using external storage instead."
        );
        assert_eq!(UiError::AltfwFailed.message().lines().count(), 2);
    }
}
