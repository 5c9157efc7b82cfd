//! RUI-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, RuiError>;

/// Top-level error type for the recovery UI.
#[derive(Debug, Error)]
pub enum RuiError {
    #[error("[RUI-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[RUI-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[RUI-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[RUI-2001] invalid diagnostic event: {kind}={value}")]
    InvalidEvent { kind: &'static str, value: u8 },

    #[error("[RUI-2002] unimplemented: {what}")]
    Unimplemented { what: String },

    #[error("[RUI-2003] hardware failure in {component}: code {code}")]
    Hardware { component: String, code: i32 },

    #[error("[RUI-2101] log has no displayable pages: {details}")]
    LogEmpty { details: String },

    #[error("[RUI-2102] menu for screen {screen} has no items")]
    MenuEmpty { screen: &'static str },

    #[error("[RUI-2103] boot failed: {details}")]
    BootFailed { details: String },

    #[error("[RUI-2201] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[RUI-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[RUI-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[RUI-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl RuiError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "RUI-1001",
            Self::MissingConfig { .. } => "RUI-1002",
            Self::ConfigParse { .. } => "RUI-1003",
            Self::InvalidEvent { .. } => "RUI-2001",
            Self::Unimplemented { .. } => "RUI-2002",
            Self::Hardware { .. } => "RUI-2003",
            Self::LogEmpty { .. } => "RUI-2101",
            Self::MenuEmpty { .. } => "RUI-2102",
            Self::BootFailed { .. } => "RUI-2103",
            Self::Serialization { .. } => "RUI-2201",
            Self::Io { .. } => "RUI-3002",
            Self::ChannelClosed { .. } => "RUI-3003",
            Self::Runtime { .. } => "RUI-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::ChannelClosed { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a device fault code.
    #[must_use]
    pub fn hardware(component: impl Into<String>, code: i32) -> Self {
        Self::Hardware {
            component: component.into(),
            code,
        }
    }

    /// Convenience constructor for an unsupported capability.
    #[must_use]
    pub fn unimplemented(what: impl Into<String>) -> Self {
        Self::Unimplemented { what: what.into() }
    }
}

impl From<serde_json::Error> for RuiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for RuiError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_variant() -> Vec<RuiError> {
        vec![
            RuiError::InvalidConfig {
                details: String::new(),
            },
            RuiError::MissingConfig {
                path: PathBuf::new(),
            },
            RuiError::ConfigParse {
                context: "",
                details: String::new(),
            },
            RuiError::InvalidEvent {
                kind: "type",
                value: 9,
            },
            RuiError::unimplemented("self-test"),
            RuiError::hardware("nvme0", -5),
            RuiError::LogEmpty {
                details: String::new(),
            },
            RuiError::MenuEmpty { screen: "x" },
            RuiError::BootFailed {
                details: String::new(),
            },
            RuiError::Serialization {
                context: "",
                details: String::new(),
            },
            RuiError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            RuiError::ChannelClosed { component: "" },
            RuiError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = every_variant();
        let codes: Vec<&str> = errors.iter().map(RuiError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn display_starts_with_bracketed_code() {
        for err in every_variant() {
            let msg = err.to_string();
            assert!(
                msg.starts_with(&format!("[{}]", err.code())),
                "display should lead with its code: {msg}"
            );
        }
    }

    #[test]
    fn hardware_display_includes_component_and_code() {
        let msg = RuiError::hardware("nvme0n1", 7).to_string();
        assert!(msg.contains("nvme0n1"), "{msg}");
        assert!(msg.contains("code 7"), "{msg}");
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(RuiError::io("/tmp/x", std::io::Error::other("test")).is_retryable());
        assert!(RuiError::ChannelClosed { component: "keys" }.is_retryable());

        assert!(!RuiError::unimplemented("extended self-test").is_retryable());
        assert!(!RuiError::hardware("nvme0", 1).is_retryable());
        assert!(
            !RuiError::InvalidEvent {
                kind: "result",
                value: 0
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = RuiError::io(
            "/tmp/test.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "RUI-3002");
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: RuiError = json_err.into();
        assert_eq!(err.code(), "RUI-2201");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: RuiError = toml_err.into();
        assert_eq!(err.code(), "RUI-1003");
    }
}
