//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use recovery_ui::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, RuiError};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLog};

// Platform
pub use crate::platform::pal::{BootMode, Key, KeyPress, Platform};
pub use crate::platform::sim::{DeviceProfile, SimPlatform, parse_script};

// Diagnostics
pub use crate::diag::report::{DiagEvent, DiagReport, DiagTestResult, DiagTestType, decode_payload};

// Engine
pub use crate::ui::directive::{BootTarget, Directive, UiOutcome};
pub use crate::ui::engine::UiContext;
pub use crate::ui::flows::{BootReport, select_and_load_kernel, show_firmware_sync};
pub use crate::ui::log_pager::LogPager;
pub use crate::ui::screen::ScreenId;
