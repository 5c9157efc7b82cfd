#![forbid(unsafe_code)]

//! Recovery UI (rui): the firmware recovery and developer-mode menu engine,
//! with the storage and memory diagnostics it drives.
//!
//! The engine is written against the collaborator traits in
//! [`platform::pal`]; [`platform::sim`] provides a scriptable device so
//! every flow can run on a host:
//! 1. **Navigation engine**: screen registry, history stack, menu dispatch
//! 2. **Flows**: manual recovery, broken screen, developer mode, diagnostics
//! 3. **Diagnostics**: storage self-test and health, memory test, event report
//!
//! # Library usage
//!
//! ```rust,no_run
//! use recovery_ui::prelude::*;
//!
//! let config = Config::default();
//! let mut activity = ActivityLog::memory();
//! let mut device = SimPlatform::new(DeviceProfile::default());
//! let report = select_and_load_kernel(&mut device, &config, &mut activity);
//! ```

pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod diag;
pub mod logger;
pub mod platform;
pub mod ui;
