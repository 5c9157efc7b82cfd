//! Navigation engine: screen registry, per-screen state, menu dispatch, the
//! main loop and the boot-mode flows built on it.

pub mod actions;
pub mod directive;
pub mod draw;
pub mod engine;
pub mod error;
pub mod event_loop;
pub mod flows;
pub mod input;
pub mod log_pager;
pub mod menu;
pub mod screen;
pub mod screens;
pub mod state;
