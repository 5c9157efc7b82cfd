//! Navigation engine: owns the session and applies directives.
//!
//! The active [`UiState`] sits in `state`; the states below it live in
//! `history`. Every transition goes through [`UiContext::apply`], which
//! follows redirects returned by `init`/`reinit` hooks up to a fixed depth.

#![allow(missing_docs)]

use crate::core::config::Config;
use crate::core::errors::{Result, RuiError};
use crate::diag::TextBuffer;
use crate::diag::memory::MemoryTest;
use crate::diag::report::DiagReport;
use crate::diag::storage_test::{PollIntervals, TestController};
use crate::logger::activity::{ActivityEvent, ActivityLog};
use crate::platform::pal::{BootMode, FrameInfo, KeyPress, LoadResult, Platform};
use crate::ui::actions::Action;
use crate::ui::directive::{Directive, UiOutcome};
use crate::ui::error::UiError;
use crate::ui::input::PowerButton;
use crate::ui::log_pager::LogPager;
use crate::ui::screen::{ItemTarget, MenuItem, MenuSource, ScreenId};
use crate::ui::screens;
use crate::ui::state::UiState;

/// Redirect chains longer than this are cut off with a warning.
const MAX_REDIRECTS: usize = 8;

/// Menus built from platform data, at most once per session.
#[derive(Debug, Default)]
struct MenuCache {
    language: Option<Vec<MenuItem>>,
    altfw: Option<Vec<MenuItem>>,
    altfw_count: usize,
}

/// One UI session.
pub struct UiContext<'a> {
    pub platform: &'a mut dyn Platform,
    pub config: &'a Config,
    pub activity: &'a mut ActivityLog,
    pub mode: BootMode,
    pub state: UiState,
    history: Vec<UiState>,

    /// Key read this iteration, if any.
    pub key: Option<KeyPress>,
    pub error: Option<UiError>,
    pub error_beep: bool,
    pub force_display: bool,
    pub locale_id: u32,

    // Developer-mode countdown.
    pub disable_timer: bool,
    pub start_time_us: u64,
    pub beep_count: u8,

    /// Physical presence button was seen pressed on the to-dev screen.
    pub presence_pressed: bool,
    /// Last non-Ok removable disk result seen by manual recovery.
    pub recovery_rv: Option<LoadResult>,
    pub power_button: PowerButton,

    menus: MenuCache,

    pub report: DiagReport,
    pub storage_test: TestController,
    pub storage_text: TextBuffer,
    pub memory_test: Option<MemoryTest>,
}

impl<'a> UiContext<'a> {
    /// Create a session whose root is `root`. The root's `init` runs in
    /// [`UiContext::start`].
    pub fn new(
        platform: &'a mut dyn Platform,
        config: &'a Config,
        activity: &'a mut ActivityLog,
        root: ScreenId,
    ) -> Self {
        let mode = platform.boot_mode();
        let locale_id = platform.locale_id();
        let diag = &config.diagnostics;
        Self {
            platform,
            config,
            activity,
            mode,
            state: UiState::new(root),
            history: Vec::new(),
            key: None,
            error: None,
            error_beep: false,
            force_display: false,
            locale_id,
            disable_timer: false,
            start_time_us: 0,
            beep_count: 0,
            presence_pressed: false,
            recovery_rv: None,
            power_button: PowerButton::HeldSinceBoot,
            menus: MenuCache::default(),
            report: DiagReport::new(diag.event_capacity),
            storage_test: TestController::new(PollIntervals::from_config(diag)),
            storage_text: TextBuffer::new(diag.memory_output_bytes),
            memory_test: None,
        }
    }

    pub fn now_us(&self) -> u64 {
        self.platform.monotonic_us()
    }

    /// Screens on the stack, bottom first, active last.
    pub fn stack(&self) -> Vec<ScreenId> {
        self.history
            .iter()
            .chain(std::iter::once(&self.state))
            .map(|s| s.screen)
            .collect()
    }

    // ──── navigation ────

    /// Run the root screen's `init`. A root that asks to go back stays.
    pub fn start(&mut self) -> Option<UiOutcome> {
        let root = self.state.screen;
        self.ensure_menu(root);
        self.state = self.fresh_state(root);
        self.activity.record(ActivityEvent::ScreenChanged {
            screen: root.name(),
        });
        match self.run_hook(screens::get(root).init) {
            Directive::GoBack if self.history.is_empty() => None,
            d => self.apply_at(d, 1),
        }
    }

    /// Apply one directive. Returns the UI outcome when it ends the loop.
    pub fn apply(&mut self, directive: Directive) -> Option<UiOutcome> {
        self.apply_at(directive, 0)
    }

    pub fn change_screen(&mut self, id: ScreenId) -> Option<UiOutcome> {
        self.change_screen_at(id, 0)
    }

    /// Pop to the previous screen. A no-op at the bottom of the stack.
    pub fn back(&mut self) -> Option<UiOutcome> {
        self.back_at(0)
    }

    fn apply_at(&mut self, directive: Directive, depth: usize) -> Option<UiOutcome> {
        if depth > MAX_REDIRECTS {
            self.warn(format!(
                "redirect chain too long at {}, ignoring {directive:?}",
                self.state.screen.name()
            ));
            return None;
        }
        match directive {
            Directive::Continue => None,
            Directive::ChangeScreen(id) => self.change_screen_at(id, depth),
            Directive::GoBack => self.back_at(depth),
            terminal => terminal.outcome(),
        }
    }

    fn change_screen_at(&mut self, id: ScreenId, depth: usize) -> Option<UiOutcome> {
        if self.state.screen == id || self.history.iter().any(|s| s.screen == id) {
            while self.state.screen != id {
                self.pop_state();
            }
            self.activity
                .record(ActivityEvent::ScreenChanged { screen: id.name() });
            let d = self.run_hook(screens::get(id).reinit);
            return self.apply_at(d, depth + 1);
        }

        self.ensure_menu(id);
        let fresh = self.fresh_state(id);
        let previous = std::mem::replace(&mut self.state, fresh);
        self.history.push(previous);
        self.activity
            .record(ActivityEvent::ScreenChanged { screen: id.name() });

        let directive = if matches!(screens::get(id).menu, MenuSource::Dynamic)
            && self.menu().is_empty()
        {
            self.warn(RuiError::MenuEmpty { screen: id.name() }.to_string());
            self.set_error_and_back(UiError::MenuEmpty)
        } else {
            self.run_hook(screens::get(id).init)
        };

        match directive {
            Directive::Continue => None,
            Directive::GoBack => self.back_at(depth + 1),
            Directive::ChangeScreen(next) => {
                self.pop_state();
                self.change_screen_at(next, depth + 1)
            }
            terminal => terminal.outcome(),
        }
    }

    fn back_at(&mut self, depth: usize) -> Option<UiOutcome> {
        if self.history.is_empty() {
            return None;
        }
        let left = self.state.screen;
        self.pop_state();
        self.activity
            .record(ActivityEvent::ScreenBack { screen: left.name() });
        let d = self.run_hook(screens::get(self.state.screen).reinit);
        self.apply_at(d, depth + 1)
    }

    /// Drop the active state (running its exit hook) and restore the one
    /// below it.
    fn pop_state(&mut self) {
        let Some(previous) = self.history.pop() else {
            return;
        };
        if let Some(exit) = screens::get(self.state.screen).exit {
            exit(self);
        }
        self.state = previous;
    }

    /// Run exit hooks for every state still on the stack, top first.
    pub fn teardown(&mut self) {
        loop {
            if let Some(exit) = screens::get(self.state.screen).exit {
                exit(self);
            }
            match self.history.pop() {
                Some(previous) => self.state = previous,
                None => break,
            }
        }
    }

    fn run_hook(&mut self, hook: Option<crate::ui::screen::Hook>) -> Directive {
        hook.map_or(Directive::Continue, |h| h(self))
    }

    fn fresh_state(&self, id: ScreenId) -> UiState {
        let mut state = UiState::new(id);
        state.selected = state.first_visible(0, self.menu_of(id).len()).unwrap_or(0);
        state
    }

    // ──── errors ────

    /// Raise `error` unless another one is already pending.
    pub fn set_error(&mut self, error: UiError) {
        let suppressed = self.error.is_some();
        if !suppressed {
            self.error = Some(error);
        }
        self.activity.record(ActivityEvent::UiErrorRaised {
            error: error.name(),
            screen: self.state.screen.name(),
            suppressed,
        });
    }

    pub fn set_error_and_back(&mut self, error: UiError) -> Directive {
        self.set_error(error);
        Directive::GoBack
    }

    pub fn dismiss_error(&mut self) {
        if let Some(error) = self.error.take() {
            self.activity.record(ActivityEvent::ErrorDismissed {
                error: error.name(),
            });
        }
    }

    pub fn warn(&mut self, details: impl Into<String>) {
        self.activity.record(ActivityEvent::Warning {
            details: details.into(),
        });
    }

    // ──── menus ────

    /// Menu of the active screen.
    pub fn menu(&self) -> &[MenuItem] {
        self.menu_of(self.state.screen)
    }

    pub fn menu_of(&self, id: ScreenId) -> &[MenuItem] {
        match screens::get(id).menu {
            MenuSource::None => &[],
            MenuSource::Static(items) => items,
            MenuSource::Dynamic => {
                let cached = match id {
                    ScreenId::LanguageSelect => self.menus.language.as_deref(),
                    ScreenId::SelectAltfw => self.menus.altfw.as_deref(),
                    _ => None,
                };
                cached.unwrap_or(&[])
            }
        }
    }

    /// Index of the active screen's item that runs `action`.
    pub fn item_index(&self, action: Action) -> Option<usize> {
        self.menu()
            .iter()
            .position(|item| item.target == ItemTarget::Action(action))
    }

    /// Number of bootloaders listed on the selection screen.
    pub fn altfw_count(&mut self) -> usize {
        self.ensure_menu(ScreenId::SelectAltfw);
        self.menus.altfw_count
    }

    fn ensure_menu(&mut self, id: ScreenId) {
        match id {
            ScreenId::LanguageSelect if self.menus.language.is_none() => {
                self.menus.language = Some(screens::language_menu(&*self.platform));
            }
            ScreenId::SelectAltfw if self.menus.altfw.is_none() => {
                let (menu, count) = match self.platform.altfw_list() {
                    Ok(list) => screens::altfw_menu(&list),
                    Err(err) => {
                        self.warn(format!("cannot list alternate bootloaders: {err}"));
                        screens::altfw_menu(&[])
                    }
                };
                self.menus.altfw = Some(menu);
                self.menus.altfw_count = count;
            }
            _ => {}
        }
    }

    // ──── log pages ────

    /// Load `text` (when given) into the active state's pager and refresh
    /// the page buttons.
    pub fn log_page_update(&mut self, text: Option<&str>) -> Result<()> {
        let view = &self.config.log_view;
        let pager = self
            .state
            .pager
            .get_or_insert_with(|| LogPager::new(view.lines_per_page, view.chars_per_line));
        if let Some(text) = text {
            pager.load(text)?;
        }
        let (first, last) = (pager.is_first_page(), pager.is_last_page());
        if let Some(i) = self.item_index(Action::PageUp) {
            self.state.disabled.set(i, first);
        }
        if let Some(i) = self.item_index(Action::PageDown) {
            self.state.disabled.set(i, last);
        }
        self.force_display = true;
        Ok(())
    }

    /// Show the first page and focus "page down", or "back" for a single
    /// page. Hidden items are never focused.
    pub fn log_page_reset_to_top(&mut self) -> Result<()> {
        if let Some(pager) = self.state.pager.as_mut() {
            pager.set_page(0);
        }
        self.log_page_update(None)?;
        let multi = self.state.pager.as_ref().is_some_and(|p| p.page_count() > 1);
        let preferred = if multi { Action::PageDown } else { Action::Back };
        // Back is hidden while a test runs; cancel stands in for it.
        let focus = [preferred, Action::CancelTest]
            .into_iter()
            .filter_map(|action| self.item_index(action))
            .find(|&i| !self.state.hidden.contains(i));
        if let Some(i) = focus {
            self.state.selected = i;
        }
        Ok(())
    }

    /// Diagnostic screens show "cancel" while running and "back" after.
    pub fn show_back_or_cancel(&mut self, running: bool) {
        let back = self.item_index(Action::Back);
        let cancel = self.item_index(Action::CancelTest);
        if let Some(i) = back {
            self.state.hidden.set(i, running);
        }
        if let Some(i) = cancel {
            self.state.hidden.set(i, !running);
        }
        let (from, to) = if running { (back, cancel) } else { (cancel, back) };
        if let (Some(from), Some(to)) = (from, to) {
            if self.state.selected == from {
                self.state.selected = to;
            }
        }
    }

    // ──── drawing ────

    pub fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            screen: self.state.screen,
            locale_id: self.locale_id,
            selected: self.state.selected,
            hidden: self.state.hidden,
            disabled: self.state.disabled,
            timer_disabled: self.disable_timer,
            current_page: self.state.current_page(),
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::{DeviceProfile, SimPlatform};

    fn recovery_profile() -> DeviceProfile {
        DeviceProfile {
            mode: BootMode::ManualRecovery,
            ..DeviceProfile::default()
        }
    }

    fn with_ctx<R>(profile: DeviceProfile, root: ScreenId, f: impl FnOnce(&mut UiContext<'_>) -> R) -> R {
        let mut sim = SimPlatform::new(profile);
        let config = Config::default();
        let mut activity = ActivityLog::memory();
        let mut ctx = UiContext::new(&mut sim, &config, &mut activity, root);
        assert_eq!(ctx.start(), None);
        f(&mut ctx)
    }

    #[test]
    fn back_on_empty_history_is_a_noop() {
        with_ctx(recovery_profile(), ScreenId::RecoverySelect, |ctx| {
            let before = ctx.frame_info();
            assert_eq!(ctx.back(), None);
            assert_eq!(ctx.frame_info(), before);
            assert_eq!(ctx.stack(), vec![ScreenId::RecoverySelect]);
        });
    }

    #[test]
    fn enter_then_back_restores_focus_and_masks() {
        with_ctx(recovery_profile(), ScreenId::RecoverySelect, |ctx| {
            ctx.state.selected = 5;
            let before = ctx.frame_info();
            assert_eq!(ctx.change_screen(ScreenId::AdvancedOptions), None);
            assert_eq!(ctx.state.screen, ScreenId::AdvancedOptions);
            assert_eq!(ctx.back(), None);
            assert_eq!(ctx.frame_info(), before);
        });
    }

    #[test]
    fn change_to_screen_on_stack_unwinds() {
        with_ctx(recovery_profile(), ScreenId::RecoverySelect, |ctx| {
            let _ = ctx.change_screen(ScreenId::AdvancedOptions);
            let _ = ctx.change_screen(ScreenId::LanguageSelect);
            assert_eq!(ctx.stack().len(), 3);
            let _ = ctx.change_screen(ScreenId::RecoverySelect);
            assert_eq!(ctx.stack(), vec![ScreenId::RecoverySelect]);
        });
    }

    #[test]
    fn first_error_wins_until_dismissed() {
        with_ctx(recovery_profile(), ScreenId::RecoverySelect, |ctx| {
            ctx.set_error(UiError::DebugLog);
            ctx.set_error(UiError::FirmwareLog);
            assert_eq!(ctx.error, Some(UiError::DebugLog));
            ctx.dismiss_error();
            ctx.set_error(UiError::Diagnostics);
            assert_eq!(ctx.error, Some(UiError::Diagnostics));
        });
    }

    #[test]
    fn init_going_back_drops_the_fresh_state() {
        let profile = DeviceProfile {
            mode: BootMode::ManualRecovery,
            debug_info: None,
            ..DeviceProfile::default()
        };
        with_ctx(profile, ScreenId::RecoverySelect, |ctx| {
            assert_eq!(ctx.change_screen(ScreenId::DebugInfo), None);
            assert_eq!(ctx.stack(), vec![ScreenId::RecoverySelect]);
            assert_eq!(ctx.error, Some(UiError::DebugLog));
        });
    }

    #[test]
    fn root_that_goes_back_stays() {
        let profile = DeviceProfile {
            mode: BootMode::ManualRecovery,
            debug_info: None,
            ..DeviceProfile::default()
        };
        with_ctx(profile, ScreenId::DebugInfo, |ctx| {
            assert_eq!(ctx.stack(), vec![ScreenId::DebugInfo]);
            assert_eq!(ctx.error, Some(UiError::DebugLog));
        });
    }

    #[test]
    fn test_screens_never_focus_a_hidden_item() {
        let screens = [
            ScreenId::StorageTestShort,
            ScreenId::StorageTestExtended,
            ScreenId::MemoryQuick,
            ScreenId::MemoryFull,
        ];
        for screen in screens {
            let profile = DeviceProfile {
                mode: BootMode::Diagnostics,
                ..DeviceProfile::default()
            };
            with_ctx(profile, ScreenId::Diagnostics, |ctx| {
                assert_eq!(ctx.change_screen(screen), None);
                assert_eq!(ctx.state.screen, screen);
                let (selected, hidden) = (ctx.state.selected, ctx.state.hidden);
                assert!(
                    !hidden.contains(selected),
                    "{screen:?}: focused item {selected} is hidden ({hidden:#x})"
                );
            });
        }
    }

    #[test]
    fn running_self_test_focuses_cancel() {
        let profile = DeviceProfile {
            mode: BootMode::Diagnostics,
            ..DeviceProfile::default()
        };
        with_ctx(profile, ScreenId::Diagnostics, |ctx| {
            let _ = ctx.change_screen(ScreenId::StorageTestShort);
            assert_eq!(ctx.item_index(Action::CancelTest), Some(ctx.state.selected));
        });
    }

    #[test]
    fn empty_dynamic_menu_raises_and_goes_back() {
        let profile = DeviceProfile {
            mode: BootMode::ManualRecovery,
            locales: Vec::new(),
            ..DeviceProfile::default()
        };
        with_ctx(profile, ScreenId::RecoverySelect, |ctx| {
            assert_eq!(ctx.change_screen(ScreenId::LanguageSelect), None);
            assert_eq!(ctx.stack(), vec![ScreenId::RecoverySelect]);
            assert_eq!(ctx.error, Some(UiError::MenuEmpty));
        });
    }

    #[test]
    fn show_back_or_cancel_moves_focus() {
        with_ctx(recovery_profile(), ScreenId::FirmwareLog, |ctx| {
            // FirmwareLog has no cancel item; focus only moves when both exist.
            ctx.state.selected = 3;
            ctx.show_back_or_cancel(true);
            assert!(ctx.state.hidden.contains(3));
            assert_eq!(ctx.state.selected, 3);
        });
    }
}
