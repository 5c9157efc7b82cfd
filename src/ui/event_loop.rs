//! The UI main loop: draw, read a key, dispatch, sleep.

#![allow(missing_docs)]

use crate::logger::activity::ActivityEvent;
use crate::platform::pal::FrameInfo;
use crate::ui::directive::{Directive, UiOutcome};
use crate::ui::draw::display_ui;
use crate::ui::engine::UiContext;
use crate::ui::flows::Flow;
use crate::ui::input::check_shutdown_request;
use crate::ui::menu::menu_navigation;
use crate::ui::screens;

/// Run the session until a directive ends it. Exit hooks of every screen
/// still on the stack run before returning.
pub fn ui_loop(ctx: &mut UiContext<'_>, flow: Option<Flow>) -> UiOutcome {
    ctx.activity.record(ActivityEvent::UiStarted {
        root: ctx.state.screen.name(),
        mode: ctx.mode.name(),
    });
    let outcome = match ctx.start() {
        Some(outcome) => outcome,
        None => run(ctx, flow),
    };
    ctx.teardown();
    ctx.activity.record(ActivityEvent::UiExited {
        outcome: outcome.to_string(),
    });
    outcome
}

fn run(ctx: &mut UiContext<'_>, flow: Option<Flow>) -> UiOutcome {
    let mut shown: Option<FrameInfo> = None;
    loop {
        let started_us = ctx.now_us();
        redraw_if_needed(ctx, &mut shown);

        ctx.key = ctx.platform.read_key();

        if let Some(source) = check_shutdown_request(ctx) {
            ctx.activity
                .record(ActivityEvent::ShutdownRequested { source });
            return UiOutcome::Shutdown;
        }

        // Any key only dismisses a pending error.
        if ctx.error.is_some() && ctx.key.is_some() {
            ctx.dismiss_error();
            ctx.key = None;
        }

        if let Some(outcome) = dispatch(ctx, flow) {
            return outcome;
        }

        let elapsed_ms = ctx.now_us().saturating_sub(started_us) / 1_000;
        let delay_ms = ctx.config.ui.key_delay_ms;
        if elapsed_ms < delay_ms {
            ctx.platform.sleep_ms(delay_ms - elapsed_ms);
        }
    }
}

fn redraw_if_needed(ctx: &mut UiContext<'_>, shown: &mut Option<FrameInfo>) {
    let frame = ctx.frame_info();
    let error_changed = shown.is_none_or(|prev| prev.error != frame.error);
    if (error_changed && frame.error.is_some()) || ctx.error_beep {
        let ui = &ctx.config.ui;
        let (ms, hz) = (ui.error_beep_ms, ui.error_beep_hz);
        ctx.platform.beep(ms, hz);
        ctx.error_beep = false;
    }
    if *shown != Some(frame) || ctx.force_display {
        display_ui(ctx);
        *shown = Some(frame);
        ctx.force_display = false;
    }
}

/// Shortcuts, menu, screen action, flow tick. The first terminal directive
/// ends the iteration.
fn dispatch(ctx: &mut UiContext<'_>, flow: Option<Flow>) -> Option<UiOutcome> {
    let shortcut = flow.and_then(|f| f.shortcut(ctx));
    let directive = match shortcut {
        Some(d) => {
            ctx.key = None;
            d
        }
        None => menu_navigation(ctx),
    };
    if let Some(outcome) = ctx.apply(directive) {
        return Some(outcome);
    }

    if let Some(action) = screens::get(ctx.state.screen).action {
        let d = action(ctx);
        if let Some(outcome) = ctx.apply(d) {
            return Some(outcome);
        }
    }

    let tick = flow.map_or(Directive::Continue, |f| f.tick(ctx));
    ctx.apply(tick)
}
