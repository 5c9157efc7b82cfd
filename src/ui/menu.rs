//! Menu dispatch: turn one key into exactly one directive.
//!
//! Focus never wraps and never lands on a hidden item. Disabled items take
//! focus but selecting them does nothing.

#![allow(missing_docs)]

use crate::platform::pal::Key;
use crate::ui::actions;
use crate::ui::directive::Directive;
use crate::ui::engine::UiContext;
use crate::ui::input::navigation_key;
use crate::ui::screen::ItemTarget;

/// Move focus to the previous visible item. Blocked at the top.
pub fn menu_prev(ctx: &mut UiContext<'_>) -> Directive {
    let state = &mut ctx.state;
    if let Some(i) = (0..state.selected).rev().find(|&i| !state.hidden.contains(i)) {
        state.selected = i;
    }
    Directive::Continue
}

/// Move focus to the next visible item. Blocked at the bottom.
pub fn menu_next(ctx: &mut UiContext<'_>) -> Directive {
    let count = ctx.menu().len();
    let state = &mut ctx.state;
    if let Some(i) = state.first_visible(state.selected + 1, count) {
        state.selected = i;
    }
    Directive::Continue
}

/// Activate the focused item.
pub fn menu_select(ctx: &mut UiContext<'_>) -> Directive {
    let selected = ctx.state.selected;
    let Some(item) = ctx.menu().get(selected) else {
        return Directive::Continue;
    };
    let target = item.target;
    if ctx.state.disabled.contains(selected) || ctx.state.hidden.contains(selected) {
        return Directive::Continue;
    }
    match target {
        ItemTarget::Screen(id) => Directive::ChangeScreen(id),
        ItemTarget::Action(action) => actions::run(ctx, action),
        ItemTarget::None => Directive::Continue,
    }
}

/// Route the current key through the menu.
pub fn menu_navigation(ctx: &mut UiContext<'_>) -> Directive {
    let Some(press) = ctx.key else {
        return Directive::Continue;
    };
    match navigation_key(press.key, ctx.config.ui.detachable) {
        Key::Up => menu_prev(ctx),
        Key::Down => menu_next(ctx),
        Key::Enter => menu_select(ctx),
        Key::Esc => Directive::GoBack,
        _ => Directive::Continue,
    }
}
