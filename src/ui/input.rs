//! Key mapping for button-only hardware and shutdown request detection.

#![allow(missing_docs)]

use crate::platform::pal::Key;
use crate::ui::engine::UiContext;

/// Power button edge tracking. A press only counts once the button has been
/// seen released, then pressed, then released again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerButton {
    /// Still held from the press that booted the device.
    HeldSinceBoot,
    Released,
    Pressed,
}

/// Detachables navigate with the volume keys and select with power.
pub fn navigation_key(key: Key, detachable: bool) -> Key {
    if !detachable {
        return key;
    }
    match key {
        Key::VolUpShort => Key::Up,
        Key::VolDownShort => Key::Down,
        Key::PowerShort => Key::Enter,
        other => other,
    }
}

/// Sample the shutdown inputs. Returns the source of a shutdown request.
pub fn check_shutdown_request(ctx: &mut UiContext<'_>) -> Option<&'static str> {
    let signals = ctx.platform.shutdown_request();
    let gbb = ctx.platform.gbb_flags();

    let mut power = false;
    if signals.power_button_held {
        if ctx.power_button == PowerButton::Released {
            ctx.power_button = PowerButton::Pressed;
        }
    } else {
        power = ctx.power_button == PowerButton::Pressed;
        ctx.power_button = PowerButton::Released;
    }
    if ctx.key.map(|k| k.key) == Some(Key::PowerShort) {
        power = true;
    }

    if ctx.config.ui.detachable {
        power = false;
    }
    let lid = signals.lid_closed && !gbb.disable_lid_shutdown;

    if signals.interrupt {
        Some("interrupt")
    } else if lid {
        Some("lid")
    } else if power {
        Some("power_button")
    } else {
        None
    }
}
