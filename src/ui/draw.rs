//! Screen composition on a 1000x1000 virtual canvas.
//!
//! The display decides how a bitmap name maps to pixels; this module only
//! decides which bitmaps go where.

#![allow(missing_docs)]

use crate::core::errors::Result;
use crate::platform::pal::{Display, FrameInfo, Rect};
use crate::ui::engine::UiContext;
use crate::ui::error::UiError;
use crate::ui::screen::{ItemType, MenuItem, Screen, Step};
use crate::ui::screens;

pub const CANVAS: i32 = 1000;
const MARGIN_H: i32 = 50;
const MARGIN_TOP: i32 = 30;
const HEADER_HEIGHT: i32 = 60;
const ICON_HEIGHT: i32 = 45;
const SECTION_GAP: i32 = 20;
const DESC_GAP: i32 = 8;
const BUTTON_HEIGHT: i32 = 40;
const BUTTON_GAP: i32 = 6;
const LOG_BOX_HEIGHT: i32 = 420;
const FOOTER_Y: i32 = 860;
const ERROR_BOX: Rect = Rect {
    x: 250,
    y: 300,
    width: 500,
    height: 400,
};

/// Draw one frame for the active screen.
pub fn display_ui(ctx: &mut UiContext<'_>) {
    let frame = ctx.frame_info();
    let screen = screens::get(frame.screen);
    let menu = ctx.menu().to_vec();
    let desc = screen
        .draw_desc
        .map_or_else(|| screen.desc.to_vec(), |hook| hook(ctx));
    let log_text = ctx
        .state
        .pager
        .as_ref()
        .map(|p| p.current_text().to_owned());
    let locale_code = ctx.platform.locale_code(frame.locale_id);

    let parts = Parts {
        screen,
        frame: &frame,
        menu: &menu,
        desc: &desc,
        log_text: log_text.as_deref(),
        locale_code: locale_code.as_deref(),
    };

    ctx.platform.begin_frame(&frame);
    let composed = compose(&mut *ctx.platform, &parts);
    if let Err(err) = composed {
        ctx.warn(format!("drawing {} failed: {err}", frame.screen.name()));
        let fallback = Rect {
            x: MARGIN_H,
            y: MARGIN_TOP,
            width: CANVAS - 2 * MARGIN_H,
            height: CANVAS - 2 * MARGIN_TOP,
        };
        if let Err(err) = ctx.platform.draw_text_box(screen.mesg, fallback) {
            ctx.warn(format!("fallback message failed: {err}"));
        }
    }
    ctx.platform.end_frame();
}

/// Everything a frame needs, gathered before the display is borrowed.
struct Parts<'p> {
    screen: &'static Screen,
    frame: &'p FrameInfo,
    menu: &'p [MenuItem],
    desc: &'p [&'static str],
    log_text: Option<&'p str>,
    locale_code: Option<&'p str>,
}

fn compose<D: Display + ?Sized>(display: &mut D, parts: &Parts<'_>) -> Result<()> {
    let frame = parts.frame;
    let locale = frame.locale_id;
    let mut y = MARGIN_TOP;

    if parts.menu.first().is_some_and(|i| i.kind == ItemType::Language) {
        draw_language_header(display, parts)?;
    }
    y += HEADER_HEIGHT;

    if let Some(icon) = parts.screen.icon.file() {
        let bitmap = display.get_bitmap(icon, locale)?;
        display.draw_bitmap(&bitmap, MARGIN_H, y, false)?;
        y += ICON_HEIGHT + SECTION_GAP;
    }

    if let Some(step) = parts.screen.step {
        draw_steps(display, step, locale, y)?;
        y += ICON_HEIGHT + SECTION_GAP;
    }

    if let Some(title) = parts.screen.title {
        let bitmap = display.get_bitmap(title, locale)?;
        display.draw_bitmap(&bitmap, MARGIN_H, y, false)?;
        y += bitmap.height + SECTION_GAP;
    }

    for file in parts.desc {
        let bitmap = display.get_bitmap(file, locale)?;
        display.draw_bitmap(&bitmap, MARGIN_H, y, false)?;
        y += bitmap.height + DESC_GAP;
    }

    if let Some(text) = parts.log_text {
        let rect = Rect {
            x: MARGIN_H,
            y,
            width: CANVAS - 2 * MARGIN_H,
            height: LOG_BOX_HEIGHT,
        };
        display.draw_text_box(text, rect)?;
        y += LOG_BOX_HEIGHT + SECTION_GAP;
    }

    y = draw_buttons(display, parts, ItemType::Primary, y)?;
    draw_buttons(display, parts, ItemType::Secondary, y + SECTION_GAP)?;

    if !parts.screen.no_footer {
        let footer = display.get_bitmap("footer.bmp", locale)?;
        display.draw_bitmap(&footer, MARGIN_H, FOOTER_Y, false)?;
    }

    if let Some(error) = frame.error {
        draw_error_box(display, error, locale)?;
    }
    Ok(())
}

fn draw_language_header<D: Display + ?Sized>(display: &mut D, parts: &Parts<'_>) -> Result<()> {
    let locale = parts.frame.locale_id;
    let focused = parts.frame.selected == 0;
    let globe = display.get_bitmap("ic_globe.bmp", locale)?;
    display.draw_bitmap(&globe, MARGIN_H, MARGIN_TOP, !focused)?;
    let rect = Rect {
        x: MARGIN_H + globe.width + DESC_GAP,
        y: MARGIN_TOP,
        width: 200,
        height: HEADER_HEIGHT - DESC_GAP,
    };
    display.draw_text_box(parts.locale_code.unwrap_or("??"), rect)?;
    let arrow = display.get_bitmap("ic_dropdown.bmp", locale)?;
    display.draw_bitmap(&arrow, rect.x + rect.width, MARGIN_TOP, false)
}

fn draw_steps<D: Display + ?Sized>(display: &mut D, step: Step, locale: u32, y: i32) -> Result<()> {
    let current = i32::from(step.current);
    let mut x = MARGIN_H;
    for n in 1..=i32::from(step.total) {
        let name = if n == current.abs() && current < 0 {
            "ic_step_error.bmp".to_string()
        } else if n < current.abs() {
            "ic_step_done.bmp".to_string()
        } else {
            format!("ic_{n}.bmp")
        };
        let bitmap = display.get_bitmap(&name, locale)?;
        display.draw_bitmap(&bitmap, x, y, n > current.abs())?;
        x += bitmap.width + BUTTON_GAP;
    }
    Ok(())
}

/// Draw every visible item of `kind`; returns the y below the last one.
fn draw_buttons<D: Display + ?Sized>(
    display: &mut D,
    parts: &Parts<'_>,
    kind: ItemType,
    mut y: i32,
) -> Result<i32> {
    let frame = parts.frame;
    for (i, item) in parts.menu.iter().enumerate() {
        if item.kind != kind || frame.hidden.contains(i) {
            continue;
        }
        let disabled = frame.disabled.contains(i);
        let background = if i == frame.selected {
            "btn_bg_focus.bmp"
        } else {
            "btn_bg.bmp"
        };
        let bg = display.get_bitmap(background, frame.locale_id)?;
        display.draw_bitmap(&bg, MARGIN_H, y, disabled)?;

        let mut x = MARGIN_H + DESC_GAP;
        if let Some(icon) = item.icon {
            let bitmap = display.get_bitmap(icon, frame.locale_id)?;
            display.draw_bitmap(&bitmap, x, y, disabled)?;
            x += bitmap.width + DESC_GAP;
        }
        match item.file {
            Some(file) => {
                let label = display.get_bitmap(file, frame.locale_id)?;
                display.draw_bitmap(&label, x, y, disabled)?;
            }
            None => {
                let rect = Rect {
                    x,
                    y,
                    width: CANVAS - x - MARGIN_H,
                    height: BUTTON_HEIGHT,
                };
                display.draw_text_box(&item.text, rect)?;
            }
        }
        if !item.no_arrow && kind == ItemType::Primary {
            let arrow = display.get_bitmap("ic_arrow.bmp", frame.locale_id)?;
            display.draw_bitmap(&arrow, CANVAS - MARGIN_H - arrow.width, y, disabled)?;
        }
        y += BUTTON_HEIGHT + BUTTON_GAP;

        if disabled {
            if let Some(help) = item.disabled_help {
                let bitmap = display.get_bitmap(help, frame.locale_id)?;
                display.draw_bitmap(&bitmap, MARGIN_H, y, false)?;
                y += bitmap.height + BUTTON_GAP;
            }
        }
    }
    Ok(y)
}

fn draw_error_box<D: Display + ?Sized>(display: &mut D, error: UiError, locale: u32) -> Result<()> {
    let mut y = ERROR_BOX.y + SECTION_GAP;
    let x = ERROR_BOX.x + SECTION_GAP;
    let background = display.get_bitmap("error_box.bmp", locale)?;
    display.draw_bitmap(&background, ERROR_BOX.x, ERROR_BOX.y, false)?;

    let mut files = vec!["ic_info.bmp", error.file()];
    if error.show_dev_url() {
        files.push("dev_mode_url.bmp");
    }
    files.push("btn_back.bmp");
    for file in files {
        let bitmap = display.get_bitmap(file, locale)?;
        display.draw_bitmap(&bitmap, x, y, false)?;
        y += bitmap.height + DESC_GAP;
    }
    Ok(())
}
