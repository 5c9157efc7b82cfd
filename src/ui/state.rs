//! Per-screen mutable state and the item bit-sets it carries.

#![allow(missing_docs)]

use std::fmt;

use crate::ui::log_pager::LogPager;
use crate::ui::screen::ScreenId;

/// Fixed-size set of menu item indices.
///
/// Indices at or past [`ItemMask::CAPACITY`] are never members; setting one
/// is ignored. Menus are validated against this bound when the registry is
/// built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ItemMask(u32);

impl ItemMask {
    pub const CAPACITY: usize = 32;
    pub const EMPTY: Self = Self(0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, index: usize) -> bool {
        index < Self::CAPACITY && self.0 & (1 << index) != 0
    }

    pub fn insert(&mut self, index: usize) {
        if index < Self::CAPACITY {
            self.0 |= 1 << index;
        }
    }

    pub fn remove(&mut self, index: usize) {
        if index < Self::CAPACITY {
            self.0 &= !(1 << index);
        }
    }

    pub fn set(&mut self, index: usize, member: bool) {
        if member {
            self.insert(index);
        } else {
            self.remove(index);
        }
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::LowerHex for ItemMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// State of one screen on the navigation stack.
#[derive(Debug, Clone)]
pub struct UiState {
    pub screen: ScreenId,
    pub selected: usize,
    pub hidden: ItemMask,
    pub disabled: ItemMask,
    /// Paged text shown by log and diagnostics screens.
    pub pager: Option<LogPager>,
    /// Diagnostic screens: the test reached a terminal result.
    pub test_finished: bool,
}

impl UiState {
    pub fn new(screen: ScreenId) -> Self {
        Self {
            screen,
            selected: 0,
            hidden: ItemMask::EMPTY,
            disabled: ItemMask::EMPTY,
            pager: None,
            test_finished: false,
        }
    }

    pub fn current_page(&self) -> usize {
        self.pager.as_ref().map_or(0, LogPager::current_page)
    }

    /// First visible item at or after `from`, if any.
    pub fn first_visible(&self, from: usize, count: usize) -> Option<usize> {
        (from..count).find(|&i| !self.hidden.contains(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_ignores_out_of_range_indices() {
        let mut mask = ItemMask::EMPTY;
        mask.insert(3);
        mask.insert(ItemMask::CAPACITY);
        assert!(mask.contains(3));
        assert!(!mask.contains(ItemMask::CAPACITY));
        assert_eq!(mask.bits(), 0b1000);
        mask.set(3, false);
        assert!(mask.is_empty());
    }

    #[test]
    fn mask_formats_as_hex() {
        let mut mask = ItemMask::EMPTY;
        mask.insert(1);
        mask.insert(4);
        assert_eq!(format!("{mask:#x}"), "0x12");
    }

    #[test]
    fn first_visible_skips_hidden() {
        let mut state = UiState::new(ScreenId::RecoverySelect);
        state.hidden.insert(0);
        state.hidden.insert(1);
        assert_eq!(state.first_visible(0, 4), Some(2));
        state.hidden.insert(2);
        state.hidden.insert(3);
        assert_eq!(state.first_visible(0, 4), None);
    }
}
