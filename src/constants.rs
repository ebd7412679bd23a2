//! Shared crate-wide constants.

/// Width in cells of the frame drawn around every window.
pub const BORDER_WIDTH: u16 = 1;

/// Smallest outer width/height a window may have: a border on both sides
/// around a single content cell.
pub const MIN_WINDOW_SIZE: u16 = 1 + BORDER_WIDTH * 2;

/// Function keys F1..=F12 map onto menu function slots.
pub const MAX_MENU_FUNCTIONS: usize = 12;

/// Upper bound for a single input poll on the loop thread. Keeps resize
/// detection and redraw requests responsive.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

/// Column width of the label part of a formatted counter row.
pub const COUNTER_LABEL_WIDTH: usize = 40;

/// Columns of indentation per menu tree level.
pub const MENU_INDENT: u16 = 4;
