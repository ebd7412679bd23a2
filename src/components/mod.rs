//! Concrete windows built on [`crate::window::Window`].

pub mod debug_log;
pub mod function_bar;
pub mod list;
pub mod live_refresh;
pub mod menu;
pub mod message;

pub use debug_log::{DebugLogHandle, DebugLogWindow, DebugLogWriter};
pub use list::{ListCursor, ScrollableList};
pub use live_refresh::LiveRefreshWindow;
pub use menu::{ExpandableMenu, MenuNode, MenuSelection};
pub use message::{
    MessageWindow, OkMessageWindow, YesNoMessageWindow, acknowledge, confirm,
};
