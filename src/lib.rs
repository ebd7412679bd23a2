//! A small terminal window manager: a stack of bordered windows, keyboard
//! focus on the topmost one, and a function-key menu on the last row.
//!
//! Windows are plain structs implementing [`window::Window`], owned by the
//! application through [`window::WindowHandle`]s and registered with a
//! [`window::WindowManager`], which draws them from its own loop thread.

pub mod components;
pub mod config;
pub mod constants;
pub mod drivers;
pub mod error;
pub mod event_loop;
pub mod keybindings;
pub mod state;
pub mod surface;
pub mod theme;
pub mod tracing_sub;
pub mod ui;
pub mod window;

pub use config::WmConfig;
pub use error::{WmError, WmResult};
pub use window::{Window, WindowBase, WindowHandle, WindowId, WindowManager};
