//! Window base abstraction, shared handles, and the manager that stacks
//! them.
//!
//! Application code owns every window through a [`WindowHandle`]. The
//! [`WindowManager`] only keeps weak references, so dropping the last
//! handle removes a window from the screen on the next draw.
pub mod decorator;
mod window_manager;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crossterm::event::KeyEvent;

use crate::keybindings::KeyCombo;
use crate::surface::{Canvas, Geometry, Surface};

pub use window_manager::{MenuFunction, WindowManager};

/// Zero-argument action: key handlers, menu functions, activations.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

pub fn callback(f: impl Fn() + Send + Sync + 'static) -> Callback {
    Arc::new(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        WindowId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct SignalFlags {
    refresh: AtomicBool,
    erase: AtomicBool,
}

/// The manager's shared refresh/erase flags. Cheap to clone and safe to
/// raise from any thread.
#[derive(Debug, Clone, Default)]
pub struct RedrawSignal {
    flags: Arc<SignalFlags>,
}

impl RedrawSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_refresh(&self) {
        self.flags.refresh.store(true, Ordering::Release);
    }

    /// Wipe the screen before the next redraw, then redraw.
    pub fn request_erase(&self) {
        self.flags.erase.store(true, Ordering::Release);
        self.request_refresh();
    }

    pub fn is_refresh_pending(&self) -> bool {
        self.flags.refresh.load(Ordering::Acquire)
    }

    pub fn is_erase_pending(&self) -> bool {
        self.flags.erase.load(Ordering::Acquire)
    }

    pub(crate) fn take_refresh(&self) -> bool {
        self.flags.refresh.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn take_erase(&self) -> bool {
        self.flags.erase.swap(false, Ordering::AcqRel)
    }
}

/// What a window's built-in key handling did with a key.
pub enum KeyOutcome {
    Ignored,
    Handled,
    /// Handled, with a follow-up that runs once the window is unlocked. Use
    /// this for anything that may touch other windows or the manager.
    Deferred(Callback),
}

impl KeyOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, KeyOutcome::Ignored)
    }
}

/// State every window carries: identity, title, geometry, key handlers.
pub struct WindowBase {
    id: WindowId,
    title: String,
    surface: Surface,
    handlers: HashMap<KeyCombo, Callback>,
    signal: Option<RedrawSignal>,
}

impl fmt::Debug for WindowBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowBase")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("surface", &self.surface)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

fn min_width_for(title: &str) -> u16 {
    let chars = title.chars().count().min(u16::MAX as usize - 2) as u16;
    chars + 2
}

impl WindowBase {
    pub fn new(x: u16, y: u16, width: u16, height: u16, title: impl Into<String>) -> Self {
        let title = title.into();
        let surface = Surface::new(Geometry::new(x, y, width, height), min_width_for(&title));
        Self {
            id: WindowId::next(),
            title,
            surface,
            handlers: HashMap::new(),
            signal: None,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.surface.set_min_width(min_width_for(&self.title));
        self.request_redraw();
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Requested geometry; becomes visible on the next draw.
    pub fn geometry(&self) -> Geometry {
        self.surface.pending()
    }

    pub fn move_to(&mut self, x: u16, y: u16) {
        self.surface.move_to(x, y);
        self.request_redraw();
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.surface.resize(width, height);
        self.request_redraw();
    }

    pub fn content_width(&self) -> usize {
        usize::from(self.surface.pending().content_width())
    }

    pub fn content_height(&self) -> usize {
        usize::from(self.surface.pending().content_height())
    }

    pub fn add_key_handler(
        &mut self,
        key: impl Into<KeyCombo>,
        action: impl Fn() + Send + Sync + 'static,
    ) {
        self.handlers.insert(key.into(), Arc::new(action));
    }

    pub fn remove_key_handler(&mut self, key: impl Into<KeyCombo>) -> bool {
        self.handlers.remove(&key.into()).is_some()
    }

    pub fn handler_for(&self, key: &KeyEvent) -> Option<Callback> {
        self.handlers.get(&KeyCombo::from_event(key)).cloned()
    }

    /// Connect to a manager's redraw flags. Done by `WindowManager::register`.
    pub fn attach(&mut self, signal: RedrawSignal) {
        self.signal = Some(signal);
    }

    pub fn signal(&self) -> Option<&RedrawSignal> {
        self.signal.as_ref()
    }

    pub fn request_redraw(&self) {
        if let Some(signal) = &self.signal {
            signal.request_refresh();
        }
    }
}

/// A window the manager can stack, draw, and feed keys to.
///
/// The manager drives both halves of the draw/input protocol itself:
///
/// - Drawing: it commits pending geometry, blanks the window's rectangle,
///   calls [`draw_content`](Window::draw_content) with a canvas clipped to
///   the content area, and finally paints border and title.
/// - Input: it calls [`handle_key`](Window::handle_key) for the window's
///   built-in semantics and then always runs the handler registered on the
///   [`WindowBase`] for that key, so registered handlers keep working no
///   matter what an implementation does with the key.
pub trait Window: Send + 'static {
    fn base(&self) -> &WindowBase;
    fn base_mut(&mut self) -> &mut WindowBase;

    fn handle_key(&mut self, _key: &KeyEvent) -> KeyOutcome {
        KeyOutcome::Ignored
    }

    fn draw_content(&mut self, canvas: &mut Canvas<'_>);
}

pub(crate) fn lock_window<W: ?Sized>(window: &Mutex<W>) -> MutexGuard<'_, W> {
    window.lock().unwrap_or_else(|err| err.into_inner())
}

/// Owning, lockable reference to a window.
///
/// Never call manager methods while holding the guard returned by
/// [`lock`](WindowHandle::lock): the loop thread locks windows to draw
/// them.
pub struct WindowHandle<W: Window> {
    id: WindowId,
    inner: Arc<Mutex<W>>,
}

impl<W: Window> Clone for WindowHandle<W> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: self.inner.clone(),
        }
    }
}

impl<W: Window> WindowHandle<W> {
    pub fn new(window: W) -> Self {
        Self {
            id: window.base().id(),
            inner: Arc::new(Mutex::new(window)),
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, W> {
        lock_window(&self.inner)
    }

    pub(crate) fn downgrade(&self) -> WindowRef {
        let strong: Arc<Mutex<dyn Window>> = self.inner.clone();
        WindowRef {
            id: self.id,
            window: Arc::downgrade(&strong),
        }
    }
}

impl<W: Window> From<&WindowHandle<W>> for WindowId {
    fn from(handle: &WindowHandle<W>) -> Self {
        handle.id()
    }
}

/// Non-owning stack entry.
#[derive(Clone)]
pub(crate) struct WindowRef {
    id: WindowId,
    window: Weak<Mutex<dyn Window>>,
}

impl WindowRef {
    pub(crate) fn id(&self) -> WindowId {
        self.id
    }

    pub(crate) fn upgrade(&self) -> Option<Arc<Mutex<dyn Window>>> {
        self.window.upgrade()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyCode;
    use std::sync::atomic::AtomicUsize;

    struct Blank {
        base: WindowBase,
    }

    impl Window for Blank {
        fn base(&self) -> &WindowBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut WindowBase {
            &mut self.base
        }

        fn draw_content(&mut self, _canvas: &mut Canvas<'_>) {}
    }

    #[test]
    fn ids_are_unique() {
        let a = WindowBase::new(0, 0, 10, 5, "a");
        let b = WindowBase::new(0, 0, 10, 5, "b");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn width_grows_to_fit_title() {
        let base = WindowBase::new(0, 0, 4, 5, "Long title");
        assert_eq!(base.geometry().width, 12);
        assert_eq!(base.content_width(), 10);
    }

    #[test]
    fn retitle_raises_min_width() {
        let mut base = WindowBase::new(0, 0, 6, 5, "ab");
        base.set_title("a much longer one");
        assert_eq!(base.geometry().width, 19);
    }

    #[test]
    fn key_handlers_register_and_remove() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut base = WindowBase::new(0, 0, 10, 5, "t");
        let counter = hits.clone();
        base.add_key_handler('x', move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let key = KeyEvent::from(KeyCode::Char('x'));
        (base.handler_for(&key).expect("registered"))();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(base.handler_for(&KeyEvent::from(KeyCode::Char('y'))).is_none());
        assert!(base.remove_key_handler('x'));
        assert!(base.handler_for(&key).is_none());
    }

    #[test]
    fn move_and_resize_request_redraw_once_attached() {
        let signal = RedrawSignal::new();
        let mut base = WindowBase::new(0, 0, 10, 5, "t");
        base.move_to(1, 1);
        assert!(!signal.is_refresh_pending());
        base.attach(signal.clone());
        base.resize(20, 6);
        assert!(signal.take_refresh());
        assert_eq!(base.geometry(), Geometry::new(1, 1, 20, 6));
    }

    #[test]
    fn weak_ref_dies_with_last_handle() {
        let handle = WindowHandle::new(Blank {
            base: WindowBase::new(0, 0, 10, 5, "t"),
        });
        let weak = handle.downgrade();
        assert_eq!(weak.id(), handle.id());
        assert!(weak.upgrade().is_some());
        drop(handle);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn erase_implies_refresh() {
        let signal = RedrawSignal::new();
        signal.request_erase();
        assert!(signal.is_erase_pending());
        assert!(signal.take_refresh());
        assert!(signal.take_erase());
        assert!(!signal.take_erase());
    }
}
