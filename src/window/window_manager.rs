use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};

use crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::style::Style;

use super::decorator::{BoxDecorator, WindowDecorator};
use super::{Callback, KeyOutcome, RedrawSignal, Window, WindowHandle, WindowId, WindowRef};
use crate::components::function_bar;
use crate::config::WmConfig;
use crate::constants::MAX_MENU_FUNCTIONS;
use crate::drivers::{InputDriver, OutputDriver};
use crate::error::{WmError, WmResult};
use crate::event_loop::{ControlFlow, EventLoop};
use crate::keybindings::{Action, KeyBindings};
use crate::state::TerminalState;
use crate::surface::Canvas;
use crate::ui::{UiFrame, safe_fill};

use super::lock_window;

#[derive(Clone)]
pub struct MenuFunction {
    label: String,
    action: Callback,
}

impl MenuFunction {
    pub fn label(&self) -> &str {
        &self.label
    }
}

struct LoopIo {
    input: Box<dyn InputDriver>,
    output: Box<dyn OutputDriver>,
}

struct Shared {
    config: WmConfig,
    signal: RedrawSignal,
    decorator: Box<dyn WindowDecorator>,
    stack: Mutex<Vec<WindowRef>>,
    functions: Mutex<Vec<MenuFunction>>,
    terminal: Mutex<TerminalState>,
    quit_handler: Mutex<Option<Callback>>,
    running: AtomicBool,
    io: Mutex<Option<LoopIo>>,
    worker: Mutex<Option<JoinHandle<io::Result<()>>>>,
    loop_thread: Mutex<Option<ThreadId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// Owns the window stack, the function-key menu, and the loop thread.
///
/// Cloning yields another handle to the same manager; construct one per
/// process and pass clones to whatever needs to register windows or
/// request redraws. The back of the stack is the topmost, focused window.
///
/// None of the internal locks is held while a window or callback runs, so
/// callbacks may freely call back into the manager.
#[derive(Clone)]
pub struct WindowManager {
    shared: Arc<Shared>,
}

impl Default for WindowManager {
    fn default() -> Self {
        Self::new(WmConfig::default())
    }
}

impl WindowManager {
    pub fn new(config: WmConfig) -> Self {
        Self::with_decorator(config, Box::new(BoxDecorator))
    }

    pub fn with_decorator(config: WmConfig, decorator: Box<dyn WindowDecorator>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                signal: RedrawSignal::new(),
                decorator,
                stack: Mutex::new(Vec::new()),
                functions: Mutex::new(Vec::new()),
                terminal: Mutex::new(TerminalState::default()),
                quit_handler: Mutex::new(None),
                running: AtomicBool::new(false),
                io: Mutex::new(None),
                worker: Mutex::new(None),
                loop_thread: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &WmConfig {
        &self.shared.config
    }

    pub fn redraw_signal(&self) -> RedrawSignal {
        self.shared.signal.clone()
    }

    // ---- lifecycle -------------------------------------------------------

    /// Take over the terminal: enter raw mode and record its size. The
    /// drivers are handed to the loop thread by [`start`](Self::start).
    pub fn initialize(
        &self,
        input: impl InputDriver + 'static,
        mut output: impl OutputDriver + 'static,
    ) -> WmResult<()> {
        self.shared.config.validate()?;
        if self.is_running() {
            return Err(WmError::AlreadyRunning);
        }
        output.enter()?;
        let size = output.size()?;
        *lock(&self.shared.terminal) = TerminalState::new(size.0, size.1);
        *lock(&self.shared.io) = Some(LoopIo {
            input: Box::new(input),
            output: Box::new(output),
        });
        self.shared.signal.request_erase();
        tracing::info!(width = size.0, height = size.1, "terminal initialized");
        Ok(())
    }

    pub fn start(&self) -> WmResult<()> {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Err(WmError::AlreadyRunning);
        }
        let Some(io) = lock(&self.shared.io).take() else {
            self.shared.running.store(false, Ordering::Release);
            return Err(WmError::NotInitialized);
        };
        let wm = self.clone();
        let spawned = thread::Builder::new()
            .name("wm-loop".into())
            .spawn(move || wm.run_loop(io));
        match spawned {
            Ok(worker) => {
                *lock(&self.shared.worker) = Some(worker);
                tracing::info!("window manager started");
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::Release);
                Err(WmError::Io(err))
            }
        }
    }

    /// Stop the loop thread, wait for it, and restore the terminal.
    pub fn stop(&self) -> WmResult<()> {
        if self.on_loop_thread() {
            return Err(WmError::OnLoopThread("stop"));
        }
        self.shared.running.store(false, Ordering::Release);
        let worker = lock(&self.shared.worker).take();
        let Some(worker) = worker else {
            if let Some(mut io) = lock(&self.shared.io).take() {
                io.output.exit()?;
            }
            return Ok(());
        };
        let result = worker.join().map_err(|_| WmError::LoopPanicked)?;
        tracing::info!("window manager stopped");
        result.map_err(WmError::from)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn on_loop_thread(&self) -> bool {
        lock(&self.shared.loop_thread).is_some_and(|id| id == thread::current().id())
    }

    fn run_loop(&self, io: LoopIo) -> io::Result<()> {
        *lock(&self.shared.loop_thread) = Some(thread::current().id());
        let LoopIo { input, mut output } = io;
        self.shared.signal.request_refresh();
        let mut event_loop = EventLoop::new(input, self.shared.config.poll_interval);
        let result = event_loop.run(|event| {
            if !self.is_running() {
                return Ok(ControlFlow::Quit);
            }
            self.step(event, output.as_mut())?;
            Ok(ControlFlow::Continue)
        });
        if let Err(err) = &result {
            tracing::error!(error = %err, "window manager loop failed");
        }
        self.shared.running.store(false, Ordering::Release);
        *lock(&self.shared.loop_thread) = None;
        let exited = output.exit();
        result.and(exited)
    }

    /// One loop iteration: dispatch `event` (if any), redraw when requested,
    /// then check the terminal size.
    ///
    /// The loop thread calls this continuously; tests call it directly to
    /// drive the manager deterministically.
    pub fn step(&self, event: Option<Event>, output: &mut dyn OutputDriver) -> io::Result<()> {
        if let Some(event) = event {
            self.handle_event(&event);
        }
        if self.shared.signal.take_refresh() {
            self.draw(output)?;
        }
        let size = output.size()?;
        let mut terminal = lock(&self.shared.terminal);
        terminal.observe(size);
        if let Some((width, height)) = terminal.take_resize_change() {
            tracing::debug!(width, height, "terminal resized");
            self.shared.signal.request_erase();
        }
        Ok(())
    }

    // ---- terminal --------------------------------------------------------

    pub fn terminal_size(&self) -> (u16, u16) {
        lock(&self.shared.terminal).size()
    }

    pub fn terminal_width(&self) -> u16 {
        self.terminal_size().0
    }

    pub fn terminal_height(&self) -> u16 {
        self.terminal_size().1
    }

    // ---- redraw flags ----------------------------------------------------

    pub fn request_refresh(&self) {
        self.shared.signal.request_refresh();
    }

    pub fn request_erase(&self) {
        self.shared.signal.request_erase();
    }

    pub fn refresh_pending(&self) -> bool {
        self.shared.signal.is_refresh_pending()
    }

    pub fn erase_pending(&self) -> bool {
        self.shared.signal.is_erase_pending()
    }

    // ---- window stack ----------------------------------------------------

    /// Put `window` on top of the stack unless it is already registered.
    pub fn register<W: Window>(&self, window: &WindowHandle<W>) {
        window
            .lock()
            .base_mut()
            .attach(self.shared.signal.clone());
        let mut stack = lock(&self.shared.stack);
        if stack.iter().any(|entry| entry.id() == window.id()) {
            return;
        }
        stack.push(window.downgrade());
        tracing::debug!(window_id = %window.id(), depth = stack.len(), "window registered");
        drop(stack);
        self.request_refresh();
    }

    pub fn deregister(&self, window: impl Into<WindowId>) {
        let id = window.into();
        let mut stack = lock(&self.shared.stack);
        let before = stack.len();
        stack.retain(|entry| entry.id() != id);
        if stack.len() == before {
            return;
        }
        tracing::debug!(window_id = %id, depth = stack.len(), "window deregistered");
        drop(stack);
        self.request_erase();
    }

    /// Raise an already registered window to the top.
    pub fn set_focus(&self, window: impl Into<WindowId>) {
        let id = window.into();
        let mut stack = lock(&self.shared.stack);
        let Some(index) = stack.iter().position(|entry| entry.id() == id) else {
            return;
        };
        let entry = stack.remove(index);
        stack.push(entry);
        drop(stack);
        self.request_refresh();
    }

    pub fn is_registered(&self, window: impl Into<WindowId>) -> bool {
        let id = window.into();
        lock(&self.shared.stack).iter().any(|entry| entry.id() == id)
    }

    /// Stack order, bottom first.
    pub fn window_ids(&self) -> Vec<WindowId> {
        lock(&self.shared.stack).iter().map(WindowRef::id).collect()
    }

    pub fn focused(&self) -> Option<WindowId> {
        lock(&self.shared.stack).last().map(WindowRef::id)
    }

    /// Rotate the topmost window to the bottom.
    pub fn cycle_focus(&self) {
        let mut stack = lock(&self.shared.stack);
        if let Some(top) = stack.pop() {
            stack.insert(0, top);
        }
        drop(stack);
        self.request_refresh();
    }

    /// Live windows bottom to top. Entries whose window was dropped are
    /// pruned.
    fn live_windows(&self) -> Vec<(WindowId, Arc<Mutex<dyn Window>>)> {
        let mut stack = lock(&self.shared.stack);
        let mut live = Vec::with_capacity(stack.len());
        stack.retain(|entry| match entry.upgrade() {
            Some(window) => {
                live.push((entry.id(), window));
                true
            }
            None => {
                tracing::debug!(window_id = %entry.id(), "pruning dropped window");
                false
            }
        });
        live
    }

    // ---- function menu ---------------------------------------------------

    /// Bind the next free function key. Returns `false` once all twelve are
    /// taken; the registration is dropped in that case.
    pub fn add_menu_function(
        &self,
        label: impl Into<String>,
        action: impl Fn() + Send + Sync + 'static,
    ) -> bool {
        let mut functions = lock(&self.shared.functions);
        let added = functions.len() < MAX_MENU_FUNCTIONS;
        if added {
            functions.push(MenuFunction {
                label: label.into(),
                action: Arc::new(action),
            });
        } else {
            tracing::debug!("menu function dropped, all function keys bound");
        }
        drop(functions);
        self.request_refresh();
        added
    }

    pub fn menu_functions(&self) -> Vec<MenuFunction> {
        lock(&self.shared.functions).clone()
    }

    /// Run the function at `index` (F1 is 0). Out-of-range indices are
    /// ignored.
    pub fn execute_menu_function(&self, index: usize) -> bool {
        let action = lock(&self.shared.functions)
            .get(index)
            .map(|function| function.action.clone());
        match action {
            Some(action) => {
                tracing::debug!(index, "menu function");
                action();
                true
            }
            None => false,
        }
    }

    /// Action for the quit binding (Ctrl+Q / Ctrl+C). Without one, those
    /// keys reach the focused window like any other.
    pub fn set_quit_handler(&self, action: impl Fn() + Send + Sync + 'static) {
        *lock(&self.shared.quit_handler) = Some(Arc::new(action));
    }

    // ---- input -----------------------------------------------------------

    pub fn handle_event(&self, event: &Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Resize(..) => self.request_erase(),
            _ => {}
        }
    }

    fn handle_key(&self, key: &KeyEvent) {
        if let KeyCode::F(n) = key.code {
            if let Some(index) = n.checked_sub(1) {
                self.execute_menu_function(usize::from(index));
            }
            return;
        }
        let bindings = KeyBindings::global();
        if bindings.matches(Action::FocusNext, key) {
            self.cycle_focus();
            return;
        }
        if bindings.matches(Action::Quit, key) {
            let quit = lock(&self.shared.quit_handler).clone();
            if let Some(quit) = quit {
                quit();
                return;
            }
        }
        self.dispatch_to_focused(key);
    }

    fn dispatch_to_focused(&self, key: &KeyEvent) {
        let top = lock(&self.shared.stack).last().and_then(WindowRef::upgrade);
        let Some(window) = top else {
            return;
        };
        let (outcome, handler) = {
            let mut window = lock_window(&*window);
            let outcome = window.handle_key(key);
            (outcome, window.base().handler_for(key))
        };
        let handled = !outcome.is_ignored() || handler.is_some();
        if let KeyOutcome::Deferred(follow_up) = outcome {
            follow_up();
        }
        if let Some(handler) = handler {
            handler();
        }
        if handled {
            self.request_refresh();
        }
    }

    // ---- drawing ---------------------------------------------------------

    /// Repaint every window bottom to top, then the function bar.
    pub fn draw(&self, output: &mut dyn OutputDriver) -> io::Result<()> {
        if self.shared.signal.take_erase() {
            output.clear()?;
        }
        let windows = self.live_windows();
        let labels: Vec<String> = if self.shared.config.function_bar {
            lock(&self.shared.functions)
                .iter()
                .map(|function| function.label.clone())
                .collect()
        } else {
            Vec::new()
        };
        let decorator = self.shared.decorator.as_ref();
        output.draw(&mut |frame| {
            let top = windows.len().saturating_sub(1);
            for (index, (id, window)) in windows.iter().enumerate() {
                let mut window = lock_window(&**window);
                paint_window(frame, *id, &mut *window, index == top, decorator);
            }
            function_bar::render(frame, &labels);
        })
    }
}

fn paint_window(
    frame: &mut UiFrame<'_>,
    id: WindowId,
    window: &mut dyn Window,
    focused: bool,
    decorator: &dyn WindowDecorator,
) {
    let (geometry, was_stale) = window.base_mut().surface_mut().commit();
    if was_stale {
        tracing::debug!(window_id = %id, ?geometry, "geometry committed");
    }
    let bounds = frame.area();
    let buffer = frame.buffer_mut();
    let rect = geometry.rect();
    safe_fill(buffer, bounds, rect, Style::default());
    {
        let mut canvas = Canvas::new(buffer, geometry.inner());
        window.draw_content(&mut canvas);
    }
    decorator.render_window(buffer, rect, bounds, window.base().title(), focused);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::headless::BufferOutputDriver;
    use crate::window::WindowBase;
    use std::sync::atomic::AtomicUsize;

    struct Label {
        base: WindowBase,
        text: String,
        keys: Arc<Mutex<Vec<KeyCode>>>,
    }

    impl Label {
        fn handle(title: &str, x: u16, y: u16) -> WindowHandle<Label> {
            WindowHandle::new(Label {
                base: WindowBase::new(x, y, 12, 4, title),
                text: format!("in {title}"),
                keys: Arc::default(),
            })
        }
    }

    impl Window for Label {
        fn base(&self) -> &WindowBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut WindowBase {
            &mut self.base
        }

        fn handle_key(&mut self, key: &KeyEvent) -> KeyOutcome {
            self.keys.lock().unwrap().push(key.code);
            if key.code == KeyCode::Char('h') {
                KeyOutcome::Handled
            } else {
                KeyOutcome::Ignored
            }
        }

        fn draw_content(&mut self, canvas: &mut Canvas<'_>) {
            canvas.print_at(0, 0, &self.text);
        }
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::from(code))
    }

    #[test]
    fn register_is_idempotent_and_requests_refresh() {
        let wm = WindowManager::default();
        let a = Label::handle("a", 0, 0);
        wm.register(&a);
        assert!(wm.refresh_pending());
        wm.register(&a);
        assert_eq!(wm.window_ids(), vec![a.id()]);
    }

    #[test]
    fn deregister_requests_erase_only_when_present() {
        let wm = WindowManager::default();
        let a = Label::handle("a", 0, 0);
        wm.deregister(&a);
        assert!(!wm.erase_pending());
        wm.register(&a);
        wm.deregister(&a);
        assert!(wm.erase_pending());
        assert!(wm.window_ids().is_empty());
    }

    #[test]
    fn set_focus_moves_registered_window_to_top() {
        let wm = WindowManager::default();
        let a = Label::handle("a", 0, 0);
        let b = Label::handle("b", 0, 0);
        let stranger = Label::handle("c", 0, 0);
        wm.register(&a);
        wm.register(&b);
        wm.set_focus(&a);
        assert_eq!(wm.window_ids(), vec![b.id(), a.id()]);
        wm.set_focus(&stranger);
        assert_eq!(wm.window_ids(), vec![b.id(), a.id()]);
        assert!(!wm.is_registered(&stranger));
    }

    #[test]
    fn tab_with_single_window_keeps_order_and_redraws() {
        let wm = WindowManager::default();
        let a = Label::handle("a", 0, 0);
        wm.register(&a);
        wm.shared.signal.take_refresh();
        wm.handle_event(&key(KeyCode::Tab));
        assert_eq!(wm.window_ids(), vec![a.id()]);
        assert!(wm.refresh_pending());
        assert!(a.lock().keys.lock().unwrap().is_empty());
    }

    #[test]
    fn tab_rotates_top_to_bottom() {
        let wm = WindowManager::default();
        let handles: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|t| Label::handle(t, 0, 0))
            .collect();
        for h in &handles {
            wm.register(h);
        }
        wm.handle_event(&key(KeyCode::Tab));
        assert_eq!(
            wm.window_ids(),
            vec![handles[2].id(), handles[0].id(), handles[1].id()]
        );
        assert_eq!(wm.focused(), Some(handles[1].id()));
    }

    #[test]
    fn function_keys_map_to_menu_indices() {
        let wm = WindowManager::default();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let hits = hits.clone();
            assert!(wm.add_menu_function("x", move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        // F6 is index 5, beyond the two registered functions
        wm.handle_event(&key(KeyCode::F(6)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        wm.handle_event(&key(KeyCode::F(2)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        wm.handle_event(&key(KeyCode::F(0)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn menu_functions_cap_at_twelve() {
        let wm = WindowManager::default();
        for i in 0..MAX_MENU_FUNCTIONS {
            assert!(wm.add_menu_function(format!("f{i}"), || {}));
        }
        wm.shared.signal.take_refresh();
        assert!(!wm.add_menu_function("extra", || {}));
        assert_eq!(wm.menu_functions().len(), MAX_MENU_FUNCTIONS);
        assert!(wm.refresh_pending());
    }

    #[test]
    fn keys_reach_builtin_then_registered_handler() {
        let wm = WindowManager::default();
        let a = Label::handle("a", 0, 0);
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = hits.clone();
            a.lock().base_mut().add_key_handler('h', move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        wm.register(&a);
        wm.handle_event(&key(KeyCode::Char('h')));
        wm.handle_event(&key(KeyCode::Char('z')));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            *a.lock().keys.lock().unwrap(),
            vec![KeyCode::Char('h'), KeyCode::Char('z')]
        );
    }

    #[test]
    fn quit_binding_runs_handler_instead_of_window() {
        let wm = WindowManager::default();
        let a = Label::handle("a", 0, 0);
        wm.register(&a);
        let quit = Arc::new(AtomicBool::new(false));
        {
            let quit = quit.clone();
            wm.set_quit_handler(move || quit.store(true, Ordering::SeqCst));
        }
        wm.handle_event(&Event::Key(KeyEvent::new(
            KeyCode::Char('q'),
            crossterm::event::KeyModifiers::CONTROL,
        )));
        assert!(quit.load(Ordering::SeqCst));
        assert!(a.lock().keys.lock().unwrap().is_empty());
    }

    #[test]
    fn draw_paints_stack_and_function_bar() {
        let wm = WindowManager::default();
        let mut output = BufferOutputDriver::new(30, 8).unwrap();
        let screen = output.screen();
        // already sized, so the step below sees no resize
        *lock(&wm.shared.terminal) = TerminalState::new(30, 8);
        let back = Label::handle("back", 0, 0);
        let front = Label::handle("front", 14, 2);
        wm.register(&back);
        wm.register(&front);
        wm.add_menu_function("Help", || {});
        wm.add_menu_function("Exit", || {});

        wm.step(None, &mut output).unwrap();

        assert_eq!(screen.row_text(0), "┌───back───┐");
        assert!(screen.row_text(1).starts_with("│in back"));
        assert_eq!(screen.row_text(2).chars().nth(14), Some('+'));
        assert!(screen.row_text(3).contains("in front"));
        assert_eq!(screen.row_text(7), "F1HelpF2Exit");
        let frame = screen.last_frame().unwrap();
        let reversed = |x: u16| {
            frame
                .cell((x, 7))
                .unwrap()
                .modifier
                .contains(ratatui::style::Modifier::REVERSED)
        };
        assert!(!reversed(0));
        assert!(reversed(2));
        assert!(reversed(29));
        assert!(!wm.refresh_pending());
    }

    #[test]
    fn dropped_windows_disappear() {
        let wm = WindowManager::default();
        let mut output = BufferOutputDriver::new(20, 6).unwrap();
        let a = Label::handle("a", 0, 0);
        wm.register(&a);
        drop(a);
        wm.request_refresh();
        wm.step(None, &mut output).unwrap();
        assert!(wm.window_ids().is_empty());
    }

    #[test]
    fn resize_forces_erase() {
        let wm = WindowManager::default();
        let mut output = BufferOutputDriver::new(20, 6).unwrap();
        let screen = output.screen();
        wm.step(None, &mut output).unwrap();
        wm.shared.signal.take_erase();
        wm.shared.signal.take_refresh();
        screen.resize(40, 10);
        wm.step(None, &mut output).unwrap();
        assert_eq!(wm.terminal_size(), (40, 10));
        assert!(wm.erase_pending());
        wm.step(None, &mut output).unwrap();
        assert_eq!(screen.clear_count(), 1);
    }

    #[test]
    fn lifecycle_errors() {
        let wm = WindowManager::default();
        assert!(matches!(wm.start(), Err(WmError::NotInitialized)));
        assert!(!wm.is_running());
        assert!(wm.stop().is_ok());
    }
}
