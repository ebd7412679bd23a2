use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use crossterm::event::KeyEvent;

use crate::error::{WmError, WmResult};
use crate::keybindings::{Action, KeyBindings};
use crate::surface::Canvas;
use crate::theme;
use crate::window::{Callback, KeyOutcome, Window, WindowBase, WindowHandle, WindowManager};

const OK_BUTTON: &str = " OK ";
const YES_BUTTON: &str = " YES ";
const NO_BUTTON: &str = " NO ";
const BUTTON_GAP: usize = 2;
const HORIZONTAL_PADDING: usize = 6;
const VERTICAL_PADDING: usize = 7;

/// Wrapped text shared by all message windows.
struct MessageBody {
    lines: Vec<String>,
}

impl MessageBody {
    fn new(message: &str) -> Self {
        Self {
            lines: message.lines().map(str::to_string).collect(),
        }
    }

    /// Geometry centered on the terminal, shrunk to fit it when the
    /// terminal size is known.
    fn base(&self, wm: &WindowManager, title: String, min_inner: usize) -> WindowBase {
        let widest = self
            .lines
            .iter()
            .map(|line| line.chars().count())
            .chain([title.chars().count(), min_inner])
            .max()
            .unwrap_or(0);
        let mut width = clamp_u16(widest + HORIZONTAL_PADDING);
        let mut height = clamp_u16(self.lines.len() + VERTICAL_PADDING);
        let (term_width, term_height) = wm.terminal_size();
        if term_width > 0 && term_height > 0 {
            width = width.min(term_width);
            // leave the function bar visible
            height = height.min(term_height.saturating_sub(1).max(1));
        }
        let x = term_width.saturating_sub(width) / 2;
        let y = term_height.saturating_sub(height) / 2;
        WindowBase::new(x, y, width, height, title)
    }

    fn paint(&self, canvas: &mut Canvas<'_>) {
        for (row, line) in self.lines.iter().enumerate() {
            let x = centered(canvas.width(), line.chars().count());
            canvas.print_at(x, (row + 1) as u16, line);
        }
    }

    fn button_row(&self) -> u16 {
        clamp_u16(self.lines.len() + 2)
    }
}

fn clamp_u16(value: usize) -> u16 {
    value.min(usize::from(u16::MAX)) as u16
}

fn centered(width: u16, len: usize) -> u16 {
    (usize::from(width).saturating_sub(len) / 2) as u16
}

fn paint_button(canvas: &mut Canvas<'_>, x: u16, y: u16, label: &str, selected: bool) {
    canvas.set_style(theme::button(selected));
    canvas.print_at(x, y, label);
    canvas.set_style(Default::default());
}

/// Centered text without buttons, e.g. a "please wait" notice. Remove it
/// with [`WindowManager::deregister`].
pub struct MessageWindow {
    base: WindowBase,
    body: MessageBody,
}

impl MessageWindow {
    pub fn new(wm: &WindowManager, title: impl Into<String>, message: &str) -> Self {
        let body = MessageBody::new(message);
        Self {
            base: body.base(wm, title.into(), 0),
            body,
        }
    }

    /// Build, register, and focus a message window.
    pub fn show(wm: &WindowManager, title: impl Into<String>, message: &str) -> WindowHandle<Self> {
        let handle = WindowHandle::new(Self::new(wm, title, message));
        wm.register(&handle);
        wm.set_focus(&handle);
        handle
    }
}

impl Window for MessageWindow {
    fn base(&self) -> &WindowBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WindowBase {
        &mut self.base
    }

    fn draw_content(&mut self, canvas: &mut Canvas<'_>) {
        self.body.paint(canvas);
    }
}

/// Message with a single ` OK ` button. Enter closes the window, then runs
/// the callback.
pub struct OkMessageWindow {
    base: WindowBase,
    body: MessageBody,
    wm: WindowManager,
    on_click: Callback,
}

impl OkMessageWindow {
    pub fn new(
        wm: &WindowManager,
        title: impl Into<String>,
        message: &str,
        on_click: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let body = MessageBody::new(message);
        Self {
            base: body.base(wm, title.into(), OK_BUTTON.len()),
            body,
            wm: wm.clone(),
            on_click: Arc::new(on_click),
        }
    }
}

impl Window for OkMessageWindow {
    fn base(&self) -> &WindowBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WindowBase {
        &mut self.base
    }

    fn handle_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        if !KeyBindings::global().matches(Action::Accept, key) {
            return KeyOutcome::Ignored;
        }
        let wm = self.wm.clone();
        let id = self.base.id();
        let on_click = self.on_click.clone();
        KeyOutcome::Deferred(Arc::new(move || {
            wm.deregister(id);
            on_click();
        }))
    }

    fn draw_content(&mut self, canvas: &mut Canvas<'_>) {
        self.body.paint(canvas);
        let x = centered(canvas.width(), OK_BUTTON.len());
        paint_button(canvas, x, self.body.button_row(), OK_BUTTON, true);
    }
}

pub type ChoiceCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Message with ` YES ` and ` NO ` buttons. Left/Right move the selection,
/// Enter closes the window and reports the choice (`true` for yes).
pub struct YesNoMessageWindow {
    base: WindowBase,
    body: MessageBody,
    wm: WindowManager,
    yes_selected: bool,
    on_choice: ChoiceCallback,
}

impl YesNoMessageWindow {
    pub fn new(
        wm: &WindowManager,
        title: impl Into<String>,
        message: &str,
        on_choice: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        let body = MessageBody::new(message);
        let buttons = YES_BUTTON.len() + BUTTON_GAP + NO_BUTTON.len();
        Self {
            base: body.base(wm, title.into(), buttons),
            body,
            wm: wm.clone(),
            yes_selected: true,
            on_choice: Arc::new(on_choice),
        }
    }

    pub fn yes_selected(&self) -> bool {
        self.yes_selected
    }
}

impl Window for YesNoMessageWindow {
    fn base(&self) -> &WindowBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WindowBase {
        &mut self.base
    }

    fn handle_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        let bindings = KeyBindings::global();
        if bindings.matches(Action::ChooseLeft, key) {
            self.yes_selected = true;
            return KeyOutcome::Handled;
        }
        if bindings.matches(Action::ChooseRight, key) {
            self.yes_selected = false;
            return KeyOutcome::Handled;
        }
        if !bindings.matches(Action::Accept, key) {
            return KeyOutcome::Ignored;
        }
        let wm = self.wm.clone();
        let id = self.base.id();
        let on_choice = self.on_choice.clone();
        let choice = self.yes_selected;
        KeyOutcome::Deferred(Arc::new(move || {
            wm.deregister(id);
            on_choice(choice);
        }))
    }

    fn draw_content(&mut self, canvas: &mut Canvas<'_>) {
        self.body.paint(canvas);
        let total = YES_BUTTON.len() + BUTTON_GAP + NO_BUTTON.len();
        let x = centered(canvas.width(), total);
        let y = self.body.button_row();
        paint_button(canvas, x, y, YES_BUTTON, self.yes_selected);
        let no_x = x + (YES_BUTTON.len() + BUTTON_GAP) as u16;
        paint_button(canvas, no_x, y, NO_BUTTON, !self.yes_selected);
    }
}

fn ensure_can_block(wm: &WindowManager, operation: &'static str) -> WmResult<()> {
    if wm.on_loop_thread() {
        return Err(WmError::OnLoopThread(operation));
    }
    if !wm.is_running() {
        return Err(WmError::NotRunning);
    }
    Ok(())
}

/// Wait for a modal answer, giving up when the manager stops.
fn wait_for<T>(wm: &WindowManager, replies: &crossbeam_channel::Receiver<T>) -> WmResult<T> {
    let poll = wm.config().poll_interval.max(Duration::from_millis(10));
    loop {
        match replies.recv_timeout(poll) {
            Ok(value) => return Ok(value),
            Err(RecvTimeoutError::Timeout) if wm.is_running() => {}
            Err(RecvTimeoutError::Timeout) => return Err(WmError::NotRunning),
            Err(RecvTimeoutError::Disconnected) => return Err(WmError::ModalClosed),
        }
    }
}

/// Show a Yes/No question and block until the user answers.
///
/// Must be called from a thread other than the manager's loop thread while
/// the manager is running.
pub fn confirm(wm: &WindowManager, title: impl Into<String>, message: &str) -> WmResult<bool> {
    ensure_can_block(wm, "confirm")?;
    let (reply, replies) = crossbeam_channel::bounded(1);
    let window = WindowHandle::new(YesNoMessageWindow::new(wm, title, message, move |choice| {
        let _ = reply.try_send(choice);
    }));
    wm.register(&window);
    wm.set_focus(&window);
    let answer = wait_for(wm, &replies);
    wm.deregister(&window);
    answer
}

/// Show an OK message and block until it is dismissed.
pub fn acknowledge(wm: &WindowManager, title: impl Into<String>, message: &str) -> WmResult<()> {
    ensure_can_block(wm, "acknowledge")?;
    let (reply, replies) = crossbeam_channel::bounded(1);
    let window = WindowHandle::new(OkMessageWindow::new(wm, title, message, move || {
        let _ = reply.try_send(());
    }));
    wm.register(&window);
    wm.set_focus(&window);
    let answer = wait_for(wm, &replies);
    wm.deregister(&window);
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::headless::row_text;
    use crossterm::event::{Event, KeyCode};
    use ratatui::buffer::Buffer;
    use ratatui::layout::Rect;
    use ratatui::style::Modifier;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::from(code))
    }

    #[test]
    fn size_follows_text_and_title() {
        let wm = WindowManager::default();
        let window = MessageWindow::new(&wm, "T", "first line\nsecond");
        let geometry = window.base().geometry();
        assert_eq!(geometry.width, 10 + 6);
        assert_eq!(geometry.height, 2 + 7);

        let yes_no = YesNoMessageWindow::new(&wm, "Q", "?", |_| {});
        assert!(yes_no.base().geometry().width >= 11 + 6);
    }

    #[test]
    fn ok_window_closes_then_calls_back() {
        let wm = WindowManager::default();
        let clicked = Arc::new(AtomicBool::new(false));
        let window = {
            let clicked = clicked.clone();
            WindowHandle::new(OkMessageWindow::new(&wm, "Done", "All set", move || {
                clicked.store(true, Ordering::SeqCst);
            }))
        };
        wm.register(&window);
        wm.handle_event(&key(KeyCode::Char('x')));
        assert!(wm.is_registered(&window));
        wm.handle_event(&key(KeyCode::Enter));
        assert!(clicked.load(Ordering::SeqCst));
        assert!(!wm.is_registered(&window));
    }

    #[test]
    fn yes_no_reports_the_selected_button() {
        let wm = WindowManager::default();
        let choices = Arc::new(Mutex::new(Vec::new()));
        let window = {
            let choices = choices.clone();
            WindowHandle::new(YesNoMessageWindow::new(&wm, "Q", "Continue?", move |c| {
                choices.lock().unwrap().push(c);
            }))
        };
        wm.register(&window);
        wm.handle_event(&key(KeyCode::Right));
        assert!(!window.lock().yes_selected());
        wm.handle_event(&key(KeyCode::Enter));
        assert_eq!(*choices.lock().unwrap(), vec![false]);
        assert!(wm.window_ids().is_empty());
    }

    #[test]
    fn buttons_render_below_text() {
        let wm = WindowManager::default();
        let mut window = YesNoMessageWindow::new(&wm, "Q", "Go?", |_| {});
        let area = Rect::new(0, 0, 20, 6);
        let mut buffer = Buffer::empty(area);
        window.draw_content(&mut Canvas::new(&mut buffer, area));
        assert_eq!(row_text(&buffer, 1).trim(), "Go?");
        assert_eq!(row_text(&buffer, 3).trim(), "YES    NO");
        let yes_x = (20 - 11) / 2;
        let reversed = |x: u16| buffer.cell((x, 3)).unwrap().modifier.contains(Modifier::REVERSED);
        assert!(reversed(yes_x));
        assert!(!reversed(yes_x + 7));
    }

    #[test]
    fn blocking_helpers_refuse_when_not_running() {
        let wm = WindowManager::default();
        assert!(matches!(confirm(&wm, "Q", "?"), Err(WmError::NotRunning)));
        assert!(matches!(acknowledge(&wm, "Q", "?"), Err(WmError::NotRunning)));
        assert!(wm.window_ids().is_empty());
    }
}
