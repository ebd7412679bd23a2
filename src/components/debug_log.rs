use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock};

use crossterm::event::KeyEvent;

use super::list::ListCursor;
use crate::surface::Canvas;
use crate::theme;
use crate::window::{KeyOutcome, RedrawSignal, Window, WindowBase};

pub const DEFAULT_MAX_LINES: usize = 2000;
static GLOBAL_LOG: OnceLock<DebugLogHandle> = OnceLock::new();
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

pub fn set_global_debug_log(handle: DebugLogHandle) -> bool {
    GLOBAL_LOG.set(handle).is_ok()
}

pub fn global_debug_log() -> Option<DebugLogHandle> {
    GLOBAL_LOG.get().cloned()
}

/// Copy panic reports into the global log. The terminal is in raw mode on
/// the alternate screen while the manager runs, so stderr output would be
/// lost.
pub fn install_panic_hook() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(handle) = GLOBAL_LOG.get() {
            handle.push("=== PANIC ===");
            if let Some(location) = info.location() {
                handle.push(format!(
                    "{}:{}:{}",
                    location.file(),
                    location.line(),
                    location.column()
                ));
            }
            if let Some(msg) = info.payload().downcast_ref::<&str>() {
                handle.push(format!("message: {msg}"));
            } else if let Some(msg) = info.payload().downcast_ref::<String>() {
                handle.push(format!("message: {msg}"));
            } else {
                handle.push("message: <non-string panic>");
            }
            handle.push("============");
        }
        prev(info);
    }));
}

#[derive(Debug)]
struct DebugLogBuffer {
    lines: VecDeque<String>,
    max_lines: usize,
}

impl DebugLogBuffer {
    fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
        }
    }

    fn push_line(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }
}

/// Bounded in-memory log shared between the tracing writer and the log
/// window.
#[derive(Clone, Debug)]
pub struct DebugLogHandle {
    inner: Arc<Mutex<DebugLogBuffer>>,
    signal: Arc<Mutex<Option<RedrawSignal>>>,
}

impl Default for DebugLogHandle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl DebugLogHandle {
    pub fn new(max_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DebugLogBuffer::new(max_lines))),
            signal: Arc::new(Mutex::new(None)),
        }
    }

    /// Raised on every push while set, so an open log window keeps up.
    pub fn set_redraw_signal(&self, signal: Option<RedrawSignal>) {
        if let Ok(mut slot) = self.signal.lock() {
            *slot = signal;
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        if let Ok(mut buffer) = self.inner.lock() {
            buffer.push_line(line.into());
        }
        if let Ok(slot) = self.signal.lock()
            && let Some(signal) = slot.as_ref()
        {
            signal.request_refresh();
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|buffer| buffer.lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|buffer| buffer.lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn writer(&self) -> DebugLogWriter {
        DebugLogWriter::new(self.clone())
    }
}

/// `io::Write` adapter that splits output into log lines.
#[derive(Debug)]
pub struct DebugLogWriter {
    handle: DebugLogHandle,
    pending: Vec<u8>,
}

impl DebugLogWriter {
    pub fn new(handle: DebugLogHandle) -> Self {
        Self {
            handle,
            pending: Vec::new(),
        }
    }

    fn flush_pending(&mut self, force: bool) {
        if self.pending.is_empty() {
            return;
        }
        let end = if force {
            self.pending.len()
        } else {
            match self.pending.iter().rposition(|b| *b == b'\n') {
                Some(pos) => pos + 1,
                None => return,
            }
        };
        let drained: Vec<u8> = self.pending.drain(..end).collect();
        let text = String::from_utf8_lossy(&drained);
        for line in text.split('\n') {
            if !line.is_empty() {
                self.handle.push(line.to_string());
            }
        }
    }
}

impl Write for DebugLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.flush_pending(false);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending(true);
        Ok(())
    }
}

impl Drop for DebugLogWriter {
    fn drop(&mut self) {
        self.flush_pending(true);
    }
}

/// Scrollable view of a [`DebugLogHandle`] that follows the newest line
/// until the user scrolls away from it.
pub struct DebugLogWindow {
    base: WindowBase,
    handle: DebugLogHandle,
    cursor: ListCursor,
    follow_tail: bool,
}

impl DebugLogWindow {
    pub fn new(
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        title: impl Into<String>,
        handle: DebugLogHandle,
    ) -> Self {
        Self {
            base: WindowBase::new(x, y, width, height, title),
            handle,
            cursor: ListCursor::default(),
            follow_tail: true,
        }
    }

    pub fn handle(&self) -> &DebugLogHandle {
        &self.handle
    }

    pub fn is_following(&self) -> bool {
        self.follow_tail
    }
}

impl Window for DebugLogWindow {
    fn base(&self) -> &WindowBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WindowBase {
        &mut self.base
    }

    fn handle_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        let total = self.handle.len();
        if self.follow_tail {
            self.cursor.down_to_end(total, self.base.content_height());
        }
        if !self.cursor.navigate(key, total, self.base.content_height()) {
            return KeyOutcome::Ignored;
        }
        self.follow_tail = self.cursor.position() + 1 >= total;
        KeyOutcome::Handled
    }

    fn draw_content(&mut self, canvas: &mut Canvas<'_>) {
        let lines = self.handle.lines();
        let visible = usize::from(canvas.height());
        if self.follow_tail {
            self.cursor.down_to_end(lines.len(), visible);
        }
        self.cursor.clamp(lines.len(), visible);
        let highlight = self.cursor.highlight();
        for (row, line) in lines
            .iter()
            .skip(self.cursor.scroll())
            .take(visible)
            .enumerate()
        {
            let mut style = if line.contains("ERROR") {
                theme::log_error()
            } else if line.contains("WARN") {
                theme::log_warning()
            } else {
                Default::default()
            };
            if row == highlight && !self.follow_tail {
                style = style.add_modifier(theme::highlight());
            }
            canvas.set_style(style);
            canvas.print_at(0, row as u16, line);
        }
        canvas.set_style(Default::default());
    }
}
