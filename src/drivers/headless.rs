//! Drivers that need no real terminal: scripted input and an in-memory
//! ratatui `TestBackend`. Used by the integration tests and for
//! rendering snapshots.
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

use super::{InputDriver, OutputDriver};
use crate::ui::UiFrame;

/// Producer side of a [`ScriptedInputDriver`]; stays usable after the
/// driver moved onto the loop thread.
#[derive(Clone, Default)]
pub struct InputScript {
    queue: Arc<Mutex<VecDeque<Event>>>,
}

impl InputScript {
    pub fn push(&self, event: Event) {
        self.queue
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push_back(event);
    }

    pub fn key(&self, code: KeyCode) {
        self.push(Event::Key(KeyEvent::from(code)));
    }

    pub fn is_drained(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .is_empty()
    }
}

#[derive(Default)]
pub struct ScriptedInputDriver {
    script: InputScript,
}

impl ScriptedInputDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> InputScript {
        self.script.clone()
    }
}

impl InputDriver for ScriptedInputDriver {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        if !self.script.is_drained() {
            return Ok(true);
        }
        thread::sleep(timeout);
        Ok(!self.script.is_drained())
    }

    fn read(&mut self) -> io::Result<Event> {
        self.script
            .queue
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "input script is empty"))
    }
}

#[derive(Default)]
struct ScreenState {
    last_frame: Option<Buffer>,
    requested_size: Option<(u16, u16)>,
    draws: usize,
    clears: usize,
    entered: bool,
}

/// Observer side of a [`BufferOutputDriver`].
#[derive(Clone, Default)]
pub struct Screen {
    state: Arc<Mutex<ScreenState>>,
}

impl Screen {
    fn with<R>(&self, f: impl FnOnce(&mut ScreenState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        f(&mut state)
    }

    /// Copy of the most recently drawn frame.
    pub fn last_frame(&self) -> Option<Buffer> {
        self.with(|state| state.last_frame.clone())
    }

    /// Text of row `y` of the last frame, trailing blanks trimmed.
    pub fn row_text(&self, y: u16) -> String {
        self.last_frame()
            .map(|buffer| row_text(&buffer, y))
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.last_frame()
            .map(|buffer| {
                (0..buffer.area.height).any(|y| row_text(&buffer, y).contains(needle))
            })
            .unwrap_or(false)
    }

    /// Simulate the terminal being resized by the user.
    pub fn resize(&self, width: u16, height: u16) {
        self.with(|state| state.requested_size = Some((width, height)));
    }

    pub fn draw_count(&self) -> usize {
        self.with(|state| state.draws)
    }

    pub fn clear_count(&self) -> usize {
        self.with(|state| state.clears)
    }

    pub fn is_entered(&self) -> bool {
        self.with(|state| state.entered)
    }
}

pub fn row_text(buffer: &Buffer, y: u16) -> String {
    let area: Rect = buffer.area;
    if y >= area.height {
        return String::new();
    }
    let mut line = String::new();
    for x in 0..area.width {
        if let Some(cell) = buffer.cell((area.x + x, area.y + y)) {
            line.push_str(cell.symbol());
        }
    }
    line.trim_end().to_string()
}

pub struct BufferOutputDriver {
    terminal: Terminal<TestBackend>,
    screen: Screen,
}

impl BufferOutputDriver {
    pub fn new(width: u16, height: u16) -> io::Result<Self> {
        let terminal = Terminal::new(TestBackend::new(width, height))
            .map_err(|err| io::Error::other(err.to_string()))?;
        Ok(Self {
            terminal,
            screen: Screen::default(),
        })
    }

    pub fn screen(&self) -> Screen {
        self.screen.clone()
    }

    fn apply_requested_size(&mut self) {
        if let Some((width, height)) = self.screen.with(|state| state.requested_size.take()) {
            self.terminal.backend_mut().resize(width, height);
        }
    }
}

impl OutputDriver for BufferOutputDriver {
    fn enter(&mut self) -> io::Result<()> {
        self.screen.with(|state| state.entered = true);
        Ok(())
    }

    fn exit(&mut self) -> io::Result<()> {
        self.screen.with(|state| state.entered = false);
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        if let Some(size) = self.screen.with(|state| state.requested_size) {
            return Ok(size);
        }
        self.terminal
            .size()
            .map(|size| (size.width, size.height))
            .map_err(|err| io::Error::other(err.to_string()))
    }

    fn clear(&mut self) -> io::Result<()> {
        self.apply_requested_size();
        self.screen.with(|state| state.clears += 1);
        self.terminal
            .clear()
            .map_err(|err| io::Error::other(err.to_string()))
    }

    fn draw(&mut self, paint: &mut dyn FnMut(&mut UiFrame<'_>)) -> io::Result<()> {
        self.apply_requested_size();
        self.terminal
            .draw(|frame| {
                let mut wrapper = UiFrame::new(frame);
                paint(&mut wrapper);
            })
            .map_err(|err| io::Error::other(err.to_string()))?;
        let frame = self.terminal.backend().buffer().clone();
        self.screen.with(|state| {
            state.last_frame = Some(frame);
            state.draws += 1;
        });
        Ok(())
    }
}
