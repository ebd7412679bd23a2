//! Window geometry and the painting handle windows draw through.
//!
//! Geometry is double-buffered: key handlers and background threads request
//! a new position or size on the pending copy, and the window manager
//! commits it at the start of the next draw. A draw therefore never sees a
//! rectangle that changes halfway through.
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};

use crate::constants::{BORDER_WIDTH, MIN_WINDOW_SIZE};
use crate::ui::{safe_fill, safe_set_string};

/// Outer rectangle of a window, border included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Geometry {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn content_width(&self) -> u16 {
        self.width.saturating_sub(BORDER_WIDTH * 2)
    }

    pub fn content_height(&self) -> u16 {
        self.height.saturating_sub(BORDER_WIDTH * 2)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Content area: the outer rectangle minus the one-cell border.
    pub fn inner(&self) -> Rect {
        Rect::new(
            self.x.saturating_add(BORDER_WIDTH),
            self.y.saturating_add(BORDER_WIDTH),
            self.content_width(),
            self.content_height(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Surface {
    pending: Geometry,
    committed: Geometry,
    min_width: u16,
    stale: bool,
}

impl Surface {
    pub fn new(geometry: Geometry, min_width: u16) -> Self {
        let min_width = min_width.max(MIN_WINDOW_SIZE);
        let geometry = Self::clamp(geometry, min_width);
        Self {
            pending: geometry,
            committed: geometry,
            min_width,
            stale: true,
        }
    }

    fn clamp(mut geometry: Geometry, min_width: u16) -> Geometry {
        geometry.width = geometry.width.max(min_width);
        geometry.height = geometry.height.max(MIN_WINDOW_SIZE);
        geometry
    }

    /// Geometry as last requested. Navigation logic measures against this.
    pub fn pending(&self) -> Geometry {
        self.pending
    }

    /// Geometry as last drawn.
    pub fn committed(&self) -> Geometry {
        self.committed
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn move_to(&mut self, x: u16, y: u16) {
        self.pending.x = x;
        self.pending.y = y;
        self.stale = true;
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.pending.width = width;
        self.pending.height = height;
        self.pending = Self::clamp(self.pending, self.min_width);
        self.stale = true;
    }

    /// Raise the minimum width, growing the pending geometry if needed.
    pub fn set_min_width(&mut self, min_width: u16) {
        self.min_width = min_width.max(MIN_WINDOW_SIZE);
        if self.pending.width < self.min_width {
            self.pending.width = self.min_width;
            self.stale = true;
        }
    }

    /// Promote pending geometry. Returns the committed rectangle and whether
    /// it was stale.
    pub fn commit(&mut self) -> (Geometry, bool) {
        let was_stale = self.stale;
        if was_stale {
            self.committed = self.pending;
            self.stale = false;
        }
        (self.committed, was_stale)
    }
}

/// Drawing handle over a window's content area.
///
/// Coordinates are local to the content area. Writes outside it, or outside
/// the terminal, are dropped.
pub struct Canvas<'a> {
    buffer: &'a mut Buffer,
    inner: Rect,
    bounds: Rect,
    style: Style,
}

impl<'a> Canvas<'a> {
    pub fn new(buffer: &'a mut Buffer, inner: Rect) -> Self {
        let bounds = inner.intersection(buffer.area);
        Self {
            buffer,
            inner,
            bounds,
            style: Style::default(),
        }
    }

    pub fn width(&self) -> u16 {
        self.inner.width
    }

    pub fn height(&self) -> u16 {
        self.inner.height
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn enable(&mut self, attr: Modifier) {
        self.style = self.style.add_modifier(attr);
    }

    pub fn disable(&mut self, attr: Modifier) {
        self.style = self.style.remove_modifier(attr);
    }

    pub fn print_at(&mut self, x: u16, y: u16, text: &str) {
        if x >= self.inner.width || y >= self.inner.height {
            return;
        }
        safe_set_string(
            self.buffer,
            self.bounds,
            self.inner.x.saturating_add(x),
            self.inner.y.saturating_add(y),
            text,
            self.style,
        );
    }

    pub fn put_char(&mut self, x: u16, y: u16, ch: char) {
        let mut tmp = [0u8; 4];
        self.print_at(x, y, ch.encode_utf8(&mut tmp));
    }

    /// Paint the rest of row `y`, starting at column `x`, with the current
    /// style.
    pub fn fill_row(&mut self, x: u16, y: u16) {
        if x >= self.inner.width || y >= self.inner.height {
            return;
        }
        let rect = Rect::new(
            self.inner.x.saturating_add(x),
            self.inner.y.saturating_add(y),
            self.inner.width - x,
            1,
        );
        safe_fill(self.buffer, self.bounds, rect, self.style);
    }

    pub fn clear(&mut self) {
        safe_fill(self.buffer, self.bounds, self.inner, Style::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_is_clamped_upward() {
        let surface = Surface::new(Geometry::new(0, 0, 1, 0), 12);
        assert_eq!(surface.pending().width, 12);
        assert_eq!(surface.pending().height, MIN_WINDOW_SIZE);
        assert_eq!(surface.pending().content_height(), 1);
    }

    #[test]
    fn resize_is_lazy_until_commit() {
        let mut surface = Surface::new(Geometry::new(0, 0, 20, 10), 3);
        surface.commit();
        surface.move_to(5, 6);
        surface.resize(30, 2);
        assert!(surface.is_stale());
        assert_eq!(surface.committed(), Geometry::new(0, 0, 20, 10));
        assert_eq!(surface.pending(), Geometry::new(5, 6, 30, 3));

        let (committed, was_stale) = surface.commit();
        assert!(was_stale);
        assert_eq!(committed, Geometry::new(5, 6, 30, 3));
        assert!(!surface.commit().1);
    }

    #[test]
    fn growing_min_width_widens_pending() {
        let mut surface = Surface::new(Geometry::new(0, 0, 8, 5), 3);
        surface.commit();
        surface.set_min_width(14);
        assert!(surface.is_stale());
        assert_eq!(surface.pending().width, 14);
    }

    #[test]
    fn inner_excludes_border() {
        let g = Geometry::new(2, 3, 10, 6);
        assert_eq!(g.inner(), Rect::new(3, 4, 8, 4));
    }

    #[test]
    fn canvas_clips_to_content_area() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 10, 4));
        let inner = Rect::new(1, 1, 4, 2);
        let mut canvas = Canvas::new(&mut buf, inner);
        canvas.print_at(0, 0, "abcdefgh");
        canvas.print_at(0, 5, "never");
        canvas.put_char(3, 1, 'z');
        assert_eq!(buf.cell((1, 1)).unwrap().symbol(), "a");
        assert_eq!(buf.cell((4, 1)).unwrap().symbol(), "d");
        assert_eq!(buf.cell((5, 1)).unwrap().symbol(), " ");
        assert_eq!(buf.cell((4, 2)).unwrap().symbol(), "z");
    }

    #[test]
    fn canvas_attributes_toggle() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 6, 1));
        let mut canvas = Canvas::new(&mut buf, Rect::new(0, 0, 6, 1));
        canvas.enable(Modifier::REVERSED);
        canvas.print_at(0, 0, "ab");
        canvas.disable(Modifier::REVERSED);
        canvas.print_at(2, 0, "cd");
        assert!(buf.cell((1, 0)).unwrap().modifier.contains(Modifier::REVERSED));
        assert!(!buf.cell((2, 0)).unwrap().modifier.contains(Modifier::REVERSED));
    }

    #[test]
    fn canvas_survives_offscreen_windows() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 4, 4));
        let mut canvas = Canvas::new(&mut buf, Rect::new(10, 10, 5, 5));
        canvas.print_at(0, 0, "x");
        canvas.fill_row(0, 0);
        canvas.clear();
    }
}
