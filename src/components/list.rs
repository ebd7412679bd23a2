use crossterm::event::KeyEvent;

use crate::keybindings::{Action, KeyBindings};
use crate::surface::Canvas;
use crate::theme;
use crate::window::{KeyOutcome, Window, WindowBase};

/// Highlight and scroll state of a vertically scrolling list.
///
/// `highlight` is relative to the visible rows; the absolute position is
/// `highlight + scroll`. Every operation takes the current row count and
/// visible height and clamps first, so a shrinking list or window never
/// leaves the cursor out of range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListCursor {
    highlight: usize,
    scroll: usize,
}

impl ListCursor {
    pub fn highlight(&self) -> usize {
        self.highlight
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// Absolute index of the highlighted row.
    pub fn position(&self) -> usize {
        self.highlight + self.scroll
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn clamp(&mut self, total: usize, visible: usize) {
        if total == 0 {
            self.reset();
            return;
        }
        let max_highlight = visible.max(1) - 1;
        let position = self.position().min(total - 1);
        self.scroll = self.scroll.min(position);
        if position - self.scroll > max_highlight {
            self.scroll = position - max_highlight;
        }
        self.highlight = position - self.scroll;
    }

    pub fn up(&mut self, total: usize, visible: usize) {
        self.clamp(total, visible);
        if self.highlight > 0 {
            self.highlight -= 1;
        } else if self.scroll > 0 {
            self.scroll -= 1;
        }
    }

    pub fn down(&mut self, total: usize, visible: usize) {
        self.clamp(total, visible);
        if total == 0 || self.position() >= total - 1 {
            return;
        }
        if self.highlight < visible.max(1) - 1 {
            self.highlight += 1;
        } else {
            self.scroll += 1;
        }
    }

    /// Highlight the last row with as many rows above it as fit.
    pub fn down_to_end(&mut self, total: usize, visible: usize) {
        if total == 0 {
            self.reset();
            return;
        }
        self.scroll = total.saturating_sub(visible.max(1));
        self.highlight = total - 1 - self.scroll;
    }

    /// Apply list navigation for `key`. Returns `false` for keys that are
    /// not Up/Down.
    pub fn navigate(&mut self, key: &KeyEvent, total: usize, visible: usize) -> bool {
        let bindings = KeyBindings::global();
        if bindings.matches(Action::ListUp, key) {
            self.up(total, visible);
            true
        } else if bindings.matches(Action::ListDown, key) {
            self.down(total, visible);
            true
        } else {
            false
        }
    }
}

/// Paint the visible slice of `rows` with the highlighted one reversed.
pub fn paint_rows(canvas: &mut Canvas<'_>, rows: &[String], cursor: &mut ListCursor) {
    let visible = usize::from(canvas.height());
    cursor.clamp(rows.len(), visible);
    for (line, row) in rows.iter().skip(cursor.scroll()).take(visible).enumerate() {
        let y = line as u16;
        if line == cursor.highlight() {
            canvas.enable(theme::highlight());
            canvas.fill_row(0, y);
            canvas.print_at(0, y, row);
            canvas.disable(theme::highlight());
        } else {
            canvas.print_at(0, y, row);
        }
    }
}

pub struct ScrollableList {
    base: WindowBase,
    rows: Vec<String>,
    cursor: ListCursor,
}

impl ScrollableList {
    pub fn new(x: u16, y: u16, width: u16, height: u16, title: impl Into<String>) -> Self {
        Self {
            base: WindowBase::new(x, y, width, height, title),
            rows: Vec::new(),
            cursor: ListCursor::default(),
        }
    }

    pub fn add_item(&mut self, row: impl Into<String>) {
        self.rows.push(row.into());
        self.base.request_redraw();
    }

    pub fn set_items(&mut self, rows: Vec<String>) {
        self.rows = rows;
        self.cursor.clamp(self.rows.len(), self.base.content_height());
        self.base.request_redraw();
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.cursor.reset();
        self.base.request_redraw();
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn cursor(&self) -> ListCursor {
        self.cursor
    }

    pub fn selected_row(&self) -> Option<&str> {
        self.rows.get(self.cursor.position()).map(String::as_str)
    }
}

impl Window for ScrollableList {
    fn base(&self) -> &WindowBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WindowBase {
        &mut self.base
    }

    fn handle_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        let visible = self.base.content_height();
        if self.cursor.navigate(key, self.rows.len(), visible) {
            KeyOutcome::Handled
        } else {
            KeyOutcome::Ignored
        }
    }

    fn draw_content(&mut self, canvas: &mut Canvas<'_>) {
        paint_rows(canvas, &self.rows, &mut self.cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::headless::row_text;
    use crossterm::event::KeyCode;
    use ratatui::buffer::Buffer;
    use ratatui::layout::Rect;
    use ratatui::style::Modifier;

    fn check(cursor: &ListCursor, total: usize, visible: usize) {
        if total == 0 {
            return;
        }
        assert!(cursor.highlight() < visible, "{cursor:?}");
        assert!(cursor.position() <= total - 1, "{cursor:?}");
    }

    #[test]
    fn down_scrolls_once_highlight_reaches_bottom() {
        let mut cursor = ListCursor::default();
        for _ in 0..4 {
            cursor.down(10, 3);
        }
        assert_eq!((cursor.highlight(), cursor.scroll()), (2, 2));
        for _ in 0..20 {
            cursor.down(10, 3);
        }
        assert_eq!(cursor.position(), 9);
        assert_eq!(cursor.highlight(), 2);
    }

    #[test]
    fn up_keeps_highlight_pinned_at_top_while_scrolling() {
        let mut cursor = ListCursor::default();
        for _ in 0..9 {
            cursor.down(10, 3);
        }
        for _ in 0..3 {
            cursor.up(10, 3);
        }
        assert_eq!((cursor.highlight(), cursor.scroll()), (0, 6));
        for _ in 0..10 {
            cursor.up(10, 3);
        }
        assert_eq!(cursor, ListCursor::default());
    }

    #[test]
    fn invariants_hold_over_mixed_sequences() {
        // deterministic walk over a mix of totals, heights and moves
        let mut cursor = ListCursor::default();
        let mut state = 0x2545_f491_u32;
        for step in 0..2000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let total = (state % 12) as usize;
            let visible = 1 + (state >> 8) as usize % 5;
            if step % 3 == 0 {
                cursor.up(total, visible);
            } else {
                cursor.down(total, visible);
            }
            check(&cursor, total, visible);
        }
    }

    #[test]
    fn shrinking_view_clamps_on_next_navigation() {
        let mut cursor = ListCursor::default();
        for _ in 0..7 {
            cursor.down(20, 8);
        }
        assert_eq!(cursor.highlight(), 7);
        cursor.up(20, 3);
        check(&cursor, 20, 3);
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn empty_list_has_no_highlight() {
        let mut cursor = ListCursor::default();
        cursor.down(0, 5);
        cursor.up(0, 5);
        assert_eq!(cursor, ListCursor::default());

        let mut list = ScrollableList::new(0, 0, 10, 4, "t");
        let area = Rect::new(0, 0, 10, 4);
        let mut buffer = Buffer::empty(area);
        list.draw_content(&mut Canvas::new(&mut buffer, Rect::new(1, 1, 8, 2)));
        assert!(
            (0..4).all(|y| !buffer.cell((1, y)).unwrap().modifier.contains(Modifier::REVERSED))
        );
        assert_eq!(list.selected_row(), None);
    }

    #[test]
    fn draws_visible_slice_with_highlight() {
        let mut list = ScrollableList::new(0, 0, 10, 4, "t");
        list.set_items((0..5).map(|i| format!("row{i}")).collect());
        let down = KeyEvent::from(KeyCode::Down);
        for _ in 0..3 {
            assert!(!list.handle_key(&down).is_ignored());
        }
        assert!(list.handle_key(&KeyEvent::from(KeyCode::Char('x'))).is_ignored());
        assert_eq!(list.selected_row(), Some("row3"));

        let area = Rect::new(0, 0, 10, 4);
        let mut buffer = Buffer::empty(area);
        list.draw_content(&mut Canvas::new(&mut buffer, Rect::new(1, 1, 8, 2)));
        assert_eq!(row_text(&buffer, 1), " row2");
        assert_eq!(row_text(&buffer, 2), " row3");
        assert!(buffer.cell((8, 2)).unwrap().modifier.contains(Modifier::REVERSED));
        assert!(!buffer.cell((1, 1)).unwrap().modifier.contains(Modifier::REVERSED));
    }
}
