use ratatui::buffer::Buffer;
use ratatui::prelude::Rect;
use ratatui::style::Style;

use crate::theme;
use crate::ui::{safe_set_string, truncate_to_width};

/// Paints a window's border and title over its (already drawn) content.
pub trait WindowDecorator: std::fmt::Debug + Send + Sync {
    fn render_window(
        &self,
        buffer: &mut Buffer,
        rect: Rect,
        bounds: Rect,
        title: &str,
        focused: bool,
    );
}

/// Single-line box frame. The focused window gets `+` corners and a bright
/// border; the title is bold and centered on the top edge.
#[derive(Debug, Default)]
pub struct BoxDecorator;

impl BoxDecorator {
    fn put(buffer: &mut Buffer, bounds: Rect, x: u16, y: u16, symbol: &str, style: Style) {
        if x >= bounds.x
            && x < bounds.x + bounds.width
            && y >= bounds.y
            && y < bounds.y + bounds.height
            && let Some(cell) = buffer.cell_mut((x, y))
        {
            cell.reset();
            cell.set_symbol(symbol);
            cell.set_style(style);
        }
    }
}

impl WindowDecorator for BoxDecorator {
    fn render_window(
        &self,
        buffer: &mut Buffer,
        rect: Rect,
        bounds: Rect,
        title: &str,
        focused: bool,
    ) {
        if rect.width < 2 || rect.height < 2 {
            return;
        }
        let bounds = bounds.intersection(buffer.area);
        let border_style = theme::border(focused);

        let left = rect.x;
        let top = rect.y;
        let right = rect.x.saturating_add(rect.width - 1);
        let bottom = rect.y.saturating_add(rect.height - 1);

        for x in left.saturating_add(1)..right {
            Self::put(buffer, bounds, x, top, "─", border_style);
            Self::put(buffer, bounds, x, bottom, "─", border_style);
        }
        for y in top.saturating_add(1)..bottom {
            Self::put(buffer, bounds, left, y, "│", border_style);
            Self::put(buffer, bounds, right, y, "│", border_style);
        }
        let corners = if focused {
            let corner = theme::focus_corner();
            [corner; 4]
        } else {
            ["┌", "┐", "└", "┘"]
        };
        Self::put(buffer, bounds, left, top, corners[0], border_style);
        Self::put(buffer, bounds, right, top, corners[1], border_style);
        Self::put(buffer, bounds, left, bottom, corners[2], border_style);
        Self::put(buffer, bounds, right, bottom, corners[3], border_style);

        let inner_width = usize::from(rect.width - 2);
        let title = truncate_to_width(title, inner_width);
        if title.is_empty() {
            return;
        }
        let title_len = title.chars().count() as u16;
        let start_x = left + (rect.width - title_len) / 2;
        safe_set_string(buffer, bounds, start_x, top, &title, theme::title(focused));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Modifier;

    fn row(buffer: &Buffer, y: u16) -> String {
        (0..buffer.area.width)
            .map(|x| buffer.cell((x, y)).unwrap().symbol().to_string())
            .collect()
    }

    #[test]
    fn unfocused_box_with_centered_title() {
        let mut buffer = Buffer::empty(Rect::new(0, 0, 10, 3));
        let area = buffer.area;
        BoxDecorator.render_window(&mut buffer, area, area, "ab", false);
        assert_eq!(row(&buffer, 0), "┌───ab───┐");
        assert_eq!(row(&buffer, 1), "│        │");
        assert_eq!(row(&buffer, 2), "└────────┘");
        assert!(buffer.cell((4, 0)).unwrap().modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn focused_box_uses_plus_corners() {
        let mut buffer = Buffer::empty(Rect::new(0, 0, 6, 3));
        let area = buffer.area;
        BoxDecorator.render_window(&mut buffer, area, area, "", true);
        assert_eq!(row(&buffer, 0), "+────+");
        assert_eq!(row(&buffer, 2), "+────+");
    }

    #[test]
    fn clipped_to_bounds() {
        let mut buffer = Buffer::empty(Rect::new(0, 0, 4, 2));
        let area = buffer.area;
        BoxDecorator.render_window(&mut buffer, Rect::new(2, 1, 10, 10), area, "title", true);
        assert_eq!(buffer.cell((2, 1)).unwrap().symbol(), "+");
        assert_eq!(buffer.cell((3, 1)).unwrap().symbol(), "─");
    }
}
