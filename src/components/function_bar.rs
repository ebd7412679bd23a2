use ratatui::layout::Rect;

use crate::theme;
use crate::ui::{UiFrame, safe_fill, safe_set_string};

/// Paint the function-key bar on the last row of the frame.
///
/// Each entry renders as the plain key name (`F1`) followed by its label in
/// reverse video; the remainder of the row is filled reversed. Nothing is
/// drawn when no functions are registered.
pub fn render(frame: &mut UiFrame<'_>, labels: &[String]) {
    let area = frame.area();
    if labels.is_empty() || area.width == 0 || area.height == 0 {
        return;
    }
    let y = area.y + area.height - 1;
    let row = Rect::new(area.x, y, area.width, 1);
    let buffer = frame.buffer_mut();
    let right = area.x.saturating_add(area.width);

    let mut x = area.x;
    for (index, label) in labels.iter().enumerate() {
        if x >= right {
            return;
        }
        let key = format!("F{}", index + 1);
        safe_set_string(buffer, row, x, y, &key, theme::function_key());
        x = x.saturating_add(key.chars().count() as u16);
        safe_set_string(buffer, row, x, y, label, theme::function_label());
        x = x.saturating_add(label.chars().count() as u16);
    }
    if x < right {
        let rest = Rect::new(x, y, right - x, 1);
        safe_fill(buffer, row, rest, theme::function_label());
    }
}
