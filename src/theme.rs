use ratatui::style::{Color, Modifier, Style};

// Centralized styles for window chrome and list content.

pub fn border(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

pub fn title(focused: bool) -> Style {
    let style = Style::default().add_modifier(Modifier::BOLD);
    if focused {
        style.fg(Color::White)
    } else {
        style.fg(Color::Gray)
    }
}

/// Corner glyph of the focused window, plain box corners otherwise.
pub fn focus_corner() -> &'static str {
    "+"
}

pub fn highlight() -> Modifier {
    Modifier::REVERSED
}

// Function bar
pub fn function_key() -> Style {
    Style::default()
}

pub fn function_label() -> Style {
    Style::default().add_modifier(Modifier::REVERSED)
}

// Message windows
pub fn button(selected: bool) -> Style {
    if selected {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    }
}

// Debug log
pub fn log_warning() -> Style {
    Style::default().fg(Color::Yellow)
}

pub fn log_error() -> Style {
    Style::default().fg(Color::Red)
}
