use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    // Window manager
    FocusNext,
    // List / menu navigation
    ListUp,
    ListDown,
    Expand,
    Collapse,
    Activate,
    // Message windows
    ChooseLeft,
    ChooseRight,
    Accept,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Quit => "Quit",
            Action::FocusNext => "Switch window",
            Action::ListUp => "Move up",
            Action::ListDown => "Move down",
            Action::Expand => "Open menu entry",
            Action::Collapse => "Close menu entry",
            Action::Activate => "Select",
            Action::ChooseLeft => "Choose left button",
            Action::ChooseRight => "Choose right button",
            Action::Accept => "Press button",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyCombo {
    pub fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    /// Lookup key for an incoming event. Shift is folded into printable
    /// characters, so `'A'` arrives as `Char('A')` with no modifiers.
    pub fn from_event(key: &KeyEvent) -> Self {
        let mut mods = key.modifiers;
        if matches!(key.code, KeyCode::Char(_)) {
            mods.remove(KeyModifiers::SHIFT);
        }
        Self::new(key.code, mods)
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        *self == Self::from_event(key)
    }

    pub fn display(&self) -> String {
        let mut parts = Vec::new();
        if self.mods.contains(KeyModifiers::CONTROL) {
            parts.push("Ctrl".to_string());
        }
        if self.mods.contains(KeyModifiers::SHIFT) {
            parts.push("Shift".to_string());
        }
        if self.mods.contains(KeyModifiers::ALT) {
            parts.push("Alt".to_string());
        }
        let code = match self.code {
            KeyCode::Char(' ') => "Space".to_string(),
            KeyCode::Char(c) if self.mods.contains(KeyModifiers::CONTROL) => {
                c.to_ascii_uppercase().to_string()
            }
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Esc => "Esc".to_string(),
            KeyCode::Enter => "Enter".to_string(),
            KeyCode::Tab => "Tab".to_string(),
            KeyCode::Left => "Left".to_string(),
            KeyCode::Right => "Right".to_string(),
            KeyCode::Up => "Up".to_string(),
            KeyCode::Down => "Down".to_string(),
            KeyCode::F(n) => format!("F{}", n),
            _ => format!("{:?}", self.code),
        };
        parts.push(code);
        parts.join("+")
    }
}

impl From<KeyCode> for KeyCombo {
    fn from(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }
}

impl From<char> for KeyCombo {
    fn from(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::NONE)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<Action, Vec<KeyCombo>>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use Action::*;
        let mut kb = Self::new();
        kb.add(
            Quit,
            KeyCombo::new(KeyCode::Char('q'), KeyModifiers::CONTROL),
        );
        kb.add(
            Quit,
            KeyCombo::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        kb.add(FocusNext, KeyCode::Tab.into());
        // List / menu navigation
        kb.add(ListUp, KeyCode::Up.into());
        kb.add(ListDown, KeyCode::Down.into());
        kb.add(Expand, KeyCode::Right.into());
        kb.add(Collapse, KeyCode::Left.into());
        kb.add(Activate, KeyCode::Enter.into());
        kb.add(Activate, ' '.into());
        // Message windows
        kb.add(ChooseLeft, KeyCode::Left.into());
        kb.add(ChooseRight, KeyCode::Right.into());
        kb.add(Accept, KeyCode::Enter.into());
        kb
    }
}

impl KeyBindings {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Process-wide default bindings.
    pub fn global() -> &'static KeyBindings {
        static GLOBAL: OnceLock<KeyBindings> = OnceLock::new();
        GLOBAL.get_or_init(KeyBindings::default)
    }

    pub fn add(&mut self, action: Action, combo: KeyCombo) {
        self.map.entry(action).or_default().push(combo);
    }

    pub fn matches(&self, action: Action, key: &KeyEvent) -> bool {
        if let Some(list) = self.map.get(&action) {
            list.iter().any(|c| c.matches(key))
        } else {
            false
        }
    }

    /// Return the display strings for all combos mapped to `action`.
    pub fn combos_for(&self, action: Action) -> Vec<String> {
        self.map
            .get(&action)
            .map(|list| list.iter().map(|c| c.display()).collect())
            .unwrap_or_default()
    }
}
