use std::sync::Arc;

use crossterm::event::KeyEvent;

use super::list::ListCursor;
use crate::constants::MENU_INDENT;
use crate::keybindings::{Action, KeyBindings, KeyCombo};
use crate::surface::Canvas;
use crate::theme;
use crate::window::{Callback, KeyOutcome, Window, WindowBase};

/// One entry of an [`ExpandableMenu`]. Children are owned; parent context is
/// computed top down while walking the tree.
pub struct MenuNode<P> {
    name: String,
    on_activate: Option<Callback>,
    payload: Option<P>,
    children: Vec<MenuNode<P>>,
    expanded: bool,
}

impl<P> MenuNode<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_activate: None,
            payload: None,
            children: Vec::new(),
            expanded: false,
        }
    }

    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn on_activate(mut self, action: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_activate = Some(Arc::new(action));
        self
    }

    /// Append a child and return it for further nesting.
    pub fn add_child(&mut self, child: MenuNode<P>) -> &mut MenuNode<P> {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    pub fn children(&self) -> &[MenuNode<P>] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded && self.has_children()
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded && self.has_children();
    }

    pub fn toggle_expanded(&mut self) {
        self.set_expanded(!self.is_expanded());
    }

    /// Rows this node occupies: itself plus its visible descendants.
    pub fn visible_count(&self) -> usize {
        1 + if self.is_expanded() {
            count_visible(&self.children)
        } else {
            0
        }
    }

    fn marker(&self) -> &'static str {
        match (self.has_children(), self.is_expanded()) {
            (false, _) => "[ ]",
            (true, false) => "[+]",
            (true, true) => "[-]",
        }
    }
}

fn count_visible<P>(nodes: &[MenuNode<P>]) -> usize {
    nodes.iter().map(MenuNode::visible_count).sum()
}

/// Walk `nodes` in flattened order until `remaining` reaches zero, filling
/// `path` with the child indices that lead to the match.
fn locate<P>(nodes: &[MenuNode<P>], remaining: &mut usize, path: &mut Vec<usize>) -> bool {
    for (index, node) in nodes.iter().enumerate() {
        path.push(index);
        if *remaining == 0 {
            return true;
        }
        *remaining -= 1;
        if node.is_expanded() && locate(&node.children, remaining, path) {
            return true;
        }
        path.pop();
    }
    false
}

/// Snapshot of the highlighted menu entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuSelection<P> {
    pub name: String,
    pub payload: Option<P>,
    /// Child indices from the root list down to the entry.
    pub path: Vec<usize>,
}

pub type SelectionAction<P> = Arc<dyn Fn(&MenuSelection<P>) + Send + Sync>;

/// Tree menu with expandable entries.
pub struct ExpandableMenu<P> {
    base: WindowBase,
    roots: Vec<MenuNode<P>>,
    cursor: ListCursor,
    selection_keys: Vec<(KeyCombo, SelectionAction<P>)>,
}

impl<P: Clone + Send + Sync + 'static> ExpandableMenu<P> {
    pub fn new(x: u16, y: u16, width: u16, height: u16, title: impl Into<String>) -> Self {
        Self {
            base: WindowBase::new(x, y, width, height, title),
            roots: Vec::new(),
            cursor: ListCursor::default(),
            selection_keys: Vec::new(),
        }
    }

    pub fn add_item(&mut self, node: MenuNode<P>) -> &mut MenuNode<P> {
        self.base.request_redraw();
        self.roots.push(node);
        let last = self.roots.len() - 1;
        &mut self.roots[last]
    }

    pub fn clear(&mut self) {
        self.roots.clear();
        self.cursor.reset();
        self.base.request_redraw();
    }

    pub fn roots(&self) -> &[MenuNode<P>] {
        &self.roots
    }

    pub fn cursor(&self) -> ListCursor {
        self.cursor
    }

    /// Number of rows the expanded tree needs.
    pub fn visible_count(&self) -> usize {
        count_visible(&self.roots)
    }

    /// Child-index path of the node at flattened position `index`.
    pub fn path_of(&self, index: usize) -> Option<Vec<usize>> {
        let mut remaining = index;
        let mut path = Vec::new();
        locate(&self.roots, &mut remaining, &mut path).then_some(path)
    }

    pub fn node_at(&self, index: usize) -> Option<&MenuNode<P>> {
        let path = self.path_of(index)?;
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.roots.get(*first)?, |node, &i| node.children.get(i))
    }

    pub fn node_at_mut(&mut self, index: usize) -> Option<&mut MenuNode<P>> {
        let path = self.path_of(index)?;
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get_mut(*first)?;
        for &i in rest {
            node = node.children.get_mut(i)?;
        }
        Some(node)
    }

    pub fn selected_index(&self) -> usize {
        self.cursor.position()
    }

    pub fn selected(&self) -> Option<MenuSelection<P>> {
        let index = self.selected_index();
        let path = self.path_of(index)?;
        let node = self.node_at(index)?;
        Some(MenuSelection {
            name: node.name.clone(),
            payload: node.payload.clone(),
            path,
        })
    }

    /// Run `action` with the current selection whenever `key` is pressed.
    /// Keys pressed while nothing is selected are consumed without effect.
    pub fn bind_selection(
        &mut self,
        key: impl Into<KeyCombo>,
        action: impl Fn(&MenuSelection<P>) + Send + Sync + 'static,
    ) {
        let combo = key.into();
        self.selection_keys.retain(|(existing, _)| *existing != combo);
        self.selection_keys.push((combo, Arc::new(action)));
    }

    fn clamp(&mut self) {
        let total = self.visible_count();
        self.cursor.clamp(total, self.base.content_height());
    }

    fn selection_key(&self, key: &KeyEvent) -> Option<KeyOutcome> {
        let (_, action) = self
            .selection_keys
            .iter()
            .find(|(combo, _)| combo.matches(key))?;
        let Some(selection) = self.selected() else {
            return Some(KeyOutcome::Handled);
        };
        let action = action.clone();
        Some(KeyOutcome::Deferred(Arc::new(move || action(&selection))))
    }
}

impl<P: Clone + Send + Sync + 'static> Window for ExpandableMenu<P> {
    fn base(&self) -> &WindowBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WindowBase {
        &mut self.base
    }

    fn handle_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        self.clamp();
        let total = self.visible_count();
        if self.cursor.navigate(key, total, self.base.content_height()) {
            return KeyOutcome::Handled;
        }
        let bindings = KeyBindings::global();
        let index = self.selected_index();
        if bindings.matches(Action::Expand, key) {
            if let Some(node) = self.node_at_mut(index)
                && !node.is_expanded()
            {
                node.set_expanded(true);
            }
            return KeyOutcome::Handled;
        }
        if bindings.matches(Action::Collapse, key) {
            if let Some(node) = self.node_at_mut(index)
                && node.is_expanded()
            {
                node.set_expanded(false);
            }
            self.clamp();
            return KeyOutcome::Handled;
        }
        if bindings.matches(Action::Activate, key) {
            return match self.node_at(index).and_then(|node| node.on_activate.clone()) {
                Some(action) => KeyOutcome::Deferred(action),
                None => KeyOutcome::Handled,
            };
        }
        self.selection_key(key).unwrap_or(KeyOutcome::Ignored)
    }

    fn draw_content(&mut self, canvas: &mut Canvas<'_>) {
        let visible = usize::from(canvas.height());
        self.cursor.clamp(self.visible_count(), visible);
        let mut painter = TreePainter {
            canvas,
            rails: Vec::new(),
            index: 0,
            scroll: self.cursor.scroll(),
            highlight: self.cursor.position(),
            visible,
        };
        painter.paint(&self.roots, 0);
    }
}

struct TreePainter<'c, 'b> {
    canvas: &'c mut Canvas<'b>,
    /// For each ancestor at depth >= 1: does it have a following sibling?
    rails: Vec<bool>,
    index: usize,
    scroll: usize,
    highlight: usize,
    visible: usize,
}

impl TreePainter<'_, '_> {
    /// Returns `false` once the visible height is used up.
    fn paint<P>(&mut self, nodes: &[MenuNode<P>], depth: usize) -> bool {
        for (i, node) in nodes.iter().enumerate() {
            let last = i + 1 == nodes.len();
            if self.index >= self.scroll + self.visible {
                return false;
            }
            if self.index >= self.scroll {
                self.paint_row(node, depth, last);
            }
            self.index += 1;
            if node.is_expanded() {
                if depth > 0 {
                    self.rails.push(!last);
                }
                let more = self.paint(&node.children, depth + 1);
                if depth > 0 {
                    self.rails.pop();
                }
                if !more {
                    return false;
                }
            }
        }
        true
    }

    fn paint_row<P>(&mut self, node: &MenuNode<P>, depth: usize, last: bool) {
        let y = (self.index - self.scroll) as u16;
        let mut prefix = String::new();
        if depth > 0 {
            for &rail in &self.rails {
                prefix.push_str(if rail { " │  " } else { "    " });
            }
            prefix.push_str(if last { " └──" } else { " ├──" });
        }
        let x = depth as u16 * MENU_INDENT;
        self.canvas.print_at(0, y, &prefix);
        let label = format!("{} {}", node.marker(), node.name);
        let highlighted = self.index == self.highlight;
        if highlighted {
            self.canvas.enable(theme::highlight());
        }
        self.canvas.print_at(x, y, &label);
        if highlighted {
            self.canvas.disable(theme::highlight());
        }
    }
}
