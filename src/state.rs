/// Terminal dimensions as last seen by the loop thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TerminalState {
    width: u16,
    height: u16,
    resize_dirty: bool,
}

impl TerminalState {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            resize_dirty: false,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Record the current size; marks a pending change if it differs.
    pub fn observe(&mut self, (width, height): (u16, u16)) {
        if (self.width, self.height) == (width, height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.resize_dirty = true;
    }

    pub fn take_resize_change(&mut self) -> Option<(u16, u16)> {
        if self.resize_dirty {
            self.resize_dirty = false;
            Some((self.width, self.height))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_and_take_change() {
        let mut s = TerminalState::new(80, 24);
        s.observe((80, 24));
        // no change -> None
        assert!(s.take_resize_change().is_none());
        s.observe((100, 30));
        assert_eq!(s.take_resize_change(), Some((100, 30)));
        // consumed
        assert!(s.take_resize_change().is_none());
        assert_eq!(s.size(), (100, 30));
    }
}
