//! Scroll and cursor state for one log pane.

/// Viewing state of a pane over a store of `len` records. `scroll` is the
/// index of the top visible line; `cursor` the selected line.
#[derive(Debug, Clone)]
pub struct LogPane {
    pub title: String,
    pub scroll: usize,
    pub cursor: usize,
    /// Set on any manual scroll; cleared by jumping to the bottom. While
    /// clear and the pane sits at the bottom, new commits keep it pinned
    /// there.
    pub user_scrolled: bool,
    /// Height of the last rendered viewport, for paging and follow math.
    pub last_height: usize,
}

impl LogPane {
    pub fn new(title: &str) -> Self {
        LogPane {
            title: title.to_string(),
            scroll: 0,
            cursor: 0,
            user_scrolled: false,
            last_height: 0,
        }
    }

    fn bottom_scroll(&self, len: usize) -> usize {
        len.saturating_sub(self.last_height.max(1))
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.scroll = self.scroll.saturating_sub(n);
        self.cursor = self.cursor.saturating_sub(n);
        self.user_scrolled = true;
    }

    pub fn scroll_down(&mut self, n: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.scroll = (self.scroll + n).min(self.bottom_scroll(len));
        self.cursor = (self.cursor + n).min(len - 1);
        self.user_scrolled = true;
    }

    pub fn to_top(&mut self) {
        self.scroll = 0;
        self.cursor = 0;
        self.user_scrolled = true;
    }

    /// Jump to the newest line and re-enter follow mode.
    pub fn to_bottom(&mut self, len: usize) {
        self.scroll = self.bottom_scroll(len);
        self.cursor = len.saturating_sub(1);
        self.user_scrolled = false;
    }

    /// Keep the pane pinned to the newest line after a commit, unless the
    /// user scrolled away.
    pub fn follow(&mut self, len: usize) {
        if !self.user_scrolled {
            self.scroll = self.bottom_scroll(len);
            self.cursor = len.saturating_sub(1);
        }
    }

    /// Center `index` in the viewport and select it.
    pub fn center_on(&mut self, index: usize, len: usize) {
        let height = self.last_height.max(1);
        self.cursor = index.min(len.saturating_sub(1));
        self.scroll = self
            .cursor
            .saturating_sub(height / 2)
            .min(self.bottom_scroll(len));
        self.user_scrolled = true;
    }

    /// Clamp state after the store shrank (clear or filter change).
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.scroll = 0;
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.min(len - 1);
        self.scroll = self.scroll.min(self.bottom_scroll(len));
    }
}
