//! The primary navigation stack.
//!
//! Owned by the shell and mutated only through the routing engine. Empty
//! until the first visit; from then on every operation leaves at least one
//! entry.

use crate::screen::{Screen, ScreenId};

#[derive(Debug, Clone, Default)]
pub struct NavigationStack {
    entries: Vec<Screen>,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: Screen) -> Self {
        Self {
            entries: vec![root],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top(&self) -> Option<&Screen> {
        self.entries.last()
    }

    pub fn bottom(&self) -> Option<&Screen> {
        self.entries.first()
    }

    pub fn entries(&self) -> &[Screen] {
        &self.entries
    }

    pub fn get_mut(&mut self, id: ScreenId) -> Option<&mut Screen> {
        self.entries.iter_mut().find(|s| s.id() == id)
    }

    pub fn contains(&self, id: ScreenId) -> bool {
        self.entries.iter().any(|s| s.id() == id)
    }

    pub fn push(&mut self, screen: Screen) {
        self.entries.push(screen);
    }

    /// Replace the top entry, or push onto an empty stack.
    pub fn replace_top(&mut self, screen: Screen) {
        self.entries.pop();
        self.entries.push(screen);
    }

    /// Drop the top entry, then push `screen`.
    pub fn pop_and_push(&mut self, screen: Screen) {
        self.replace_top(screen);
    }

    /// Discard every entry and start over from `screen`.
    pub fn reset(&mut self, screen: Screen) {
        self.entries.clear();
        self.entries.push(screen);
    }

    /// Keep only the bottom entry, then replace it with `screen`.
    pub fn collapse_to_root(&mut self, screen: Screen) {
        self.entries.truncate(1);
        self.replace_top(screen);
    }

    /// User-initiated back: pop the top if something remains beneath it.
    pub fn pop(&mut self) -> Option<Screen> {
        if self.entries.len() > 1 {
            self.entries.pop()
        } else {
            None
        }
    }
}
