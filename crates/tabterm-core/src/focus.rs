//! Selection and keyboard focus.
//!
//! The router tracks which position is selected and whether input focus
//! still has to be delivered to it. Focus is never delivered from inside a
//! mutation: the router only records a pending request, and the owner flushes
//! it with [`FocusRouter::take_pending_focus`] once the insert or removal has
//! committed.

/// A committed change to the tab registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Inserted(usize),
    Removed(usize),
}

#[derive(Debug, Default, Clone)]
pub struct FocusRouter {
    selected: Option<usize>,
    pending: bool,
}

impl FocusRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// The selected tab changed (click, navigation, or a new tab).
    pub fn on_selection_changed(&mut self, position: usize) {
        self.selected = Some(position);
        self.pending = true;
    }

    /// Keep the selection valid after the registry changed. `count` is the
    /// number of tabs after the mutation.
    ///
    /// Removing the selected tab selects the tab that slid into its position,
    /// or the new last tab when it was the last one.
    pub fn on_registry_mutated(&mut self, mutation: Mutation, count: usize) {
        if count == 0 {
            self.selected = None;
            self.pending = false;
            return;
        }

        match (mutation, self.selected) {
            (Mutation::Inserted(position), None) => self.on_selection_changed(position),
            (Mutation::Inserted(position), Some(selected)) if position <= selected => {
                // Same tab, new index.
                self.selected = Some(selected + 1);
            }
            (Mutation::Removed(position), Some(selected)) if position < selected => {
                self.selected = Some(selected - 1);
            }
            (Mutation::Removed(position), Some(selected)) if position == selected => {
                self.on_selection_changed(selected.min(count - 1));
            }
            (Mutation::Removed(_), None) => {
                // A non-empty registry always has a selection.
                self.on_selection_changed(0);
            }
            _ => {}
        }
    }

    /// Position that should receive input focus now, if a change is pending.
    pub fn take_pending_focus(&mut self) -> Option<usize> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        self.selected
    }
}
