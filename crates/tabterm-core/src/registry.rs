use tabterm_pty::SessionId;

use crate::error::RegistryError;

/// Visible left-to-right order of tabs.
///
/// A position is an index into this order, not a stable identifier: removing
/// a tab shifts every later tab down by one. Each session appears at most
/// once.
#[derive(Debug, Default, Clone)]
pub struct TabRegistry {
    order: Vec<SessionId>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` as the last tab and return its position.
    pub fn insert(&mut self, id: SessionId) -> Result<usize, RegistryError> {
        if self.order.contains(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        self.order.push(id);
        Ok(self.order.len() - 1)
    }

    /// Remove `id` and return the position it occupied.
    pub fn remove_by_session(&mut self, id: SessionId) -> Result<usize, RegistryError> {
        let position = self.position_of(id).ok_or(RegistryError::NotFound(id))?;
        self.order.remove(position);
        Ok(position)
    }

    pub fn session_at(&self, position: usize) -> Option<SessionId> {
        self.order.get(position).copied()
    }

    pub fn position_of(&self, id: SessionId) -> Option<usize> {
        self.order.iter().position(|&s| s == id)
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sessions in visible order.
    pub fn sessions(&self) -> impl DoubleEndedIterator<Item = SessionId> + '_ {
        self.order.iter().copied()
    }
}
