use bevy::prelude::*;

// ---------------------------------------------------------------------------
// HistoryCommand trait
// ---------------------------------------------------------------------------

/// A reversible edit. Both directions replay stored state; neither may
/// recompute anything from the live world beyond looking up handles.
pub trait HistoryCommand: Send + Sync + 'static {
    type Error;

    fn undo(&self, world: &mut World) -> Result<(), Self::Error>;
    fn redo(&self, world: &mut World) -> Result<(), Self::Error>;
    fn description(&self) -> &str;
}

// ---------------------------------------------------------------------------
// CommandHistory resource
// ---------------------------------------------------------------------------

/// Linear undo/redo log. Pushing a new command discards the redo branch.
#[derive(Resource)]
pub struct CommandHistory<C: HistoryCommand> {
    undo_stack: Vec<C>,
    redo_stack: Vec<C>,
    /// Maximum number of undo entries kept. Zero means unbounded.
    limit: usize,
}

impl<C: HistoryCommand> Default for CommandHistory<C> {
    fn default() -> Self {
        Self::with_limit(0)
    }
}

impl<C: HistoryCommand> CommandHistory<C> {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit,
        }
    }

    /// Change the depth limit. Returns the entries that no longer fit,
    /// oldest first.
    pub fn set_limit(&mut self, limit: usize) -> Vec<C> {
        self.limit = limit;
        self.enforce_limit()
    }

    /// Record a command that has already been applied to the world.
    ///
    /// Returns every command that left the history as a result: the whole
    /// redo branch, then any undo entries pushed past the limit. Callers
    /// use these to release resources only a discarded command could reach.
    pub fn push(&mut self, command: C) -> Vec<C> {
        self.undo_stack.push(command);
        let mut discarded: Vec<C> = self.redo_stack.drain(..).collect();
        discarded.extend(self.enforce_limit());
        discarded
    }

    /// Revert the most recent command. Returns `Ok(false)` when there is
    /// nothing to undo. On failure the command stays on the undo stack.
    pub fn undo(&mut self, world: &mut World) -> Result<bool, C::Error> {
        let Some(command) = self.undo_stack.pop() else {
            return Ok(false);
        };
        match command.undo(world) {
            Ok(()) => {
                self.redo_stack.push(command);
                Ok(true)
            }
            Err(err) => {
                self.undo_stack.push(command);
                Err(err)
            }
        }
    }

    /// Re-apply the most recently undone command. Returns `Ok(false)` when
    /// there is nothing to redo. On failure the command stays on the redo stack.
    pub fn redo(&mut self, world: &mut World) -> Result<bool, C::Error> {
        let Some(command) = self.redo_stack.pop() else {
            return Ok(false);
        };
        match command.redo(world) {
            Ok(()) => {
                self.undo_stack.push(command);
                Ok(true)
            }
            Err(err) => {
                self.redo_stack.push(command);
                Err(err)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// The command `undo` would revert next.
    pub fn peek_undo(&self) -> Option<&C> {
        self.undo_stack.last()
    }

    /// The command `redo` would re-apply next.
    pub fn peek_redo(&self) -> Option<&C> {
        self.redo_stack.last()
    }

    /// Every command still reachable by undo or redo.
    pub fn commands(&self) -> impl Iterator<Item = &C> {
        self.undo_stack.iter().chain(self.redo_stack.iter())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    fn enforce_limit(&mut self) -> Vec<C> {
        if self.limit == 0 || self.undo_stack.len() <= self.limit {
            return Vec::new();
        }
        let excess = self.undo_stack.len() - self.limit;
        self.undo_stack.drain(..excess).collect()
    }
}
