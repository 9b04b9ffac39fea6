use bevy::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// Structural edits must wait until the current drag has been ended.
    #[error("a gizmo drag is still in progress")]
    DragInProgress,
    /// A recorded command refers to an entity the world no longer holds.
    /// History and scene have drifted apart; this is a bug in the host.
    #[error("history out of sync: entity {0} no longer exists")]
    MissingEntity(Entity),
    #[error("pivot proxy has not been spawned; call `init_editor_world` first")]
    MissingPivot,
}
