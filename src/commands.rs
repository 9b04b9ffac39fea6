use area_history::{CommandHistory, HistoryCommand};
use bevy::prelude::*;

use crate::{
    drag::InteractionState,
    error::EditorError,
    gizmos::GizmoMode,
    pivot, scene,
    selection::{self, Selection, SelectionMode},
    settings::EditorSettings,
    snapshot::TransformSnapshot,
    EntitiesReleased, SceneUpdated, TransformChanged,
};

/// The editor's undo/redo log.
pub type EditorHistory = CommandHistory<EditorCommand>;

pub struct CommandHistoryPlugin;

impl Plugin for CommandHistoryPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, handle_undo_redo_keys);
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupMode {
    Translate,
    Rotate,
    Scale,
    /// Produced by snap-to-ground rather than a gizmo drag.
    Snap,
}

impl From<GizmoMode> for GroupMode {
    fn from(mode: GizmoMode) -> Self {
        match mode {
            GizmoMode::Translate => Self::Translate,
            GizmoMode::Rotate => Self::Rotate,
            GizmoMode::Scale => Self::Scale,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransformChange {
    pub entity: Entity,
    pub prev: TransformSnapshot,
    pub next: TransformSnapshot,
}

/// An entity taken out of the scene, with what is needed to put it back.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedEntity {
    pub entity: Entity,
    pub snapshot: TransformSnapshot,
    /// Registry position before removal.
    pub slot: Option<usize>,
}

/// A reversible edit. Each variant stores exactly the state its undo and
/// redo replay; nothing is recomputed from the live scene.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorCommand {
    AddEntities {
        entities: Vec<Entity>,
    },
    /// Entries are in removal order.
    DeleteEntities {
        removed: Vec<RemovedEntity>,
    },
    Transform(TransformChange),
    GroupTransform {
        items: Vec<TransformChange>,
        mode: GroupMode,
    },
    PivotChange {
        pivot: Entity,
        prev: TransformSnapshot,
        next: TransformSnapshot,
    },
}

impl EditorCommand {
    /// Every entity handle this command touches.
    pub fn entities(&self) -> Vec<Entity> {
        match self {
            Self::AddEntities { entities } => entities.clone(),
            Self::DeleteEntities { removed } => removed.iter().map(|r| r.entity).collect(),
            Self::Transform(change) => vec![change.entity],
            Self::GroupTransform { items, .. } => items.iter().map(|i| i.entity).collect(),
            Self::PivotChange { pivot, .. } => vec![*pivot],
        }
    }

    fn ensure_live(&self, world: &World) -> Result<(), EditorError> {
        match self.entities().into_iter().find(|&e| world.get_entity(e).is_err()) {
            Some(missing) => Err(EditorError::MissingEntity(missing)),
            None => Ok(()),
        }
    }

    fn apply(&self, world: &mut World, forward: bool) -> Result<(), EditorError> {
        self.ensure_live(world)?;

        match self {
            Self::AddEntities { entities } => {
                if forward {
                    attach(world, entities.iter().map(|&e| (e, None)))?;
                    selection::set_selection(world, entities.clone());
                } else {
                    detach(world, entities)?;
                }
                world.trigger(SceneUpdated);
            }
            Self::DeleteEntities { removed } => {
                let entities: Vec<Entity> = removed.iter().map(|r| r.entity).collect();
                if forward {
                    detach(world, &entities)?;
                } else {
                    // Reinsert in reverse removal order so every slot lands
                    // where it was.
                    attach(world, removed.iter().rev().map(|r| (r.entity, r.slot)))?;
                    for r in removed {
                        r.snapshot.restore(world, r.entity)?;
                    }
                    selection::set_selection(world, entities);
                    world.trigger(TransformChanged);
                }
                world.trigger(SceneUpdated);
            }
            Self::Transform(change) => {
                change.pick(forward).restore(world, change.entity)?;
                recenter_group_pivot(world);
                world.trigger(TransformChanged);
            }
            Self::GroupTransform { items, .. } => {
                for item in items {
                    item.pick(forward).restore(world, item.entity)?;
                }
                recenter_group_pivot(world);
                world.trigger(TransformChanged);
            }
            Self::PivotChange { pivot, prev, next } => {
                let snapshot = if forward { next } else { prev };
                snapshot.restore(world, *pivot)?;
                world.trigger(TransformChanged);
            }
        }
        Ok(())
    }
}

impl TransformChange {
    fn pick(&self, forward: bool) -> &TransformSnapshot {
        if forward { &self.next } else { &self.prev }
    }
}

impl HistoryCommand for EditorCommand {
    type Error = EditorError;

    fn undo(&self, world: &mut World) -> Result<(), EditorError> {
        self.apply(world, false)
    }

    fn redo(&self, world: &mut World) -> Result<(), EditorError> {
        self.apply(world, true)
    }

    fn description(&self) -> &str {
        match self {
            Self::AddEntities { .. } => "Add entities",
            Self::DeleteEntities { .. } => "Delete entities",
            Self::Transform(_) => "Transform entity",
            Self::GroupTransform {
                mode: GroupMode::Snap,
                ..
            } => "Snap to ground",
            Self::GroupTransform { .. } => "Transform group",
            Self::PivotChange { .. } => "Move pivot",
        }
    }
}

fn attach(
    world: &mut World,
    entries: impl Iterator<Item = (Entity, Option<usize>)>,
) -> Result<(), EditorError> {
    for (entity, slot) in entries {
        scene::add_to_scene(world, entity, slot)?;
    }
    Ok(())
}

fn detach(world: &mut World, entities: &[Entity]) -> Result<(), EditorError> {
    for &entity in entities {
        scene::remove_from_scene(world, entity)?;
    }
    let remaining: Vec<Entity> = world
        .resource::<Selection>()
        .entities
        .iter()
        .copied()
        .filter(|e| !entities.contains(e))
        .collect();
    selection::set_selection(world, remaining);
    Ok(())
}

/// Group members moved under the pivot; put it back on their centroid
/// unless the user is placing it by hand.
pub(crate) fn recenter_group_pivot(world: &mut World) {
    let is_group = world.resource::<Selection>().mode() == SelectionMode::Group;
    if is_group && !world.resource::<InteractionState>().is_pivot_edit() {
        pivot::recenter_pivot(world);
    }
}

// ---------------------------------------------------------------------------
// Editing API
// ---------------------------------------------------------------------------

/// Push an already-applied command onto the history.
pub fn record(world: &mut World, command: EditorCommand) {
    info!("Recorded: {}", command.description());
    let limit = world
        .get_resource::<EditorSettings>()
        .map_or(0, |s| s.history_limit);
    let mut history = world.resource_mut::<EditorHistory>();
    let mut discarded = history.set_limit(limit);
    discarded.extend(history.push(command));
    release_unreachable(world, &discarded);
}

/// Detached entities that only `discarded` could have brought back are
/// gone for good. Copies the editor spawned itself are despawned; the rest
/// belong to the host and are handed over through [`EntitiesReleased`].
fn release_unreachable(world: &mut World, discarded: &[EditorCommand]) {
    let history = world.resource::<EditorHistory>();
    let mut orphans: Vec<Entity> = Vec::new();
    for entity in discarded.iter().flat_map(EditorCommand::entities) {
        if orphans.contains(&entity) || world.get::<scene::Detached>(entity).is_none() {
            continue;
        }
        if history.commands().any(|c| c.entities().contains(&entity)) {
            continue;
        }
        orphans.push(entity);
    }
    if orphans.is_empty() {
        return;
    }

    let (owned, hosted): (Vec<Entity>, Vec<Entity>) = orphans
        .into_iter()
        .partition(|&e| world.get::<scene::Duplicate>(e).is_some());
    for entity in owned {
        debug!("Despawning unreachable copy {entity}");
        world.despawn(entity);
    }
    if !hosted.is_empty() {
        debug!("Releasing {} detached entities to the host", hosted.len());
        world.trigger(EntitiesReleased { entities: hosted });
    }
}

/// Fails with [`EditorError::DragInProgress`] while a drag is unresolved.
pub(crate) fn ensure_not_dragging(world: &World) -> Result<(), EditorError> {
    if world.resource::<InteractionState>().is_dragging() {
        return Err(EditorError::DragInProgress);
    }
    Ok(())
}

/// Revert the last command. `Ok(false)` when the history is empty.
pub fn undo(world: &mut World) -> Result<bool, EditorError> {
    ensure_not_dragging(world)?;
    let result = world.resource_scope(|world, mut history: Mut<EditorHistory>| history.undo(world));
    if let Err(err) = &result {
        error!("Undo aborted: {err}");
    }
    result
}

/// Re-apply the last undone command. `Ok(false)` when there is nothing to redo.
pub fn redo(world: &mut World) -> Result<bool, EditorError> {
    ensure_not_dragging(world)?;
    let result = world.resource_scope(|world, mut history: Mut<EditorHistory>| history.redo(world));
    if let Err(err) = &result {
        error!("Redo aborted: {err}");
    }
    result
}

// ---------------------------------------------------------------------------
// Keyboard shortcut system
// ---------------------------------------------------------------------------

fn handle_undo_redo_keys(world: &mut World) {
    let keyboard = world.resource::<ButtonInput<KeyCode>>();
    let ctrl = keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
    let shift = keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);
    let z_pressed = keyboard.just_pressed(KeyCode::KeyZ);
    let y_pressed = keyboard.just_pressed(KeyCode::KeyY);

    if !ctrl {
        return;
    }

    let result = if (z_pressed && shift) || y_pressed {
        redo(world)
    } else if z_pressed {
        undo(world)
    } else {
        return;
    };

    if let Err(EditorError::DragInProgress) = result {
        debug!("Undo/redo deferred: finish the current drag first");
    }
}
