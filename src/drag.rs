use bevy::prelude::*;

use crate::{
    commands::{self, EditorCommand, GroupMode, TransformChange},
    gizmos::GizmoMode,
    pivot::{self, AttachTarget},
    selection::{Selection, SelectionMode},
    snapshot::{self, TransformSnapshot},
    TransformChanged,
};

pub struct DragPlugin;

impl Plugin for DragPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InteractionState>()
            .add_systems(Update, (handle_pivot_edit_key, apply_group_drag).chain());
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The one place that knows what the user is currently doing with the gizmo.
#[derive(Resource, Default, Clone, Debug)]
pub enum InteractionState {
    #[default]
    Idle,
    DraggingSingle(SingleDrag),
    DraggingGroup(GroupDrag),
    /// The gizmo manipulates the pivot itself; members stay put.
    PivotEdit {
        /// Pivot state captured when a pivot drag started.
        drag: Option<TransformSnapshot>,
    },
}

#[derive(Clone, Debug)]
pub struct SingleDrag {
    pub entity: Entity,
    pub mode: GizmoMode,
    pub before: TransformSnapshot,
}

#[derive(Clone, Debug)]
pub struct GroupDrag {
    pub pivot: Entity,
    pub mode: GizmoMode,
    pub pivot_before: TransformSnapshot,
    pub members: Vec<(Entity, TransformSnapshot)>,
}

impl InteractionState {
    /// True between `begin_drag` and `end_drag`, whatever the target.
    pub fn is_dragging(&self) -> bool {
        match self {
            Self::Idle => false,
            Self::DraggingSingle(_) | Self::DraggingGroup(_) => true,
            Self::PivotEdit { drag } => drag.is_some(),
        }
    }

    pub fn is_pivot_edit(&self) -> bool {
        matches!(self, Self::PivotEdit { .. })
    }
}

// ---------------------------------------------------------------------------
// Drag session
// ---------------------------------------------------------------------------

/// Start a gizmo drag on whatever the gizmo is attached to. Returns false
/// when there is nothing to drag or a drag is already running.
pub fn begin_drag(world: &mut World) -> bool {
    let state = world.resource::<InteractionState>().clone();
    let mode = *world.resource::<GizmoMode>();

    let next = match state {
        InteractionState::PivotEdit { drag: None } => {
            let Ok(pivot) = pivot::pivot_entity(world) else {
                return false;
            };
            let Some(before) = TransformSnapshot::capture(world, pivot) else {
                return false;
            };
            InteractionState::PivotEdit { drag: Some(before) }
        }
        InteractionState::Idle => match pivot::attach_target(world) {
            AttachTarget::None => {
                debug!("Drag started with nothing selected; ignoring");
                return false;
            }
            AttachTarget::Entity(entity) => {
                let Some(before) = TransformSnapshot::capture(world, entity) else {
                    return false;
                };
                InteractionState::DraggingSingle(SingleDrag {
                    entity,
                    mode,
                    before,
                })
            }
            AttachTarget::Pivot(pivot) => {
                let Some(pivot_before) = TransformSnapshot::capture(world, pivot) else {
                    return false;
                };
                if mode == GizmoMode::Scale && pivot_before.scale.x == 0.0 {
                    warn!("Pivot scale is zero at drag start; scaling relative to 1");
                }
                let entities = world.resource::<Selection>().entities.clone();
                InteractionState::DraggingGroup(GroupDrag {
                    pivot,
                    mode,
                    pivot_before,
                    members: snapshot::capture_all(world, &entities),
                })
            }
        },
        _ => {
            warn!("begin_drag called while a drag is already in progress");
            return false;
        }
    };

    *world.resource_mut::<InteractionState>() = next;
    true
}

/// Propagate the pivot's live transform to every group member. Only does
/// work during a group drag; single-entity and pivot-edit drags move their
/// target directly.
pub fn update_drag(world: &mut World) -> bool {
    let InteractionState::DraggingGroup(drag) = world.resource::<InteractionState>() else {
        return false;
    };
    let drag = drag.clone();
    let Some(pivot_now) = world.get::<Transform>(drag.pivot).copied() else {
        return false;
    };
    let pivot_start = drag.pivot_before.transform();

    for (entity, start) in &drag.members {
        let next = pivot::group_member_transform(
            drag.mode,
            &pivot_start,
            &pivot_now,
            &start.transform(),
        );
        if let Some(mut transform) = world.get_mut::<Transform>(*entity) {
            *transform = next;
        }
    }
    world.trigger(TransformChanged);
    true
}

/// Finish the current drag and record a command if anything changed.
/// Must also be called when a drag is cancelled. Returns true when a
/// command was recorded.
pub fn end_drag(world: &mut World) -> bool {
    if matches!(
        *world.resource::<InteractionState>(),
        InteractionState::DraggingGroup(_)
    ) {
        update_drag(world);
    }

    let state = world.resource::<InteractionState>().clone();
    let (command, resting) = match state {
        InteractionState::Idle | InteractionState::PivotEdit { drag: None } => return false,
        InteractionState::DraggingSingle(drag) => {
            let command = TransformSnapshot::capture(world, drag.entity)
                .filter(|after| *after != drag.before)
                .map(|after| {
                    EditorCommand::Transform(TransformChange {
                        entity: drag.entity,
                        prev: drag.before,
                        next: after,
                    })
                });
            (command, InteractionState::Idle)
        }
        InteractionState::DraggingGroup(drag) => {
            let items: Vec<TransformChange> = drag
                .members
                .into_iter()
                .filter_map(|(entity, prev)| {
                    TransformSnapshot::capture(world, entity).map(|next| TransformChange {
                        entity,
                        prev,
                        next,
                    })
                })
                .collect();
            let changed = items.iter().any(|item| item.prev != item.next);
            let command = changed.then(|| EditorCommand::GroupTransform {
                items,
                mode: GroupMode::from(drag.mode),
            });
            (command, InteractionState::Idle)
        }
        InteractionState::PivotEdit {
            drag: Some(before),
        } => {
            let pivot = pivot::pivot_entity(world).ok();
            let command = pivot
                .and_then(|pivot| {
                    TransformSnapshot::capture(world, pivot).map(|after| (pivot, after))
                })
                .filter(|(_, after)| *after != before)
                .map(|(pivot, after)| EditorCommand::PivotChange {
                    pivot,
                    prev: before,
                    next: after,
                });
            (command, InteractionState::PivotEdit { drag: None })
        }
    };

    *world.resource_mut::<InteractionState>() = resting;
    // The selection may have changed mid-drag while the pivot was user-driven.
    pivot::sync_pivot(world, false);

    let Some(command) = command else {
        return false;
    };
    commands::record(world, command);
    world.trigger(TransformChanged);
    true
}

/// Enter or leave pivot edit mode. Entering requires a group selection and
/// no drag in progress. Returns whether pivot edit is active afterwards.
pub fn toggle_pivot_edit(world: &mut World) -> bool {
    let state = world.resource::<InteractionState>().clone();
    let next = match state {
        InteractionState::PivotEdit { drag: None } => InteractionState::Idle,
        InteractionState::Idle
            if world.resource::<Selection>().mode() == SelectionMode::Group =>
        {
            InteractionState::PivotEdit { drag: None }
        }
        other => {
            debug!("Pivot edit toggle ignored in state {other:?}");
            return other.is_pivot_edit();
        }
    };
    let active = next.is_pivot_edit();
    *world.resource_mut::<InteractionState>() = next;
    pivot::update_pivot_visibility(world);
    active
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Apply the live pivot transform to group members every frame of a drag.
fn apply_group_drag(world: &mut World) {
    if matches!(
        *world.resource::<InteractionState>(),
        InteractionState::DraggingGroup(_)
    ) {
        update_drag(world);
    }
}

fn handle_pivot_edit_key(world: &mut World) {
    let keyboard = world.resource::<ButtonInput<KeyCode>>();
    let ctrl = keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
    if ctrl || !keyboard.just_pressed(KeyCode::KeyP) {
        return;
    }
    toggle_pivot_edit(world);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{init_editor_world, scene, selection, EditorHistory};

    fn setup(positions: &[Vec3]) -> (World, Vec<Entity>) {
        let mut world = World::new();
        init_editor_world(&mut world);
        let entities = positions
            .iter()
            .map(|&p| {
                let e = world
                    .spawn((scene::Editable, Transform::from_translation(p)))
                    .id();
                scene::add_to_scene(&mut world, e, None).unwrap();
                e
            })
            .collect();
        (world, entities)
    }

    fn undo_len(world: &World) -> usize {
        world.resource::<EditorHistory>().undo_len()
    }

    fn pivot_transform(world: &mut World) -> Mut<'_, Transform> {
        let pivot = pivot::pivot_entity(world).unwrap();
        world.get_mut::<Transform>(pivot).unwrap()
    }

    #[test]
    fn untouched_drag_records_nothing() {
        let (mut world, e) = setup(&[Vec3::ZERO, Vec3::X]);
        selection::select_object(&mut world, e[0], false);
        assert!(begin_drag(&mut world));
        assert!(!end_drag(&mut world));
        assert_eq!(undo_len(&world), 0);

        selection::select_all(&mut world);
        assert!(begin_drag(&mut world));
        update_drag(&mut world);
        assert!(!end_drag(&mut world));
        assert_eq!(undo_len(&world), 0);
        assert!(matches!(
            *world.resource::<InteractionState>(),
            InteractionState::Idle
        ));
    }

    #[test]
    fn single_drag_records_transform() {
        let (mut world, e) = setup(&[Vec3::ZERO]);
        selection::select_object(&mut world, e[0], false);
        begin_drag(&mut world);
        world.get_mut::<Transform>(e[0]).unwrap().translation = Vec3::new(0.0, 1.0, 0.0);
        assert!(end_drag(&mut world));

        let history = world.resource::<EditorHistory>();
        assert!(matches!(
            history.peek_undo(),
            Some(EditorCommand::Transform(TransformChange { entity, .. })) if *entity == e[0]
        ));
    }

    #[test]
    fn group_drag_applies_live_and_records_mode() {
        let (mut world, e) = setup(&[Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0)]);
        selection::select_all(&mut world);
        begin_drag(&mut world);

        pivot_transform(&mut world).translation += Vec3::new(0.0, 5.0, 0.0);
        update_drag(&mut world);
        update_drag(&mut world);
        for (i, &entity) in e.iter().enumerate() {
            assert_eq!(
                world.get::<Transform>(entity).unwrap().translation,
                Vec3::new(i as f32, 5.0, 0.0)
            );
        }

        assert!(end_drag(&mut world));
        let history = world.resource::<EditorHistory>();
        match history.peek_undo() {
            Some(EditorCommand::GroupTransform { items, mode }) => {
                assert_eq!(*mode, GroupMode::Translate);
                assert_eq!(items.len(), 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn group_mode_is_captured_at_drag_start() {
        let (mut world, _) = setup(&[Vec3::ZERO, Vec3::X]);
        selection::select_all(&mut world);
        *world.resource_mut::<GizmoMode>() = GizmoMode::Scale;
        begin_drag(&mut world);
        pivot_transform(&mut world).scale = Vec3::splat(2.0);
        end_drag(&mut world);

        let history = world.resource::<EditorHistory>();
        assert!(matches!(
            history.peek_undo(),
            Some(EditorCommand::GroupTransform { mode: GroupMode::Scale, .. })
        ));
    }

    #[test]
    fn pivot_edit_moves_only_the_pivot() {
        let (mut world, e) = setup(&[Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]);
        selection::select_all(&mut world);
        assert!(toggle_pivot_edit(&mut world));

        begin_drag(&mut world);
        pivot_transform(&mut world).translation = Vec3::new(0.0, 3.0, 0.0);
        assert!(end_drag(&mut world));

        assert_eq!(world.get::<Transform>(e[1]).unwrap().translation, Vec3::new(2.0, 0.0, 0.0));
        assert!(matches!(
            world.resource::<EditorHistory>().peek_undo(),
            Some(EditorCommand::PivotChange { .. })
        ));
        assert!(world.resource::<InteractionState>().is_pivot_edit());

        // Membership changes don't overwrite the user-placed pivot.
        let extra = world
            .spawn((scene::Editable, Transform::from_xyz(9.0, 0.0, 0.0)))
            .id();
        scene::add_to_scene(&mut world, extra, None).unwrap();
        selection::select_object(&mut world, extra, true);
        assert_eq!(pivot_transform(&mut world).translation, Vec3::new(0.0, 3.0, 0.0));

        assert!(!toggle_pivot_edit(&mut world));
    }

    #[test]
    fn pivot_edit_needs_a_group() {
        let (mut world, e) = setup(&[Vec3::ZERO, Vec3::X]);
        assert!(!toggle_pivot_edit(&mut world));
        selection::select_object(&mut world, e[0], false);
        assert!(!toggle_pivot_edit(&mut world));

        selection::select_all(&mut world);
        assert!(toggle_pivot_edit(&mut world));
        selection::select_object(&mut world, e[0], false);
        assert!(!world.resource::<InteractionState>().is_pivot_edit());
    }

    #[test]
    fn second_begin_is_rejected() {
        let (mut world, e) = setup(&[Vec3::ZERO]);
        selection::select_object(&mut world, e[0], false);
        assert!(begin_drag(&mut world));
        assert!(!begin_drag(&mut world));
        end_drag(&mut world);
        assert!(!world.resource::<InteractionState>().is_dragging());
    }

    #[test]
    fn drag_with_empty_selection_is_ignored() {
        let (mut world, _) = setup(&[Vec3::ZERO]);
        assert!(!begin_drag(&mut world));
        assert!(!end_drag(&mut world));
    }
}
