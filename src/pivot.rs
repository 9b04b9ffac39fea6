//! Shared pivot for multi-entity edits.
//!
//! The pivot is an ordinary entity carrying [`PivotProxy`]. It is never
//! registered in the scene, so it is neither selectable nor exported. While
//! two or more entities are selected the gizmo attaches to the pivot, and
//! drags on the pivot are propagated to every member by
//! [`group_member_transform`].

use bevy::prelude::*;

use crate::{
    drag::InteractionState,
    error::EditorError,
    gizmos::GizmoMode,
    selection::{Selection, SelectionMode},
    EditorEntity,
};

#[derive(Component, Default)]
pub struct PivotProxy;

/// Handle of the pivot proxy entity.
#[derive(Resource, Clone, Copy, Debug)]
pub struct Pivot {
    pub entity: Entity,
}

/// Where the gizmo is attached. Exactly one of these is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachTarget {
    None,
    Entity(Entity),
    Pivot(Entity),
}

/// Spawn the pivot proxy once. Later calls return the existing handle.
pub fn spawn_pivot(world: &mut World) -> Entity {
    if let Some(pivot) = world.get_resource::<Pivot>() {
        return pivot.entity;
    }
    let entity = world
        .spawn((
            Name::new("Pivot"),
            PivotProxy,
            EditorEntity,
            Transform::IDENTITY,
            Visibility::Hidden,
        ))
        .id();
    world.insert_resource(Pivot { entity });
    entity
}

pub fn pivot_entity(world: &World) -> Result<Entity, EditorError> {
    world
        .get_resource::<Pivot>()
        .map(|p| p.entity)
        .ok_or(EditorError::MissingPivot)
}

pub fn attach_target(world: &World) -> AttachTarget {
    let pivot = world.get_resource::<Pivot>().map(|p| p.entity);
    let state = world.resource::<InteractionState>();
    if state.is_pivot_edit() {
        return pivot.map_or(AttachTarget::None, AttachTarget::Pivot);
    }
    match world.resource::<Selection>().mode() {
        SelectionMode::Empty => AttachTarget::None,
        SelectionMode::Single(entity) => AttachTarget::Entity(entity),
        SelectionMode::Group => pivot.map_or(AttachTarget::None, AttachTarget::Pivot),
    }
}

/// Arithmetic mean of the positions of `entities` that have a transform.
pub fn centroid(world: &World, entities: &[Entity]) -> Option<Vec3> {
    let positions: Vec<Vec3> = entities
        .iter()
        .filter_map(|&e| world.get::<Transform>(e).map(|t| t.translation))
        .collect();
    if positions.is_empty() {
        return None;
    }
    Some(positions.iter().copied().sum::<Vec3>() / positions.len() as f32)
}

/// Move the pivot to the centroid of the current selection. Orientation and
/// scale are kept.
pub fn recenter_pivot(world: &mut World) {
    let Some(pivot) = world.get_resource::<Pivot>().map(|p| p.entity) else {
        return;
    };
    let entities = world.resource::<Selection>().entities.clone();
    let Some(center) = centroid(world, &entities) else {
        return;
    };
    if let Some(mut transform) = world.get_mut::<Transform>(pivot) {
        transform.translation = center;
    }
}

/// Reconcile the pivot with the selection after it changed.
///
/// Pivot edit ends once the group dissolves (unless the pivot itself is
/// being dragged). The pivot is re-centred on membership changes, except
/// while the user owns its transform (pivot edit or any drag).
pub(crate) fn sync_pivot(world: &mut World, membership_changed: bool) {
    let is_group = world.resource::<Selection>().mode() == SelectionMode::Group;

    {
        let mut state = world.resource_mut::<InteractionState>();
        if !is_group && matches!(*state, InteractionState::PivotEdit { drag: None }) {
            *state = InteractionState::Idle;
        }
    }

    let state = world.resource::<InteractionState>();
    let user_driven = state.is_pivot_edit() || state.is_dragging();
    if membership_changed && is_group && !user_driven {
        recenter_pivot(world);
    }
    update_pivot_visibility(world);
}

/// The pivot is shown whenever the gizmo is attached to it.
pub(crate) fn update_pivot_visibility(world: &mut World) {
    let Some(pivot) = world.get_resource::<Pivot>().map(|p| p.entity) else {
        return;
    };
    let visible = matches!(attach_target(world), AttachTarget::Pivot(_));
    if let Some(mut visibility) = world.get_mut::<Visibility>(pivot) {
        *visibility = if visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

// ---------------------------------------------------------------------------
// Group transform math
// ---------------------------------------------------------------------------

/// Scale ratio between the current and drag-start pivot. A drag-start
/// scale of exactly zero is treated as one.
pub fn scale_factor(pivot_start: &Transform, pivot_now: &Transform) -> f32 {
    let base = if pivot_start.scale.x == 0.0 {
        1.0
    } else {
        pivot_start.scale.x
    };
    pivot_now.scale.x / base
}

/// Where a group member ends up when the pivot moves from `pivot_start` to
/// `pivot_now`. Always computed from the member's drag-start transform so
/// repeated ticks with the same pivot give the same answer.
pub fn group_member_transform(
    mode: GizmoMode,
    pivot_start: &Transform,
    pivot_now: &Transform,
    member_start: &Transform,
) -> Transform {
    let origin = pivot_start.translation;
    match mode {
        GizmoMode::Translate => {
            let delta = pivot_now.translation - origin;
            Transform {
                translation: member_start.translation + delta,
                ..*member_start
            }
        }
        GizmoMode::Rotate => {
            // World-frame delta; equals start⁻¹·now whenever the pivot
            // starts unrotated.
            let delta = (pivot_now.rotation * pivot_start.rotation.inverse()).normalize();
            let offset = member_start.translation - origin;
            Transform {
                translation: origin + delta * offset,
                rotation: (delta * member_start.rotation).normalize(),
                scale: member_start.scale,
            }
        }
        GizmoMode::Scale => {
            let factor = scale_factor(pivot_start, pivot_now);
            let offset = (member_start.translation - origin) * factor;
            Transform {
                translation: origin + offset,
                rotation: member_start.rotation,
                scale: member_start.scale * factor,
            }
        }
    }
}
