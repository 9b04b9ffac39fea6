use bevy::prelude::*;

use crate::{pivot, scene, SelectionChanged};

pub struct SelectionPlugin;

impl Plugin for SelectionPlugin {
    fn build(&self, app: &mut App) {
        init_selection(app.world_mut());
    }
}

/// Insert the [`Selection`] resource and its despawn observer, once.
pub(crate) fn init_selection(world: &mut World) {
    if world.contains_resource::<Selection>() {
        return;
    }
    world.init_resource::<Selection>();
    world.add_observer(on_selected_removed);
}

/// Marker component placed on selected entities. Multiple entities can have this.
#[derive(Component)]
pub struct Selected;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionMode {
    Empty,
    Single(Entity),
    Group,
}

/// Resource tracking the full selection state.
#[derive(Resource, Default, Debug)]
pub struct Selection {
    /// Ordered list of selected entities, without duplicates. The last
    /// entity is the primary selection.
    pub entities: Vec<Entity>,
}

impl Selection {
    pub fn mode(&self) -> SelectionMode {
        match self.entities.as_slice() {
            [] => SelectionMode::Empty,
            [single] => SelectionMode::Single(*single),
            _ => SelectionMode::Group,
        }
    }

    /// Get the primary (last) selected entity.
    pub fn primary(&self) -> Option<Entity> {
        self.entities.last().copied()
    }

    /// Check if an entity is selected.
    pub fn is_selected(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Editing API
// ---------------------------------------------------------------------------

/// Click selection. Without `additive` the selection becomes `{entity}`;
/// with it, `entity` is toggled. A handle that is not a live editable
/// entity clears the selection on a plain click and is ignored otherwise.
pub fn select_object(world: &mut World, entity: Entity, additive: bool) {
    if !scene::is_editable(world, entity) {
        if additive {
            debug!("Ignoring additive select of non-editable entity {entity}");
            return;
        }
        set_selection(world, Vec::new());
        return;
    }

    if !additive {
        set_selection(world, vec![entity]);
        return;
    }

    let mut entities = world.resource::<Selection>().entities.clone();
    if let Some(pos) = entities.iter().position(|&e| e == entity) {
        entities.remove(pos);
    } else {
        entities.push(entity);
    }
    set_selection(world, entities);
}

pub fn clear_selection(world: &mut World) {
    set_selection(world, Vec::new());
}

/// Select every editable entity, in registry order.
pub fn select_all(world: &mut World) {
    let entities = scene::editable_entities(world);
    set_selection(world, entities);
}

/// Add `entities` to the current selection, keeping existing order.
pub fn extend_selection(world: &mut World, entities: &[Entity]) {
    let mut merged = world.resource::<Selection>().entities.clone();
    merged.extend_from_slice(entities);
    set_selection(world, merged);
}

/// Replace the selection. Duplicates are dropped (first occurrence wins),
/// `Selected` markers are kept in sync, the pivot is refreshed and
/// [`SelectionChanged`] fires.
pub fn set_selection(world: &mut World, entities: Vec<Entity>) {
    let mut next: Vec<Entity> = Vec::with_capacity(entities.len());
    for entity in entities {
        if !next.contains(&entity) {
            next.push(entity);
        }
    }

    let previous = std::mem::replace(
        &mut world.resource_mut::<Selection>().entities,
        next.clone(),
    );

    for &entity in &previous {
        if next.contains(&entity) {
            continue;
        }
        if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.remove::<Selected>();
        }
    }
    for &entity in &next {
        if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(Selected);
        }
    }

    let membership_changed =
        previous.len() != next.len() || previous.iter().any(|e| !next.contains(e));
    pivot::sync_pivot(world, membership_changed);
    world.trigger(SelectionChanged);
}

/// A selected entity lost its `Selected` marker without going through
/// [`set_selection`] (the host despawned it). Drop it through the normal
/// path so the pivot and observers catch up.
fn on_selected_removed(
    trigger: On<Remove, Selected>,
    selection: Res<Selection>,
    mut commands: Commands,
) {
    let entity = trigger.event_target();
    if !selection.is_selected(entity) {
        return;
    }
    commands.queue(move |world: &mut World| {
        let mut remaining = world.resource::<Selection>().entities.clone();
        remaining.retain(|&e| e != entity && world.get_entity(e).is_ok());
        set_selection(world, remaining);
    });
}
