use bevy::{input_focus::InputFocus, prelude::*};

use crate::{
    commands::{self, EditorCommand, GroupMode, RemovedEntity, TransformChange},
    error::EditorError,
    scene::{self, AnimationClips, Duplicate, Editable, LinkUrl, LocalBounds},
    selection::{self, Selection},
    settings::EditorSettings,
    snapshot::TransformSnapshot,
    SceneUpdated, TransformChanged,
};

pub struct EntityOpsPlugin;

impl Plugin for EntityOpsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, handle_entity_keys);
    }
}

/// Selected entities that are still part of the scene, in selection order.
fn selected_editable(world: &World) -> Vec<Entity> {
    world
        .resource::<Selection>()
        .entities
        .iter()
        .copied()
        .filter(|&e| scene::is_editable(world, e))
        .collect()
}

/// Register host-spawned entities with the scene, record the addition and
/// select them. Entities already in the scene are skipped.
pub fn add_entities(world: &mut World, entities: &[Entity]) -> Result<bool, EditorError> {
    commands::ensure_not_dragging(world)?;
    if let Some(&missing) = entities.iter().find(|&&e| world.get_entity(e).is_err()) {
        return Err(EditorError::MissingEntity(missing));
    }

    let registry = world.resource::<scene::SceneRegistry>();
    let mut added: Vec<Entity> = Vec::with_capacity(entities.len());
    for &entity in entities {
        if !registry.contains(entity) && !added.contains(&entity) {
            added.push(entity);
        }
    }
    if added.is_empty() {
        return Ok(false);
    }

    for &entity in &added {
        world.entity_mut(entity).insert(Editable);
        scene::add_to_scene(world, entity, None)?;
    }
    commands::record(world, EditorCommand::AddEntities { entities: added.clone() });
    selection::set_selection(world, added);
    world.trigger(SceneUpdated);
    Ok(true)
}

/// Copy every selected entity, offset the copies and select them.
/// Returns the new entities.
pub fn duplicate_selected(world: &mut World) -> Result<Vec<Entity>, EditorError> {
    commands::ensure_not_dragging(world)?;
    let sources = selected_editable(world);
    if sources.is_empty() {
        return Ok(Vec::new());
    }
    let offset = world
        .get_resource::<EditorSettings>()
        .map_or(Vec3::new(0.5, 0.0, 0.5), |s| s.duplicate_offset);

    let mut copies = Vec::with_capacity(sources.len());
    for source in sources {
        let copy = world.spawn((Editable, Duplicate)).id();

        copy_component::<Transform>(world, source, copy);
        copy_component::<Visibility>(world, source, copy);
        copy_component::<LinkUrl>(world, source, copy);
        copy_component::<AnimationClips>(world, source, copy);
        copy_component::<LocalBounds>(world, source, copy);
        copy_component::<SceneRoot>(world, source, copy);
        copy_component::<Mesh3d>(world, source, copy);
        copy_component::<MeshMaterial3d<StandardMaterial>>(world, source, copy);
        if let Some(parent) = world.get::<ChildOf>(source).map(|c| c.parent()) {
            world.entity_mut(copy).insert(ChildOf(parent));
        }

        if let Some(name) = world.get::<Name>(source) {
            let new_name = format!("{} (Copy)", name.as_str());
            world.entity_mut(copy).insert(Name::new(new_name));
        }
        if let Some(mut transform) = world.get_mut::<Transform>(copy) {
            transform.translation += offset;
        }

        scene::add_to_scene(world, copy, None)?;
        copies.push(copy);
    }

    commands::record(world, EditorCommand::AddEntities { entities: copies.clone() });
    selection::set_selection(world, copies.clone());
    world.trigger(SceneUpdated);
    Ok(copies)
}

fn copy_component<T: Component + Clone>(world: &mut World, from: Entity, to: Entity) {
    if let Some(value) = world.get::<T>(from).cloned() {
        world.entity_mut(to).insert(value);
    }
}

/// Take the selected entities out of the scene. They stay alive, hidden,
/// so undo can put them back.
pub fn delete_selected(world: &mut World) -> Result<bool, EditorError> {
    commands::ensure_not_dragging(world)?;
    let targets = selected_editable(world);
    if targets.is_empty() {
        return Ok(false);
    }

    let mut removed = Vec::with_capacity(targets.len());
    for entity in targets {
        let Some(snapshot) = TransformSnapshot::capture(world, entity) else {
            warn!("Entity {entity} has no transform; not deleting it");
            continue;
        };
        let slot = scene::remove_from_scene(world, entity)?;
        removed.push(RemovedEntity {
            entity,
            snapshot,
            slot,
        });
    }
    if removed.is_empty() {
        return Ok(false);
    }

    let remaining: Vec<Entity> = world
        .resource::<Selection>()
        .entities
        .iter()
        .copied()
        .filter(|e| !removed.iter().any(|r| r.entity == *e))
        .collect();
    commands::record(world, EditorCommand::DeleteEntities { removed });
    selection::set_selection(world, remaining);
    world.trigger(SceneUpdated);
    Ok(true)
}

/// Lift or drop each selected entity so the bottom of its world bounds
/// sits at y = 0. Entities without usable bounds are left alone.
pub fn snap_to_ground(world: &mut World) -> Result<bool, EditorError> {
    commands::ensure_not_dragging(world)?;

    let mut items = Vec::new();
    for entity in selected_editable(world) {
        let Some(bounds) = scene::world_bounds(world, entity) else {
            warn!("Skipping snap for {entity}: no finite bounding box");
            continue;
        };
        let lift = -bounds.min.y;
        if lift == 0.0 {
            continue;
        }
        let Some(prev) = TransformSnapshot::capture(world, entity) else {
            continue;
        };
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation.y += lift;
        }
        let Some(next) = TransformSnapshot::capture(world, entity) else {
            continue;
        };
        if next != prev {
            items.push(TransformChange { entity, prev, next });
        }
    }
    if items.is_empty() {
        return Ok(false);
    }

    commands::record(
        world,
        EditorCommand::GroupTransform {
            items,
            mode: GroupMode::Snap,
        },
    );
    commands::recenter_group_pivot(world);
    world.trigger(TransformChanged);
    Ok(true)
}

// ---------------------------------------------------------------------------
// Keyboard shortcuts
// ---------------------------------------------------------------------------

fn handle_entity_keys(world: &mut World) {
    // Don't steal keys from a focused text field.
    if world
        .get_resource::<InputFocus>()
        .is_some_and(|focus| focus.0.is_some())
    {
        return;
    }

    let keyboard = world.resource::<ButtonInput<KeyCode>>();
    let ctrl = keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
    let delete_pressed =
        keyboard.just_pressed(KeyCode::Delete) || keyboard.just_pressed(KeyCode::Backspace);
    let d_pressed = keyboard.just_pressed(KeyCode::KeyD);
    let a_pressed = keyboard.just_pressed(KeyCode::KeyA);
    let escape_pressed = keyboard.just_pressed(KeyCode::Escape);
    let end_pressed = keyboard.just_pressed(KeyCode::End);

    let result = if delete_pressed {
        delete_selected(world)
    } else if ctrl && d_pressed {
        duplicate_selected(world).map(|copies| !copies.is_empty())
    } else if end_pressed {
        snap_to_ground(world)
    } else if ctrl && a_pressed {
        selection::select_all(world);
        Ok(true)
    } else if escape_pressed {
        selection::clear_selection(world);
        Ok(true)
    } else {
        return;
    };

    if let Err(err) = result {
        debug!("Entity shortcut ignored: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{drag, init_editor_world, EditorHistory};

    fn spawn_model(world: &mut World, name: &str, translation: Vec3) -> Entity {
        world
            .spawn((
                Name::new(name.to_string()),
                Transform::from_translation(translation),
                Visibility::default(),
                LocalBounds::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
            ))
            .id()
    }

    fn setup() -> (World, Entity, Entity) {
        let mut world = World::new();
        init_editor_world(&mut world);
        let a = spawn_model(&mut world, "Chair", Vec3::ZERO);
        let b = spawn_model(&mut world, "Table", Vec3::new(2.0, 0.0, 0.0));
        add_entities(&mut world, &[a, b]).unwrap();
        (world, a, b)
    }

    #[test]
    fn added_entities_are_editable_and_selected() {
        let (world, a, b) = setup();
        assert_eq!(scene::editable_entities(&world), vec![a, b]);
        assert_eq!(world.resource::<Selection>().entities, vec![a, b]);
        assert_eq!(world.resource::<EditorHistory>().undo_len(), 1);
    }

    #[test]
    fn adding_registered_entities_again_is_a_no_op() {
        let (mut world, a, _) = setup();
        assert_eq!(add_entities(&mut world, &[a]), Ok(false));
        assert_eq!(world.resource::<EditorHistory>().undo_len(), 1);
    }

    #[test]
    fn duplicate_copies_metadata_and_offsets() {
        let (mut world, a, _) = setup();
        world.entity_mut(a).insert((
            LinkUrl("https://example.com".into()),
            AnimationClips(vec!["Idle".into()]),
        ));
        selection::select_object(&mut world, a, false);

        let copies = duplicate_selected(&mut world).unwrap();
        assert_eq!(copies.len(), 1);
        let copy = copies[0];
        assert_eq!(world.get::<Name>(copy).unwrap().as_str(), "Chair (Copy)");
        assert_eq!(
            world.get::<Transform>(copy).unwrap().translation,
            Vec3::new(0.5, 0.0, 0.5)
        );
        assert_eq!(world.get::<LinkUrl>(copy).unwrap().0, "https://example.com");
        assert_eq!(world.get::<AnimationClips>(copy).unwrap().0, vec!["Idle"]);
        assert_eq!(world.resource::<Selection>().entities, vec![copy]);
        assert!(scene::is_editable(&world, copy));
    }

    #[test]
    fn delete_detaches_and_clears_selection() {
        let (mut world, a, b) = setup();
        assert_eq!(delete_selected(&mut world), Ok(true));
        assert!(world.resource::<Selection>().is_empty());
        assert!(scene::editable_entities(&world).is_empty());
        assert!(world.get_entity(a).is_ok());
        assert!(world.get_entity(b).is_ok());
        assert_eq!(delete_selected(&mut world), Ok(false));
    }

    #[test]
    fn snap_lifts_entity_onto_ground() {
        let (mut world, a, b) = setup();
        world.get_mut::<Transform>(b).unwrap().translation.y = 0.5;
        selection::select_all(&mut world);

        assert_eq!(snap_to_ground(&mut world), Ok(true));
        assert_eq!(world.get::<Transform>(a).unwrap().translation.y, 0.5);
        assert_eq!(world.get::<Transform>(b).unwrap().translation.y, 0.5);

        match world.resource::<EditorHistory>().peek_undo() {
            Some(EditorCommand::GroupTransform { items, mode }) => {
                assert_eq!(*mode, GroupMode::Snap);
                // `b` was already resting on the ground.
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].entity, a);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(snap_to_ground(&mut world), Ok(false));
    }

    #[test]
    fn snap_skips_entities_without_bounds() {
        let (mut world, a, _) = setup();
        world.entity_mut(a).remove::<LocalBounds>();
        selection::select_object(&mut world, a, false);
        assert_eq!(snap_to_ground(&mut world), Ok(false));
    }

    #[test]
    fn structural_edits_wait_for_drag_end() {
        let (mut world, a, _) = setup();
        selection::select_object(&mut world, a, false);
        drag::begin_drag(&mut world);

        assert_eq!(delete_selected(&mut world), Err(EditorError::DragInProgress));
        assert_eq!(duplicate_selected(&mut world), Err(EditorError::DragInProgress));
        assert_eq!(snap_to_ground(&mut world), Err(EditorError::DragInProgress));

        drag::end_drag(&mut world);
        assert_eq!(delete_selected(&mut world), Ok(true));
    }
}
