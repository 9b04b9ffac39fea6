use bevy::prelude::*;

use crate::error::EditorError;

/// Immutable capture of one entity's transform and name.
///
/// Equality is exact, component by component. A drag that nudges a value
/// by one ulp is a real change and must produce a history entry.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformSnapshot {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub name: Option<String>,
}

impl TransformSnapshot {
    pub fn new(transform: Transform, name: Option<String>) -> Self {
        Self {
            translation: transform.translation,
            rotation: transform.rotation,
            scale: transform.scale,
            name,
        }
    }

    /// Capture the current state of `entity`, or `None` if it has no `Transform`.
    pub fn capture(world: &World, entity: Entity) -> Option<Self> {
        let transform = *world.get::<Transform>(entity)?;
        let name = world.get::<Name>(entity).map(|n| n.as_str().to_string());
        Some(Self::new(transform, name))
    }

    pub fn transform(&self) -> Transform {
        Transform {
            translation: self.translation,
            rotation: self.rotation,
            scale: self.scale,
        }
    }

    /// Write this snapshot back onto `entity`, name included.
    pub fn restore(&self, world: &mut World, entity: Entity) -> Result<(), EditorError> {
        let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
            return Err(EditorError::MissingEntity(entity));
        };
        entity_mut.insert(self.transform());
        match &self.name {
            Some(name) => {
                entity_mut.insert(Name::new(name.clone()));
            }
            None => {
                entity_mut.remove::<Name>();
            }
        }
        Ok(())
    }
}

/// Capture snapshots for every entity in `entities`, skipping entities
/// without a transform.
pub fn capture_all(world: &World, entities: &[Entity]) -> Vec<(Entity, TransformSnapshot)> {
    entities
        .iter()
        .filter_map(|&e| TransformSnapshot::capture(world, e).map(|s| (e, s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_and_restore_round_trip() {
        let mut world = World::new();
        let entity = world
            .spawn((
                Name::new("Chair"),
                Transform::from_xyz(1.0, 2.0, 3.0).with_scale(Vec3::splat(2.0)),
            ))
            .id();

        let before = TransformSnapshot::capture(&world, entity).unwrap();

        world.entity_mut(entity).insert((
            Transform::from_xyz(9.0, 9.0, 9.0),
            Name::new("Renamed"),
        ));
        assert_ne!(TransformSnapshot::capture(&world, entity).unwrap(), before);

        before.restore(&mut world, entity).unwrap();
        assert_eq!(TransformSnapshot::capture(&world, entity).unwrap(), before);
        assert_eq!(world.get::<Name>(entity).unwrap().as_str(), "Chair");
    }

    #[test]
    fn equality_is_exact() {
        let a = TransformSnapshot::new(Transform::from_xyz(1.0, 0.0, 0.0), None);
        let b = TransformSnapshot::new(
            Transform::from_xyz(1.0 + f32::EPSILON, 0.0, 0.0),
            None,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn restore_on_missing_entity_reports_desync() {
        let mut world = World::new();
        let gone = world.spawn_empty().id();
        world.despawn(gone);

        let snapshot = TransformSnapshot::new(Transform::IDENTITY, None);
        assert_eq!(
            snapshot.restore(&mut world, gone),
            Err(EditorError::MissingEntity(gone))
        );
    }
}
