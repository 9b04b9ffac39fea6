use bevy::{camera::primitives::Aabb, prelude::*};

use crate::error::EditorError;

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneRegistry>()
            .add_systems(Update, refresh_local_bounds);
    }
}

// ---------------------------------------------------------------------------
// Entity metadata
// ---------------------------------------------------------------------------

/// Marks an entity the user may select and manipulate.
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct Editable;

/// Interaction link attached to an entity (opened when the viewer taps it).
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct LinkUrl(pub String);

/// Opaque animation clip references, handed to the exporter untouched.
#[derive(Component, Clone, Debug, Default, PartialEq, Eq)]
pub struct AnimationClips(pub Vec<String>);

/// Copies spawned by the editor. Their lifetime is the editor's, so they
/// are despawned once no history entry can restore them.
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct Duplicate;

/// Placed on entities that were removed from the scene but are kept alive
/// so that undo can bring them back under the same handle.
#[derive(Component, Default)]
pub struct Detached;

/// Label shown for an entity's link interaction: its name when that is not
/// blank, otherwise the entity handle.
pub fn link_label(world: &World, entity: Entity) -> String {
    world
        .get::<Name>(entity)
        .map(|name| name.as_str().trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| entity.to_string())
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Entities currently part of the scene, in registration order.
#[derive(Resource, Default, Debug)]
pub struct SceneRegistry {
    entities: Vec<Entity>,
}

impl SceneRegistry {
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    pub fn position(&self, entity: Entity) -> Option<usize> {
        self.entities.iter().position(|&e| e == entity)
    }

    /// Insert `entity` at `slot` (clamped), or append. Duplicates are ignored.
    pub fn insert(&mut self, entity: Entity, slot: Option<usize>) -> bool {
        if self.contains(entity) {
            return false;
        }
        match slot {
            Some(slot) => self.entities.insert(slot.min(self.entities.len()), entity),
            None => self.entities.push(entity),
        }
        true
    }

    /// Remove `entity`, returning the slot it occupied.
    pub fn remove(&mut self, entity: Entity) -> Option<usize> {
        let slot = self.position(entity)?;
        self.entities.remove(slot);
        Some(slot)
    }
}

/// Every registered entity that carries [`Editable`], in registry order.
pub fn editable_entities(world: &World) -> Vec<Entity> {
    world
        .resource::<SceneRegistry>()
        .entities()
        .iter()
        .copied()
        .filter(|&e| world.get::<Editable>(e).is_some())
        .collect()
}

/// True if `entity` is live, registered and editable.
pub fn is_editable(world: &World, entity: Entity) -> bool {
    world.get_entity(entity).is_ok()
        && world.get::<Editable>(entity).is_some()
        && world.resource::<SceneRegistry>().contains(entity)
}

/// Put `entity` (back) into the scene. `slot` restores a previous registry
/// position; `None` appends.
pub fn add_to_scene(
    world: &mut World,
    entity: Entity,
    slot: Option<usize>,
) -> Result<(), EditorError> {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return Err(EditorError::MissingEntity(entity));
    };
    entity_mut.remove::<Detached>();
    if let Some(mut visibility) = entity_mut.get_mut::<Visibility>() {
        *visibility = Visibility::Inherited;
    }
    world.resource_mut::<SceneRegistry>().insert(entity, slot);
    Ok(())
}

/// Take `entity` out of the scene without despawning it. Returns the
/// registry slot it occupied, if it was registered.
pub fn remove_from_scene(world: &mut World, entity: Entity) -> Result<Option<usize>, EditorError> {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return Err(EditorError::MissingEntity(entity));
    };
    entity_mut.insert(Detached);
    if let Some(mut visibility) = entity_mut.get_mut::<Visibility>() {
        *visibility = Visibility::Hidden;
    }
    Ok(world.resource_mut::<SceneRegistry>().remove(entity))
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// A box with no extent. Non-finite, so hit tests and snapping skip it.
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |acc, p| Self {
            min: acc.min.min(p),
            max: acc.max.max(p),
        })
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
        ]
    }

    /// Axis-aligned box enclosing this box after `transform`.
    pub fn transformed(&self, transform: &Transform) -> Self {
        if !self.is_finite() {
            return Self::EMPTY;
        }
        Self::from_points(self.corners().map(|c| transform.transform_point(c)))
    }
}

/// Bounding box in the entity's own local space.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct LocalBounds(pub BoundingBox);

impl LocalBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self(BoundingBox::new(min, max))
    }
}

/// World-space box of `entity` under its current `Transform`, or `None` if
/// the entity has no usable geometry.
pub fn world_bounds(world: &World, entity: Entity) -> Option<BoundingBox> {
    let local = world.get::<LocalBounds>(entity)?;
    let transform = world.get::<Transform>(entity)?;
    let bounds = local.0.transformed(transform);
    bounds.is_finite().then_some(bounds)
}

/// Rebuild `LocalBounds` of editable roots from the mesh `Aabb`s found on
/// the root and its descendants.
fn refresh_local_bounds(
    mut commands: Commands,
    roots: Query<
        (Entity, &GlobalTransform, Option<&LocalBounds>),
        (With<Editable>, Without<Detached>),
    >,
    children_query: Query<&Children>,
    aabb_query: Query<(&Aabb, &GlobalTransform)>,
) {
    for (entity, root_tf, existing) in &roots {
        let mut points = Vec::new();
        collect_aabb_corners(entity, &children_query, &aabb_query, &mut points);

        let bounds = if points.is_empty() {
            // Hosts may supply bounds for geometry the renderer doesn't know about.
            if existing.is_some() {
                continue;
            }
            BoundingBox::EMPTY
        } else {
            let to_local = root_tf.affine().inverse();
            BoundingBox::from_points(points.into_iter().map(|p| to_local.transform_point3(p)))
        };

        if existing.map(|b| b.0) != Some(bounds) {
            commands.entity(entity).insert(LocalBounds(bounds));
        }
    }
}

fn collect_aabb_corners(
    entity: Entity,
    children_query: &Query<&Children>,
    aabb_query: &Query<(&Aabb, &GlobalTransform)>,
    out: &mut Vec<Vec3>,
) {
    if let Ok((aabb, global_tf)) = aabb_query.get(entity) {
        let center = Vec3::from(aabb.center);
        let half = Vec3::from(aabb.half_extents);
        let local = BoundingBox::new(center - half, center + half);
        out.extend(local.corners().map(|c| global_tf.transform_point(c)));
    }
    let Ok(children) = children_query.get(entity) else {
        return;
    };
    for child in children.iter() {
        collect_aabb_corners(child, children_query, aabb_query, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_restores_slots() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let c = world.spawn_empty().id();

        let mut registry = SceneRegistry::default();
        for e in [a, b, c] {
            registry.insert(e, None);
        }
        assert!(!registry.insert(a, None));

        let slot = registry.remove(b);
        assert_eq!(slot, Some(1));
        registry.insert(b, slot);
        assert_eq!(registry.entities(), &[a, b, c]);
    }

    #[test]
    fn detached_entities_leave_registry_but_stay_alive() {
        let mut world = World::new();
        world.init_resource::<SceneRegistry>();
        let entity = world
            .spawn((Editable, Transform::default(), Visibility::Visible))
            .id();
        add_to_scene(&mut world, entity, None).unwrap();
        assert!(is_editable(&world, entity));

        let slot = remove_from_scene(&mut world, entity).unwrap();
        assert_eq!(slot, Some(0));
        assert!(!is_editable(&world, entity));
        assert!(world.get::<Detached>(entity).is_some());
        assert_eq!(world.get::<Visibility>(entity), Some(&Visibility::Hidden));

        add_to_scene(&mut world, entity, slot).unwrap();
        assert!(is_editable(&world, entity));
        assert!(world.get::<Detached>(entity).is_none());
    }

    #[test]
    fn editable_entities_skip_plain_registry_entries() {
        let mut world = World::new();
        world.init_resource::<SceneRegistry>();
        let light = world.spawn(Transform::default()).id();
        let model = world.spawn((Editable, Transform::default())).id();
        add_to_scene(&mut world, light, None).unwrap();
        add_to_scene(&mut world, model, None).unwrap();

        assert_eq!(editable_entities(&world), vec![model]);
    }

    #[test]
    fn world_bounds_follow_transform() {
        let mut world = World::new();
        let entity = world
            .spawn((
                Transform::from_xyz(0.0, 2.0, 0.0).with_scale(Vec3::splat(2.0)),
                LocalBounds::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
            ))
            .id();

        let bounds = world_bounds(&world, entity).unwrap();
        assert_eq!(bounds.min, Vec3::new(-1.0, 1.0, -1.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 3.0, 1.0));
    }

    #[test]
    fn empty_bounds_are_not_reported() {
        let mut world = World::new();
        let entity = world
            .spawn((Transform::default(), LocalBounds(BoundingBox::EMPTY)))
            .id();
        let bare = world.spawn(Transform::default()).id();

        assert!(world_bounds(&world, entity).is_none());
        assert!(world_bounds(&world, bare).is_none());
    }

    #[test]
    fn link_label_prefers_name() {
        let mut world = World::new();
        let named = world.spawn(Name::new("Poster")).id();
        let blank = world.spawn(Name::new("   ")).id();
        let unnamed = world.spawn_empty().id();

        assert_eq!(link_label(&world, named), "Poster");
        assert_eq!(link_label(&world, blank), blank.to_string());
        assert_eq!(link_label(&world, unnamed), unnamed.to_string());
    }
}
