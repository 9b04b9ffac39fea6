pub mod commands;
pub mod drag;
pub mod entity_ops;
pub mod error;
pub mod gizmos;
pub mod pivot;
pub mod scene;
pub mod selection;
pub mod settings;
pub mod snapshot;
pub mod viewport_select;

use bevy::prelude::*;

pub use commands::{EditorCommand, EditorHistory, GroupMode};
pub use drag::InteractionState;
pub use error::EditorError;
pub use gizmos::GizmoMode;
pub use selection::{Selection, SelectionMode};
pub use settings::EditorSettings;

/// Marker for entities owned by the editor itself (the pivot proxy). They
/// never appear in the scene registry.
#[derive(Component, Default)]
pub struct EditorEntity;

/// Fired after every selection operation.
#[derive(Event, Debug, Clone, Copy)]
pub struct SelectionChanged;

/// Fired after entity transforms change through the editor.
#[derive(Event, Debug, Clone, Copy)]
pub struct TransformChanged;

/// Fired after entities enter or leave the scene.
#[derive(Event, Debug, Clone, Copy)]
pub struct SceneUpdated;

/// Detached entities that no history entry can restore any more. The
/// host owns them and decides whether to despawn them.
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct EntitiesReleased {
    pub entities: Vec<Entity>,
}

#[derive(Default)]
pub struct EditorPlugin {
    pub settings: EditorSettings,
}

impl EditorPlugin {
    pub fn with_settings(settings: EditorSettings) -> Self {
        Self { settings }
    }
}

impl Plugin for EditorPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.settings.clone());
        init_editor_world(app.world_mut());

        app.add_plugins((
            scene::ScenePlugin,
            selection::SelectionPlugin,
            gizmos::TransformGizmosPlugin,
            drag::DragPlugin,
            commands::CommandHistoryPlugin,
            entity_ops::EntityOpsPlugin,
            viewport_select::ViewportSelectPlugin,
        ));
    }
}

/// Insert every editor resource that is still missing and spawn the pivot.
/// Enough to drive the editing API on a bare `World` without an `App`.
pub fn init_editor_world(world: &mut World) {
    world.init_resource::<EditorSettings>();
    let history_limit = world.resource::<EditorSettings>().history_limit;

    world.init_resource::<scene::SceneRegistry>();
    selection::init_selection(world);
    world.init_resource::<InteractionState>();
    world.init_resource::<GizmoMode>();
    world.init_resource::<viewport_select::MarqueeState>();
    world.init_resource::<viewport_select::PointerTarget>();
    if !world.contains_resource::<EditorHistory>() {
        world.insert_resource(EditorHistory::with_limit(history_limit));
    }
    pivot::spawn_pivot(world);
}
