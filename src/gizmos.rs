use bevy::prelude::*;

use crate::drag::InteractionState;

pub struct TransformGizmosPlugin;

impl Plugin for TransformGizmosPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GizmoMode>()
            .add_systems(Update, handle_gizmo_mode_keys);
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[derive(Resource, Default, PartialEq, Eq, Clone, Copy, Debug)]
pub enum GizmoMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

impl GizmoMode {
    /// Translate -> Rotate -> Scale -> Translate.
    pub fn next(self) -> Self {
        match self {
            Self::Translate => Self::Rotate,
            Self::Rotate => Self::Scale,
            Self::Scale => Self::Translate,
        }
    }
}

/// Switch the gizmo mode. Ignored while a drag is in flight, since the
/// drag already captured its mode.
pub fn set_gizmo_mode(world: &mut World, mode: GizmoMode) -> bool {
    if world.resource::<InteractionState>().is_dragging() {
        debug!("Ignoring gizmo mode change to {mode:?} during drag");
        return false;
    }
    *world.resource_mut::<GizmoMode>() = mode;
    true
}

pub fn cycle_gizmo_mode(world: &mut World) -> GizmoMode {
    let next = world.resource::<GizmoMode>().next();
    set_gizmo_mode(world, next);
    *world.resource::<GizmoMode>()
}

// ---------------------------------------------------------------------------
// Key bindings: W/E/R switch gizmo mode, T cycles
// ---------------------------------------------------------------------------

fn handle_gizmo_mode_keys(world: &mut World) {
    let keyboard = world.resource::<ButtonInput<KeyCode>>();
    let ctrl = keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
    if ctrl {
        return;
    }

    let mode = if keyboard.just_pressed(KeyCode::KeyW) {
        Some(GizmoMode::Translate)
    } else if keyboard.just_pressed(KeyCode::KeyE) {
        Some(GizmoMode::Rotate)
    } else if keyboard.just_pressed(KeyCode::KeyR) {
        Some(GizmoMode::Scale)
    } else {
        None
    };
    let cycle = keyboard.just_pressed(KeyCode::KeyT);

    if let Some(mode) = mode {
        set_gizmo_mode(world, mode);
    } else if cycle {
        cycle_gizmo_mode(world);
    }
}
