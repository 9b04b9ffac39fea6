use bevy::prelude::*;

use crate::{
    drag::InteractionState,
    scene::{self, BoundingBox},
    selection,
    settings::EditorSettings,
};

pub struct ViewportSelectPlugin;

impl Plugin for ViewportSelectPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MarqueeState>()
            .init_resource::<PointerTarget>()
            .add_systems(Update, handle_marquee_input);
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// What the pointer was over when the button went down. Written by the
/// host's picking layer.
#[derive(Resource, Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerTarget {
    #[default]
    EmptyCanvas,
    Gizmo,
    Ui,
    Entity(Entity),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarqueeMode {
    /// Hits replace the selection.
    Replace,
    /// Hits are added to the selection.
    Additive,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarqueeSession {
    pub start: Vec2,
    pub current: Vec2,
    pub mode: MarqueeMode,
    /// Set once the pointer has travelled past the threshold. Never unset.
    pub activated: bool,
}

impl MarqueeSession {
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start, self.current)
    }
}

#[derive(Resource, Default, Debug)]
pub struct MarqueeState {
    pub session: Option<MarqueeSession>,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// World-to-screen mapping for one camera. Screen space has its origin at
/// the top-left of the viewport, y pointing down, in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenProjection {
    pub clip_from_world: Mat4,
    pub viewport_size: Vec2,
}

impl ScreenProjection {
    pub fn new(clip_from_world: Mat4, viewport_size: Vec2) -> Self {
        Self {
            clip_from_world,
            viewport_size,
        }
    }

    pub fn from_camera(camera: &Camera, camera_transform: &GlobalTransform) -> Option<Self> {
        let viewport_size = camera.logical_viewport_size()?;
        let view_from_world = Mat4::from(camera_transform.affine().inverse());
        Some(Self::new(camera.clip_from_view() * view_from_world, viewport_size))
    }

    /// Screen position of `point`, or `None` if it lies behind the camera.
    pub fn project(&self, point: Vec3) -> Option<Vec2> {
        let clip = self.clip_from_world * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let screen = Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport_size.x,
            (1.0 - ndc.y) * 0.5 * self.viewport_size.y,
        );
        screen.is_finite().then_some(screen)
    }
}

/// A box is hit when any projected corner lands inside `rect`. Boxes that
/// swallow the whole rectangle have no corner inside it, so their projected
/// centre is tried as well.
pub fn hit_test(bounds: &BoundingBox, projection: &ScreenProjection, rect: Rect) -> bool {
    if !bounds.is_finite() {
        return false;
    }
    let inside = |p: Vec3| projection.project(p).is_some_and(|s| rect.contains(s));
    bounds.corners().into_iter().any(inside) || inside(bounds.center())
}

/// Editable entities whose world bounds hit `rect`, in registry order.
pub fn marquee_hits(world: &World, projection: &ScreenProjection, rect: Rect) -> Vec<Entity> {
    scene::editable_entities(world)
        .into_iter()
        .filter(|&entity| match scene::world_bounds(world, entity) {
            Some(bounds) => hit_test(&bounds, projection, rect),
            None => {
                warn!("Marquee skipping {entity}: no finite bounding box");
                false
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Session API
// ---------------------------------------------------------------------------

/// Start a marquee at `start`. Needs the marquee modifier held and the
/// press to have landed on empty canvas, so plain drags still orbit the
/// camera.
pub fn begin_marquee(world: &mut World, start: Vec2, modifier: bool, additive: bool) -> bool {
    if !modifier {
        return false;
    }
    let target = *world.resource::<PointerTarget>();
    if target != PointerTarget::EmptyCanvas {
        debug!("Marquee not started: pointer down on {target:?}");
        return false;
    }
    if world.resource::<InteractionState>().is_dragging() {
        return false;
    }

    let mode = if additive {
        MarqueeMode::Additive
    } else {
        MarqueeMode::Replace
    };
    world.resource_mut::<MarqueeState>().session = Some(MarqueeSession {
        start,
        current: start,
        mode,
        activated: false,
    });
    true
}

/// Track the pointer. Returns whether the rectangle is active.
pub fn update_marquee(world: &mut World, current: Vec2) -> bool {
    let threshold = world
        .get_resource::<EditorSettings>()
        .map_or(4.0, |s| s.marquee_threshold);
    let mut state = world.resource_mut::<MarqueeState>();
    let Some(session) = state.session.as_mut() else {
        return false;
    };
    session.current = current;
    if !session.activated && session.start.distance(current) > threshold {
        session.activated = true;
    }
    session.activated
}

/// End the session and apply its hits. A session that never crossed the
/// threshold leaves the selection untouched and returns `None`.
pub fn finish_marquee(world: &mut World, projection: &ScreenProjection) -> Option<Vec<Entity>> {
    let session = world.resource_mut::<MarqueeState>().session.take()?;
    if !session.activated {
        return None;
    }

    let hits = marquee_hits(world, projection, session.rect());
    match session.mode {
        MarqueeMode::Replace => selection::set_selection(world, hits.clone()),
        MarqueeMode::Additive => selection::extend_selection(world, &hits),
    }
    Some(hits)
}

pub fn cancel_marquee(world: &mut World) {
    world.resource_mut::<MarqueeState>().session = None;
}

// ---------------------------------------------------------------------------
// Input: Shift+drag replaces, Shift+Ctrl+drag adds
// ---------------------------------------------------------------------------

fn handle_marquee_input(
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    windows: Query<&Window>,
    camera_query: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
    mut commands: Commands,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((camera, cam_tf)) = camera_query.single() else {
        return;
    };

    // Viewport-local cursor, matching the projection's screen space.
    let viewport_min = camera
        .logical_viewport_rect()
        .map_or(Vec2::ZERO, |rect| rect.min);
    let cursor = window.cursor_position().map(|pos| pos - viewport_min);

    if mouse.just_pressed(MouseButton::Left) {
        let Some(cursor) = cursor else {
            return;
        };
        let shift = keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);
        let ctrl = keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
        commands.queue(move |world: &mut World| {
            begin_marquee(world, cursor, shift, ctrl);
        });
        return;
    }

    if mouse.just_released(MouseButton::Left) {
        let projection = ScreenProjection::from_camera(camera, cam_tf);
        commands.queue(move |world: &mut World| {
            if let Some(cursor) = cursor {
                update_marquee(world, cursor);
            }
            match projection {
                Some(projection) => {
                    finish_marquee(world, &projection);
                }
                None => cancel_marquee(world),
            }
        });
        return;
    }

    if !mouse.pressed(MouseButton::Left) {
        return;
    }
    if let Some(cursor) = cursor {
        commands.queue(move |world: &mut World| {
            update_marquee(world, cursor);
        });
    }
}
