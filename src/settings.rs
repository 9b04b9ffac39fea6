use anyhow::Context;
use bevy::prelude::*;
use serde::Deserialize;

/// Tunables for the editing core. Every field has a default, so a
/// settings file only needs to list the values it overrides.
#[derive(Resource, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EditorSettings {
    /// Pointer travel in pixels before a marquee drag counts as a rectangle.
    pub marquee_threshold: f32,
    /// World-space offset applied to duplicated entities.
    pub duplicate_offset: Vec3,
    /// Undo depth. Zero keeps every entry.
    pub history_limit: usize,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            marquee_threshold: 4.0,
            duplicate_offset: Vec3::new(0.5, 0.0, 0.5),
            history_limit: 256,
        }
    }
}

impl EditorSettings {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let settings: Self =
            serde_json::from_str(json).context("failed to parse editor settings")?;
        anyhow::ensure!(
            settings.marquee_threshold.is_finite() && settings.marquee_threshold >= 0.0,
            "marquee_threshold must be a non-negative number, got {}",
            settings.marquee_threshold
        );
        Ok(settings)
    }
}
