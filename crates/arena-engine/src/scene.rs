//! Presentation directives.
//!
//! Some actions imply renderer setup that is not game state: `INIT_GAME`
//! lights the arena. Those effects are emitted as [`SceneDirective`]s that the
//! game context queues for the renderer. They are never hashed, replicated or
//! read back by the reducer.

use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Ambient,
    Directional,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    /// `0xRRGGBB`.
    pub color: u32,
    pub intensity: f32,
    /// Ignored for ambient lights.
    pub position: Vec3,
}

/// A non-authoritative instruction for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneDirective {
    /// Remove everything the renderer added for the previous game.
    Clear,
    AddLight(Light),
}

/// Ambient light plus key, fill and back directional lights.
pub fn arena_lighting() -> Vec<SceneDirective> {
    let directional = |color, intensity, position| {
        SceneDirective::AddLight(Light {
            kind: LightKind::Directional,
            color,
            intensity,
            position,
        })
    };
    vec![
        SceneDirective::Clear,
        SceneDirective::AddLight(Light {
            kind: LightKind::Ambient,
            color: 0x404040,
            intensity: 1.0,
            position: Vec3::ZERO,
        }),
        directional(0xFFE4C4, 0.74, Vec3::new(-100.0, 50.0, 100.0)),
        directional(0xA6D8ED, 0.25, Vec3::new(100.0, 50.0, 100.0)),
        directional(0xFFFFFF, 0.5, Vec3::new(100.0, 0.0, -100.0).normalize()),
    ]
}
