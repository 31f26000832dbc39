//! Light sources.

use glam::Vec3;

/// Default point and spot light range.
pub const DEFAULT_RANGE: f32 = 10.0;

/// Light attached to a scene node.
///
/// Directional and spot lights shine along the node's world -Y axis;
/// point and spot positions come from the node's world matrix.
#[derive(Debug, Clone, Copy)]
pub enum Light {
    Directional {
        color: Vec3,
        intensity: f32,
    },
    Point {
        color: Vec3,
        intensity: f32,
        range: f32,
    },
    Spot {
        color: Vec3,
        intensity: f32,
        range: f32,
        inner_angle: f32,
        outer_angle: f32,
    },
}

impl Light {
    /// Directional light.
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self::Directional { color, intensity }
    }

    /// Point light with the default range.
    pub fn point(color: Vec3, intensity: f32) -> Self {
        Self::Point {
            color,
            intensity,
            range: DEFAULT_RANGE,
        }
    }

    /// Spot light with the default range.
    pub fn spot(color: Vec3, intensity: f32, inner_angle: f32, outer_angle: f32) -> Self {
        Self::Spot {
            color,
            intensity,
            range: DEFAULT_RANGE,
            inner_angle,
            outer_angle,
        }
    }

    /// Light color.
    pub fn color(&self) -> Vec3 {
        match *self {
            Self::Directional { color, .. }
            | Self::Point { color, .. }
            | Self::Spot { color, .. } => color,
        }
    }

    /// Light intensity.
    pub fn intensity(&self) -> f32 {
        match *self {
            Self::Directional { intensity, .. }
            | Self::Point { intensity, .. }
            | Self::Spot { intensity, .. } => intensity,
        }
    }
}
