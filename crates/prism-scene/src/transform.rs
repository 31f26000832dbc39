//! Local transforms.

use glam::{Mat4, Quat, Vec3};

/// Translation, rotation, and scale of a node relative to its parent.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a transform from a translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    /// The local matrix, scale applied first, then rotation, then
    /// translation.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_is_identity() {
        let matrix = Transform::default().local_matrix();
        assert_relative_eq!(matrix.to_cols_array()[..], Mat4::IDENTITY.to_cols_array()[..]);
    }

    #[test]
    fn scale_applies_before_translation() {
        let transform = Transform {
            translation: Vec3::new(1.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        };

        let point = transform.local_matrix().transform_point3(Vec3::X);
        assert_relative_eq!(point.x, 3.0);
        assert_relative_eq!(point.y, 0.0);
    }

    #[test]
    fn rotation_applies_after_scale() {
        let transform = Transform {
            translation: Vec3::ZERO,
            rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            scale: Vec3::new(2.0, 1.0, 1.0),
        };

        // X scales to 2, then rotates onto +Y
        let point = transform.local_matrix().transform_point3(Vec3::X);
        assert_relative_eq!(point.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(point.y, 2.0, epsilon = 1e-6);
    }
}
