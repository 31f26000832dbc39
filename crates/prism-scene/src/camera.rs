//! Camera projections.

use glam::Mat4;

/// Default vertical field of view in radians (~45 degrees).
pub const DEFAULT_FOV_Y: f32 = 0.785;
/// Default near plane.
pub const DEFAULT_NEAR: f32 = 0.1;
/// Default far plane.
pub const DEFAULT_FAR: f32 = 100.0;

/// Camera attached to a scene node.
///
/// The view matrix is not stored here; it is the inverse of the owning
/// node's world matrix.
#[derive(Debug, Clone, Copy)]
pub enum Camera {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        half_height: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
}

impl Camera {
    /// Perspective camera with the default frustum.
    pub fn perspective(aspect: f32) -> Self {
        Self::Perspective {
            fov_y: DEFAULT_FOV_Y,
            aspect,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    /// Orthographic camera spanning `half_height` above and below center.
    pub fn orthographic(half_height: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::Orthographic {
            half_height,
            aspect,
            near,
            far,
        }
    }

    /// Update the aspect ratio, keeping the rest of the frustum.
    pub fn set_aspect(&mut self, aspect: f32) {
        match self {
            Self::Perspective { aspect: a, .. } | Self::Orthographic { aspect: a, .. } => {
                *a = aspect;
            }
        }
    }

    /// Projection matrix with Vulkan conventions.
    ///
    /// Depth runs 0..1 and Y is flipped so clip-space +Y points down.
    pub fn projection(&self) -> Mat4 {
        let mut projection = match *self {
            Self::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Self::Orthographic {
                half_height,
                aspect,
                near,
                far,
            } => {
                let half_width = half_height * aspect;
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    near,
                    far,
                )
            }
        };

        projection.y_axis.y *= -1.0;
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn perspective_depth_spans_zero_to_one() {
        let camera = Camera::perspective(16.0 / 9.0);
        let projection = camera.projection();

        let near_point = projection * Vec4::new(0.0, 0.0, -DEFAULT_NEAR, 1.0);
        assert_relative_eq!(near_point.z / near_point.w, 0.0, epsilon = 1e-5);

        let far_point = projection * Vec4::new(0.0, 0.0, -DEFAULT_FAR, 1.0);
        assert_relative_eq!(far_point.z / far_point.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn y_axis_is_flipped() {
        let camera = Camera::perspective(1.0);
        let projection = camera.projection();

        // A point above center in view space lands below center in clip space
        let clip = projection * Vec4::new(0.0, 1.0, -10.0, 1.0);
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn orthographic_maps_extents_to_unit_square() {
        let camera = Camera::orthographic(2.0, 2.0, 0.1, 10.0);
        let projection = camera.projection();

        let corner = projection * Vec4::new(4.0, 2.0, -0.1, 1.0);
        assert_relative_eq!(corner.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(corner.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn set_aspect_updates_projection() {
        let mut camera = Camera::perspective(1.0);
        let square = camera.projection();
        camera.set_aspect(2.0);
        let wide = camera.projection();

        assert_relative_eq!(square.x_axis.x, 2.0 * wide.x_axis.x, epsilon = 1e-6);
    }
}
