use glam::{Affine3A, Mat4, Quat, Vec3};

/// Camera projection parameters from the scene description.
#[derive(Debug, Clone)]
pub enum RenderCamera {
    Perspective {
        yfov: f32,
        znear: f32,
        /// Missing far plane means "use the caller's fallback".
        zfar: Option<f32>,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
}

impl RenderCamera {
    /// Projection matrix; `far_fallback` substitutes for a missing far
    /// plane.
    #[must_use]
    pub fn projection_matrix(&self, aspect_ratio: f32, far_fallback: f32) -> Mat4 {
        match *self {
            RenderCamera::Perspective { yfov, znear, zfar } => {
                Mat4::perspective_rh(yfov, aspect_ratio, znear, zfar.unwrap_or(far_fallback))
            }
            RenderCamera::Orthographic {
                xmag,
                ymag,
                znear,
                zfar,
            } => Mat4::orthographic_rh(-xmag, xmag, -ymag, ymag, znear, zfar),
        }
    }
}

/// Per-instance camera pose, extracted from the owning node's world matrix
/// during the camera-update phase.
#[derive(Debug, Clone)]
pub struct CameraTransform {
    position: Vec3,
    rotation: Quat,
}

impl CameraTransform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub(crate) fn update(&mut self, world: &Affine3A) {
        let (_, rotation, translation) = world.to_scale_rotation_translation();
        self.position = translation;
        self.rotation = rotation;
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// View matrix for the render layer.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position).inverse()
    }
}

impl Default for CameraTransform {
    fn default() -> Self {
        Self::new()
    }
}
