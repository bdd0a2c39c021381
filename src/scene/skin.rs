use glam::Mat4;

/// Immutable skin description: the joint nodes feeding a skinned mesh and
/// their inverse bind matrices.
///
/// The per-instance joint matrix buffer this skin describes is computed by
/// [`crate::scene::Joint`] components during the render-data phase as
/// `world_matrix * inverse_bind_matrix`.
#[derive(Debug, Clone)]
pub struct RenderSkin {
    pub(crate) name: Option<String>,
    pub(crate) joints: Vec<usize>,
    pub(crate) inverse_bind_matrices: Option<Vec<Mat4>>,
}

impl RenderSkin {
    #[must_use]
    pub fn new(
        name: Option<String>,
        joints: Vec<usize>,
        inverse_bind_matrices: Option<Vec<Mat4>>,
    ) -> Self {
        Self {
            name,
            joints,
            inverse_bind_matrices,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn joints(&self) -> &[usize] {
        &self.joints
    }

    #[inline]
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    #[must_use]
    pub fn inverse_bind_matrix(&self, joint_index: usize) -> Option<&Mat4> {
        self.inverse_bind_matrices
            .as_ref()
            .and_then(|matrices| matrices.get(joint_index))
    }
}
