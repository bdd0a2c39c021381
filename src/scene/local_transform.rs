use glam::{Affine3A, Quat, Vec3};

/// Decomposed translation/rotation/scale value.
///
/// The authoritative form for direct manipulation: animation sampling, IK
/// and influence updates mutate the fields in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Decomposed {
    pub const IDENTITY: Decomposed = Decomposed {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn matrix(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Decomposed {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Affine3A> for Decomposed {
    /// Shear is discarded; only translation, rotation and per-axis scale
    /// survive the conversion.
    fn from(matrix: Affine3A) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }
}

/// A single stage's local transform contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalTransform {
    /// Opaque matrix form, authoritative for baked compositions.
    Matrix(Affine3A),
    /// Decomposed form, authoritative for field-level mutation.
    Decomposed(Decomposed),
}

impl LocalTransform {
    #[must_use]
    pub fn matrix(&self) -> Affine3A {
        match self {
            LocalTransform::Matrix(matrix) => *matrix,
            LocalTransform::Decomposed(decomposed) => decomposed.matrix(),
        }
    }

    #[must_use]
    pub fn translation(&self) -> Vec3 {
        match self {
            LocalTransform::Matrix(matrix) => matrix.translation.into(),
            LocalTransform::Decomposed(decomposed) => decomposed.translation,
        }
    }

    #[must_use]
    pub fn rotation(&self) -> Quat {
        match self {
            LocalTransform::Matrix(matrix) => matrix.to_scale_rotation_translation().1,
            LocalTransform::Decomposed(decomposed) => decomposed.rotation,
        }
    }

    #[must_use]
    pub fn scale(&self) -> Vec3 {
        match self {
            LocalTransform::Matrix(matrix) => matrix.to_scale_rotation_translation().0,
            LocalTransform::Decomposed(decomposed) => decomposed.scale,
        }
    }

    #[must_use]
    pub fn to_decomposed(&self) -> Decomposed {
        match self {
            LocalTransform::Matrix(matrix) => Decomposed::from(*matrix),
            LocalTransform::Decomposed(decomposed) => *decomposed,
        }
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        LocalTransform::Decomposed(Decomposed::IDENTITY)
    }
}
