use bitflags::bitflags;
use glam::Mat4;

use crate::scene::debug::DebugGeometrySink;

/// One step of the fixed per-frame evaluation order.
///
/// Phases run strictly in the order of the [`UpdatePhaseKind`] listing;
/// later phases read the outputs of earlier ones. The debug variant
/// carries the external geometry consumer for the duration of the pass.
pub enum UpdatePhase<'a> {
    Ik,
    InfluenceTransform,
    GlobalTransformPropagation,
    RenderDataUpdate,
    CameraUpdate,
    DebugRender {
        view_projection: Mat4,
        sink: &'a mut dyn DebugGeometrySink,
    },
}

impl UpdatePhase<'_> {
    #[must_use]
    pub fn kind(&self) -> UpdatePhaseKind {
        match self {
            UpdatePhase::Ik => UpdatePhaseKind::Ik,
            UpdatePhase::InfluenceTransform => UpdatePhaseKind::InfluenceTransform,
            UpdatePhase::GlobalTransformPropagation => UpdatePhaseKind::GlobalTransformPropagation,
            UpdatePhase::RenderDataUpdate => UpdatePhaseKind::RenderDataUpdate,
            UpdatePhase::CameraUpdate => UpdatePhaseKind::CameraUpdate,
            UpdatePhase::DebugRender { .. } => UpdatePhaseKind::DebugRender,
        }
    }
}

/// Field-less tag for [`UpdatePhase`], used for phase registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePhaseKind {
    Ik,
    InfluenceTransform,
    GlobalTransformPropagation,
    RenderDataUpdate,
    CameraUpdate,
    DebugRender,
}

bitflags! {
    /// The set of phases a component or node participates in.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct PhaseMask: u8 {
        const IK = 1 << 0;
        const INFLUENCE_TRANSFORM = 1 << 1;
        const GLOBAL_TRANSFORM_PROPAGATION = 1 << 2;
        const RENDER_DATA_UPDATE = 1 << 3;
        const CAMERA_UPDATE = 1 << 4;
        const DEBUG_RENDER = 1 << 5;
    }
}

impl PhaseMask {
    #[must_use]
    pub fn single(kind: UpdatePhaseKind) -> PhaseMask {
        match kind {
            UpdatePhaseKind::Ik => PhaseMask::IK,
            UpdatePhaseKind::InfluenceTransform => PhaseMask::INFLUENCE_TRANSFORM,
            UpdatePhaseKind::GlobalTransformPropagation => PhaseMask::GLOBAL_TRANSFORM_PROPAGATION,
            UpdatePhaseKind::RenderDataUpdate => PhaseMask::RENDER_DATA_UPDATE,
            UpdatePhaseKind::CameraUpdate => PhaseMask::CAMERA_UPDATE,
            UpdatePhaseKind::DebugRender => PhaseMask::DEBUG_RENDER,
        }
    }

    #[inline]
    #[must_use]
    pub fn contains_kind(self, kind: UpdatePhaseKind) -> bool {
        self.intersects(Self::single(kind))
    }
}
