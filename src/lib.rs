#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod scene;

pub use errors::{Result, SceneError};
pub use scene::{
    CameraTransform, Decomposed, DebugGeometrySink, IkAngleLimit, IkAxis, IkChainLink, IkTarget,
    Influence, LocalTransform, ModelInstance, NodeComponent, RenderCamera, RenderNode,
    RenderScene, RenderSkin, TransformStage, TransformStore, UpdatePhase, UpdatePhaseKind,
};
