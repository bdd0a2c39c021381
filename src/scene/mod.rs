//! Staged pose evaluation for skinned models.
//!
//! - `TransformStage` / `TransformStore`: ordered per-node transform slots
//!   with dirty-tracked cumulative matrices
//! - `RenderNode` / `RenderScene`: immutable hierarchy plus behavior
//!   components, shared between instances
//! - `ModelInstance`: per-model mutable pose state
//! - `IkTarget`: CCD chain solver with box and hinge limits
//! - `UpdatePhase`: the fixed per-frame evaluation order

pub mod camera;
pub mod component;
pub mod debug;
pub mod ik;
pub mod instance;
pub mod local_transform;
pub mod node;
pub mod phase;
pub mod scene;
pub mod skin;
pub mod stage;
pub mod transform_store;

pub use camera::{CameraTransform, RenderCamera};
pub use component::{CameraBinding, Influence, Joint, NodeComponent, Primitive};
pub use debug::{DebugColor, DebugGeometrySink};
pub use ik::{IkAngleLimit, IkAxis, IkChainLink, IkTarget};
pub use instance::ModelInstance;
pub use local_transform::{Decomposed, LocalTransform};
pub use node::RenderNode;
pub use phase::{PhaseMask, UpdatePhase, UpdatePhaseKind};
pub use scene::RenderScene;
pub use skin::RenderSkin;
pub use stage::{StageMask, TransformStage};
pub use transform_store::TransformStore;
