use glam::{Mat4, Quat, Vec3};

use crate::scene::debug::{self, DebugGeometrySink};
use crate::scene::ik::IkTarget;
use crate::scene::instance::ModelInstance;
use crate::scene::local_transform::LocalTransform;
use crate::scene::node::RenderNode;
use crate::scene::phase::PhaseMask;
use crate::scene::scene::RenderScene;
use crate::scene::stage::TransformStage;

/// Per-node behavior component.
///
/// A closed set: the scheduler dispatches with a match over variants, and
/// each variant declares the update phases it participates in.
#[derive(Debug, Clone)]
pub enum NodeComponent {
    /// Writes one skin joint matrix during render-data update.
    Joint(Joint),
    /// Uploads an unskinned primitive's model matrix.
    Primitive(Primitive),
    /// Tracks a scene camera from this node's world transform.
    Camera(CameraBinding),
    /// Copies a weighted fraction of this node's pose onto another node.
    Influence(Influence),
    /// Solves an IK chain so this node reaches another node's position.
    IkTarget(IkTarget),
}

impl NodeComponent {
    /// Phases this component must be visited in.
    #[must_use]
    pub fn phases(&self) -> PhaseMask {
        match self {
            NodeComponent::Joint(_) => PhaseMask::RENDER_DATA_UPDATE | PhaseMask::DEBUG_RENDER,
            NodeComponent::Primitive(_) => PhaseMask::RENDER_DATA_UPDATE,
            NodeComponent::Camera(_) => PhaseMask::CAMERA_UPDATE,
            NodeComponent::Influence(_) => PhaseMask::INFLUENCE_TRANSFORM,
            NodeComponent::IkTarget(_) => PhaseMask::IK | PhaseMask::DEBUG_RENDER,
        }
    }
}

/// Binds a node to one joint slot of a skin.
#[derive(Debug, Clone)]
pub struct Joint {
    pub skin_index: usize,
    pub joint_index: usize,
}

impl Joint {
    pub(crate) fn update_render_data(
        &self,
        node_index: usize,
        scene: &RenderScene,
        instance: &mut ModelInstance,
    ) {
        let mut matrix = Mat4::from(instance.world_transform(node_index));
        let skin = &scene.skins()[self.skin_index];
        if let Some(inverse_bind) = skin.inverse_bind_matrix(self.joint_index) {
            matrix *= *inverse_bind;
        }
        instance.joint_matrices[self.skin_index][self.joint_index] = matrix;
    }

    pub(crate) fn debug_render(
        &self,
        node: &RenderNode,
        instance: &ModelInstance,
        view_projection: &Mat4,
        sink: &mut dyn DebugGeometrySink,
    ) {
        // No bone lines for influence sources.
        if node
            .components()
            .iter()
            .any(|component| matches!(component, NodeComponent::Influence(_)))
        {
            return;
        }
        if let Some(parent) = node.parent() {
            let parent_pos: Vec3 = instance.world_transform(parent).translation.into();
            let self_pos: Vec3 = instance.world_transform(node.index()).translation.into();
            sink.line(view_projection, parent_pos, self_pos, debug::YELLOW);
        }
    }
}

/// Binds a node to a model-matrix slot of the render output.
#[derive(Debug, Clone)]
pub struct Primitive {
    pub primitive_index: usize,
    pub skin_index: Option<usize>,
}

impl Primitive {
    pub(crate) fn update_render_data(&self, node_index: usize, instance: &mut ModelInstance) {
        // Skinned primitives are positioned entirely by their joints.
        if self.skin_index.is_some() {
            return;
        }
        instance.model_matrices[self.primitive_index] =
            Mat4::from(instance.world_transform(node_index));
    }
}

/// Binds a node to a scene camera slot.
#[derive(Debug, Clone)]
pub struct CameraBinding {
    pub camera_index: usize,
}

impl CameraBinding {
    pub(crate) fn update(&self, node_index: usize, instance: &mut ModelInstance) {
        let world = instance.world_transform(node_index);
        instance.camera_transforms[self.camera_index].update(&world);
    }
}

/// Append-bone configuration: the owning node is the source whose pose is
/// copied, scaled by `weight`, onto `target_node` at `target_stage`.
#[derive(Debug, Clone)]
pub struct Influence {
    pub target_stage: TransformStage,
    pub target_node: usize,
    pub weight: f32,
    pub affects_rotation: bool,
    pub affects_translation: bool,
    pub append_local: bool,
}

impl Influence {
    pub(crate) fn apply(&self, source_node: usize, instance: &mut ModelInstance) {
        let source = &instance.transform_stores[source_node];
        let nested = source.get(self.target_stage).copied();

        // Local appends read the source's own animated transform; a
        // non-local append whose source already carries a value at the
        // target stage chains off that nested value instead.
        let mut rotation = match (self.append_local, nested) {
            (false, Some(nested)) => nested.rotation(),
            _ => source
                .get(TransformStage::AnimatedRelative)
                .map_or(Quat::IDENTITY, LocalTransform::rotation),
        };
        if let Some(ik) = source.get(TransformStage::Ik) {
            // Rotation picks up the source's solved IK; translation never
            // does.
            rotation *= ik.rotation();
        }
        let rotation = Quat::IDENTITY.slerp(rotation, self.weight);

        let translation = match (self.append_local, nested) {
            (false, Some(nested)) => nested.translation(),
            _ => source
                .get(TransformStage::AnimatedRelative)
                .map_or(Vec3::ZERO, LocalTransform::translation),
        } * self.weight;

        let affects_rotation = self.affects_rotation;
        let affects_translation = self.affects_translation;
        instance.transform_stores[self.target_node].update_decomposed(
            self.target_stage,
            |decomposed| {
                if affects_rotation {
                    decomposed.rotation = rotation;
                }
                if affects_translation {
                    decomposed.translation = translation;
                }
            },
        );
    }
}
