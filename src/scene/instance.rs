use std::sync::Arc;

use glam::{Affine3A, Mat4, Vec3};

use crate::scene::camera::CameraTransform;
use crate::scene::debug::DebugGeometrySink;
use crate::scene::ik::{IkLinkScratch, IkState};
use crate::scene::local_transform::Decomposed;
use crate::scene::scene::RenderScene;
use crate::scene::stage::TransformStage;
use crate::scene::transform_store::TransformStore;

/// Mutable pose state of one live model.
///
/// Instances of the same scene share the immutable hierarchy and component
/// configuration, never the pose: transform stores, world matrices, solver
/// scratch and output buffers are all per-instance. A single instance is
/// evaluated on one thread; separate instances are independent.
pub struct ModelInstance {
    pub(crate) scene: Arc<RenderScene>,
    pub(crate) transform_stores: Vec<TransformStore>,
    pub(crate) world_transforms: Vec<Affine3A>,
    pub(crate) ik_states: Vec<IkState>,
    pub(crate) joint_matrices: Vec<Vec<Mat4>>,
    pub(crate) model_matrices: Vec<Mat4>,
    pub(crate) camera_transforms: Vec<CameraTransform>,
    /// Set by any transform write; cleared after the pose phases run.
    pub(crate) pose_dirty: bool,
    pub(crate) render_data_fresh: bool,
    pub(crate) cameras_fresh: bool,
}

impl ModelInstance {
    #[must_use]
    pub fn new(scene: Arc<RenderScene>) -> Self {
        let transform_stores = scene
            .nodes()
            .iter()
            .map(|node| TransformStore::new(node.base_transform))
            .collect();
        let world_transforms = vec![Affine3A::IDENTITY; scene.node_count()];
        let ik_states = (0..scene.ik_target_count())
            .map(|ik_index| {
                let (_, target) = scene.ik_target(ik_index);
                IkState {
                    enabled: true,
                    links: vec![IkLinkScratch::default(); target.chains.len()],
                }
            })
            .collect();
        let joint_matrices = scene
            .skins()
            .iter()
            .map(|skin| vec![Mat4::IDENTITY; skin.joint_count()])
            .collect();
        let model_matrices = vec![Mat4::IDENTITY; scene.primitive_count()];
        let camera_transforms = scene
            .cameras()
            .iter()
            .map(|_| CameraTransform::new())
            .collect();

        Self {
            scene,
            transform_stores,
            world_transforms,
            ik_states,
            joint_matrices,
            model_matrices,
            camera_transforms,
            pose_dirty: true,
            render_data_fresh: false,
            cameras_fresh: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &Arc<RenderScene> {
        &self.scene
    }

    fn mark_pose_dirty(&mut self) {
        self.pose_dirty = true;
        self.render_data_fresh = false;
        self.cameras_fresh = false;
    }

    // ========================================================================
    // Transform writes (animation sampler / gameplay contract)
    // ========================================================================

    /// Overwrites `stage` on `node` with a matrix value.
    pub fn set_transform_matrix(&mut self, node: usize, stage: TransformStage, matrix: Affine3A) {
        self.transform_stores[node].set_matrix(stage, matrix);
        self.mark_pose_dirty();
    }

    /// Overwrites `stage` on `node` with a decomposed value.
    pub fn set_transform_decomposed(
        &mut self,
        node: usize,
        stage: TransformStage,
        decomposed: Decomposed,
    ) {
        self.transform_stores[node].set_decomposed(stage, decomposed);
        self.mark_pose_dirty();
    }

    /// In-place mutation of `stage` on `node`, coerced to decomposed form.
    pub fn update_transform_decomposed(
        &mut self,
        node: usize,
        stage: TransformStage,
        update: impl FnOnce(&mut Decomposed),
    ) {
        self.transform_stores[node].update_decomposed(stage, update);
        self.mark_pose_dirty();
    }

    /// In-place mutation of `stage` on `node`, coerced to matrix form.
    pub fn update_transform_matrix(
        &mut self,
        node: usize,
        stage: TransformStage,
        update: impl FnOnce(&mut Affine3A),
    ) {
        self.transform_stores[node].update_matrix(stage, update);
        self.mark_pose_dirty();
    }

    /// Clears per-frame transient stages of `node`, everything at or after
    /// `stage`, before fresh animation and IK input is written.
    pub fn clear_transforms_from(&mut self, node: usize, stage: TransformStage) {
        self.transform_stores[node].clear_from(stage);
        self.mark_pose_dirty();
    }

    // ========================================================================
    // Reads
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn transform_store(&self, node: usize) -> &TransformStore {
        &self.transform_stores[node]
    }

    /// World matrix of `node`; valid after global transform propagation.
    #[inline]
    #[must_use]
    pub fn world_transform(&self, node: usize) -> Affine3A {
        self.world_transforms[node]
    }

    #[inline]
    #[must_use]
    pub(crate) fn world_translation(&self, node: usize) -> Vec3 {
        self.world_transforms[node].translation.into()
    }

    /// Joint matrices of one skin, pre-multiplied by the inverse bind
    /// matrices; valid after a render-data update.
    #[inline]
    #[must_use]
    pub fn joint_matrices(&self, skin_index: usize) -> &[Mat4] {
        &self.joint_matrices[skin_index]
    }

    /// Model matrices of unskinned primitives; valid after a render-data
    /// update.
    #[inline]
    #[must_use]
    pub fn model_matrices(&self) -> &[Mat4] {
        &self.model_matrices
    }

    #[inline]
    #[must_use]
    pub fn camera_transform(&self, camera_index: usize) -> &CameraTransform {
        &self.camera_transforms[camera_index]
    }

    // ========================================================================
    // IK control (UI contract)
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn ik_enabled(&self, ik_index: usize) -> bool {
        self.ik_states[ik_index].enabled
    }

    /// Enables or disables one IK target. Disabling leaves the previous
    /// solve's IK-stage values in place.
    pub fn set_ik_enabled(&mut self, ik_index: usize, enabled: bool) {
        let state = &mut self.ik_states[ik_index];
        if state.enabled != enabled {
            state.enabled = enabled;
            self.mark_pose_dirty();
        }
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Recomputes world matrices for `node` and its descendants from the
    /// current cumulative transforms. The IK solver calls this between
    /// link updates; ancestors outside the subtree keep their cached
    /// matrices.
    pub fn refresh_subtree(&mut self, node: usize) {
        let mut stack = vec![node];
        while let Some(index) = stack.pop() {
            let local = self.transform_stores[index].cumulative(TransformStage::LAST);
            let node_ref = self.scene.node(index);
            let world = match node_ref.parent() {
                Some(parent) => self.world_transforms[parent] * local,
                None => local,
            };
            self.world_transforms[index] = world;
            stack.extend_from_slice(node_ref.children());
        }
    }

    /// Runs the pose phases (if anything changed) and refreshes the
    /// render-side joint and model matrices.
    pub fn update_render_data(&mut self) {
        let scene = Arc::clone(&self.scene);
        scene.update_render_data(self);
    }

    /// Runs the pose phases (if anything changed) and refreshes camera
    /// transforms.
    pub fn update_camera(&mut self) {
        let scene = Arc::clone(&self.scene);
        scene.update_camera(self);
    }

    /// Emits debug geometry for the current pose through `sink`.
    pub fn debug_render(&mut self, view_projection: Mat4, sink: &mut dyn DebugGeometrySink) {
        let scene = Arc::clone(&self.scene);
        scene.debug_render(self, view_projection, sink);
    }
}
