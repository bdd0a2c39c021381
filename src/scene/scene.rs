use std::collections::VecDeque;

use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::errors::{Result, SceneError};
use crate::scene::camera::RenderCamera;
use crate::scene::component::NodeComponent;
use crate::scene::debug::DebugGeometrySink;
use crate::scene::ik::IkTarget;
use crate::scene::instance::ModelInstance;
use crate::scene::node::RenderNode;
use crate::scene::phase::{UpdatePhase, UpdatePhaseKind};
use crate::scene::skin::RenderSkin;
use crate::scene::stage::TransformStage;

/// Immutable scene: node hierarchy, components, skins and cameras.
///
/// Built once from the loader's output and shared (via `Arc`) between any
/// number of [`ModelInstance`]s. Construction validates every cross
/// reference; the per-frame evaluation path assumes a valid scene and
/// never fails.
#[derive(Debug)]
pub struct RenderScene {
    nodes: Vec<RenderNode>,
    roots: Vec<usize>,
    /// Breadth-first traversal order; every parent precedes its children.
    update_order: Vec<usize>,
    skins: Vec<RenderSkin>,
    cameras: Vec<RenderCamera>,
    /// `(node, component)` per IK target, dense by `ik_index`.
    ik_components: Vec<(usize, usize)>,
    primitive_count: usize,
    node_names: FxHashMap<String, usize>,
    has_debug_render: bool,
}

impl RenderScene {
    pub fn new(
        mut nodes: Vec<RenderNode>,
        skins: Vec<RenderSkin>,
        cameras: Vec<RenderCamera>,
    ) -> Result<Self> {
        let count = nodes.len();

        for (position, node) in nodes.iter().enumerate() {
            if node.index != position {
                return Err(SceneError::NodeIndexMismatch {
                    index: node.index,
                    position,
                });
            }
        }

        // Parent links derive from the child lists.
        for node in &mut nodes {
            node.parent = None;
        }
        let mut edges = Vec::new();
        for node in &nodes {
            for &child in &node.children {
                if child >= count {
                    return Err(SceneError::IndexOutOfBounds {
                        context: "child link",
                        index: child,
                        count,
                    });
                }
                if child == node.index {
                    return Err(SceneError::SelfChild { node: node.index });
                }
                edges.push((node.index, child));
            }
        }
        for (parent, child) in edges {
            if nodes[child].parent.is_some() {
                return Err(SceneError::DuplicateParent { child });
            }
            nodes[child].parent = Some(parent);
        }

        let roots: Vec<usize> = nodes
            .iter()
            .filter(|node| node.parent.is_none())
            .map(|node| node.index)
            .collect();

        let mut update_order = Vec::with_capacity(count);
        let mut queue: VecDeque<usize> = roots.iter().copied().collect();
        while let Some(index) = queue.pop_front() {
            update_order.push(index);
            queue.extend(nodes[index].children.iter().copied());
        }
        if update_order.len() != count {
            return Err(SceneError::HierarchyNotForest {
                unreachable: count - update_order.len(),
                total: count,
            });
        }

        for node in &mut nodes {
            node.recompute_phases();
        }

        for (skin_index, skin) in skins.iter().enumerate() {
            for &joint in skin.joints() {
                if joint >= count {
                    return Err(SceneError::IndexOutOfBounds {
                        context: "skin joint node",
                        index: joint,
                        count,
                    });
                }
            }
            if let Some(matrices) = &skin.inverse_bind_matrices {
                if matrices.len() != skin.joints.len() {
                    return Err(SceneError::InverseBindCountMismatch {
                        skin: skin_index,
                        joints: skin.joints.len(),
                        matrices: matrices.len(),
                    });
                }
            }
        }

        let mut ik_found = Vec::new();
        let mut primitive_found = Vec::new();
        for node in &nodes {
            for (component_index, component) in node.components.iter().enumerate() {
                match component {
                    NodeComponent::Joint(joint) => {
                        let skin = skins.get(joint.skin_index).ok_or(
                            SceneError::IndexOutOfBounds {
                                context: "joint skin",
                                index: joint.skin_index,
                                count: skins.len(),
                            },
                        )?;
                        if joint.joint_index >= skin.joint_count() {
                            return Err(SceneError::IndexOutOfBounds {
                                context: "skin joint slot",
                                index: joint.joint_index,
                                count: skin.joint_count(),
                            });
                        }
                    }
                    NodeComponent::Primitive(primitive) => {
                        if let Some(skin_index) = primitive.skin_index {
                            if skin_index >= skins.len() {
                                return Err(SceneError::IndexOutOfBounds {
                                    context: "primitive skin",
                                    index: skin_index,
                                    count: skins.len(),
                                });
                            }
                        }
                        primitive_found.push(primitive.primitive_index);
                    }
                    NodeComponent::Camera(binding) => {
                        if binding.camera_index >= cameras.len() {
                            return Err(SceneError::IndexOutOfBounds {
                                context: "camera",
                                index: binding.camera_index,
                                count: cameras.len(),
                            });
                        }
                    }
                    NodeComponent::Influence(influence) => {
                        if influence.target_node >= count {
                            return Err(SceneError::IndexOutOfBounds {
                                context: "influence target",
                                index: influence.target_node,
                                count,
                            });
                        }
                    }
                    NodeComponent::IkTarget(ik) => {
                        if ik.effector_node >= count {
                            return Err(SceneError::IndexOutOfBounds {
                                context: "ik effector",
                                index: ik.effector_node,
                                count,
                            });
                        }
                        if ik.stage == TransformStage::FIRST {
                            return Err(SceneError::IkWritesBaseStage { node: node.index });
                        }
                        for link in &ik.chains {
                            if link.node >= count {
                                return Err(SceneError::IndexOutOfBounds {
                                    context: "ik chain link",
                                    index: link.node,
                                    count,
                                });
                            }
                            if let Some(limit) = &link.limit {
                                for (axis, min, max) in [
                                    ('x', limit.min.x, limit.max.x),
                                    ('y', limit.min.y, limit.max.y),
                                    ('z', limit.min.z, limit.max.z),
                                ] {
                                    if min > max {
                                        return Err(SceneError::InvalidLimitRange {
                                            node: link.node,
                                            axis,
                                        });
                                    }
                                }
                            }
                        }
                        ik_found.push((ik.ik_index, node.index, component_index));
                    }
                }
            }
        }

        let ik_count = ik_found.len();
        let mut ik_slots: Vec<Option<(usize, usize)>> = vec![None; ik_count];
        for (ik_index, node, component) in ik_found {
            match ik_slots.get_mut(ik_index) {
                Some(slot @ None) => *slot = Some((node, component)),
                Some(Some(_)) => {
                    return Err(SceneError::DuplicateIndex {
                        context: "ik target",
                        index: ik_index,
                    });
                }
                None => {
                    return Err(SceneError::NonDenseIndex {
                        context: "ik target",
                        found: ik_count,
                        index: ik_index,
                    });
                }
            }
        }
        let ik_components: Vec<(usize, usize)> = ik_slots.into_iter().flatten().collect();

        let primitive_count = primitive_found.len();
        let mut primitive_seen = vec![false; primitive_count];
        for index in primitive_found {
            match primitive_seen.get_mut(index) {
                Some(seen @ false) => *seen = true,
                Some(_) => {
                    return Err(SceneError::DuplicateIndex {
                        context: "primitive",
                        index,
                    });
                }
                None => {
                    return Err(SceneError::NonDenseIndex {
                        context: "primitive",
                        found: primitive_count,
                        index,
                    });
                }
            }
        }

        let mut node_names = FxHashMap::default();
        for node in &nodes {
            if let Some(name) = &node.name {
                if node_names.insert(name.clone(), node.index).is_some() {
                    log::warn!("duplicate node name '{name}', keeping the last occurrence");
                }
            }
        }

        let has_debug_render = nodes
            .iter()
            .any(|node| node.has_phase(UpdatePhaseKind::DebugRender));

        log::debug!(
            "scene built: {count} nodes, {} skins, {} ik chains, {} cameras",
            skins.len(),
            ik_components.len(),
            cameras.len()
        );

        Ok(Self {
            nodes,
            roots,
            update_order,
            skins,
            cameras,
            ik_components,
            primitive_count,
            node_names,
            has_debug_render,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    #[inline]
    #[must_use]
    pub fn node(&self, index: usize) -> &RenderNode {
        &self.nodes[index]
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    #[inline]
    #[must_use]
    pub fn skins(&self) -> &[RenderSkin] {
        &self.skins
    }

    #[inline]
    #[must_use]
    pub fn cameras(&self) -> &[RenderCamera] {
        &self.cameras
    }

    #[inline]
    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.primitive_count
    }

    #[must_use]
    pub fn node_by_name(&self, name: &str) -> Option<usize> {
        self.node_names.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn ik_target_count(&self) -> usize {
        self.ik_components.len()
    }

    /// The node owning the `ik_index`-th IK target and its configuration.
    #[must_use]
    pub fn ik_target(&self, ik_index: usize) -> (&RenderNode, &IkTarget) {
        let (node_index, component_index) = self.ik_components[ik_index];
        let node = &self.nodes[node_index];
        match &node.components[component_index] {
            NodeComponent::IkTarget(target) => (node, target),
            _ => unreachable!("ik component table is validated at construction"),
        }
    }

    /// Human-readable effector node name of an IK target, for UI listings.
    #[must_use]
    pub fn ik_effector_name(&self, ik_index: usize) -> Option<&str> {
        let (_, target) = self.ik_target(ik_index);
        self.nodes[target.effector_node].name()
    }

    // ========================================================================
    // Phase scheduling
    // ========================================================================

    /// Runs one phase over every node in hierarchy order.
    ///
    /// Global transform propagation is node-level and visits everything;
    /// the remaining phases dispatch only to nodes whose components
    /// registered for them.
    pub fn execute_phase(&self, instance: &mut ModelInstance, phase: &mut UpdatePhase) {
        let kind = phase.kind();
        for &index in &self.update_order {
            let node = &self.nodes[index];
            if kind == UpdatePhaseKind::GlobalTransformPropagation {
                let local = instance.transform_stores[index].cumulative(TransformStage::LAST);
                let world = match node.parent() {
                    Some(parent) => instance.world_transforms[parent] * local,
                    None => local,
                };
                instance.world_transforms[index] = world;
                continue;
            }
            if !node.has_phase(kind) {
                continue;
            }
            self.dispatch(node, instance, phase);
        }
    }

    fn dispatch(&self, node: &RenderNode, instance: &mut ModelInstance, phase: &mut UpdatePhase) {
        let kind = phase.kind();
        for component in &node.components {
            // A component only ever sees phases it declared.
            if !component.phases().contains_kind(kind) {
                continue;
            }
            match (component, &mut *phase) {
                (NodeComponent::Joint(joint), UpdatePhase::RenderDataUpdate) => {
                    joint.update_render_data(node.index, self, instance);
                }
                (
                    NodeComponent::Joint(joint),
                    UpdatePhase::DebugRender {
                        view_projection,
                        sink,
                    },
                ) => {
                    joint.debug_render(node, instance, view_projection, &mut **sink);
                }
                (NodeComponent::Primitive(primitive), UpdatePhase::RenderDataUpdate) => {
                    primitive.update_render_data(node.index, instance);
                }
                (NodeComponent::Camera(binding), UpdatePhase::CameraUpdate) => {
                    binding.update(node.index, instance);
                }
                (NodeComponent::Influence(influence), UpdatePhase::InfluenceTransform) => {
                    influence.apply(node.index, instance);
                }
                (NodeComponent::IkTarget(target), UpdatePhase::Ik) => {
                    target.solve(node.index, instance);
                }
                (
                    NodeComponent::IkTarget(target),
                    UpdatePhase::DebugRender {
                        view_projection,
                        sink,
                    },
                ) => {
                    target.debug_render(node.index, instance, view_projection, &mut **sink);
                }
                _ => {}
            }
        }
    }

    /// Runs the pose phases once if any transform changed since the last
    /// evaluation: propagation, IK, influence, then propagation again so
    /// the solver and append outputs reach the world matrices.
    fn ensure_pose(&self, instance: &mut ModelInstance) {
        if !instance.pose_dirty {
            return;
        }
        self.execute_phase(instance, &mut UpdatePhase::GlobalTransformPropagation);
        self.execute_phase(instance, &mut UpdatePhase::Ik);
        self.execute_phase(instance, &mut UpdatePhase::InfluenceTransform);
        self.execute_phase(instance, &mut UpdatePhase::GlobalTransformPropagation);
        instance.pose_dirty = false;
    }

    /// Refreshes the render-side joint and model matrices; no-op while the
    /// pose is unchanged.
    pub fn update_render_data(&self, instance: &mut ModelInstance) {
        if instance.render_data_fresh {
            return;
        }
        self.ensure_pose(instance);
        self.execute_phase(instance, &mut UpdatePhase::RenderDataUpdate);
        instance.render_data_fresh = true;
    }

    /// Refreshes camera transforms; no-op while the pose is unchanged or
    /// the scene has no cameras.
    pub fn update_camera(&self, instance: &mut ModelInstance) {
        if self.cameras.is_empty() || instance.cameras_fresh {
            return;
        }
        self.ensure_pose(instance);
        self.execute_phase(instance, &mut UpdatePhase::CameraUpdate);
        instance.cameras_fresh = true;
    }

    /// Emits debug geometry through `sink`; no-op when no component
    /// registered for debug rendering.
    pub fn debug_render(
        &self,
        instance: &mut ModelInstance,
        view_projection: Mat4,
        sink: &mut dyn DebugGeometrySink,
    ) {
        if !self.has_debug_render {
            return;
        }
        self.ensure_pose(instance);
        let mut phase = UpdatePhase::DebugRender {
            view_projection,
            sink,
        };
        self.execute_phase(instance, &mut phase);
    }
}
