//! Scene and scheduler tests
//!
//! Tests for:
//! - Construction-time validation of the loader-supplied description
//! - Parent-before-child ordering of global transform propagation
//! - Phase registration and node skipping
//! - Influence (append bone) contributions
//! - Joint / primitive / camera render outputs
//! - Pose-state independence between instances of one scene

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::{Affine3A, Mat4, Quat, Vec3};
use marionette::SceneError;
use marionette::scene::camera::RenderCamera;
use marionette::scene::component::{
    CameraBinding, Influence, Joint, NodeComponent, Primitive,
};
use marionette::scene::debug::{DebugColor, DebugGeometrySink};
use marionette::scene::ik::{IkAngleLimit, IkChainLink, IkTarget};
use marionette::scene::instance::ModelInstance;
use marionette::scene::local_transform::{Decomposed, LocalTransform};
use marionette::scene::node::RenderNode;
use marionette::scene::phase::UpdatePhase;
use marionette::scene::scene::RenderScene;
use marionette::scene::skin::RenderSkin;
use marionette::scene::stage::TransformStage;

// ============================================================================
// Helpers
// ============================================================================

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn node_at(index: usize, translation: Vec3) -> RenderNode {
    let mut node = RenderNode::new(index);
    node.set_base_transform(LocalTransform::Decomposed(Decomposed {
        translation,
        ..Decomposed::IDENTITY
    }));
    node
}

/// root(0) -> mid(1) -> leaf(2), each one unit along +X.
fn chain_nodes() -> Vec<RenderNode> {
    let mut root = node_at(0, Vec3::new(1.0, 0.0, 0.0));
    root.push_child(1);
    let mut mid = node_at(1, Vec3::new(1.0, 0.0, 0.0));
    mid.push_child(2);
    let leaf = node_at(2, Vec3::new(1.0, 0.0, 0.0));
    vec![root, mid, leaf]
}

fn scene_of(nodes: Vec<RenderNode>) -> Arc<RenderScene> {
    Arc::new(RenderScene::new(nodes, Vec::new(), Vec::new()).expect("valid scene"))
}

// ============================================================================
// Construction validation
// ============================================================================

#[test]
fn rejects_misnumbered_nodes() {
    let nodes = vec![RenderNode::new(0), RenderNode::new(5)];
    let err = RenderScene::new(nodes, Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, SceneError::NodeIndexMismatch { index: 5, .. }));
}

#[test]
fn rejects_out_of_bounds_child() {
    let mut root = RenderNode::new(0);
    root.push_child(7);
    let err = RenderScene::new(vec![root], Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, SceneError::IndexOutOfBounds { index: 7, .. }));
}

#[test]
fn rejects_child_with_two_parents() {
    let mut a = RenderNode::new(0);
    a.push_child(2);
    let mut b = RenderNode::new(1);
    b.push_child(2);
    let c = RenderNode::new(2);
    let err = RenderScene::new(vec![a, b, c], Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, SceneError::DuplicateParent { child: 2 }));
}

#[test]
fn rejects_self_child() {
    let mut node = RenderNode::new(0);
    node.push_child(0);
    let err = RenderScene::new(vec![node], Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, SceneError::SelfChild { node: 0 }));
}

#[test]
fn rejects_cycles() {
    let mut a = RenderNode::new(0);
    a.push_child(1);
    let mut b = RenderNode::new(1);
    b.push_child(0);
    let err = RenderScene::new(vec![a, b], Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, SceneError::HierarchyNotForest { .. }));
}

#[test]
fn rejects_ik_writing_base_stage() {
    let mut node = RenderNode::new(0);
    node.push_component(NodeComponent::IkTarget(IkTarget {
        ik_index: 0,
        angle_limit: 1.0,
        loop_count: 4,
        effector_node: 0,
        stage: TransformStage::Base,
        chains: Vec::new(),
    }));
    let err = RenderScene::new(vec![node], Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, SceneError::IkWritesBaseStage { node: 0 }));
}

#[test]
fn rejects_inverted_limit_range() {
    let mut node = RenderNode::new(0);
    node.push_component(NodeComponent::IkTarget(IkTarget {
        ik_index: 0,
        angle_limit: 1.0,
        loop_count: 4,
        effector_node: 0,
        stage: TransformStage::Ik,
        chains: vec![IkChainLink {
            node: 0,
            limit: Some(IkAngleLimit {
                min: Vec3::new(0.5, 0.0, 0.0),
                max: Vec3::new(-0.5, 0.0, 0.0),
            }),
        }],
    }));
    let err = RenderScene::new(vec![node], Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, SceneError::InvalidLimitRange { axis: 'x', .. }));
}

#[test]
fn rejects_duplicate_ik_index() {
    let mut node = RenderNode::new(0);
    for _ in 0..2 {
        node.push_component(NodeComponent::IkTarget(IkTarget {
            ik_index: 0,
            angle_limit: 1.0,
            loop_count: 4,
            effector_node: 0,
            stage: TransformStage::Ik,
            chains: Vec::new(),
        }));
    }
    let err = RenderScene::new(vec![node], Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        SceneError::DuplicateIndex {
            context: "ik target",
            index: 0
        }
    ));
}

#[test]
fn rejects_inverse_bind_count_mismatch() {
    let skin = RenderSkin::new(None, vec![0], Some(vec![Mat4::IDENTITY, Mat4::IDENTITY]));
    let err = RenderScene::new(vec![RenderNode::new(0)], vec![skin], Vec::new()).unwrap_err();
    assert!(matches!(err, SceneError::InverseBindCountMismatch { .. }));
}

#[test]
fn rejects_influence_target_out_of_bounds() {
    let mut node = RenderNode::new(0);
    node.push_component(NodeComponent::Influence(Influence {
        target_stage: TransformStage::Influence,
        target_node: 9,
        weight: 1.0,
        affects_rotation: true,
        affects_translation: false,
        append_local: false,
    }));
    let err = RenderScene::new(vec![node], Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, SceneError::IndexOutOfBounds { index: 9, .. }));
}

// ============================================================================
// Propagation order
// ============================================================================

#[test]
fn propagation_composes_parent_before_child() {
    let scene = scene_of(chain_nodes());
    let mut instance = ModelInstance::new(Arc::clone(&scene));

    // Only the propagation phase; no other phase has run.
    scene.execute_phase(&mut instance, &mut UpdatePhase::GlobalTransformPropagation);

    for (index, expected_x) in [(0, 1.0), (1, 2.0), (2, 3.0)] {
        let world: Vec3 = instance.world_transform(index).translation.into();
        assert!(
            approx_eq(world.x, expected_x),
            "node {index}: expected x={expected_x}, got {}",
            world.x
        );
    }

    // Leaf world must equal the matrix chain product.
    let expected = Affine3A::from_translation(Vec3::new(1.0, 0.0, 0.0))
        * Affine3A::from_translation(Vec3::new(1.0, 0.0, 0.0))
        * Affine3A::from_translation(Vec3::new(1.0, 0.0, 0.0));
    assert!(instance.world_transform(2).abs_diff_eq(expected, 1e-6));
}

#[test]
fn propagation_handles_multiple_roots() {
    let mut nodes = chain_nodes();
    nodes.push(node_at(3, Vec3::new(0.0, 7.0, 0.0)));
    let scene = scene_of(nodes);
    let mut instance = ModelInstance::new(Arc::clone(&scene));

    scene.execute_phase(&mut instance, &mut UpdatePhase::GlobalTransformPropagation);

    let world: Vec3 = instance.world_transform(3).translation.into();
    assert!(approx_eq(world.y, 7.0));
}

#[test]
fn deep_chain_propagates_without_recursion_limits() {
    let depth = 500;
    let mut nodes = Vec::with_capacity(depth);
    for i in 0..depth {
        let mut node = node_at(i, Vec3::new(1.0, 0.0, 0.0));
        if i + 1 < depth {
            node.push_child(i + 1);
        }
        nodes.push(node);
    }
    let scene = scene_of(nodes);
    let mut instance = ModelInstance::new(Arc::clone(&scene));

    scene.execute_phase(&mut instance, &mut UpdatePhase::GlobalTransformPropagation);

    let world: Vec3 = instance.world_transform(depth - 1).translation.into();
    assert!(approx_eq(world.x, depth as f32));
}

// ============================================================================
// Influence (append bones)
// ============================================================================

fn influence_component(
    target_node: usize,
    weight: f32,
    append_local: bool,
) -> NodeComponent {
    NodeComponent::Influence(Influence {
        target_stage: TransformStage::Influence,
        target_node,
        weight,
        affects_rotation: true,
        affects_translation: true,
        append_local,
    })
}

#[test]
fn influence_copies_weighted_pose() {
    let mut source = node_at(0, Vec3::ZERO);
    source.push_component(influence_component(1, 0.5, false));
    let target = node_at(1, Vec3::ZERO);
    let scene = scene_of(vec![source, target]);
    let mut instance = ModelInstance::new(Arc::clone(&scene));

    instance.update_transform_decomposed(0, TransformStage::AnimatedRelative, |d| {
        d.rotation = Quat::from_rotation_z(FRAC_PI_2);
        d.translation = Vec3::new(2.0, 0.0, 0.0);
    });
    instance.update_render_data();

    let value = instance
        .transform_store(1)
        .get(TransformStage::Influence)
        .expect("influence stage written");
    // Half weight: half the angle, half the translation.
    assert!(value.rotation().angle_between(Quat::from_rotation_z(FRAC_PI_2 / 2.0)) < 1e-4);
    assert!((value.translation() - Vec3::new(1.0, 0.0, 0.0)).length() < EPSILON);
}

#[test]
fn influence_sees_ik_rotation_on_rotation_only() {
    let mut source = node_at(0, Vec3::ZERO);
    source.push_component(influence_component(1, 1.0, false));
    let target = node_at(1, Vec3::ZERO);
    let scene = scene_of(vec![source, target]);
    let mut instance = ModelInstance::new(Arc::clone(&scene));

    instance.update_transform_decomposed(0, TransformStage::AnimatedRelative, |d| {
        d.rotation = Quat::from_rotation_z(0.3);
        d.translation = Vec3::new(1.0, 0.0, 0.0);
    });
    instance.update_transform_decomposed(0, TransformStage::Ik, |d| {
        d.rotation = Quat::from_rotation_z(0.2);
        d.translation = Vec3::new(0.0, 9.0, 0.0);
    });
    instance.update_render_data();

    let value = instance
        .transform_store(1)
        .get(TransformStage::Influence)
        .expect("influence stage written");
    // Rotation picks up the solved IK rotation; translation never does.
    assert!(value.rotation().angle_between(Quat::from_rotation_z(0.5)) < 1e-4);
    assert!((value.translation() - Vec3::new(1.0, 0.0, 0.0)).length() < EPSILON);
}

#[test]
fn chained_append_reads_nested_value() {
    // 0 -> 1 -> 2: node 1's append output feeds node 2's append input.
    let mut first = node_at(0, Vec3::ZERO);
    first.push_component(influence_component(1, 1.0, false));
    let mut second = node_at(1, Vec3::ZERO);
    second.push_component(influence_component(2, 0.5, false));
    let third = node_at(2, Vec3::ZERO);
    let scene = scene_of(vec![first, second, third]);
    let mut instance = ModelInstance::new(Arc::clone(&scene));

    instance.update_transform_decomposed(0, TransformStage::AnimatedRelative, |d| {
        d.rotation = Quat::from_rotation_z(0.4);
    });
    instance.update_render_data();

    let value = instance
        .transform_store(2)
        .get(TransformStage::Influence)
        .expect("influence stage written");
    assert!(value.rotation().angle_between(Quat::from_rotation_z(0.2)) < 1e-4);
}

#[test]
fn append_local_ignores_nested_value() {
    let mut first = node_at(0, Vec3::ZERO);
    first.push_component(influence_component(1, 1.0, false));
    let mut second = node_at(1, Vec3::ZERO);
    second.push_component(influence_component(2, 1.0, true));
    let third = node_at(2, Vec3::ZERO);
    let scene = scene_of(vec![first, second, third]);
    let mut instance = ModelInstance::new(Arc::clone(&scene));

    instance.update_transform_decomposed(0, TransformStage::AnimatedRelative, |d| {
        d.rotation = Quat::from_rotation_z(0.4);
    });
    instance.update_render_data();

    // Node 1 has no animated transform of its own, so a local append
    // contributes identity even though its influence stage was written.
    let value = instance
        .transform_store(2)
        .get(TransformStage::Influence)
        .expect("influence stage written");
    assert!(value.rotation().angle_between(Quat::IDENTITY) < 1e-4);
}

// ============================================================================
// Render data
// ============================================================================

#[test]
fn joint_matrices_apply_inverse_bind() {
    let inverse_bind = Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0));
    let skin = RenderSkin::new(
        Some("skin".to_string()),
        vec![0, 1],
        Some(vec![Mat4::IDENTITY, inverse_bind]),
    );

    let mut root = node_at(0, Vec3::ZERO);
    root.push_child(1);
    root.push_component(NodeComponent::Joint(Joint {
        skin_index: 0,
        joint_index: 0,
    }));
    let mut child = node_at(1, Vec3::new(1.0, 0.0, 0.0));
    child.push_component(NodeComponent::Joint(Joint {
        skin_index: 0,
        joint_index: 1,
    }));

    let scene = Arc::new(
        RenderScene::new(vec![root, child], vec![skin], Vec::new()).expect("valid scene"),
    );
    let mut instance = ModelInstance::new(Arc::clone(&scene));
    instance.update_render_data();

    let matrices = instance.joint_matrices(0);
    assert!(matrices[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
    // world(1) = T(1,0,0); joint = world * inverse bind = identity.
    assert!(matrices[1].abs_diff_eq(Mat4::IDENTITY, 1e-6));
}

#[test]
fn unskinned_primitive_uploads_world_matrix() {
    let mut node = node_at(0, Vec3::new(0.0, 3.0, 0.0));
    node.push_component(NodeComponent::Primitive(Primitive {
        primitive_index: 0,
        skin_index: None,
    }));
    let scene = scene_of(vec![node]);
    let mut instance = ModelInstance::new(Arc::clone(&scene));
    instance.update_render_data();

    let expected = Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0));
    assert!(instance.model_matrices()[0].abs_diff_eq(expected, 1e-6));
}

#[test]
fn skinned_primitive_keeps_identity_model_matrix() {
    let skin = RenderSkin::new(None, vec![0], None);
    let mut node = node_at(0, Vec3::new(0.0, 3.0, 0.0));
    node.push_component(NodeComponent::Primitive(Primitive {
        primitive_index: 0,
        skin_index: Some(0),
    }));
    let scene = Arc::new(
        RenderScene::new(vec![node], vec![skin], Vec::new()).expect("valid scene"),
    );
    let mut instance = ModelInstance::new(Arc::clone(&scene));
    instance.update_render_data();

    assert!(instance.model_matrices()[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
}

#[test]
fn camera_transform_follows_node() {
    let mut node = node_at(0, Vec3::new(0.0, 5.0, 10.0));
    node.push_component(NodeComponent::Camera(CameraBinding { camera_index: 0 }));
    let cameras = vec![RenderCamera::Perspective {
        yfov: 1.0,
        znear: 0.1,
        zfar: None,
    }];
    let scene = Arc::new(
        RenderScene::new(vec![node], Vec::new(), cameras).expect("valid scene"),
    );
    let mut instance = ModelInstance::new(Arc::clone(&scene));
    instance.update_camera();

    let camera = instance.camera_transform(0);
    assert!((camera.position() - Vec3::new(0.0, 5.0, 10.0)).length() < EPSILON);

    // The view matrix maps the camera position to the origin.
    let at_origin = camera.view_matrix().transform_point3(camera.position());
    assert!(at_origin.length() < 1e-4);
}

// ============================================================================
// Scene queries
// ============================================================================

#[test]
fn nodes_are_found_by_name() {
    let mut node = RenderNode::new(0);
    node.set_name("hips");
    let scene = scene_of(vec![node]);
    assert_eq!(scene.node_by_name("hips"), Some(0));
    assert_eq!(scene.node_by_name("missing"), None);
}

#[test]
fn ik_targets_expose_effector_names() {
    let mut tip = RenderNode::new(0);
    tip.push_component(NodeComponent::IkTarget(IkTarget {
        ik_index: 0,
        angle_limit: 1.0,
        loop_count: 4,
        effector_node: 1,
        stage: TransformStage::Ik,
        chains: Vec::new(),
    }));
    let mut effector = RenderNode::new(1);
    effector.set_name("left ankle");
    let scene = scene_of(vec![tip, effector]);

    assert_eq!(scene.ik_target_count(), 1);
    assert_eq!(scene.ik_effector_name(0), Some("left ankle"));
}

// ============================================================================
// Debug rendering
// ============================================================================

#[derive(Default)]
struct CollectingSink {
    boxes: usize,
    lines: usize,
}

impl DebugGeometrySink for CollectingSink {
    fn box_marker(&mut self, _matrix: &Mat4, _size: f32, _color: DebugColor) {
        self.boxes += 1;
    }

    fn line(&mut self, _matrix: &Mat4, _from: Vec3, _to: Vec3, _color: DebugColor) {
        self.lines += 1;
    }
}

#[test]
fn debug_render_emits_chain_markers() {
    // Chain root(0) -> tip(1) with a one-link IK target toward node 2.
    let mut root = node_at(0, Vec3::ZERO);
    root.push_child(1);
    let mut tip = node_at(1, Vec3::new(1.0, 0.0, 0.0));
    tip.push_component(NodeComponent::IkTarget(IkTarget {
        ik_index: 0,
        angle_limit: 1.0,
        loop_count: 4,
        effector_node: 2,
        stage: TransformStage::Ik,
        chains: vec![IkChainLink {
            node: 0,
            limit: None,
        }],
    }));
    let effector = node_at(2, Vec3::new(0.0, 1.0, 0.0));
    let scene = scene_of(vec![root, tip, effector]);
    let mut instance = ModelInstance::new(Arc::clone(&scene));

    let mut sink = CollectingSink::default();
    instance.debug_render(Mat4::IDENTITY, &mut sink);

    // One box per chain link plus effector and target markers, three axis
    // lines per link.
    assert_eq!(sink.boxes, 3);
    assert_eq!(sink.lines, 3);
}

// ============================================================================
// Instance independence
// ============================================================================

#[test]
fn instances_do_not_share_pose_state() {
    let scene = scene_of(chain_nodes());
    let mut first = ModelInstance::new(Arc::clone(&scene));
    let mut second = ModelInstance::new(Arc::clone(&scene));

    first.update_transform_decomposed(0, TransformStage::AnimatedRelative, |d| {
        d.translation = Vec3::new(0.0, 10.0, 0.0);
    });
    first.update_render_data();
    second.update_render_data();

    let first_leaf: Vec3 = first.world_transform(2).translation.into();
    let second_leaf: Vec3 = second.world_transform(2).translation.into();
    assert!(approx_eq(first_leaf.y, 10.0));
    assert!(approx_eq(second_leaf.y, 0.0));
}
