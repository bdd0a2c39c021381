use std::f32::consts::{PI, TAU};

use glam::{Affine3A, EulerRot, Mat3, Mat4, Quat, Vec3};

use crate::scene::debug::{self, DebugGeometrySink};
use crate::scene::instance::ModelInstance;
use crate::scene::local_transform::LocalTransform;
use crate::scene::stage::TransformStage;

/// The one free rotation axis of a hinge-limited chain link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkAxis {
    X,
    Y,
    Z,
}

impl IkAxis {
    #[must_use]
    pub fn unit(self) -> Vec3 {
        match self {
            IkAxis::X => Vec3::X,
            IkAxis::Y => Vec3::Y,
            IkAxis::Z => Vec3::Z,
        }
    }

    fn component(self, v: Vec3) -> f32 {
        match self {
            IkAxis::X => v.x,
            IkAxis::Y => v.y,
            IkAxis::Z => v.z,
        }
    }
}

/// Per-axis euler-angle box limit of a chain link.
#[derive(Debug, Clone, Copy)]
pub struct IkAngleLimit {
    pub min: Vec3,
    pub max: Vec3,
}

impl IkAngleLimit {
    /// The single free axis, when the other two are pinned to `[0, 0]`.
    /// Such links solve in plane mode (e.g. knees and elbows).
    #[must_use]
    pub fn single_axis(&self) -> Option<IkAxis> {
        let x_pinned = self.min.x == 0.0 && self.max.x == 0.0;
        let y_pinned = self.min.y == 0.0 && self.max.y == 0.0;
        let z_pinned = self.min.z == 0.0 && self.max.z == 0.0;
        match (x_pinned, y_pinned, z_pinned) {
            (true, true, false) => Some(IkAxis::Z),
            (true, false, true) => Some(IkAxis::Y),
            (false, true, true) => Some(IkAxis::X),
            _ => None,
        }
    }
}

/// One joint of an IK chain. Links are ordered from the target node's
/// immediate chain neighbor toward the chain root.
#[derive(Debug, Clone)]
pub struct IkChainLink {
    pub node: usize,
    pub limit: Option<IkAngleLimit>,
}

/// IK chain configuration.
///
/// The component's owning node is the chain tip being dragged toward the
/// effector node's world position. `stage` is the transform stage the
/// solver writes; chain links accumulate rotations there relative to the
/// stage before it.
#[derive(Debug, Clone)]
pub struct IkTarget {
    pub ik_index: usize,
    /// Per-iteration rotation clamp, radians.
    pub angle_limit: f32,
    pub loop_count: usize,
    pub effector_node: usize,
    pub stage: TransformStage,
    pub chains: Vec<IkChainLink>,
}

/// Per-link mutable solver memory, owned by the instance.
#[derive(Debug, Clone, Default)]
pub(crate) struct IkLinkScratch {
    /// Euler angles stored by the previous limit clamp; anchors the
    /// decomposition across frames so poses near a singularity don't pop.
    pub(crate) prev_angle: Vec3,
    pub(crate) saved_rotation: Quat,
    pub(crate) plane_angle: f32,
}

/// Per-target mutable state, owned by the instance.
#[derive(Debug, Clone)]
pub(crate) struct IkState {
    pub(crate) enabled: bool,
    pub(crate) links: Vec<IkLinkScratch>,
}

fn normalize_angle(angle: f32) -> f32 {
    let mut ret = angle;
    while ret >= TAU {
        ret -= TAU;
    }
    while ret < 0.0 {
        ret += TAU;
    }
    ret
}

fn diff_angle(a: f32, b: f32) -> f32 {
    let diff = normalize_angle(a) - normalize_angle(b);
    if diff > PI {
        diff - TAU
    } else if diff < -PI {
        diff + TAU
    } else {
        diff
    }
}

const DECOMPOSE_TESTS: [Vec3; 8] = [
    Vec3::new(PI, PI, PI),
    Vec3::new(PI, PI, -PI),
    Vec3::new(PI, -PI, PI),
    Vec3::new(PI, -PI, -PI),
    Vec3::new(-PI, PI, PI),
    Vec3::new(-PI, PI, -PI),
    Vec3::new(-PI, -PI, PI),
    Vec3::new(-PI, -PI, -PI),
];

/// Rotation matrix → XYZ euler angles, picking among the direct solution
/// and the eight ±π-shifted alternatives whichever is closest to the
/// previous frame's angles. Near gimbal lock (|sin y| ≈ 1) the axis whose
/// previous angle sits nearer 0 or π is pinned first.
fn decompose(m: &Mat3, before: Vec3) -> Vec3 {
    let mut r = Vec3::ZERO;
    let sy = -m.x_axis.z;
    let e = 1e-6;
    if (1.0 - sy.abs()) < e {
        r.y = sy.asin();
        let sx = before.x.sin();
        let sz = before.z.sin();
        if sx.abs() < sz.abs() {
            let cx = before.x.cos();
            if cx > 0.0 {
                r.x = 0.0;
                r.z = (-m.y_axis.x).asin();
            } else {
                r.x = PI;
                r.z = m.y_axis.x.asin();
            }
        } else {
            let cz = before.z.cos();
            if cz > 0.0 {
                r.z = 0.0;
                r.x = (-m.z_axis.y).asin();
            } else {
                r.z = PI;
                r.x = m.z_axis.y.asin();
            }
        }
    } else {
        r.x = m.y_axis.z.atan2(m.z_axis.z);
        r.y = (-m.x_axis.z).asin();
        r.z = m.x_axis.y.atan2(m.x_axis.x);
    }

    let error = |v: Vec3| {
        diff_angle(v.x, before.x).abs()
            + diff_angle(v.y, before.y).abs()
            + diff_angle(v.z, before.z).abs()
    };
    let mut min_error = error(r);
    for test in DECOMPOSE_TESTS {
        let candidate = Vec3::new(r.x, -r.y, r.z) + test;
        let candidate_error = error(candidate);
        if candidate_error < min_error {
            min_error = candidate_error;
            r = candidate;
        }
    }
    r
}

/// Rotation part of an affine matrix, read as-is without normalizing scale
/// out. Chain matrices are rotation-dominated, matching how the solver
/// composes them.
fn rotation_part(matrix: &Affine3A) -> Quat {
    Quat::from_mat3(&Mat3::from(matrix.matrix3))
}

impl IkTarget {
    /// Runs the cyclic-coordinate-descent solve for this chain, writing
    /// IK-stage rotations for every link. `target_node` is the node
    /// owning this component (the chain tip).
    ///
    /// Never fails: degenerate inputs are defused by epsilon checks and
    /// clamped dot products, and a non-improving iteration counts as
    /// convergence.
    pub(crate) fn solve(&self, target_node: usize, instance: &mut ModelInstance) {
        if !instance.ik_enabled(self.ik_index) {
            return;
        }
        let Some(root_link) = self.chains.last() else {
            return;
        };
        let root_node = root_link.node;

        // Solver scratch from the previous frame only anchors the euler
        // decomposition; the pose itself restarts from identity.
        for (chain_index, link) in self.chains.iter().enumerate() {
            let scratch = &mut instance.ik_states[self.ik_index].links[chain_index];
            scratch.prev_angle = Vec3::ZERO;
            scratch.plane_angle = 0.0;
            instance.transform_stores[link.node]
                .update_decomposed(self.stage, |decomposed| {
                    decomposed.rotation = Quat::IDENTITY;
                });
        }
        instance.refresh_subtree(root_node);

        let mut best_distance = f32::INFINITY;
        for iteration in 0..self.loop_count {
            self.solve_core(target_node, instance, iteration);

            let distance = instance
                .world_translation(target_node)
                .distance_squared(instance.world_translation(self.effector_node));

            if distance < best_distance {
                best_distance = distance;
                for (chain_index, link) in self.chains.iter().enumerate() {
                    let rotation = instance.transform_stores[link.node]
                        .get(self.stage)
                        .map_or(Quat::IDENTITY, LocalTransform::rotation);
                    instance.ik_states[self.ik_index].links[chain_index].saved_rotation = rotation;
                }
            } else {
                // This sweep regressed: restore the best pose seen and
                // stop iterating.
                for (chain_index, link) in self.chains.iter().enumerate() {
                    let saved = instance.ik_states[self.ik_index].links[chain_index].saved_rotation;
                    instance.transform_stores[link.node]
                        .update_decomposed(self.stage, |decomposed| {
                            decomposed.rotation = saved;
                        });
                }
                instance.refresh_subtree(root_node);
                break;
            }
        }
    }

    fn solve_core(&self, target_node: usize, instance: &mut ModelInstance, iteration: usize) {
        let effector_pos = instance.world_translation(self.effector_node);
        for (chain_index, link) in self.chains.iter().enumerate() {
            if link.node == target_node {
                // Zero-length segment; rotating it only produces NaN axes.
                continue;
            }
            if let Some(axis) = link
                .limit
                .as_ref()
                .and_then(IkAngleLimit::single_axis)
            {
                self.solve_plane(target_node, instance, iteration, chain_index, axis);
                continue;
            }

            let target_pos = instance.world_translation(target_node);
            let inv_chain = instance.world_transform(link.node).inverse();

            let Some(target_vec) = inv_chain.transform_point3(target_pos).try_normalize() else {
                continue;
            };
            let Some(effector_vec) = inv_chain.transform_point3(effector_pos).try_normalize()
            else {
                continue;
            };

            let dot = target_vec.dot(effector_vec).clamp(-1.0, 1.0);
            let mut angle = dot.acos();
            if angle < 1e-5 {
                continue;
            }
            angle = angle.clamp(-self.angle_limit, self.angle_limit);
            let Some(axis) = target_vec.cross(effector_vec).try_normalize() else {
                continue;
            };
            let delta = Quat::from_axis_angle(axis, angle);

            let store = &mut instance.transform_stores[link.node];
            let mut chain_rotation = rotation_part(&store.cumulative(self.stage)) * delta;

            if let Some(limit) = &link.limit {
                let scratch = &mut instance.ik_states[self.ik_index].links[chain_index];
                let angles = decompose(&Mat3::from_quat(chain_rotation), scratch.prev_angle);
                let clamped = angles.clamp(limit.min, limit.max);
                // Re-clamp the per-frame delta so the clamped pose cannot
                // jump further than one iteration step.
                let clamped = (clamped - scratch.prev_angle)
                    .clamp(
                        Vec3::splat(-self.angle_limit),
                        Vec3::splat(self.angle_limit),
                    )
                    + scratch.prev_angle;
                scratch.prev_angle = clamped;
                chain_rotation = Quat::from_euler(EulerRot::XYZ, clamped.x, clamped.y, clamped.z);
            }

            let prev_stage = self.stage.prev().unwrap_or(TransformStage::FIRST);
            let baseline_inv = rotation_part(&store.cumulative(prev_stage)).inverse();
            let rotation = chain_rotation * baseline_inv;
            store.update_decomposed(self.stage, |decomposed| {
                decomposed.rotation = rotation;
            });
            instance.refresh_subtree(link.node);
        }
    }

    fn solve_plane(
        &self,
        target_node: usize,
        instance: &mut ModelInstance,
        iteration: usize,
        chain_index: usize,
        axis: IkAxis,
    ) {
        let link = &self.chains[chain_index];
        let Some(limit) = &link.limit else {
            return;
        };
        let rotate_axis = axis.unit();

        let effector_pos = instance.world_translation(self.effector_node);
        let target_pos = instance.world_translation(target_node);
        let inv_chain = instance.world_transform(link.node).inverse();

        let Some(target_vec) = inv_chain.transform_point3(target_pos).try_normalize() else {
            return;
        };
        let Some(effector_vec) = inv_chain.transform_point3(effector_pos).try_normalize() else {
            return;
        };

        let dot = target_vec.dot(effector_vec).clamp(-1.0, 1.0);
        let angle = dot.acos().clamp(-self.angle_limit, self.angle_limit);

        // Two signed candidates about the hinge axis; keep whichever
        // aligns the target vector better.
        let dot_positive = (Quat::from_axis_angle(rotate_axis, angle) * target_vec).dot(effector_vec);
        let dot_negative =
            (Quat::from_axis_angle(rotate_axis, -angle) * target_vec).dot(effector_vec);

        let scratch = &mut instance.ik_states[self.ik_index].links[chain_index];
        let mut new_angle = scratch.plane_angle;
        if dot_positive > dot_negative {
            new_angle += angle;
        } else {
            new_angle -= angle;
        }

        let min = axis.component(limit.min);
        let max = axis.component(limit.max);
        if iteration == 0 && !(min..=max).contains(&new_angle) {
            // Only the first iteration may flip the accumulated sign;
            // later ones clamp in place.
            if (min..=max).contains(&-new_angle) {
                new_angle = -new_angle;
            } else {
                let half = (min + max) * 0.5;
                if (half - new_angle).abs() > (half + new_angle).abs() {
                    new_angle = -new_angle;
                }
            }
        }
        let new_angle = new_angle.clamp(min, max);
        scratch.plane_angle = new_angle;

        let prev_stage = self.stage.prev().unwrap_or(TransformStage::FIRST);
        let store = &mut instance.transform_stores[link.node];
        let baseline_inv = rotation_part(&store.cumulative(prev_stage)).inverse();
        let rotation = Quat::from_axis_angle(rotate_axis, new_angle) * baseline_inv;
        store.update_decomposed(self.stage, |decomposed| {
            decomposed.rotation = rotation;
        });
        instance.refresh_subtree(link.node);
    }

    pub(crate) fn debug_render(
        &self,
        target_node: usize,
        instance: &ModelInstance,
        view_projection: &Mat4,
        sink: &mut dyn DebugGeometrySink,
    ) {
        if !instance.ik_enabled(self.ik_index) {
            return;
        }
        for link in &self.chains {
            let joint_matrix = *view_projection * Mat4::from(instance.world_transform(link.node));
            sink.box_marker(&joint_matrix, 0.05, debug::BLUE);
        }

        let effector_matrix =
            *view_projection * Mat4::from(instance.world_transform(self.effector_node));
        sink.box_marker(&effector_matrix, 0.1, debug::RED);
        let target_matrix = *view_projection * Mat4::from(instance.world_transform(target_node));
        sink.box_marker(&target_matrix, 0.1, debug::GREEN);

        let line_size = 0.5;
        for link in &self.chains {
            let joint_matrix = *view_projection * Mat4::from(instance.world_transform(link.node));
            sink.line(&joint_matrix, Vec3::ZERO, Vec3::X * line_size, debug::RED);
            sink.line(&joint_matrix, Vec3::ZERO, Vec3::Y * line_size, debug::GREEN);
            sink.line(&joint_matrix, Vec3::ZERO, Vec3::Z * line_size, debug::BLUE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_angle_wraps_into_half_turn() {
        assert!((diff_angle(0.1, TAU - 0.1) - 0.2).abs() < 1e-6);
        assert!((diff_angle(TAU - 0.1, 0.1) + 0.2).abs() < 1e-6);
        assert!(diff_angle(1.0, 1.0).abs() < 1e-6);
    }

    #[test]
    fn decompose_recovers_single_axis_rotations() {
        for (matrix, expected) in [
            (Mat3::from_rotation_x(0.7), Vec3::new(0.7, 0.0, 0.0)),
            (Mat3::from_rotation_y(-0.5), Vec3::new(0.0, -0.5, 0.0)),
            (Mat3::from_rotation_z(1.1), Vec3::new(0.0, 0.0, 1.1)),
        ] {
            let recovered = decompose(&matrix, expected);
            assert!(
                (recovered - expected).abs().max_element() < 1e-5,
                "expected {expected:?}, got {recovered:?}"
            );
        }
    }

    #[test]
    fn decompose_recovers_mixed_rotation() {
        // The decomposition solves the Rz*Ry*Rx factorization.
        let angles = Vec3::new(0.3, -0.4, 0.2);
        let m = Mat3::from_euler(EulerRot::ZYX, angles.z, angles.y, angles.x);
        let recovered = decompose(&m, angles);
        assert!(
            (recovered - angles).abs().max_element() < 1e-5,
            "expected {angles:?}, got {recovered:?}"
        );
    }

    #[test]
    fn decompose_prefers_candidate_near_previous_angles() {
        // Identity rotation: the direct solution is all zeros, but with a
        // previous frame sitting near (π, π, π) the shifted candidate wins.
        let previous = Vec3::new(PI - 0.01, PI - 0.01, PI - 0.01);
        let recovered = decompose(&Mat3::IDENTITY, previous);
        assert!(
            recovered.x.abs() > 1.0,
            "expected a π-shifted candidate, got {recovered:?}"
        );
    }

    #[test]
    fn single_axis_detection() {
        let hinge = IkAngleLimit {
            min: Vec3::new(0.0, 0.0, -1.0),
            max: Vec3::new(0.0, 0.0, 1.0),
        };
        assert_eq!(hinge.single_axis(), Some(IkAxis::Z));

        let boxy = IkAngleLimit {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        assert_eq!(boxy.single_axis(), None);
    }
}
