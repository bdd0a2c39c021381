//! Error Types
//!
//! Scene construction is the crate's only fallible surface: every cross
//! reference in the loader-supplied description is validated once, and a
//! failure is fatal to loading that asset. The per-frame pose-evaluation
//! path never returns errors; it degrades numerically instead.

use thiserror::Error;

/// Errors raised while validating a scene description.
#[derive(Error, Debug)]
pub enum SceneError {
    /// A node, skin, camera or component reference points outside its
    /// table.
    #[error("{context}: index {index} out of bounds (count: {count})")]
    IndexOutOfBounds {
        /// What was being referenced.
        context: &'static str,
        index: usize,
        count: usize,
    },

    /// A node's recorded index disagrees with its position in the list.
    #[error("node {index} is stored at position {position}")]
    NodeIndexMismatch { index: usize, position: usize },

    /// A node appears in more than one child list.
    #[error("node {child} has more than one parent")]
    DuplicateParent { child: usize },

    /// A node lists itself as a child.
    #[error("node {node} lists itself as a child")]
    SelfChild { node: usize },

    /// The hierarchy contains a cycle or nodes unreachable from any root.
    #[error("hierarchy is not a forest: {unreachable} of {total} nodes unreachable from the roots")]
    HierarchyNotForest { unreachable: usize, total: usize },

    /// A skin's inverse-bind-matrix table does not match its joint list.
    #[error("skin {skin} has {matrices} inverse bind matrices for {joints} joints")]
    InverseBindCountMismatch {
        skin: usize,
        joints: usize,
        matrices: usize,
    },

    /// An IK target is configured to write the base stage, which holds
    /// the rest pose and never solver output.
    #[error("ik target on node {node} writes to the base stage")]
    IkWritesBaseStage { node: usize },

    /// An IK link's angular limit has `min > max` on some axis.
    #[error("ik link on node {node} has min > max on the {axis} axis")]
    InvalidLimitRange { node: usize, axis: char },

    /// Two components claim the same dense slot.
    #[error("duplicate {context} index {index}")]
    DuplicateIndex { context: &'static str, index: usize },

    /// A dense component index falls outside `0..found`.
    #[error("{context} index {index} is outside the dense range 0..{found}")]
    NonDenseIndex {
        context: &'static str,
        found: usize,
        index: usize,
    },
}

/// Alias for `Result<T, SceneError>`.
pub type Result<T> = std::result::Result<T, SceneError>;
