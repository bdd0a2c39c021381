use smallvec::SmallVec;

use crate::scene::component::NodeComponent;
use crate::scene::local_transform::LocalTransform;
use crate::scene::phase::{PhaseMask, UpdatePhaseKind};

/// A single hierarchy entry of an immutable scene.
///
/// # Design Principles
///
/// - Nodes are addressed by their index into the scene's node list; the
///   parent link is a back-reference only, the child list is the owning
///   side of the hierarchy.
/// - The node itself is immutable after scene construction. All mutable
///   pose state (transform stores, world matrices, solver scratch) lives
///   in [`crate::scene::ModelInstance`], so multiple instances can share
///   one scene.
///
/// Parent links are derived and verified by [`crate::scene::RenderScene`]
/// from the child lists; loaders only fill in children.
#[derive(Debug, Clone)]
pub struct RenderNode {
    pub(crate) index: usize,
    pub(crate) parent: Option<usize>,
    pub(crate) children: SmallVec<[usize; 4]>,
    pub(crate) name: Option<String>,
    pub(crate) base_transform: Option<LocalTransform>,
    pub(crate) components: Vec<NodeComponent>,
    pub(crate) phases: PhaseMask,
}

impl RenderNode {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            parent: None,
            children: SmallVec::new(),
            name: None,
            base_transform: None,
            components: Vec::new(),
            phases: PhaseMask::empty(),
        }
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn base_transform(&self) -> Option<&LocalTransform> {
        self.base_transform.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn components(&self) -> &[NodeComponent] {
        &self.components
    }

    /// Appends a child index. Parent back-links are derived and verified
    /// at scene construction.
    pub fn push_child(&mut self, child: usize) {
        self.children.push(child);
    }

    pub fn push_component(&mut self, component: NodeComponent) {
        self.components.push(component);
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn set_base_transform(&mut self, transform: LocalTransform) {
        self.base_transform = Some(transform);
    }

    /// Union of the attached components' phase declarations; lets the
    /// scheduler skip nodes that are irrelevant for a phase.
    #[inline]
    #[must_use]
    pub fn phases(&self) -> PhaseMask {
        self.phases
    }

    #[inline]
    #[must_use]
    pub fn has_phase(&self, kind: UpdatePhaseKind) -> bool {
        self.phases.contains_kind(kind)
    }

    pub(crate) fn recompute_phases(&mut self) {
        self.phases = self
            .components
            .iter()
            .fold(PhaseMask::empty(), |mask, component| {
                mask | component.phases()
            });
    }
}
