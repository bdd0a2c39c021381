use bitflags::bitflags;

/// One named, ordered slot of a node's local-transform pipeline.
///
/// A node's local matrix is the product of its populated stage matrices in
/// this order. The order is global and fixed; writing a stage invalidates
/// the cached cumulative matrix of every later stage, never of an earlier
/// one.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformStage {
    /// Initial rest-pose transform supplied by the loader.
    Base,
    /// Relative transform sampled from baked animation.
    AnimatedRelative,
    /// Contribution copied from another node (append bones).
    Influence,
    /// IK solver output.
    Ik,
    /// Deform driven by an external parent.
    ExternalDeform,
    /// Physics output.
    Physics,
}

impl TransformStage {
    pub const ALL: [TransformStage; 6] = [
        TransformStage::Base,
        TransformStage::AnimatedRelative,
        TransformStage::Influence,
        TransformStage::Ik,
        TransformStage::ExternalDeform,
        TransformStage::Physics,
    ];
    pub const COUNT: usize = Self::ALL.len();
    pub const FIRST: TransformStage = TransformStage::Base;
    pub const LAST: TransformStage = TransformStage::Physics;

    #[inline]
    #[must_use]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_ordinal(ordinal: usize) -> Option<TransformStage> {
        Self::ALL.get(ordinal).copied()
    }

    /// The stage immediately before this one, `None` for [`Self::FIRST`].
    #[must_use]
    pub fn prev(self) -> Option<TransformStage> {
        self.ordinal().checked_sub(1).and_then(Self::from_ordinal)
    }

    /// The stage immediately after this one, `None` for [`Self::LAST`].
    #[must_use]
    pub fn next(self) -> Option<TransformStage> {
        Self::from_ordinal(self.ordinal() + 1)
    }
}

bitflags! {
    /// Bitset over stage ordinals, used as the per-store dirty set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct StageMask: u8 {
        const BASE = 1 << 0;
        const ANIMATED_RELATIVE = 1 << 1;
        const INFLUENCE = 1 << 2;
        const IK = 1 << 3;
        const EXTERNAL_DEFORM = 1 << 4;
        const PHYSICS = 1 << 5;
    }
}

impl StageMask {
    #[must_use]
    pub fn single(stage: TransformStage) -> StageMask {
        StageMask::from_bits_truncate(1 << stage.ordinal())
    }

    /// Mask covering `stage` and every stage after it.
    #[must_use]
    pub fn from_stage(stage: TransformStage) -> StageMask {
        let below = (1u8 << stage.ordinal()) - 1;
        StageMask::from_bits_truncate(StageMask::all().bits() & !below)
    }

    #[inline]
    #[must_use]
    pub fn contains_stage(self, stage: TransformStage) -> bool {
        self.intersects(Self::single(stage))
    }
}
