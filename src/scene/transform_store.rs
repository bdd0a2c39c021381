use glam::Affine3A;

use crate::scene::local_transform::{Decomposed, LocalTransform};
use crate::scene::stage::{StageMask, TransformStage};

/// Per-node staged transform store.
///
/// Holds a sparse stage → value mapping together with a cache of cumulative
/// matrices and a dirty set. For a populated, clean stage `S` the cache
/// satisfies `cumulative[S] == cumulative[previous populated stage] *
/// value[S].matrix()`. Writing a stage never disturbs any stage before it,
/// and repeated reads without intervening writes return the cached matrix
/// unchanged.
///
/// The base stage is always populated; a store constructed without a base
/// value starts from the identity pose.
#[derive(Debug, Clone)]
pub struct TransformStore {
    stages: [Option<LocalTransform>; TransformStage::COUNT],
    cumulative: [Option<Affine3A>; TransformStage::COUNT],
    dirty: StageMask,
}

impl TransformStore {
    #[must_use]
    pub fn new(base: Option<LocalTransform>) -> Self {
        let base = base.unwrap_or_default();
        let mut stages = [None; TransformStage::COUNT];
        let mut cumulative = [None; TransformStage::COUNT];
        cumulative[0] = Some(base.matrix());
        stages[0] = Some(base);
        Self {
            stages,
            cumulative,
            dirty: StageMask::empty(),
        }
    }

    /// Raw per-stage value, or `None` when the stage contributes nothing.
    #[inline]
    #[must_use]
    pub fn get(&self, stage: TransformStage) -> Option<&LocalTransform> {
        self.stages[stage.ordinal()].as_ref()
    }

    /// Cumulative matrix up to and including `stage`.
    ///
    /// A clean read returns the nearest cached matrix at or below `stage`.
    /// A dirty read rebuilds from the nearest present-and-clean seed,
    /// caching and un-dirtying every stage visited on the way up.
    ///
    /// # Panics
    /// If the base stage was never populated. That is a construction bug,
    /// not a runtime condition.
    #[must_use]
    pub fn cumulative(&mut self, stage: TransformStage) -> Affine3A {
        if self.dirty.contains_stage(stage) {
            return self.rebuild(stage);
        }
        for ordinal in (0..=stage.ordinal()).rev() {
            if let Some(cached) = self.cumulative[ordinal] {
                return cached;
            }
        }
        panic!("transform store has no cumulative matrix for the base stage");
    }

    fn rebuild(&mut self, target: TransformStage) -> Affine3A {
        // Nearest stage at or below `target` that is both present and
        // clean; when everything is dirty this bottoms out at the base
        // stage, whose matrix is rebuilt from its raw value.
        let mut start = target;
        while self.dirty.contains_stage(start) || self.stages[start.ordinal()].is_none() {
            match start.prev() {
                Some(prev) => start = prev,
                None => break,
            }
        }

        let mut accumulated = if start == TransformStage::FIRST
            && self.dirty.contains_stage(start)
        {
            let base = self.stages[0]
                .as_ref()
                .expect("transform store base stage must be populated");
            let matrix = base.matrix();
            self.cumulative[0] = Some(matrix);
            self.dirty.remove(StageMask::single(TransformStage::FIRST));
            matrix
        } else {
            self.cumulative[start.ordinal()]
                .expect("clean stage must have a cached cumulative matrix")
        };

        for ordinal in (start.ordinal() + 1)..=target.ordinal() {
            let stage = TransformStage::ALL[ordinal];
            let Some(value) = self.stages[ordinal].as_ref() else {
                // Absent stages contribute identity but still become clean.
                self.dirty.remove(StageMask::single(stage));
                continue;
            };
            accumulated = accumulated * value.matrix();
            self.cumulative[ordinal] = Some(accumulated);
            self.dirty.remove(StageMask::single(stage));
        }

        accumulated
    }

    fn mark_dirty(&mut self, stage: TransformStage) {
        self.dirty |= StageMask::from_stage(stage);
    }

    /// Fetches `stage` coerced to decomposed form (converting a matrix
    /// value or defaulting to identity), mutates it in place, then marks
    /// `stage` and every later stage dirty.
    pub fn update_decomposed(
        &mut self,
        stage: TransformStage,
        update: impl FnOnce(&mut Decomposed),
    ) {
        let slot = &mut self.stages[stage.ordinal()];
        if !matches!(slot, Some(LocalTransform::Decomposed(_))) {
            let coerced = slot.map_or(Decomposed::IDENTITY, |value| value.to_decomposed());
            *slot = Some(LocalTransform::Decomposed(coerced));
        }
        if let Some(LocalTransform::Decomposed(decomposed)) = slot {
            update(decomposed);
        }
        self.mark_dirty(stage);
    }

    /// Matrix-form counterpart of [`Self::update_decomposed`].
    pub fn update_matrix(&mut self, stage: TransformStage, update: impl FnOnce(&mut Affine3A)) {
        let slot = &mut self.stages[stage.ordinal()];
        if !matches!(slot, Some(LocalTransform::Matrix(_))) {
            let current = slot.map_or(Affine3A::IDENTITY, |value| value.matrix());
            *slot = Some(LocalTransform::Matrix(current));
        }
        if let Some(LocalTransform::Matrix(matrix)) = slot {
            update(matrix);
        }
        self.mark_dirty(stage);
    }

    /// Overwrites `stage` with a matrix value, dirtying it and every later
    /// stage.
    pub fn set_matrix(&mut self, stage: TransformStage, matrix: Affine3A) {
        self.stages[stage.ordinal()] = Some(LocalTransform::Matrix(matrix));
        self.mark_dirty(stage);
    }

    /// Overwrites `stage` with a decomposed value, dirtying it and every
    /// later stage.
    pub fn set_decomposed(&mut self, stage: TransformStage, decomposed: Decomposed) {
        self.stages[stage.ordinal()] = Some(LocalTransform::Decomposed(decomposed));
        self.mark_dirty(stage);
    }

    /// Removes every stage value, cached matrix and dirty bit at or after
    /// `stage`. Clearing from the base stage re-seeds it with the identity
    /// pose, so the store never loses its base invariant.
    pub fn clear_from(&mut self, stage: TransformStage) {
        for ordinal in stage.ordinal()..TransformStage::COUNT {
            self.stages[ordinal] = None;
            self.cumulative[ordinal] = None;
        }
        self.dirty.remove(StageMask::from_stage(stage));
        if stage == TransformStage::FIRST {
            self.stages[0] = Some(LocalTransform::default());
            self.cumulative[0] = Some(Affine3A::IDENTITY);
        }
    }
}

impl Default for TransformStore {
    fn default() -> Self {
        Self::new(None)
    }
}
