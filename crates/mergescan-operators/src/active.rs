//! Arena of reader sets that can still produce rows.
//!
//! Positions carry no meaning beyond one merge round, so removal swaps the
//! target with the last live set and shrinks the arena.

use crate::reader_set::ReaderSet;
use crate::traits::OpError;

/// What a refill pass did to the arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefillOutcome {
    /// Refill attempts, including the ones that found the source exhausted.
    pub refills: usize,
    pub exhausted: usize,
}

impl RefillOutcome {
    /// Any refill or removal invalidates the current winner group.
    pub fn changed(&self) -> bool {
        self.refills > 0 || self.exhausted > 0
    }
}

#[derive(Default)]
pub struct ActiveSets {
    sets: Vec<ReaderSet>,
}

impl ActiveSets {
    pub fn new(sets: Vec<ReaderSet>) -> Self {
        Self { sets }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, idx: usize) -> &ReaderSet {
        &self.sets[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut ReaderSet {
        &mut self.sets[idx]
    }

    /// Drop the set at `idx`, moving the last set into its slot.
    pub fn remove(&mut self, idx: usize) -> ReaderSet {
        self.sets.swap_remove(idx)
    }

    /// Refill every drained set; remove the ones whose source is exhausted.
    ///
    /// Walks from the back so a swap-removal never moves an unvisited set.
    pub fn refill_drained(&mut self) -> Result<RefillOutcome, OpError> {
        let mut outcome = RefillOutcome::default();
        for idx in (0..self.sets.len()).rev() {
            if !self.sets[idx].is_drained() {
                continue;
            }
            outcome.refills += 1;
            if !self.sets[idx].refill()? {
                let _set = self.remove(idx);
                outcome.exhausted += 1;

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    source = _set.source_id(),
                    path = _set.path(),
                    "source exhausted"
                );
            }
        }
        Ok(outcome)
    }
}
