//! Winner group: the reader sets that must be compared in the current round.
//!
//! The group is a pure function of the active sets at one point in time. It
//! is recomputed wholesale after any refill or removal, never patched.
//!
//! Equal keys from different sources are ordered by source id (the position
//! of the file in the bind list), so the merged output is ordered by
//! `(key, source id, row position)`.

use std::cmp::Ordering;

use mergescan_core::types::Scalar;

use crate::active::ActiveSets;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinnerGroup {
    /// Indices into `ActiveSets`; the primary comes first.
    members: Vec<usize>,
}

impl WinnerGroup {
    /// Pick the primary (smallest head), then every other set whose head is
    /// not past the last buffered key of the primary.
    ///
    /// Sets whose head exceeds that bound cannot emit a row before the
    /// primary's batch is drained, so they sit this round out.
    pub fn compute(active: &ActiveSets) -> Self {
        let mut primary: Option<(usize, &Scalar, usize)> = None;
        for idx in 0..active.len() {
            let set = active.get(idx);
            let Some(head) = set.head() else { continue };
            let better = match primary {
                None => true,
                Some((_, best, best_src)) => precedes(head, set.source_id(), best, best_src),
            };
            if better {
                primary = Some((idx, head, set.source_id()));
            }
        }

        let Some((primary, _, _)) = primary else {
            return Self::default();
        };
        let Some(w_last) = active.get(primary).last() else {
            return Self::default();
        };

        let mut members = vec![primary];
        for idx in 0..active.len() {
            if idx == primary {
                continue;
            }
            if let Some(head) = active.get(idx).head() {
                if head.order_cmp(w_last) != Ordering::Greater {
                    members.push(idx);
                }
            }
        }
        Self { members }
    }

    pub fn primary(&self) -> Option<usize> {
        self.members.first().copied()
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Only the primary can emit before its batch runs out.
    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }
}

/// `(a_key, a_src)` sorts strictly before `(b_key, b_src)`.
pub fn precedes(a_key: &Scalar, a_src: usize, b_key: &Scalar, b_src: usize) -> bool {
    match a_key.order_cmp(b_key) {
        Ordering::Less => true,
        Ordering::Equal => a_src < b_src,
        Ordering::Greater => false,
    }
}
