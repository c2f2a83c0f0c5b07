//! Release retention: which manifests survive a rotation

use crate::manifest::Release;

/// Decides which releases a rotation keeps.
///
/// Pure policy over an already sorted, newest-first slice: the first
/// `retention + 1` entries survive, the newest release plus `retention`
/// predecessors. Ordering keys are strictly monotonic so there are no
/// ties to break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    retention: usize,
}

impl RetentionPolicy {
    pub fn new(retention: usize) -> Self {
        Self { retention }
    }

    /// Split `sorted_desc` into the releases to keep and the releases to
    /// drop, preserving order.
    pub fn partition<'a>(&self, sorted_desc: &'a [Release]) -> (&'a [Release], &'a [Release]) {
        let keep = sorted_desc.len().min(self.retention.saturating_add(1));
        sorted_desc.split_at(keep)
    }
}
