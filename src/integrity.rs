//! Citation integrity checking.
//!
//! Pure set differences between inline usage and reference definitions.
//! Runs for both check mode and conversion; a mismatch is a data warning
//! and never blocks writing.

use std::collections::BTreeSet;

/// Mismatches between inline citation numbers and reference definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Numbers used inline with no reference definition.
    pub missing: BTreeSet<u32>,
    /// Reference numbers never used inline.
    pub orphans: BTreeSet<u32>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.orphans.is_empty()
    }
}

/// Compares inline citation numbers against reference definition numbers.
pub fn check(inline: &BTreeSet<u32>, refs: &BTreeSet<u32>) -> IntegrityReport {
    IntegrityReport {
        missing: inline.difference(refs).copied().collect(),
        orphans: refs.difference(inline).copied().collect(),
    }
}
