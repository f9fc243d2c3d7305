use core::fmt;

/// Which bounded table pool an allocation was drawn from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Extra level 2 tables for PUD slots other than the two wired ones.
    Pmd,
    /// Level 3 tables backing 4 KiB mappings.
    Pte,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pmd => "PMD",
            Self::Pte => "PTE",
        })
    }
}

/// Why a mapping request was refused.
///
/// None of these leave a partially rewritten slot behind; see the individual
/// operations for what earlier steps of a multi-step call may have installed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// The address lies outside the single supported top-level branch.
    #[error("virtual address outside the supported range")]
    UnsupportedAddress,
    /// The mapping size is neither 4 KiB nor 2 MiB.
    #[error("mapping size must be 4 KiB or 2 MiB")]
    UnsupportedSize,
    /// An address is misaligned for the granule, or less than a page remains.
    #[error("address or extent misaligned for the requested granule")]
    AlignmentViolation,
    /// A block would have to become a table or vice versa.
    #[error("slot already holds a conflicting descriptor")]
    MappingConflict,
    /// A bounded table pool has no tables left.
    #[error("{0} table pool exhausted")]
    PoolExhausted(PoolKind),
}
