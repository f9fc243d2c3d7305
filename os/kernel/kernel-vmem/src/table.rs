//! # Translation Tables
//!
//! - [`Level`]: the four lookup levels of the 4 KiB granule (`L0`..`L3`).
//! - [`TableIndex`]: a 9-bit slot index extracted from a virtual address.
//! - [`TranslationTable`]: a 4 KiB-aligned array of 512 raw descriptors.
//!
//! ```text
//! | 63‒48 | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  0000 |  PGD  |  PUD  |  PMD  |  PTE  | Offset |
//! ```

use crate::descriptor::RawDescriptor;
use core::fmt;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Number of descriptor slots per table.
pub const ENTRIES: usize = 512;

/// Lookup level of a table in the hierarchy.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Level {
    /// Level 0, Page Global Directory.
    Pgd = 0,
    /// Level 1, Page Upper Directory.
    Pud = 1,
    /// Level 2, Page Middle Directory; holds 2 MiB blocks.
    Pmd = 2,
    /// Level 3, Page Table; holds 4 KiB pages.
    Pte = 3,
}

impl Level {
    /// Virtual-address bit position of this level's index field.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        39 - 9 * (self as u32)
    }

    /// Bytes covered by one slot at this level.
    #[inline]
    #[must_use]
    pub const fn slot_span(self) -> u64 {
        1 << self.shift()
    }

    /// The level below, or `None` for [`Level::Pte`].
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pgd => Some(Self::Pud),
            Self::Pud => Some(Self::Pmd),
            Self::Pmd => Some(Self::Pte),
            Self::Pte => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pgd => "PGD",
            Self::Pud => "PUD",
            Self::Pmd => "PMD",
            Self::Pte => "PTE",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (L{})", self.as_str(), self.as_u8())
    }
}

/// Slot index within a [`TranslationTable`] (`0..512`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

impl TableIndex {
    /// Extract the index field for `level` from `va`.
    ///
    /// ### Examples
    /// ```rust
    /// # use kernel_vmem::{Level, TableIndex};
    /// # use kernel_memory_addresses::VirtualAddress;
    /// let va = VirtualAddress::new(0x4020_3000);
    /// assert_eq!(TableIndex::of(va, Level::Pud).as_usize(), 1);
    /// assert_eq!(TableIndex::of(va, Level::Pmd).as_usize(), 1);
    /// assert_eq!(TableIndex::of(va, Level::Pte).as_usize(), 3);
    /// ```
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn of(va: VirtualAddress, level: Level) -> Self {
        Self(((va.as_u64() >> level.shift()) & 0x1FF) as u16)
    }

    /// Construct an index from a raw value.
    ///
    /// ### Panics / Debug assertions
    /// - Debug builds assert `v < 512`.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < 512);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// All four indices of `va`, top level first.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> [TableIndex; 4] {
    [
        TableIndex::of(va, Level::Pgd),
        TableIndex::of(va, Level::Pud),
        TableIndex::of(va, Level::Pmd),
        TableIndex::of(va, Level::Pte),
    ]
}

/// One 4 KiB translation table.
///
/// The level a table belongs to is a property of where it is linked, not of
/// the table itself.
#[repr(C, align(4096))]
pub struct TranslationTable {
    entries: [RawDescriptor; ENTRIES],
}

const _: () = assert!(size_of::<TranslationTable>() == 4096);

impl TranslationTable {
    /// A table with every slot invalid.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [RawDescriptor::new(); ENTRIES],
        }
    }

    /// Invalidate every slot.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(RawDescriptor::new());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> RawDescriptor {
        self.entries[i.as_usize()]
    }

    /// Write the slot at `i`.
    ///
    /// Caller is responsible for any required cache/TLB maintenance after
    /// modifying a table that is live in the MMU.
    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: RawDescriptor) {
        self.entries[i.as_usize()] = e;
    }

    #[inline]
    pub(crate) const fn slot_mut(&mut self, i: TableIndex) -> &mut RawDescriptor {
        &mut self.entries[i.as_usize()]
    }

    /// Address of this table as stored in table descriptors.
    ///
    /// Tables live in identity-mapped memory, so the address of the object is
    /// its physical address.
    #[inline]
    #[must_use]
    pub fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::from_ptr(self)
    }

    /// Number of valid slots.
    #[must_use]
    pub fn valid_entries(&self) -> usize {
        self.entries.iter().filter(|e| e.valid()).count()
    }
}

impl Default for TranslationTable {
    fn default() -> Self {
        Self::zeroed()
    }
}
