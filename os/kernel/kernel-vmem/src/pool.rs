//! # Table Pools
//!
//! Fixed-capacity bump arenas of [`TranslationTable`]s. A table handed out
//! by [`TablePool::alloc`] is owned by the hierarchy for good: there is no
//! free path, and the index of a table never changes.

use crate::error::PoolKind;
use crate::table::TranslationTable;
use core::fmt;
use kernel_memory_addresses::PhysicalAddress;
use log::debug;

/// Bounded, monotonic arena of `N` tables.
#[repr(C)]
pub struct TablePool<const N: usize> {
    tables: [TranslationTable; N],
    next: usize,
}

impl<const N: usize> TablePool<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables: [const { TranslationTable::zeroed() }; N],
            next: 0,
        }
    }

    /// Hand out the next table, zero-filled, together with its index.
    ///
    /// Returns `None` once all `N` tables are in use.
    pub fn alloc(&mut self) -> Option<(usize, &mut TranslationTable)> {
        let index = self.next;
        let table = self.tables.get_mut(index)?;
        table.zero();
        self.next += 1;
        debug!(
            "table pool: allocated table {index} of {} at {}",
            N,
            table.physical_address()
        );
        Some((index, table))
    }

    /// An allocated table.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TranslationTable> {
        self.tables[..self.next].get(index)
    }

    /// An allocated table.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut TranslationTable> {
        self.tables[..self.next].get_mut(index)
    }

    /// Index of the allocated table whose base address is `pa`.
    #[must_use]
    pub fn index_of(&self, pa: PhysicalAddress) -> Option<usize> {
        let base = PhysicalAddress::from_ptr(self.tables.as_ptr()).as_u64();
        let offset = pa.as_u64().checked_sub(base)?;
        if offset % size_of::<TranslationTable>() as u64 != 0 {
            return None;
        }
        let index = usize::try_from(offset / size_of::<TranslationTable>() as u64).ok()?;
        (index < self.next).then_some(index)
    }

    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.next
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    #[must_use]
    pub const fn available(&self) -> usize {
        N - self.next
    }

    #[must_use]
    pub const fn stats(&self) -> PoolStats {
        PoolStats {
            used: self.next,
            capacity: N,
        }
    }
}

impl<const N: usize> Default for TablePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Occupancy of one pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub used: usize,
    pub capacity: usize,
}

impl PoolStats {
    #[inline]
    #[must_use]
    pub const fn available(self) -> usize {
        self.capacity - self.used
    }
}

/// Snapshot of both table pools.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoolUsage {
    pub pmd: PoolStats,
    pub pte: PoolStats,
}

impl PoolUsage {
    /// 4 KiB pages coverable by each PTE table.
    pub const PAGES_PER_TABLE: usize = 512;

    /// Bytes of address space one PTE table can map with 4 KiB pages.
    pub const BYTES_PER_TABLE: u64 = 0x20_0000;

    #[must_use]
    pub const fn of(&self, kind: PoolKind) -> PoolStats {
        match kind {
            PoolKind::Pmd => self.pmd,
            PoolKind::Pte => self.pte,
        }
    }

    /// Address space still mappable at 4 KiB granularity with the remaining
    /// PTE tables.
    #[must_use]
    pub const fn fine_grained_capacity_bytes(&self) -> u64 {
        self.pte.available() as u64 * Self::BYTES_PER_TABLE
    }

    /// 4 KiB page slots provided by the PTE tables already in use.
    #[must_use]
    pub const fn page_slots_in_use(&self) -> usize {
        self.pte.used * Self::PAGES_PER_TABLE
    }
}

impl fmt::Display for PoolUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "L2 (PMD) tables used: {}/{}", self.pmd.used, self.pmd.capacity)?;
        writeln!(f, "L3 (PTE) tables used: {}/{}", self.pte.used, self.pte.capacity)?;
        writeln!(f, "L3 (PTE) tables available: {}", self.pte.available())?;
        writeln!(
            f,
            "Fine-grained (4 KiB) mapping capacity: {} MiB",
            self.fine_grained_capacity_bytes() >> 20
        )?;
        write!(
            f,
            "4 KiB page slots in use: {} ({} KiB)",
            self.page_slots_in_use(),
            self.page_slots_in_use() * 4
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RawDescriptor;
    use crate::table::TableIndex;

    #[test]
    fn alloc_is_monotonic_and_bounded() {
        let mut pool = Box::new(TablePool::<2>::new());
        assert_eq!(pool.alloc().map(|(i, _)| i), Some(0));
        assert_eq!(pool.alloc().map(|(i, _)| i), Some(1));
        assert!(pool.alloc().is_none());
        assert!(pool.alloc().is_none());
        assert_eq!(pool.used(), 2);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn alloc_zero_fills() {
        let mut pool = Box::new(TablePool::<1>::new());
        pool.tables[0].set(TableIndex::new(3), RawDescriptor::from_bits(0x403));
        let (_, table) = pool.alloc().unwrap();
        assert_eq!(table.valid_entries(), 0);
    }

    #[test]
    fn index_of_only_finds_allocated_tables() {
        let mut pool = Box::new(TablePool::<3>::new());
        let pa0 = pool.alloc().unwrap().1.physical_address();
        let pa1 = pool.alloc().unwrap().1.physical_address();
        let pa2 = pool.tables[2].physical_address();

        assert_eq!(pool.index_of(pa0), Some(0));
        assert_eq!(pool.index_of(pa1), Some(1));
        assert_eq!(pool.index_of(pa2), None);
        assert_eq!(pool.index_of(pa1 + 8), None);
        assert_eq!(pool.index_of(PhysicalAddress::zero()), None);
        assert!(pool.get(1).is_some());
        assert!(pool.get(2).is_none());
    }

    #[test]
    fn usage_report() {
        let usage = PoolUsage {
            pmd: PoolStats { used: 0, capacity: 16 },
            pte: PoolStats { used: 1, capacity: 128 },
        };
        assert_eq!(usage.fine_grained_capacity_bytes(), 127 * 0x20_0000);
        assert_eq!(usage.page_slots_in_use(), 512);
        assert_eq!(usage.of(PoolKind::Pte).available(), 127);
        let text = usage.to_string();
        assert!(text.contains("L3 (PTE) tables used: 1/128"));
        assert!(text.contains("254 MiB"));
    }
}
