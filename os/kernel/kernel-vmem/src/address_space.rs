//! # Address Space (`AArch64`, PGD-rooted)
//!
//! The single kernel translation regime: four wired tables plus the PMD and
//! PTE pools, owned by one [`AddressSpace`] value.
//!
//! ## Highlights
//!
//! - [`AddressSpace::resolve_or_create`] walks (and, where slots are
//!   invalid, builds) the chain of tables down to a target level.
//! - [`AddressSpace::map_address`], [`AddressSpace::map_range`] and
//!   [`AddressSpace::map_range_skip_null`] install leaves.
//! - [`AddressSpace::descriptor_at`] and [`AddressSpace::probe`] inspect the
//!   result without touching it.
//!
//! ## Table identity
//!
//! Table descriptors hold the address of the next table. Tables are expected
//! to live in identity-mapped memory, so that address is the address of the
//! table object inside this [`AddressSpace`]. The value must therefore not
//! move once tables have been linked: keep it in a `static` or behind a
//! `Box`. A table descriptor that points anywhere else is treated as a
//! conflict and never dereferenced.

mod mapping;

pub use crate::address_space::mapping::Granule;
use crate::descriptor::{Descriptor, decode, encode_table};
use crate::error::{MapError, PoolKind};
use crate::pool::{PoolUsage, TablePool};
use crate::probe::TranslationProbe;
use crate::table::{Level, TableIndex, TranslationTable};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use log::debug;

/// PUD slot wired to the static low PMD (`0x0000_0000..0x4000_0000`).
pub const PUD_LOW_SLOT: usize = 0;

/// PUD slot wired to the static device PMD (`0x4000_0000..0x8000_0000`).
pub const PUD_DEVICE_SLOT: usize = 1;

/// Identifies one table owned by an [`AddressSpace`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TableId {
    Pgd,
    Pud,
    /// Static PMD behind PUD slot 0.
    PmdLow,
    /// Static PMD behind PUD slot 1.
    PmdDevice,
    /// PMD drawn from the pool.
    PmdPool(usize),
    /// PTE table drawn from the pool.
    Pte(usize),
}

impl TableId {
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::Pgd => Level::Pgd,
            Self::Pud => Level::Pud,
            Self::PmdLow | Self::PmdDevice | Self::PmdPool(_) => Level::Pmd,
            Self::Pte(_) => Level::Pte,
        }
    }
}

/// Result of a read-only walk.
enum Walk {
    /// The table at the target level exists.
    Found(TableId),
    /// The walk stopped at `level` because the slot for the next table is
    /// invalid.
    Missing { id: TableId, level: Level },
}

/// Handle to the kernel's translation tables.
///
/// `PMD_TABLES` and `PTE_TABLES` bound the two pools.
pub struct AddressSpace<const PMD_TABLES: usize = 16, const PTE_TABLES: usize = 128> {
    pub(crate) pgd: TranslationTable,
    pub(crate) pud: TranslationTable,
    pub(crate) pmd_low: TranslationTable,
    pub(crate) pmd_device: TranslationTable,
    pub(crate) pmd_pool: TablePool<PMD_TABLES>,
    pub(crate) pte_pool: TablePool<PTE_TABLES>,
}

impl<const PMD_TABLES: usize, const PTE_TABLES: usize> AddressSpace<PMD_TABLES, PTE_TABLES> {
    /// All tables invalid, both pools empty.
    ///
    /// The default sizing takes a little over 600 KiB; place it in a
    /// `static` rather than on the stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pgd: TranslationTable::zeroed(),
            pud: TranslationTable::zeroed(),
            pmd_low: TranslationTable::zeroed(),
            pmd_device: TranslationTable::zeroed(),
            pmd_pool: TablePool::new(),
            pte_pool: TablePool::new(),
        }
    }

    /// Value for `TTBR0_EL1`: the PGD base.
    #[inline]
    #[must_use]
    pub fn root_address(&self) -> PhysicalAddress {
        self.pgd.physical_address()
    }

    /// Borrow a table by id; `None` for pool ids that were never allocated.
    #[must_use]
    pub fn table(&self, id: TableId) -> Option<&TranslationTable> {
        match id {
            TableId::Pgd => Some(&self.pgd),
            TableId::Pud => Some(&self.pud),
            TableId::PmdLow => Some(&self.pmd_low),
            TableId::PmdDevice => Some(&self.pmd_device),
            TableId::PmdPool(i) => self.pmd_pool.get(i),
            TableId::Pte(i) => self.pte_pool.get(i),
        }
    }

    pub(crate) fn table_mut(&mut self, id: TableId) -> Option<&mut TranslationTable> {
        match id {
            TableId::Pgd => Some(&mut self.pgd),
            TableId::Pud => Some(&mut self.pud),
            TableId::PmdLow => Some(&mut self.pmd_low),
            TableId::PmdDevice => Some(&mut self.pmd_device),
            TableId::PmdPool(i) => self.pmd_pool.get_mut(i),
            TableId::Pte(i) => self.pte_pool.get_mut(i),
        }
    }

    /// Find the table at `level` whose base is `pa`.
    pub(crate) fn locate(&self, pa: PhysicalAddress, level: Level) -> Option<TableId> {
        match level {
            Level::Pgd => (pa == self.pgd.physical_address()).then_some(TableId::Pgd),
            Level::Pud => (pa == self.pud.physical_address()).then_some(TableId::Pud),
            Level::Pmd => {
                if pa == self.pmd_low.physical_address() {
                    Some(TableId::PmdLow)
                } else if pa == self.pmd_device.physical_address() {
                    Some(TableId::PmdDevice)
                } else {
                    self.pmd_pool.index_of(pa).map(TableId::PmdPool)
                }
            }
            Level::Pte => self.pte_pool.index_of(pa).map(TableId::Pte),
        }
    }

    /// Reject addresses outside the single populated PGD slot.
    ///
    /// # Errors
    /// [`MapError::UnsupportedAddress`] if bits `[63:48]` are set or the PGD
    /// index is not 0.
    pub const fn check_supported(va: VirtualAddress) -> Result<(), MapError> {
        if va.as_u64() >> 48 != 0 || TableIndex::of(va, Level::Pgd).as_usize() != 0 {
            return Err(MapError::UnsupportedAddress);
        }
        Ok(())
    }

    /// Follow existing table descriptors from the PGD towards `target`.
    fn walk(&self, va: VirtualAddress, target: Level) -> Result<Walk, MapError> {
        Self::check_supported(va)?;

        let mut id = TableId::Pgd;
        let mut level = Level::Pgd;
        while level < target {
            let table = self.table(id).ok_or(MapError::MappingConflict)?;
            let next = level.next().ok_or(MapError::MappingConflict)?;
            match decode(table.get(TableIndex::of(va, level)), level) {
                Descriptor::Table(pa) => {
                    id = self.locate(pa, next).ok_or(MapError::MappingConflict)?;
                    level = next;
                }
                Descriptor::Invalid => return Ok(Walk::Missing { id, level }),
                Descriptor::Block(..) | Descriptor::Page(..) => {
                    return Err(MapError::MappingConflict);
                }
            }
        }
        Ok(Walk::Found(id))
    }

    /// Fail up front if creating the tables between `level` and `target`
    /// would run a pool dry, so that nothing is linked on failure.
    fn ensure_capacity(
        &self,
        va: VirtualAddress,
        mut level: Level,
        target: Level,
    ) -> Result<(), MapError> {
        let (mut pmd_needed, mut pte_needed) = (0, 0);
        while level < target {
            match level {
                Level::Pud if !is_wired_pud_slot(va) => pmd_needed += 1,
                Level::Pmd => pte_needed += 1,
                _ => {}
            }
            level = match level.next() {
                Some(next) => next,
                None => break,
            };
        }

        if pmd_needed > self.pmd_pool.available() {
            return Err(MapError::PoolExhausted(PoolKind::Pmd));
        }
        if pte_needed > self.pte_pool.available() {
            return Err(MapError::PoolExhausted(PoolKind::Pte));
        }
        Ok(())
    }

    /// The table that will be linked below a `level` slot for `va`.
    fn create_child(&mut self, va: VirtualAddress, level: Level) -> Result<TableId, MapError> {
        match level {
            Level::Pgd => Ok(TableId::Pud),
            Level::Pud => match TableIndex::of(va, Level::Pud).as_usize() {
                PUD_LOW_SLOT => Ok(TableId::PmdLow),
                PUD_DEVICE_SLOT => Ok(TableId::PmdDevice),
                _ => self
                    .pmd_pool
                    .alloc()
                    .map(|(i, _)| TableId::PmdPool(i))
                    .ok_or(MapError::PoolExhausted(PoolKind::Pmd)),
            },
            Level::Pmd => self
                .pte_pool
                .alloc()
                .map(|(i, _)| TableId::Pte(i))
                .ok_or(MapError::PoolExhausted(PoolKind::Pte)),
            Level::Pte => Err(MapError::MappingConflict),
        }
    }

    /// Locate, or build, the table at `target` responsible for `va`.
    ///
    /// Invalid slots on the way are filled with table descriptors: PGD slot 0
    /// leads to the static PUD, PUD slots 0 and 1 to the static PMDs, other
    /// PUD slots to pool PMDs, and PMD slots to pool PTE tables.
    ///
    /// # Errors
    /// - [`MapError::UnsupportedAddress`] for addresses outside PGD slot 0.
    /// - [`MapError::MappingConflict`] if a block sits where a table is
    ///   needed. Nothing is modified.
    /// - [`MapError::PoolExhausted`] if a needed table cannot be allocated.
    ///   Nothing is modified.
    pub fn resolve_or_create(
        &mut self,
        va: VirtualAddress,
        target: Level,
    ) -> Result<TableId, MapError> {
        let (mut id, mut level) = match self.walk(va, target)? {
            Walk::Found(id) => return Ok(id),
            Walk::Missing { id, level } => (id, level),
        };
        self.ensure_capacity(va, level, target)?;

        while level < target {
            let next = level.next().ok_or(MapError::MappingConflict)?;
            let child = self.create_child(va, level)?;
            let child_pa = self
                .table(child)
                .map(TranslationTable::physical_address)
                .ok_or(MapError::MappingConflict)?;

            let idx = TableIndex::of(va, level);
            self.table_mut(id)
                .ok_or(MapError::MappingConflict)?
                .set(idx, encode_table(child_pa));
            debug!(
                "linked {:?} at {child_pa} into {}[{}] for {va}",
                child,
                level.as_str(),
                idx.as_usize()
            );

            id = child;
            level = next;
        }
        Ok(id)
    }

    /// Existing table at `level` responsible for `va`, if the chain to it is
    /// complete.
    #[must_use]
    pub fn find_table(&self, va: VirtualAddress, level: Level) -> Option<TableId> {
        match self.walk(va, level) {
            Ok(Walk::Found(id)) => Some(id),
            Ok(Walk::Missing { .. }) | Err(_) => None,
        }
    }

    /// Decoded slot for `va` in the table at `level`, if that table exists.
    #[must_use]
    pub fn descriptor_at(&self, va: VirtualAddress, level: Level) -> Option<Descriptor> {
        let table = self.table(self.find_table(va, level)?)?;
        Some(decode(table.get(TableIndex::of(va, level)), level))
    }

    /// Translate `va` by walking the tables in software.
    ///
    /// Reports faults the way `AT S1E1R` would for the same tables: a
    /// translation fault at the level whose slot is invalid.
    #[must_use]
    pub fn probe(&self, va: VirtualAddress) -> TranslationProbe {
        if Self::check_supported(va).is_err() {
            return TranslationProbe::translation_fault(Level::Pgd);
        }

        let mut id = TableId::Pgd;
        let mut level = Level::Pgd;
        loop {
            let Some(table) = self.table(id) else {
                return TranslationProbe::translation_fault(level);
            };
            match decode(table.get(TableIndex::of(va, level)), level) {
                Descriptor::Invalid => return TranslationProbe::translation_fault(level),
                Descriptor::Table(pa) => {
                    let Some(next) = level.next() else {
                        return TranslationProbe::translation_fault(level);
                    };
                    let Some(child) = self.locate(pa, next) else {
                        return TranslationProbe::translation_fault(next);
                    };
                    id = child;
                    level = next;
                }
                Descriptor::Block(base, attrs) | Descriptor::Page(base, attrs) => {
                    let offset = va.as_u64() & (level.slot_span() - 1);
                    let phys = PhysicalAddress::new(base.as_u64() | offset);
                    return TranslationProbe::mapped(va, phys, attrs);
                }
            }
        }
    }

    /// Occupancy of both table pools.
    #[must_use]
    pub const fn pool_usage(&self) -> PoolUsage {
        PoolUsage {
            pmd: self.pmd_pool.stats(),
            pte: self.pte_pool.stats(),
        }
    }
}

impl<const PMD_TABLES: usize, const PTE_TABLES: usize> Default
    for AddressSpace<PMD_TABLES, PTE_TABLES>
{
    fn default() -> Self {
        Self::new()
    }
}

const fn is_wired_pud_slot(va: VirtualAddress) -> bool {
    matches!(
        TableIndex::of(va, Level::Pud).as_usize(),
        PUD_LOW_SLOT | PUD_DEVICE_SLOT
    )
}

/// Heap-allocate an empty address space without building it on the stack.
#[cfg(test)]
pub(crate) fn boxed<const P: usize, const T: usize>() -> Box<AddressSpace<P, T>> {
    // SAFETY: every field is plain integer storage; all-zero is `new()`.
    unsafe { Box::<AddressSpace<P, T>>::new_zeroed().assume_init() }
}
