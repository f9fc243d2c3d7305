//! Installing leaf descriptors: single pages/blocks and greedy ranges.
//!
//! Every operation comes in two flavors. `try_*` returns the precise
//! [`MapError`]; the plain variant logs the failure at `warn` and returns a
//! success flag, which is all boot code cares about.

use crate::address_space::AddressSpace;
use crate::attributes::MemoryAttributes;
use crate::descriptor::{Descriptor, decode, encode_block, encode_page};
use crate::error::MapError;
use crate::table::{Level, TableIndex};
use kernel_info::memory::NULL_GUARD_BOUNDARY;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size2M, Size4K, VirtualAddress};
use log::{trace, warn};

/// Leaf size of one mapping.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Granule {
    /// Page descriptor in a PTE table.
    Page4K,
    /// Block descriptor in a PMD.
    Block2M,
}

impl Granule {
    /// `None` for anything but exactly 4 KiB or 2 MiB.
    #[must_use]
    pub const fn from_size(size: u64) -> Option<Self> {
        if size == Size4K::SIZE {
            Some(Self::Page4K)
        } else if size == Size2M::SIZE {
            Some(Self::Block2M)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn size(self) -> u64 {
        match self {
            Self::Page4K => Size4K::SIZE,
            Self::Block2M => Size2M::SIZE,
        }
    }

    /// Level of the table holding the leaf.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::Page4K => Level::Pte,
            Self::Block2M => Level::Pmd,
        }
    }
}

impl<const PMD_TABLES: usize, const PTE_TABLES: usize> AddressSpace<PMD_TABLES, PTE_TABLES> {
    /// Map one 4 KiB page or 2 MiB block at `va` to `pa`.
    ///
    /// With `attrs == None` the attributes come from
    /// [`MemoryAttributes::classify`]. An existing leaf in the target slot is
    /// replaced.
    ///
    /// # Errors
    /// - [`MapError::UnsupportedSize`] unless `size` is 4 KiB or 2 MiB.
    /// - [`MapError::UnsupportedAddress`] if `va` lies outside PGD slot 0 or
    ///   `pa` does not fit 48 bits.
    /// - [`MapError::AlignmentViolation`] unless both addresses are aligned
    ///   to `size`.
    /// - [`MapError::MappingConflict`] if a 2 MiB block would replace a PTE
    ///   table, or a block sits where a table is needed.
    /// - [`MapError::PoolExhausted`] if a needed table cannot be allocated.
    ///
    /// On error no slot has been modified.
    pub fn try_map_address(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        size: u64,
        attrs: Option<MemoryAttributes>,
    ) -> Result<(), MapError> {
        let granule = Granule::from_size(size).ok_or(MapError::UnsupportedSize)?;
        Self::check_supported(va)?;
        if pa.as_u64() >> 48 != 0 {
            return Err(MapError::UnsupportedAddress);
        }
        let mask = granule.size() - 1;
        if va.as_u64() & mask != 0 || pa.as_u64() & mask != 0 {
            return Err(MapError::AlignmentViolation);
        }

        let attrs = attrs.unwrap_or_else(|| MemoryAttributes::classify(pa));
        let level = granule.level();
        let id = self.resolve_or_create(va, level)?;
        let table = self.table_mut(id).ok_or(MapError::MappingConflict)?;
        let idx = TableIndex::of(va, level);

        let leaf = match granule {
            Granule::Block2M => {
                if let Descriptor::Table(_) = decode(table.get(idx), level) {
                    return Err(MapError::MappingConflict);
                }
                encode_block(pa, attrs)
            }
            Granule::Page4K => encode_page(pa, attrs),
        };
        table.set(idx, leaf);
        trace!("{va} -> {pa} ({:?}, {attrs})", granule);
        Ok(())
    }

    /// [`try_map_address`](Self::try_map_address), reporting success only.
    pub fn map_address(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        size: u64,
        attrs: Option<MemoryAttributes>,
    ) -> bool {
        match self.try_map_address(va, pa, size, attrs) {
            Ok(()) => true,
            Err(e) => {
                warn!("map_address({va}, {pa}, {size:#x}) failed: {e}");
                false
            }
        }
    }

    /// Map `[va, va + size)` to `[pa, pa + size)`.
    ///
    /// Each step uses a 2 MiB block when `force_4k` is false, at least 2 MiB
    /// remain and both cursors are 2 MiB aligned; otherwise a 4 KiB page.
    /// `size == 0` is a no-op.
    ///
    /// # Errors
    /// As for [`try_map_address`](Self::try_map_address), plus
    /// [`MapError::AlignmentViolation`] when less than 4 KiB remains. The
    /// steps mapped before the failing one stay mapped.
    pub fn try_map_range(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        size: u64,
        attrs: Option<MemoryAttributes>,
        force_4k: bool,
    ) -> Result<(), MapError> {
        self.map_extent(va, pa, size, attrs, force_4k)
    }

    /// [`try_map_range`](Self::try_map_range), reporting success only.
    pub fn map_range(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        size: u64,
        attrs: Option<MemoryAttributes>,
        force_4k: bool,
    ) -> bool {
        match self.try_map_range(va, pa, size, attrs, force_4k) {
            Ok(()) => true,
            Err(e) => {
                warn!("map_range({va}, {pa}, {size:#x}) failed: {e}");
                false
            }
        }
    }

    /// Like [`try_map_range`](Self::try_map_range), but leaves the bytes
    /// below the null-guard boundary (`0x80`) out of the request.
    ///
    /// Translation works in whole pages: when the skip ends inside a page,
    /// that page is mapped whole (its base at `va` rounded down, `pa` moved
    /// back by the same amount). The null guard later retracts page 0
    /// entirely.
    ///
    /// # Errors
    /// As for [`try_map_range`](Self::try_map_range).
    /// [`MapError::AlignmentViolation`] also if the page base would precede
    /// physical address 0. [`MapError::UnsupportedAddress`] up front if `pa`
    /// does not fit 48 bits, even when the whole request is skipped.
    pub fn try_map_range_skip_null(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        size: u64,
        attrs: Option<MemoryAttributes>,
        force_4k: bool,
    ) -> Result<(), MapError> {
        if pa.as_u64() >> 48 != 0 {
            return Err(MapError::UnsupportedAddress);
        }
        let (mut va, mut pa, mut remaining) = (va, pa, size);

        if va.as_u64() < NULL_GUARD_BOUNDARY {
            let skip = (NULL_GUARD_BOUNDARY - va.as_u64()).min(remaining);
            va += skip;
            pa += skip;
            remaining -= skip;
            if remaining == 0 {
                return Ok(());
            }

            let offset = va.offset::<Size4K>();
            if offset != 0 {
                let page_pa = pa
                    .as_u64()
                    .checked_sub(offset)
                    .ok_or(MapError::AlignmentViolation)?;
                self.try_map_address(
                    va.align_down::<Size4K>(),
                    PhysicalAddress::new(page_pa),
                    Size4K::SIZE,
                    attrs,
                )?;
                let consumed = (Size4K::SIZE - offset).min(remaining);
                va += consumed;
                pa += consumed;
                remaining -= consumed;
            }
        }

        self.map_extent(va, pa, remaining, attrs, force_4k)
    }

    /// [`try_map_range_skip_null`](Self::try_map_range_skip_null), reporting
    /// success only.
    pub fn map_range_skip_null(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        size: u64,
        attrs: Option<MemoryAttributes>,
        force_4k: bool,
    ) -> bool {
        match self.try_map_range_skip_null(va, pa, size, attrs, force_4k) {
            Ok(()) => true,
            Err(e) => {
                warn!("map_range_skip_null({va}, {pa}, {size:#x}) failed: {e}");
                false
            }
        }
    }

    fn map_extent(
        &mut self,
        mut va: VirtualAddress,
        mut pa: PhysicalAddress,
        mut remaining: u64,
        attrs: Option<MemoryAttributes>,
        force_4k: bool,
    ) -> Result<(), MapError> {
        while remaining > 0 {
            let step = step_size(va, pa, remaining, force_4k)?;
            self.try_map_address(va, pa, step, attrs)?;
            va += step;
            pa += step;
            remaining -= step;
        }
        Ok(())
    }
}

fn step_size(
    va: VirtualAddress,
    pa: PhysicalAddress,
    remaining: u64,
    force_4k: bool,
) -> Result<u64, MapError> {
    if !force_4k
        && remaining >= Size2M::SIZE
        && va.is_aligned::<Size2M>()
        && pa.is_aligned::<Size2M>()
    {
        Ok(Size2M::SIZE)
    } else if remaining >= Size4K::SIZE {
        Ok(Size4K::SIZE)
    } else {
        Err(MapError::AlignmentViolation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_space::{TableId, boxed};

    #[test]
    fn granule_from_size() {
        assert_eq!(Granule::from_size(0x1000), Some(Granule::Page4K));
        assert_eq!(Granule::from_size(0x20_0000), Some(Granule::Block2M));
        assert_eq!(Granule::from_size(0x4000_0000), None);
        assert_eq!(Granule::from_size(0), None);
    }

    #[test]
    fn step_prefers_blocks() {
        let va = VirtualAddress::new(0x20_0000);
        let pa = PhysicalAddress::new(0x20_0000);
        assert_eq!(step_size(va, pa, 0x40_0000, false), Ok(0x20_0000));
        assert_eq!(step_size(va, pa, 0x40_0000, true), Ok(0x1000));
        assert_eq!(step_size(va, pa, 0x1F_F000, false), Ok(0x1000));
        assert_eq!(
            step_size(va, PhysicalAddress::new(0x20_1000), 0x40_0000, false),
            Ok(0x1000)
        );
        assert_eq!(
            step_size(va, pa, 0x800, false),
            Err(MapError::AlignmentViolation)
        );
    }

    #[test]
    fn block_over_pte_table_is_rejected() {
        let mut aspace = boxed::<2, 2>();
        assert!(aspace.map_address(
            VirtualAddress::new(0x1000),
            PhysicalAddress::new(0x1000),
            0x1000,
            None
        ));
        let before = aspace.pmd_low.get(TableIndex::new(0));
        assert_eq!(
            aspace.try_map_address(
                VirtualAddress::zero(),
                PhysicalAddress::zero(),
                0x20_0000,
                None
            ),
            Err(MapError::MappingConflict)
        );
        assert_eq!(aspace.pmd_low.get(TableIndex::new(0)), before);
    }

    #[test]
    fn skip_null_maps_page_zero_whole() {
        let mut aspace = boxed::<2, 2>();
        aspace
            .try_map_range_skip_null(
                VirtualAddress::zero(),
                PhysicalAddress::zero(),
                0x2000,
                None,
                true,
            )
            .unwrap();
        assert_eq!(aspace.find_table(VirtualAddress::zero(), Level::Pte), Some(TableId::Pte(0)));
        assert_eq!(
            aspace.probe(VirtualAddress::new(0x80)).physical_address(),
            Some(PhysicalAddress::new(0x80))
        );
        assert!(aspace.probe(VirtualAddress::new(0x1FFF)).is_mapped());
        assert!(!aspace.probe(VirtualAddress::new(0x2000)).is_mapped());
    }

    #[test]
    fn skip_null_inside_boundary_is_noop() {
        let mut aspace = boxed::<2, 2>();
        assert_eq!(
            aspace.try_map_range_skip_null(
                VirtualAddress::new(0x10),
                PhysicalAddress::new(0x10),
                0x40,
                None,
                false,
            ),
            Ok(())
        );
        assert_eq!(aspace.pgd.valid_entries(), 0);
    }
}
