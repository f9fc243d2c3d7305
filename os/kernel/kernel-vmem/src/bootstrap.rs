//! # Boot-time Table Construction
//!
//! Builds the identity map the kernel runs on once the MMU is enabled:
//!
//! ```text
//! 0x0000_0000 ─┬─ 4 KiB pages  (one PTE table, so page 0 can be retracted)
//! 0x0020_0000 ─┼─ 2 MiB blocks (low PMD, attributes from the classifier)
//! 0x4000_0000 ─┼─ 2 MiB blocks (device PMD, Device-nGnRnE)
//! 0x8000_0000 ─┴─ unmapped
//! ```

use crate::address_space::{AddressSpace, PUD_DEVICE_SLOT, PUD_LOW_SLOT};
use crate::attributes::MemoryAttributes;
use crate::descriptor::{Descriptor, decode, encode_table};
use crate::error::MapError;
use crate::table::{Level, TableIndex, TranslationTable};
use core::ops::Range;
use kernel_info::memory::{
    DEVICE_WINDOW_SIZE, DEVICE_WINDOW_START, FINE_GRAINED_BOOT_BYTES, LOW_MEMORY_END,
};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use log::{debug, info, warn};

/// Low PMD slots rewritten by [`AddressSpace::patch_page_tables`]
/// (`0x3F00_0000..0x4000_0000`).
pub const PATCHED_LOW_SLOTS: Range<u16> = 504..512;

/// Device PMD slots rewritten by [`AddressSpace::patch_page_tables`]
/// (`0x4000_0000..0x4100_0000`).
pub const PATCHED_DEVICE_SLOTS: Range<u16> = 0..8;

impl<const PMD_TABLES: usize, const PTE_TABLES: usize> AddressSpace<PMD_TABLES, PTE_TABLES> {
    /// Build the boot identity map.
    ///
    /// Zeroes the four wired tables, links PGD → PUD → {low PMD, device PMD},
    /// then maps:
    ///
    /// 1. `[0, 2 MiB)` with 4 KiB pages, attributes from the classifier;
    /// 2. `[2 MiB, 1 GiB)` with 2 MiB blocks, attributes from the classifier;
    /// 3. `[1 GiB, 2 GiB)` with 2 MiB blocks as [`MemoryAttributes::DEVICE`].
    ///
    /// The pools are not reset; call this once, on a fresh address space.
    ///
    /// # Errors
    /// The first [`MapError`] raised by the three range mappings.
    pub fn create_page_tables(&mut self) -> Result<(), MapError> {
        self.pgd.zero();
        self.pud.zero();
        self.pmd_low.zero();
        self.pmd_device.zero();

        let pud = self.pud.physical_address();
        let pmd_low = self.pmd_low.physical_address();
        let pmd_device = self.pmd_device.physical_address();
        self.pgd.set(TableIndex::new(0), encode_table(pud));
        self.pud
            .set(wired_slot(PUD_LOW_SLOT), encode_table(pmd_low));
        self.pud
            .set(wired_slot(PUD_DEVICE_SLOT), encode_table(pmd_device));
        debug!("PGD at {}, PUD at {pud}", self.pgd.physical_address());
        debug!("low PMD at {pmd_low}, device PMD at {pmd_device}");

        self.try_map_range(
            VirtualAddress::zero(),
            PhysicalAddress::zero(),
            FINE_GRAINED_BOOT_BYTES,
            None,
            true,
        )?;
        self.try_map_range(
            VirtualAddress::new(FINE_GRAINED_BOOT_BYTES),
            PhysicalAddress::new(FINE_GRAINED_BOOT_BYTES),
            LOW_MEMORY_END - FINE_GRAINED_BOOT_BYTES,
            None,
            false,
        )?;
        self.try_map_range(
            VirtualAddress::new(DEVICE_WINDOW_START),
            PhysicalAddress::new(DEVICE_WINDOW_START),
            DEVICE_WINDOW_SIZE,
            Some(MemoryAttributes::DEVICE),
            false,
        )?;

        info!(
            "identity map ready: 0x0..{LOW_MEMORY_END:#x} (4K below {FINE_GRAINED_BOOT_BYTES:#x}), device window {DEVICE_WINDOW_START:#x}..{:#x}",
            DEVICE_WINDOW_START + DEVICE_WINDOW_SIZE
        );
        Ok(())
    }

    /// Rewrite the lower attributes of the blocks covering the peripheral
    /// and local-mailbox windows to [`DEVICE_LOWER_ATTRIBUTES`], keeping
    /// their output address and upper attributes.
    ///
    /// After [`create_page_tables`](Self::create_page_tables) every one of
    /// these slots holds a block, so all 16 are rewritten. A slot that does
    /// not hold a block is left alone and logged. Returns the number of
    /// slots rewritten.
    ///
    /// [`DEVICE_LOWER_ATTRIBUTES`]: crate::DEVICE_LOWER_ATTRIBUTES
    pub fn patch_page_tables(&mut self) -> usize {
        let mut patched = 0;
        for (name, table, slots) in [
            ("low", &mut self.pmd_low, PATCHED_LOW_SLOTS),
            ("device", &mut self.pmd_device, PATCHED_DEVICE_SLOTS),
        ] {
            patched += patch_blocks(name, table, slots);
        }
        info!("patched {patched} device blocks");
        patched
    }
}

fn patch_blocks(name: &str, table: &mut TranslationTable, slots: Range<u16>) -> usize {
    let mut patched = 0;
    for slot in slots {
        let idx = TableIndex::new(slot);
        let raw = table.get(idx);
        match decode(raw, Level::Pmd) {
            Descriptor::Block(..) => {
                table.set(idx, raw.with_device_lower_attributes());
                patched += 1;
            }
            other => warn!("{name} PMD[{slot}] is {other}, expected a block; not patched"),
        }
    }
    patched
}

#[allow(clippy::cast_possible_truncation)]
const fn wired_slot(slot: usize) -> TableIndex {
    TableIndex::new(slot as u16)
}
