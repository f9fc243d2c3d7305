mod common;

use common::{address_space, boot_address_space};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::info::{DEVICE_WINDOW_END, FINE_GRAINED_BOOT_BYTES, LOW_MEMORY_END};
use kernel_vmem::{
    AddressSpace, DEVICE_LOWER_ATTRIBUTES, Descriptor, Level, MemoryAttributes, TableId,
    translation_fault_status,
};

fn va(v: u64) -> VirtualAddress {
    VirtualAddress::new(v)
}

#[test]
fn root_is_the_pgd() {
    let aspace = boot_address_space();
    let pgd = aspace.table(TableId::Pgd).unwrap();
    assert_eq!(aspace.root_address(), pgd.physical_address());
    assert_eq!(pgd.valid_entries(), 1);

    let pud = aspace.table(TableId::Pud).unwrap().physical_address();
    assert_eq!(aspace.descriptor_at(va(0), Level::Pgd), Some(Descriptor::Table(pud)));
}

#[test]
fn first_two_mib_are_pages() {
    let aspace = boot_address_space();

    let pte = aspace.find_table(va(0), Level::Pte).expect("PTE table for page 0");
    assert_eq!(pte, TableId::Pte(0));
    assert_eq!(aspace.table(pte).unwrap().valid_entries(), 512);

    for addr in [0x0, 0x1000, 0x8_0000, FINE_GRAINED_BOOT_BYTES - 0x1000] {
        match aspace.descriptor_at(va(addr), Level::Pte) {
            Some(Descriptor::Page(pa, _)) => assert_eq!(pa.as_u64(), addr),
            other => panic!("{addr:#x}: expected page, got {other:?}"),
        }
    }
    assert_eq!(
        aspace.descriptor_at(va(0), Level::Pte),
        Some(Descriptor::Page(PhysicalAddress::zero(), MemoryAttributes::NORMAL))
    );
}

#[test]
fn rest_of_low_memory_is_blocks() {
    let aspace = boot_address_space();

    assert_eq!(
        aspace.descriptor_at(va(FINE_GRAINED_BOOT_BYTES), Level::Pmd),
        Some(Descriptor::Block(
            PhysicalAddress::new(FINE_GRAINED_BOOT_BYTES),
            MemoryAttributes::NORMAL
        ))
    );
    assert_eq!(
        aspace.descriptor_at(va(0x3C00_0000), Level::Pmd),
        Some(Descriptor::Block(
            PhysicalAddress::new(0x3C00_0000),
            MemoryAttributes::DEVICE_EXECUTE_NEVER
        ))
    );
    assert_eq!(
        aspace.descriptor_at(va(LOW_MEMORY_END - 0x20_0000), Level::Pmd),
        Some(Descriptor::Block(
            PhysicalAddress::new(LOW_MEMORY_END - 0x20_0000),
            MemoryAttributes::DEVICE_EXECUTE_NEVER
        ))
    );
    assert_eq!(aspace.table(TableId::PmdLow).unwrap().valid_entries(), 512);
}

#[test]
fn device_window_uses_explicit_attributes() {
    let aspace = boot_address_space();

    // The classifier would mark the mailbox page execute-never; the boot map
    // passes its own attributes instead.
    assert_eq!(
        aspace.descriptor_at(va(0x4000_0000), Level::Pmd),
        Some(Descriptor::Block(
            PhysicalAddress::new(0x4000_0000),
            MemoryAttributes::DEVICE
        ))
    );
    assert_eq!(aspace.table(TableId::PmdDevice).unwrap().valid_entries(), 512);
    assert!(aspace.probe(va(DEVICE_WINDOW_END - 1)).is_mapped());
}

#[test]
fn nothing_above_the_device_window() {
    let aspace = boot_address_space();
    let probe = aspace.probe(va(DEVICE_WINDOW_END));
    assert!(!probe.is_mapped());
    assert!(probe.is_translation_fault());
    assert_eq!(probe.par().fst(), translation_fault_status(Level::Pud));
}

#[test]
fn identity_map_probes() {
    let aspace = boot_address_space();
    for addr in [0x0, 0x80, 0x1000, 0x8_1234, 0x3F20_1000, 0x4000_0040, 0x7FFF_FFFF] {
        assert_eq!(
            aspace.probe(va(addr)).physical_address(),
            Some(PhysicalAddress::new(addr)),
            "{addr:#x}"
        );
    }

    let uart = aspace.probe(va(0x3F20_1000));
    assert_eq!(uart.par().attr(), 0x00);
    let ram = aspace.probe(va(0x10_0000));
    assert_eq!(ram.par().attr(), 0xFF);
}

#[test]
fn boot_consumes_one_pte_table() {
    let aspace = boot_address_space();
    let usage = aspace.pool_usage();
    assert_eq!((usage.pmd.used, usage.pmd.capacity), (0, 16));
    assert_eq!((usage.pte.used, usage.pte.capacity), (1, 128));
    assert_eq!(usage.fine_grained_capacity_bytes(), 127 * 0x20_0000);
    assert_eq!(usage.page_slots_in_use(), 512);
}

#[test]
fn patch_rewrites_mailbox_blocks() {
    let mut aspace = boot_address_space();
    let before = aspace.descriptor_at(va(0x3F00_0000), Level::Pmd);

    assert_eq!(aspace.patch_page_tables(), 16);

    for (table, slots) in [(TableId::PmdLow, 504..512), (TableId::PmdDevice, 0..8)] {
        let table = aspace.table(table).unwrap();
        for slot in slots {
            let raw = table.get(kernel_vmem::TableIndex::new(slot));
            assert_eq!(raw.into_bits() & 0xFFF, DEVICE_LOWER_ATTRIBUTES.into_bits());
        }
    }
    // Output address and execute-never bits survive.
    assert_eq!(aspace.descriptor_at(va(0x3F00_0000), Level::Pmd), before);
    // Neighbors are untouched.
    assert_eq!(
        aspace.descriptor_at(va(0x3EE0_0000), Level::Pmd),
        Some(Descriptor::Block(
            PhysicalAddress::new(0x3EE0_0000),
            MemoryAttributes::DEVICE_EXECUTE_NEVER
        ))
    );
}

#[test]
fn patch_before_build_changes_nothing() {
    let mut aspace = address_space::<1, 1>();
    assert_eq!(aspace.patch_page_tables(), 0);
    assert_eq!(aspace.table(TableId::PmdLow).unwrap().valid_entries(), 0);
}

#[test]
fn boot_fails_cleanly_without_pte_tables() {
    let mut aspace: Box<AddressSpace<1, 0>> = address_space();
    assert_eq!(
        aspace.create_page_tables(),
        Err(kernel_vmem::MapError::PoolExhausted(kernel_vmem::PoolKind::Pte))
    );
    assert!(!aspace.probe(va(0)).is_mapped());
}
