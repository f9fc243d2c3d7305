mod common;

use common::{Op, RecordingMmu, address_space, boot_address_space};
use kernel_info::boot::SecondaryRelease;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::{
    AddressSpace, Descriptor, Level, MemoryAttributes, NullGuard, ProtectionState, TableId,
    translation_fault_status,
};

fn page_zero_slot(aspace: &AddressSpace) -> VirtualAddress {
    let table = aspace.table(TableId::Pte(0)).unwrap();
    VirtualAddress::new(table.physical_address().as_u64())
}

#[test]
fn page_zero_faults_after_protection() {
    let mut aspace = boot_address_space();
    let mmu = RecordingMmu::default();
    assert!(aspace.probe(VirtualAddress::zero()).is_mapped());

    let previous = aspace.enable_null_pointer_protection(&mmu);
    assert_eq!(
        previous,
        Some(Descriptor::Page(PhysicalAddress::zero(), MemoryAttributes::NORMAL))
    );

    let zero = aspace.probe(VirtualAddress::zero());
    assert!(!zero.is_mapped());
    assert!(zero.is_translation_fault());
    assert_eq!(zero.par().fst(), translation_fault_status(Level::Pte));
    assert!(!aspace.probe(VirtualAddress::new(0xFFF)).is_mapped());

    assert_eq!(
        aspace.probe(VirtualAddress::new(0x1000)).physical_address(),
        Some(PhysicalAddress::new(0x1000))
    );
    assert_eq!(
        aspace.descriptor_at(VirtualAddress::zero(), Level::Pte),
        Some(Descriptor::Invalid)
    );
}

#[test]
fn maintenance_sequence_is_ordered() {
    let mut aspace = boot_address_space();
    let mmu = RecordingMmu::default();
    aspace.enable_null_pointer_protection(&mmu);

    assert_eq!(
        mmu.ops(),
        [
            Op::FlushCacheLine(page_zero_slot(&aspace)),
            Op::DataSyncBarrier,
            Op::InvalidateTlbAllInnerShareable,
            Op::DataSyncBarrier,
            Op::InstructionSyncBarrier,
        ]
    );
}

#[test]
fn deferred_until_cores_are_released() {
    let mut aspace = boot_address_space();
    let mmu = RecordingMmu::default();
    let release = SecondaryRelease::new();
    let mut guard = NullGuard::new();

    assert_eq!(
        guard.enable_when_released(&mut *aspace, &release, &mmu),
        ProtectionState::Unprotected
    );
    assert!(mmu.ops().is_empty());
    assert!(aspace.probe(VirtualAddress::new(0xE0)).is_mapped());

    release.mark_released();
    assert_eq!(
        guard.enable_when_released(&mut *aspace, &release, &mmu),
        ProtectionState::Protected
    );
    assert_eq!(mmu.ops().len(), 5);
    assert!(!aspace.probe(VirtualAddress::new(0xE0)).is_mapped());

    // Terminal state: no second round of maintenance.
    assert_eq!(
        guard.enable_when_released(&mut *aspace, &release, &mmu),
        ProtectionState::Protected
    );
    assert_eq!(mmu.ops().len(), 5);
    assert!(guard.to_string().contains("Protected"));
}

#[test]
fn block_backed_page_zero_is_left_alone() {
    let mut aspace: Box<AddressSpace<1, 1>> = address_space();
    assert!(aspace.map_address(
        VirtualAddress::zero(),
        PhysicalAddress::zero(),
        0x20_0000,
        None
    ));
    let mmu = RecordingMmu::default();

    assert_eq!(aspace.enable_null_pointer_protection(&mmu), None);
    assert!(mmu.ops().is_empty());
    assert!(aspace.probe(VirtualAddress::zero()).is_mapped());

    let mut guard = NullGuard::default();
    assert_eq!(guard.enable(&mut *aspace, &mmu), ProtectionState::Unprotected);
}
