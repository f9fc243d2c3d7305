#![allow(dead_code)]

use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::{AddressSpace, Level, MmuMaintenance, TranslationProbe};
use std::cell::RefCell;

/// Boot-sized address space on the heap, so table addresses stay put.
pub fn address_space<const P: usize, const T: usize>() -> Box<AddressSpace<P, T>> {
    // SAFETY: all fields are integer storage; all-zero equals `AddressSpace::new()`.
    unsafe { Box::<AddressSpace<P, T>>::new_zeroed().assume_init() }
}

pub fn boot_address_space() -> Box<AddressSpace> {
    let mut aspace = address_space();
    aspace.create_page_tables().expect("boot map");
    aspace
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Op {
    FlushCacheLine(VirtualAddress),
    DataSyncBarrier,
    InvalidateTlbAllInnerShareable,
    InstructionSyncBarrier,
    TranslateProbe(VirtualAddress),
}

/// Stand-in for the hardware that records every maintenance request.
#[derive(Debug, Default)]
pub struct RecordingMmu {
    ops: RefCell<Vec<Op>>,
}

impl RecordingMmu {
    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }
}

impl MmuMaintenance for RecordingMmu {
    fn flush_cache_line(&self, va: VirtualAddress) {
        self.ops.borrow_mut().push(Op::FlushCacheLine(va));
    }

    fn data_sync_barrier(&self) {
        self.ops.borrow_mut().push(Op::DataSyncBarrier);
    }

    fn invalidate_tlb_all_inner_shareable(&self) {
        self.ops.borrow_mut().push(Op::InvalidateTlbAllInnerShareable);
    }

    fn instruction_sync_barrier(&self) {
        self.ops.borrow_mut().push(Op::InstructionSyncBarrier);
    }

    fn translate_probe(&self, va: VirtualAddress) -> TranslationProbe {
        self.ops.borrow_mut().push(Op::TranslateProbe(va));
        TranslationProbe::translation_fault(Level::Pgd)
    }
}
