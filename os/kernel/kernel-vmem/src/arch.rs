//! [`MmuMaintenance`] backed by the real `AArch64` instructions.

use crate::MmuMaintenance;
use crate::probe::TranslationProbe;
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::maintenance;

/// The MMU of the executing core.
#[derive(Debug)]
pub struct HardwareMmu {
    _private: (),
}

impl HardwareMmu {
    /// # Safety
    /// The caller must be running at EL1 with the tables it is about to
    /// modify installed in `TTBR0_EL1` (or translation still disabled).
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl MmuMaintenance for HardwareMmu {
    fn flush_cache_line(&self, va: VirtualAddress) {
        // SAFETY: EL1 guaranteed by `HardwareMmu::new`.
        unsafe { maintenance::dc_civac(va.as_u64()) }
    }

    fn data_sync_barrier(&self) {
        maintenance::dsb_sy();
    }

    fn invalidate_tlb_all_inner_shareable(&self) {
        // SAFETY: EL1 guaranteed by `HardwareMmu::new`.
        unsafe { maintenance::tlbi_vmalle1is() }
    }

    fn instruction_sync_barrier(&self) {
        maintenance::isb();
    }

    fn translate_probe(&self, va: VirtualAddress) -> TranslationProbe {
        // SAFETY: EL1 guaranteed by `HardwareMmu::new`.
        let par = unsafe { maintenance::at_s1e1r(va.as_u64()) };
        TranslationProbe::from_par(va, par)
    }
}
