#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// `MAIR_EL1` — Memory Attribute Indirection Register.
///
/// Eight attribute bytes; stage-1 descriptors select one of them through
/// their 3-bit `AttrIndx` field.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct MairEl1 {
    #[bits(8)]
    pub attr0: u8,
    #[bits(8)]
    pub attr1: u8,
    #[bits(8)]
    pub attr2: u8,
    #[bits(8)]
    pub attr3: u8,
    #[bits(8)]
    pub attr4: u8,
    #[bits(8)]
    pub attr5: u8,
    #[bits(8)]
    pub attr6: u8,
    #[bits(8)]
    pub attr7: u8,
}

/// Device-nGnRnE: strongly ordered MMIO.
pub const MAIR_DEVICE_NGNRNE: u8 = 0x00;
/// Device-nGnRE: MMIO with early write acknowledgement.
pub const MAIR_DEVICE_NGNRE: u8 = 0x04;
/// Device-GRE: gathering, reordering, early acknowledgement.
pub const MAIR_DEVICE_GRE: u8 = 0x0C;
/// Normal memory, inner/outer non-cacheable.
pub const MAIR_NORMAL_NC: u8 = 0x44;
/// Normal memory, inner/outer write-back read/write-allocate.
pub const MAIR_NORMAL_WB: u8 = 0xFF;

impl MairEl1 {
    /// The attribute table programmed at boot.
    ///
    /// | Index | Type          |
    /// |-------|---------------|
    /// | 0     | Device-nGnRnE |
    /// | 1     | Device-nGnRE  |
    /// | 2     | Device-GRE    |
    /// | 3     | Normal NC     |
    /// | 4     | Normal WB     |
    #[inline]
    #[must_use]
    pub const fn boot_default() -> Self {
        Self::new()
            .with_attr0(MAIR_DEVICE_NGNRNE)
            .with_attr1(MAIR_DEVICE_NGNRE)
            .with_attr2(MAIR_DEVICE_GRE)
            .with_attr3(MAIR_NORMAL_NC)
            .with_attr4(MAIR_NORMAL_WB)
    }

    /// Attribute byte at `index` (0..8).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn attr(self, index: u8) -> u8 {
        // Index is reduced to the 3-bit AttrIndx range.
        ((self.into_bits() >> ((index & 0b111) as u32 * 8)) & 0xFF) as u8
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for MairEl1 {
    unsafe fn load_unsafe() -> Self {
        let mair: u64;
        unsafe {
            core::arch::asm!("mrs {}, mair_el1", out(reg) mair, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(mair)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl StoreRegisterUnsafe for MairEl1 {
    unsafe fn store_unsafe(self) {
        let mair = self.into_bits();
        unsafe {
            core::arch::asm!("msr mair_el1, {}", in(reg) mair, options(nostack, preserves_flags));
        }
    }
}
