//! # Leaf Memory Attributes
//!
//! The attribute half of a stage-1 block/page descriptor, decoded into
//! typed fields:
//!
//! | Bits  | Field      | Type                 |
//! |-------|------------|----------------------|
//! | 4:2   | `AttrIndx` | [`MemoryType`]       |
//! | 5     | `NS`       | `bool`               |
//! | 7:6   | `AP[2:1]`  | [`AccessPermission`] |
//! | 9:8   | `SH`       | [`Shareability`]     |
//! | 11    | `nG`       | `bool`               |
//! | 53    | `PXN`      | `bool`               |
//! | 54    | `UXN`      | `bool`               |
//!
//! The access flag (bit 10) is not part of [`MemoryAttributes`]: the codec
//! sets it on every leaf it produces.
//!
//! [`MemoryAttributes::classify`] provides the board default for a physical
//! address, used whenever a mapping request leaves the attributes
//! unspecified.

use core::fmt;
use kernel_info::memory::{
    FRAMEBUFFER_END, FRAMEBUFFER_START, KERNEL_RAM_END, KERNEL_RAM_START, LOCAL_MAILBOX_END,
    LOCAL_MAILBOX_START, PERIPHERAL_BASE, PERIPHERAL_END,
};
use kernel_memory_addresses::PhysicalAddress;
use kernel_registers::mair_el1::MairEl1;

/// Memory type selected through the `MAIR_EL1` slot a descriptor's
/// `AttrIndx` field names.
///
/// Slot assignment follows [`MairEl1::boot_default`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MemoryType {
    /// Slot 0: strongly ordered device memory.
    DeviceNgnrne,
    /// Slot 1: device memory with early write acknowledgement.
    DeviceNgnre,
    /// Slot 2: gathering, reordering device memory.
    DeviceGre,
    /// Slot 3: normal, non-cacheable.
    NormalNonCacheable,
    /// Slot 4: normal, write-back cacheable.
    NormalWriteBack,
    /// Slots 5 to 7; not programmed at boot.
    Unassigned(u8),
}

impl MemoryType {
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        match self {
            Self::DeviceNgnrne => 0,
            Self::DeviceNgnre => 1,
            Self::DeviceGre => 2,
            Self::NormalNonCacheable => 3,
            Self::NormalWriteBack => 4,
            Self::Unassigned(index) => index & 0b111,
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b111 {
            0 => Self::DeviceNgnrne,
            1 => Self::DeviceNgnre,
            2 => Self::DeviceGre,
            3 => Self::NormalNonCacheable,
            4 => Self::NormalWriteBack,
            index => Self::Unassigned(index),
        }
    }

    /// The `MAIR_EL1` attribute byte this type resolves to.
    #[inline]
    #[must_use]
    pub const fn mair_encoding(self) -> u8 {
        MairEl1::boot_default().attr(self.into_bits())
    }

    /// Device memory has a zero upper nibble in its MAIR encoding.
    #[inline]
    #[must_use]
    pub const fn is_device(self) -> bool {
        self.mair_encoding() & 0xF0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeviceNgnrne => "Device-nGnRnE",
            Self::DeviceNgnre => "Device-nGnRE",
            Self::DeviceGre => "Device-GRE",
            Self::NormalNonCacheable => "Normal-NC",
            Self::NormalWriteBack => "Normal",
            Self::Unassigned(_) => "Unassigned",
        }
    }
}

/// Data access permissions, `AP[2:1]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum AccessPermission {
    /// EL1 read/write, no EL0 access.
    KernelReadWrite = 0b00,
    /// Read/write from EL1 and EL0.
    ReadWrite = 0b01,
    /// EL1 read-only, no EL0 access.
    KernelReadOnly = 0b10,
    /// Read-only from EL1 and EL0.
    ReadOnly = 0b11,
}

impl AccessPermission {
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0b00 => Self::KernelReadWrite,
            0b01 => Self::ReadWrite,
            0b10 => Self::KernelReadOnly,
            _ => Self::ReadOnly,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::KernelReadWrite | Self::ReadWrite)
    }
}

/// Shareability domain, `SH[1:0]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Shareability {
    NonShareable = 0b00,
    /// Reserved encoding; behaves as non-shareable on most cores.
    Reserved = 0b01,
    OuterShareable = 0b10,
    InnerShareable = 0b11,
}

impl Shareability {
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0b00 => Self::NonShareable,
            0b01 => Self::Reserved,
            0b10 => Self::OuterShareable,
            _ => Self::InnerShareable,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_shareable(self) -> bool {
        matches!(self, Self::OuterShareable | Self::InnerShareable)
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::NonShareable => "NSH",
            Self::Reserved => "SH?",
            Self::OuterShareable => "OSH",
            Self::InnerShareable => "ISH",
        }
    }
}

/// Attribute set of a block or page mapping.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[allow(clippy::struct_excessive_bools)]
pub struct MemoryAttributes {
    pub memory_type: MemoryType,
    pub access: AccessPermission,
    pub shareability: Shareability,
    pub non_secure: bool,
    pub not_global: bool,
    pub privileged_execute_never: bool,
    pub user_execute_never: bool,
}

impl MemoryAttributes {
    /// Cacheable RAM: normal write-back, inner shareable, kernel read/write,
    /// executable.
    pub const NORMAL: Self = Self {
        memory_type: MemoryType::NormalWriteBack,
        access: AccessPermission::KernelReadWrite,
        shareability: Shareability::InnerShareable,
        non_secure: false,
        not_global: false,
        privileged_execute_never: false,
        user_execute_never: false,
    };

    /// Strongly ordered MMIO, kernel read/write, non-shareable.
    ///
    /// Leaves both execute-never bits clear, as used for the boot-time
    /// device window.
    pub const DEVICE: Self = Self {
        memory_type: MemoryType::DeviceNgnrne,
        access: AccessPermission::KernelReadWrite,
        shareability: Shareability::NonShareable,
        non_secure: false,
        not_global: false,
        privileged_execute_never: false,
        user_execute_never: false,
    };

    /// [`DEVICE`](Self::DEVICE) with `PXN` and `UXN` set.
    pub const DEVICE_EXECUTE_NEVER: Self = Self::DEVICE.with_execute_never();

    /// Same attributes with both execute-never bits set.
    #[inline]
    #[must_use]
    pub const fn with_execute_never(mut self) -> Self {
        self.privileged_execute_never = true;
        self.user_execute_never = true;
        self
    }

    /// `true` if neither EL1 nor EL0 may execute from the mapping.
    #[inline]
    #[must_use]
    pub const fn is_execute_never(self) -> bool {
        self.privileged_execute_never && self.user_execute_never
    }

    #[inline]
    #[must_use]
    pub const fn is_device(self) -> bool {
        self.memory_type.is_device()
    }

    /// Default attributes for a physical address.
    ///
    /// Ranges are tested in order; the first hit wins:
    ///
    /// | Range                         | Attributes                        |
    /// |-------------------------------|-----------------------------------|
    /// | kernel RAM                    | [`NORMAL`](Self::NORMAL)          |
    /// | local mailbox page            | [`DEVICE_EXECUTE_NEVER`](Self::DEVICE_EXECUTE_NEVER) |
    /// | framebuffer                   | [`DEVICE_EXECUTE_NEVER`](Self::DEVICE_EXECUTE_NEVER) |
    /// | SoC peripherals               | [`DEVICE_EXECUTE_NEVER`](Self::DEVICE_EXECUTE_NEVER) |
    /// | anything else                 | [`NORMAL`](Self::NORMAL)          |
    ///
    /// ### Examples
    /// ```rust
    /// # use kernel_vmem::MemoryAttributes;
    /// # use kernel_memory_addresses::PhysicalAddress;
    /// let uart = MemoryAttributes::classify(PhysicalAddress::new(0x3F20_1000));
    /// assert!(uart.is_device() && uart.is_execute_never());
    /// assert_eq!(MemoryAttributes::classify(PhysicalAddress::new(0x10_0000)), MemoryAttributes::NORMAL);
    /// ```
    #[must_use]
    pub const fn classify(pa: PhysicalAddress) -> Self {
        let pa = pa.as_u64();
        if in_range(pa, KERNEL_RAM_START, KERNEL_RAM_END) {
            Self::NORMAL
        } else if in_range(pa, LOCAL_MAILBOX_START, LOCAL_MAILBOX_END)
            || in_range(pa, FRAMEBUFFER_START, FRAMEBUFFER_END)
            || in_range(pa, PERIPHERAL_BASE, PERIPHERAL_END)
        {
            Self::DEVICE_EXECUTE_NEVER
        } else {
            Self::NORMAL
        }
    }
}

#[inline]
const fn in_range(pa: u64, start: u64, end: u64) -> bool {
    pa >= start && pa < end
}

impl fmt::Display for MemoryAttributes {
    /// Compact form, e.g. `Normal|ISH|RW|X` or `Device-nGnRnE|NSH|RW|XN`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = if self.access.is_writable() { "RW" } else { "RO" };
        let exec = match (self.privileged_execute_never, self.user_execute_never) {
            (false, false) => "X",
            (true, true) => "XN",
            (true, false) => "PXN",
            (false, true) => "UXN",
        };
        write!(
            f,
            "{}|{}|{}|{}",
            self.memory_type.as_str(),
            self.shareability.as_str(),
            access,
            exec
        )?;
        if self.access.into_bits() & 0b01 != 0 {
            f.write_str("|EL0")?;
        }
        if self.not_global {
            f.write_str("|nG")?;
        }
        Ok(())
    }
}
