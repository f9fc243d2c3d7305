//! # Stage-1 Descriptor Codec
//!
//! Packs and unpacks the 64-bit VMSAv8-64 descriptors of the 4 KiB granule.
//!
//! ## Layout
//!
//! ```text
//!  63   59 58  55 54  53  52  51  48 47                12 11  10  9 8  7 6  5  4  2  1  0
//! ┌──────┬──────┬───┬───┬───┬──────┬────────────────────┬──┬──┬────┬────┬──┬─────┬──┬──┐
//! │ ign. │  SW  │UXN│PXN│ C │ res0 │  output address    │nG│AF│ SH │ AP │NS│ Idx │T │V │
//! └──────┴──────┴───┴───┴───┴──────┴────────────────────┴──┴──┴────┴────┴──┴─────┴──┴──┘
//! ```
//!
//! Bit 1 (`T`) disambiguates by level:
//!
//! | Level   | `V=1, T=1` | `V=1, T=0`   |
//! |---------|------------|--------------|
//! | L0      | Table      | invalid      |
//! | L1, L2  | Table      | Block        |
//! | L3      | Page       | invalid      |
//!
//! A page descriptor has the same bit pattern as a table descriptor; only the
//! depth at which it is found tells them apart. [`decode`] therefore always
//! takes the [`Level`] the slot was read from.
//!
//! ## Invariants
//!
//! - [`encode_block`] and [`encode_page`] always set the access flag.
//! - Output addresses are truncated to the granule; alignment is validated by
//!   the mapping engine, not here.

use crate::attributes::{AccessPermission, MemoryAttributes, MemoryType, Shareability};
use crate::table::Level;
use bitfield_struct::bitfield;
use core::fmt;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size2M, Size4K};

/// Raw 64-bit descriptor with typed field accessors.
///
/// No validation is performed on construction; use [`decode`] for a
/// semantic view.
#[bitfield(u64)]
#[derive(PartialEq, Eq, Hash)]
pub struct RawDescriptor {
    /// Bit 0 — valid.
    pub valid: bool,
    /// Bit 1 — table (L0–L2) or page (L3); clear for blocks.
    pub table: bool,
    /// Bits 2–4 — `AttrIndx`, the `MAIR_EL1` slot.
    #[bits(3, default = MemoryType::DeviceNgnrne)]
    pub attr_index: MemoryType,
    /// Bit 5 — non-secure output address.
    pub ns: bool,
    /// Bits 6–7 — data access permissions.
    #[bits(2, default = AccessPermission::KernelReadWrite)]
    pub ap: AccessPermission,
    /// Bits 8–9 — shareability.
    #[bits(2, default = Shareability::NonShareable)]
    pub sh: Shareability,
    /// Bit 10 — access flag.
    pub af: bool,
    /// Bit 11 — not global.
    pub ng: bool,
    /// Bits 12–47 — output address (next table, block or page) >> 12.
    #[bits(36)]
    oa_47_12: u64,
    /// Bits 48–51 — RES0 for 48-bit output addresses.
    #[bits(4)]
    __res48_51: u8,
    /// Bit 52 — contiguous hint.
    pub contiguous: bool,
    /// Bit 53 — privileged execute-never.
    pub pxn: bool,
    /// Bit 54 — unprivileged execute-never.
    pub uxn: bool,
    /// Bits 55–58 — reserved for software use.
    #[bits(4)]
    pub software: u8,
    /// Bits 59–63 — ignored by stage-1 leaf lookups (table attributes in
    /// table descriptors; unused here).
    #[bits(5)]
    __ignored59_63: u8,
}

/// Lower attribute pattern `0x401`: valid block, `AttrIndx` 0
/// (Device-nGnRnE), EL1 read/write, non-shareable, access flag.
pub const DEVICE_LOWER_ATTRIBUTES: RawDescriptor = RawDescriptor::new()
    .with_valid(true)
    .with_attr_index(MemoryType::DeviceNgnrne)
    .with_ap(AccessPermission::KernelReadWrite)
    .with_sh(Shareability::NonShareable)
    .with_af(true);

/// Mask of the output address field (bits `[47:12]`).
pub const OUTPUT_ADDRESS_MASK: u64 = 0x0000_FFFF_FFFF_F000;

/// Mask of the lower attribute field (bits `[11:0]`).
pub const LOWER_ATTRIBUTES_MASK: u64 = 0xFFF;

const _: () = assert!(DEVICE_LOWER_ATTRIBUTES.into_bits() == 0x401);

impl RawDescriptor {
    /// The output address field, as stored (4 KiB-aligned).
    #[inline]
    #[must_use]
    pub const fn output_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.oa_47_12() << 12)
    }

    /// Set the output address field; bits outside `[47:12]` are dropped.
    #[inline]
    #[must_use]
    pub const fn with_output_address(self, pa: PhysicalAddress) -> Self {
        self.with_oa_47_12((pa.as_u64() & OUTPUT_ADDRESS_MASK) >> 12)
    }

    /// Replace the attribute fields with `attrs`, keeping everything else.
    #[inline]
    #[must_use]
    pub const fn with_attributes(self, attrs: MemoryAttributes) -> Self {
        self.with_attr_index(attrs.memory_type)
            .with_ns(attrs.non_secure)
            .with_ap(attrs.access)
            .with_sh(attrs.shareability)
            .with_ng(attrs.not_global)
            .with_pxn(attrs.privileged_execute_never)
            .with_uxn(attrs.user_execute_never)
    }

    /// The attribute fields of a leaf.
    #[inline]
    #[must_use]
    pub const fn attributes(self) -> MemoryAttributes {
        MemoryAttributes {
            memory_type: self.attr_index(),
            access: self.ap(),
            shareability: self.sh(),
            non_secure: self.ns(),
            not_global: self.ng(),
            privileged_execute_never: self.pxn(),
            user_execute_never: self.uxn(),
        }
    }

    /// Replace bits `[11:0]` with [`DEVICE_LOWER_ATTRIBUTES`].
    ///
    /// Keeps the output address and the upper attributes (execute-never,
    /// contiguous, software bits).
    #[inline]
    #[must_use]
    pub const fn with_device_lower_attributes(self) -> Self {
        Self::from_bits(
            (self.into_bits() & !LOWER_ATTRIBUTES_MASK) | DEVICE_LOWER_ATTRIBUTES.into_bits(),
        )
    }
}

/// Decoded view of one descriptor slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Descriptor {
    /// Translation fault on lookup.
    Invalid,
    /// Pointer to the next-level table.
    Table(PhysicalAddress),
    /// 2 MiB (L2) or 1 GiB (L1) leaf.
    Block(PhysicalAddress, MemoryAttributes),
    /// 4 KiB leaf at L3.
    Page(PhysicalAddress, MemoryAttributes),
}

impl Descriptor {
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    #[inline]
    #[must_use]
    pub const fn is_table(self) -> bool {
        matches!(self, Self::Table(_))
    }

    /// Output or next-table address, if any.
    #[inline]
    #[must_use]
    pub const fn address(self) -> Option<PhysicalAddress> {
        match self {
            Self::Invalid => None,
            Self::Table(pa) | Self::Block(pa, _) | Self::Page(pa, _) => Some(pa),
        }
    }

    /// Leaf attributes, if this is a block or page.
    #[inline]
    #[must_use]
    pub const fn attributes(self) -> Option<MemoryAttributes> {
        match self {
            Self::Block(_, attrs) | Self::Page(_, attrs) => Some(attrs),
            Self::Invalid | Self::Table(_) => None,
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => f.write_str("Invalid"),
            Self::Table(pa) => write!(f, "Table({pa})"),
            Self::Block(pa, attrs) => write!(f, "Block({pa}, {attrs})"),
            Self::Page(pa, attrs) => write!(f, "Page({pa}, {attrs})"),
        }
    }
}

/// Table descriptor pointing at `next_table` (4 KiB-aligned).
#[inline]
#[must_use]
pub const fn encode_table(next_table: PhysicalAddress) -> RawDescriptor {
    debug_assert!(next_table.is_aligned::<Size4K>());
    RawDescriptor::new()
        .with_valid(true)
        .with_table(true)
        .with_output_address(next_table)
}

/// 2 MiB block descriptor; `pa` is truncated to 2 MiB.
#[inline]
#[must_use]
pub const fn encode_block(pa: PhysicalAddress, attrs: MemoryAttributes) -> RawDescriptor {
    RawDescriptor::new()
        .with_attributes(attrs)
        .with_valid(true)
        .with_table(false)
        .with_af(true)
        .with_output_address(pa.align_down::<Size2M>())
}

/// 4 KiB page descriptor; `pa` is truncated to 4 KiB.
#[inline]
#[must_use]
pub const fn encode_page(pa: PhysicalAddress, attrs: MemoryAttributes) -> RawDescriptor {
    RawDescriptor::new()
        .with_attributes(attrs)
        .with_valid(true)
        .with_table(true)
        .with_af(true)
        .with_output_address(pa.align_down::<Size4K>())
}

/// Interpret `raw` as read from a table at `level`.
///
/// Reserved encodings (a block at L0 or L3) decode as [`Descriptor::Invalid`],
/// matching how the walker treats them.
#[must_use]
pub const fn decode(raw: RawDescriptor, level: Level) -> Descriptor {
    if !raw.valid() {
        return Descriptor::Invalid;
    }
    match (level, raw.table()) {
        (Level::Pte, true) => Descriptor::Page(raw.output_address(), raw.attributes()),
        (Level::Pgd | Level::Pte, false) => Descriptor::Invalid,
        (_, true) => Descriptor::Table(raw.output_address()),
        (Level::Pud, false) => Descriptor::Block(
            PhysicalAddress::new(raw.output_address().as_u64() & !0x3FFF_FFFF),
            raw.attributes(),
        ),
        (Level::Pmd, false) => Descriptor::Block(
            PhysicalAddress::new(raw.output_address().as_u64() & !Size2M::MASK),
            raw.attributes(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_bits() {
        let d = encode_table(PhysicalAddress::new(0x8_3000));
        assert_eq!(d.into_bits(), 0x8_3000 | 0b11);
        assert_eq!(
            decode(d, Level::Pud),
            Descriptor::Table(PhysicalAddress::new(0x8_3000))
        );
    }

    #[test]
    fn block_bits_normal() {
        let d = encode_block(PhysicalAddress::new(0x20_0000), MemoryAttributes::NORMAL);
        // valid | AttrIndx 4 | SH inner | AF
        assert_eq!(d.into_bits(), 0x20_0000 | 0b01 | (4 << 2) | (0b11 << 8) | (1 << 10));
    }

    #[test]
    fn block_truncates_to_2m() {
        let d = encode_block(PhysicalAddress::new(0x20_1234), MemoryAttributes::NORMAL);
        assert_eq!(d.output_address().as_u64(), 0x20_0000);
    }

    #[test]
    fn page_bits_device_xn() {
        let pa = PhysicalAddress::new(0x3F20_1000);
        let d = encode_page(pa, MemoryAttributes::DEVICE_EXECUTE_NEVER);
        assert_eq!(d.into_bits(), 0x3F20_1000 | 0b11 | (1 << 10) | (1 << 53) | (1 << 54));
        assert_eq!(
            decode(d, Level::Pte),
            Descriptor::Page(pa, MemoryAttributes::DEVICE_EXECUTE_NEVER)
        );
    }

    #[test]
    fn page_and_table_share_bits() {
        let pa = PhysicalAddress::new(0x1000);
        let page = encode_page(pa, MemoryAttributes::DEVICE);
        let table = encode_table(pa);
        assert_eq!(page.into_bits() & !(1 << 10), table.into_bits());
        assert!(decode(page, Level::Pmd).is_table());
    }

    #[test]
    fn leaves_always_carry_access_flag() {
        for attrs in [
            MemoryAttributes::NORMAL,
            MemoryAttributes::DEVICE,
            MemoryAttributes::DEVICE_EXECUTE_NEVER,
        ] {
            assert!(encode_block(PhysicalAddress::zero(), attrs).af());
            assert!(encode_page(PhysicalAddress::zero(), attrs).af());
        }
    }

    #[test]
    fn reserved_encodings_decode_invalid() {
        let block = encode_block(PhysicalAddress::zero(), MemoryAttributes::NORMAL);
        assert_eq!(decode(block, Level::Pte), Descriptor::Invalid);
        assert_eq!(decode(block, Level::Pgd), Descriptor::Invalid);
        assert_eq!(decode(RawDescriptor::new(), Level::Pmd), Descriptor::Invalid);
    }

    #[test]
    fn block_round_trip_keeps_attributes() {
        let pa = PhysicalAddress::new(0x3C00_0000);
        let d = encode_block(pa, MemoryAttributes::DEVICE_EXECUTE_NEVER);
        let Descriptor::Block(out, attrs) = decode(d, Level::Pmd) else {
            panic!("expected block");
        };
        assert_eq!(out, pa);
        assert!(attrs.is_device());
        assert!(attrs.is_execute_never());
    }

    #[test]
    fn device_lower_attributes_keep_upper_bits() {
        let d = encode_block(
            PhysicalAddress::new(0x3F00_0000),
            MemoryAttributes::DEVICE_EXECUTE_NEVER,
        )
        .with_software(0b1010);
        let patched = d.with_device_lower_attributes();
        assert_eq!(patched.into_bits() & 0xFFF, 0x401);
        assert_eq!(patched.into_bits() & !0xFFF, d.into_bits() & !0xFFF);
        assert!(patched.pxn() && patched.uxn());
    }

    #[test]
    fn display() {
        let d = Descriptor::Page(PhysicalAddress::new(0x1000), MemoryAttributes::NORMAL);
        assert_eq!(
            d.to_string(),
            "Page(0x0000000000001000, Normal|ISH|RW|X)"
        );
        assert_eq!(Descriptor::Invalid.to_string(), "Invalid");
    }
}
