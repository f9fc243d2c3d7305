use crate::{PageSize, PhysicalPage};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical memory address.
///
/// Denotes addresses on the physical bus (RAM, MMIO, translation tables) and
/// prevents accidental VA↔PA mix-ups.
///
/// ### Notes
/// - Descriptors store a **granule-aligned** output address plus attribute
///   bits; use [`page`](Self::page) / [`offset`](Self::offset) to reason about
///   base vs. offset explicitly.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x3F20_1042);
/// assert_eq!(pa.page::<Size4K>().base().as_u64(), 0x3F20_1000);
/// assert_eq!(pa.offset::<Size4K>(), 0x42);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    /// Physical address of an object in an identity-mapped (or not yet
    /// translated) address space.
    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self::new(ptr.addr() as u64)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The page of size `S` that contains this address.
    #[inline]
    #[must_use]
    pub const fn page<S: PageSize>(self) -> PhysicalPage<S> {
        PhysicalPage::from_addr(self)
    }

    /// Offset of this address within its page of size `S`.
    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> u64 {
        self.0 & S::MASK
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.offset::<S>() == 0
    }

    #[inline]
    #[must_use]
    pub const fn align_down<S: PageSize>(self) -> Self {
        Self(self.0 & !S::MASK)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl<S> From<PhysicalPage<S>> for PhysicalAddress
where
    S: PageSize,
{
    fn from(value: PhysicalPage<S>) -> Self {
        value.base()
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
