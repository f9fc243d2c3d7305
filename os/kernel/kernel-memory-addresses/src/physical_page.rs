use crate::{PageSize, PhysicalAddress};
use core::fmt;
use core::marker::PhantomData;

/// Physical memory page base for size `S`.
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pp = PhysicalPage::<Size2M>::from_addr(PhysicalAddress::new(0x4012_3456));
/// assert_eq!(pp.base().as_u64(), 0x4000_0000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage<S: PageSize> {
    base: u64,
    _size: PhantomData<S>,
}

impl<S: PageSize> PhysicalPage<S> {
    /// The page containing `p` (low bits are dropped).
    #[inline]
    #[must_use]
    pub const fn from_addr(p: PhysicalAddress) -> Self {
        Self {
            base: p.as_u64() & !S::MASK,
            _size: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.base)
    }

    /// Reattach an in-page offset (masked to the page size).
    #[inline]
    #[must_use]
    pub const fn join(self, offset: u64) -> PhysicalAddress {
        PhysicalAddress::new(self.base | (offset & S::MASK))
    }
}

impl<S: PageSize> fmt::Display for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.base)
    }
}

impl<S: PageSize> fmt::Debug for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage<{}>({:#018X})", S::as_str(), self.base)
    }
}
