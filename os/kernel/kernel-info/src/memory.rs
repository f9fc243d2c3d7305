//! # Memory Layout

/// First byte of the kernel image and of general-purpose RAM.
///
/// Everything below belongs to the firmware's spin table and ATAGs/DTB area.
pub const KERNEL_RAM_START: u64 = 0x0008_0000;

/// End (exclusive) of general-purpose RAM as seen by the classifier.
///
/// The GPU carve-out starts here; it holds the framebuffer.
pub const KERNEL_RAM_END: u64 = FRAMEBUFFER_START;

/// Framebuffer window handed out by the VideoCore mailbox.
pub const FRAMEBUFFER_START: u64 = 0x3C00_0000;

/// End (exclusive) of the framebuffer window.
pub const FRAMEBUFFER_END: u64 = PERIPHERAL_BASE;

/// Base of the BCM2837 SoC peripheral block (GPIO, UART, mailbox, ...).
pub const PERIPHERAL_BASE: u64 = 0x3F00_0000;

/// End (exclusive) of the SoC peripheral block.
pub const PERIPHERAL_END: u64 = 0x4000_0000;

/// PL011 UART data register block.
pub const PL011_UART_BASE: u64 = PERIPHERAL_BASE + 0x20_1000;

/// ARM local peripherals: per-core timers, interrupt routing and the
/// core-to-core mailboxes.
pub const LOCAL_MAILBOX_START: u64 = 0x4000_0000;

/// End (exclusive) of the local mailbox page.
pub const LOCAL_MAILBOX_END: u64 = 0x4000_1000;

/// Everything below this address is identity-mapped as "low memory".
pub const LOW_MEMORY_END: u64 = DEVICE_WINDOW_START;

/// Start of the identity-mapped device window.
pub const DEVICE_WINDOW_START: u64 = 0x4000_0000;

/// Size of the identity-mapped device window (one level 1 slot).
pub const DEVICE_WINDOW_SIZE: u64 = 0x4000_0000;

/// End (exclusive) of the device window.
pub const DEVICE_WINDOW_END: u64 = DEVICE_WINDOW_START + DEVICE_WINDOW_SIZE;

/// Leading region mapped with 4 KiB pages at boot so that the null page can
/// later be retracted on its own.
pub const FINE_GRAINED_BOOT_BYTES: u64 = 0x20_0000;

/// Size of the page that is retracted for null-pointer trapping.
pub const NULL_PAGE_BYTES: u64 = 0x1000;

/// Bytes at the bottom of the address space that `map_range_skip_null`
/// leaves out of the requested extent.
///
/// Chosen to exclude address 0 while keeping the spin-table mailboxes
/// ([`SPIN_TABLE_MAILBOXES`]) inside the requested range.
pub const NULL_GUARD_BOUNDARY: u64 = 0x80;

/// Spin-table release addresses polled by secondary cores 1 to 3 while
/// parked by the firmware.
pub const SPIN_TABLE_MAILBOXES: [u64; 3] = [0xE0, 0xE8, 0xF0];

const _: () = {
    assert!(KERNEL_RAM_START < KERNEL_RAM_END);
    assert!(FRAMEBUFFER_END == PERIPHERAL_BASE);
    assert!(PERIPHERAL_END == DEVICE_WINDOW_START);
    assert!(LOCAL_MAILBOX_START == DEVICE_WINDOW_START);
    assert!(DEVICE_WINDOW_START.is_multiple_of(0x4000_0000));
    assert!(DEVICE_WINDOW_SIZE.is_multiple_of(0x20_0000));
    assert!(LOW_MEMORY_END.is_multiple_of(0x20_0000));
    assert!(FINE_GRAINED_BOOT_BYTES.is_multiple_of(0x20_0000));
    assert!(NULL_GUARD_BOUNDARY < NULL_PAGE_BYTES);
    assert!(SPIN_TABLE_MAILBOXES[0] >= NULL_GUARD_BOUNDARY);
    assert!(SPIN_TABLE_MAILBOXES[2] < NULL_PAGE_BYTES);
};
