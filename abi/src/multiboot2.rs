//! Multiboot2 protocol constants.

use core::mem::size_of;

/// Header magic placed in the `.multiboot2` section.
pub const MULTIBOOT2_HEADER_MAGIC: u32 = 0xE852_50D6;

/// Header architecture field: 32-bit protected mode i386.
pub const MULTIBOOT2_ARCH_I386: u32 = 0;

/// Value the loader leaves in EAX.
pub const MULTIBOOT2_BOOTLOADER_MAGIC: u32 = 0x36D7_6289;

/// Boot information tags are padded to this alignment.
pub const MULTIBOOT2_TAG_ALIGN: usize = 8;

pub const MULTIBOOT2_TAG_END: u32 = 0;
pub const MULTIBOOT2_TAG_CMDLINE: u32 = 1;
pub const MULTIBOOT2_TAG_BOOTLOADER_NAME: u32 = 2;
pub const MULTIBOOT2_TAG_BASIC_MEMINFO: u32 = 4;

/// Checksum making the four header fields sum to zero.
pub const fn multiboot2_header_checksum(header_length: u32) -> u32 {
    0u32.wrapping_sub(
        MULTIBOOT2_HEADER_MAGIC
            .wrapping_add(MULTIBOOT2_ARCH_I386)
            .wrapping_add(header_length),
    )
}

/// Smallest valid header: the fixed fields followed by an end tag.
#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Multiboot2Header {
    pub magic: u32,
    pub architecture: u32,
    pub header_length: u32,
    pub checksum: u32,
    pub end_tag_type: u16,
    pub end_tag_flags: u16,
    pub end_tag_size: u32,
}

impl Multiboot2Header {
    pub const fn new() -> Self {
        let len = size_of::<Self>() as u32;
        Self {
            magic: MULTIBOOT2_HEADER_MAGIC,
            architecture: MULTIBOOT2_ARCH_I386,
            header_length: len,
            checksum: multiboot2_header_checksum(len),
            end_tag_type: MULTIBOOT2_TAG_END as u16,
            end_tag_flags: 0,
            end_tag_size: 8,
        }
    }
}

impl Default for Multiboot2Header {
    fn default() -> Self {
        Self::new()
    }
}
