//! Multiboot2 boot information.
//!
//! The structure is an 8-byte fixed part (`total_size`, reserved) followed
//! by tags, each `type: u32, size: u32, payload`, padded to 8 bytes and
//! closed by an end tag. Only the tags this kernel uses are decoded, and
//! they are copied out: the loader may have put the structure anywhere in
//! physical memory, including ranges paging or the heap later take over.

use keel_abi::{
    BootError, MULTIBOOT2_BOOTLOADER_MAGIC, MULTIBOOT2_TAG_ALIGN, MULTIBOOT2_TAG_BASIC_MEMINFO,
    MULTIBOOT2_TAG_BOOTLOADER_NAME, MULTIBOOT2_TAG_CMDLINE, MULTIBOOT2_TAG_END,
};
use keel_lib::align_up;
use keel_lib::klog::KlogLevel;

const FIXED_PART: usize = 8;
const TAG_HEADER: usize = 8;

pub const CMDLINE_MAX: usize = 256;
pub const LOADER_NAME_MAX: usize = 64;

/// Inline string copied out of a boot tag. Longer input is cut at a char
/// boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BootString<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> BootString<N> {
    pub fn new(s: &str) -> Self {
        let mut len = s.len().min(N);
        while !s.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0; N];
        bytes[..len].copy_from_slice(&s.as_bytes()[..len]);
        Self { bytes, len }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }
}

impl<const N: usize> core::fmt::Debug for BootString<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self.as_str(), f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BasicMemInfo {
    /// KiB of conventional memory below 1 MiB.
    pub mem_lower_kib: u32,
    /// KiB of memory starting at 1 MiB.
    pub mem_upper_kib: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootInfo {
    pub total_size: u32,
    cmdline: Option<BootString<CMDLINE_MAX>>,
    bootloader_name: Option<BootString<LOADER_NAME_MAX>>,
    pub memory: Option<BasicMemInfo>,
}

pub fn check_magic(magic: u32) -> Result<(), BootError> {
    if magic == MULTIBOOT2_BOOTLOADER_MAGIC {
        Ok(())
    } else {
        Err(BootError::BadMagic(magic))
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Tag string payloads are NUL terminated; invalid UTF-8 is dropped.
fn tag_str(payload: &[u8]) -> Option<&str> {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    core::str::from_utf8(&payload[..end]).ok()
}

impl BootInfo {
    pub fn parse(bytes: &[u8]) -> Result<Self, BootError> {
        let total = read_u32(bytes, 0).ok_or(BootError::MalformedBootInfo)? as usize;
        if total < FIXED_PART || total > bytes.len() {
            return Err(BootError::MalformedBootInfo);
        }
        let bytes = &bytes[..total];

        let mut info = BootInfo {
            total_size: total as u32,
            ..BootInfo::default()
        };
        let mut offset = FIXED_PART;
        while offset + TAG_HEADER <= total {
            let tag = read_u32(bytes, offset).ok_or(BootError::MalformedBootInfo)?;
            let size = read_u32(bytes, offset + 4).ok_or(BootError::MalformedBootInfo)? as usize;
            if size < TAG_HEADER || offset + size > total {
                return Err(BootError::MalformedBootInfo);
            }
            let payload = &bytes[offset + TAG_HEADER..offset + size];
            match tag {
                MULTIBOOT2_TAG_END => return Ok(info),
                MULTIBOOT2_TAG_CMDLINE => info.cmdline = tag_str(payload).map(BootString::new),
                MULTIBOOT2_TAG_BOOTLOADER_NAME => {
                    info.bootloader_name = tag_str(payload).map(BootString::new)
                }
                MULTIBOOT2_TAG_BASIC_MEMINFO => {
                    if let (Some(lower), Some(upper)) = (read_u32(payload, 0), read_u32(payload, 4)) {
                        info.memory = Some(BasicMemInfo {
                            mem_lower_kib: lower,
                            mem_upper_kib: upper,
                        });
                    }
                }
                _ => {}
            }
            offset += align_up(size, MULTIBOOT2_TAG_ALIGN);
        }
        // Ran off the end without an end tag.
        Err(BootError::MalformedBootInfo)
    }

    /// Copy what the kernel needs out of the structure the loader left at
    /// `info`. Nothing refers back to it afterwards.
    ///
    /// # Safety
    /// `info` must be null or point to a readable Multiboot2 information
    /// structure, so this must run before paging is enabled.
    pub unsafe fn from_raw(info: *const u8) -> Result<BootInfo, BootError> {
        if info.is_null() {
            return Err(BootError::MissingBootInfo);
        }
        // SAFETY: the caller guarantees `info` addresses a valid structure,
        // whose first field is its own length. The slice does not outlive
        // this call.
        let bytes = unsafe {
            let total = (info as *const u32).read_unaligned() as usize;
            core::slice::from_raw_parts(info, total.max(FIXED_PART))
        };
        BootInfo::parse(bytes)
    }

    pub fn cmdline(&self) -> Option<&str> {
        self.cmdline.as_ref().map(BootString::as_str)
    }

    pub fn bootloader_name(&self) -> Option<&str> {
        self.bootloader_name.as_ref().map(BootString::as_str)
    }

    /// Whether `flag` appears as a whole token on the command line.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.cmdline()
            .is_some_and(|cmdline| cmdline.split_ascii_whitespace().any(|t| t == flag))
    }

    /// Value of the last `klog=<level>` token on the command line.
    pub fn klog_level(&self) -> Option<KlogLevel> {
        self.cmdline()?
            .split_ascii_whitespace()
            .filter_map(|token| token.strip_prefix("klog="))
            .filter_map(KlogLevel::from_name)
            .last()
    }
}
