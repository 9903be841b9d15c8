//! Linker-provided bounds of the kernel image.

#[cfg(target_arch = "x86")]
mod externs {
    unsafe extern "C" {
        pub(crate) static _kernel_start: u8;
        pub(crate) static _kernel_end: u8;
    }
}

/// `[start, end)` of the loaded image.
#[cfg(target_arch = "x86")]
#[inline]
pub fn kernel_bounds() -> (usize, usize) {
    // SAFETY: only the addresses of the symbols are taken.
    unsafe {
        (
            &raw const externs::_kernel_start as usize,
            &raw const externs::_kernel_end as usize,
        )
    }
}

/// Hosted builds have no image; report an empty one at the load address.
#[cfg(not(target_arch = "x86"))]
#[inline]
pub fn kernel_bounds() -> (usize, usize) {
    let load = keel_abi::KERNEL_LOAD_ADDRESS as usize;
    (load, load)
}

pub fn kernel_image_end() -> usize {
    kernel_bounds().1
}
