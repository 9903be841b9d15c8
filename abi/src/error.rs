//! Error types returned by kernel bring-up and registration paths.
//!
//! Interrupt context never produces these; they flow out of the
//! foreground initialization code only.

use core::fmt;

/// Implement `as_str()` and `Display` for a kernel error enum.
macro_rules! impl_kernel_error {
    ($ty:ty, { $($pat:pat => $msg:literal),* $(,)? }) => {
        impl $ty {
            /// Short static description of the error.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($pat => $msg,)*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Failures detected while bringing the machine up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// The loader did not identify itself as Multiboot2; carries the value found.
    BadMagic(u32),
    /// No boot information pointer was supplied.
    MissingBootInfo,
    /// A boot information tag ran past the end of the structure.
    MalformedBootInfo,
    /// The kernel image reaches into the fixed paging frames; carries its end.
    ImageOverlapsPaging(u32),
    /// Heap placement failed.
    Heap(HeapError),
    /// An interrupt handler could not be installed.
    Irq(IrqError),
}

impl_kernel_error!(BootError, {
    BootError::BadMagic(_) => "bad multiboot2 magic",
    BootError::MissingBootInfo => "missing boot information",
    BootError::MalformedBootInfo => "malformed boot information",
    BootError::ImageOverlapsPaging(_) => "kernel image overlaps paging structures",
    BootError::Heap(_) => "kernel heap initialization failed",
    BootError::Irq(_) => "interrupt handler installation failed",
});

impl From<HeapError> for BootError {
    fn from(err: HeapError) -> Self {
        Self::Heap(err)
    }
}

impl From<IrqError> for BootError {
    fn from(err: IrqError) -> Self {
        Self::Irq(err)
    }
}

/// Handler table registration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqError {
    /// IRQ line outside 0..16.
    InvalidLine,
    /// Vector outside the range accepted by the call.
    InvalidVector,
}

impl_kernel_error!(IrqError, {
    IrqError::InvalidLine => "invalid IRQ line",
    IrqError::InvalidVector => "invalid interrupt vector",
});

/// Kernel heap placement errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// `init_kernel_memory` already ran.
    AlreadyInitialized,
    /// Heap or pheap would extend past the identity-mapped window.
    OutOfWindow,
    /// Heap or pheap would overlap the paging structures.
    Overlap,
    /// Requested pheap slot count exceeds the descriptor array.
    TooManyPages,
}

impl_kernel_error!(HeapError, {
    HeapError::AlreadyInitialized => "heap already initialized",
    HeapError::OutOfWindow => "heap outside identity-mapped window",
    HeapError::Overlap => "heap overlaps paging structures",
    HeapError::TooManyPages => "too many pheap pages",
});
