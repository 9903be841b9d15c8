//! Architecture-specific constants.
//!
//! Only IA-32 protected mode is supported.

pub mod i386;
