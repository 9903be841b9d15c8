//! Per-vector interrupt handler table.
//!
//! One slot per IDT vector. Slots are written by the foreground with
//! interrupts masked and read by the dispatcher in interrupt context.
//! Handlers are invoked after the slot has been copied out, so a handler
//! may itself register or remove handlers.

use core::ffi::c_void;
use core::ptr;

use keel_abi::{EXCEPTION_VECTOR_COUNT, IDT_ENTRIES, IrqError};
use keel_lib::{InterruptFrame, IrqCell};

/// Handler signature. `context` is the pointer given at registration.
pub type InterruptHandler = fn(frame: &mut InterruptFrame, context: *mut c_void);

#[derive(Clone, Copy)]
pub enum VectorSlot {
    Empty,
    Installed {
        handler: InterruptHandler,
        context: *mut c_void,
        name: &'static str,
    },
}

#[derive(Clone, Copy)]
struct VectorEntry {
    slot: VectorSlot,
    hits: u32,
}

impl VectorEntry {
    const fn new() -> Self {
        Self {
            slot: VectorSlot::Empty,
            hits: 0,
        }
    }
}

struct Slots([VectorEntry; IDT_ENTRIES]);

// SAFETY: contexts are opaque tokens only ever handed back to the handler
// that registered them, on the one CPU.
unsafe impl Send for Slots {}

pub struct HandlerTable {
    slots: IrqCell<Slots>,
}

impl HandlerTable {
    pub const fn new() -> Self {
        Self {
            slots: IrqCell::new(Slots([VectorEntry::new(); IDT_ENTRIES])),
        }
    }

    /// Install `handler` on `vector`, replacing any previous occupant.
    pub fn register(
        &self,
        vector: u8,
        handler: InterruptHandler,
        context: *mut c_void,
        name: &'static str,
    ) {
        self.slots.with(|slots| {
            slots.0[vector as usize] = VectorEntry {
                slot: VectorSlot::Installed {
                    handler,
                    context,
                    name,
                },
                hits: 0,
            };
        });
    }

    pub fn unregister(&self, vector: u8) {
        self.slots.with(|slots| slots.0[vector as usize] = VectorEntry::new());
    }

    pub fn slot(&self, vector: u8) -> VectorSlot {
        self.slots.with(|slots| slots.0[vector as usize].slot)
    }

    pub fn is_installed(&self, vector: u8) -> bool {
        matches!(self.slot(vector), VectorSlot::Installed { .. })
    }

    /// Times the handler on `vector` has run since it was installed.
    pub fn hits(&self, vector: u8) -> u32 {
        self.slots.with(|slots| slots.0[vector as usize].hits)
    }

    /// Call the handler for `frame.vector`, if any. Returns whether one ran.
    pub fn invoke(&self, frame: &mut InterruptFrame) -> bool {
        let Ok(vector) = u8::try_from(frame.vector) else {
            return false;
        };
        let slot = self.slots.with(|slots| {
            let entry = &mut slots.0[vector as usize];
            if let VectorSlot::Installed { .. } = entry.slot {
                entry.hits = entry.hits.wrapping_add(1);
            }
            entry.slot
        });
        match slot {
            VectorSlot::Installed {
                handler, context, ..
            } => {
                handler(frame, context);
                true
            }
            VectorSlot::Empty => false,
        }
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide table consulted by the interrupt dispatcher.
pub static HANDLERS: HandlerTable = HandlerTable::new();

pub fn register_handler(
    vector: u8,
    handler: InterruptHandler,
    context: *mut c_void,
    name: &'static str,
) {
    HANDLERS.register(vector, handler, context, name);
}

pub fn unregister_handler(vector: u8) {
    HANDLERS.unregister(vector);
}

/// `register_handler` restricted to CPU exception vectors.
pub fn register_exception_handler(
    vector: u8,
    handler: InterruptHandler,
    context: *mut c_void,
    name: &'static str,
) -> Result<(), IrqError> {
    if vector >= EXCEPTION_VECTOR_COUNT {
        return Err(IrqError::InvalidVector);
    }
    HANDLERS.register(vector, handler, context, name);
    Ok(())
}

/// Context value for handlers that need none.
pub const NO_CONTEXT: *mut c_void = ptr::null_mut();
