//! Cascaded 8259A programmable interrupt controllers.
//!
//! The generic functions take any [`PortIo`]; the `pic_*` wrappers drive
//! the real controllers.

use core::sync::atomic::{AtomicU8, Ordering};

use keel_abi::{
    IRQ_BASE_VECTOR, IRQ_SLAVE_BASE_VECTOR, PIC_CASCADE_IRQ, PIC_EOI, PIC_ICW1_INIT_ICW4,
    PIC_ICW3_MASTER_HAS_SLAVE_ON_IR2, PIC_ICW3_SLAVE_CASCADE_ID, PIC_ICW4_8086,
    PIC_OCW3_READ_ISR, Port,
};
use keel_lib::io::PortIo;
use keel_lib::klog_debug;

use crate::hardware_ports;

static MASTER_OFFSET: AtomicU8 = AtomicU8::new(0x08);
static SLAVE_OFFSET: AtomicU8 = AtomicU8::new(0x70);

#[inline]
fn line_port(irq: u8) -> (Port, u8) {
    if irq < 8 {
        (Port::PIC1_DATA, irq)
    } else {
        (Port::PIC2_DATA, irq - 8)
    }
}

/// Reinitialize both PICs so IRQ0-7 land on `master_offset..` and IRQ8-15
/// on `slave_offset..`. Masks in force before the call are restored.
pub fn remap<P: PortIo>(io: &mut P, master_offset: u8, slave_offset: u8) {
    let master_mask = io.inb(Port::PIC1_DATA);
    let slave_mask = io.inb(Port::PIC2_DATA);

    // ICW1: start initialization, expect ICW4.
    io.outb(Port::PIC1_COMMAND, PIC_ICW1_INIT_ICW4);
    io.io_wait();
    io.outb(Port::PIC2_COMMAND, PIC_ICW1_INIT_ICW4);
    io.io_wait();
    // ICW2: vector offsets.
    io.outb(Port::PIC1_DATA, master_offset);
    io.io_wait();
    io.outb(Port::PIC2_DATA, slave_offset);
    io.io_wait();
    // ICW3: cascade wiring on IR2.
    io.outb(Port::PIC1_DATA, PIC_ICW3_MASTER_HAS_SLAVE_ON_IR2);
    io.io_wait();
    io.outb(Port::PIC2_DATA, PIC_ICW3_SLAVE_CASCADE_ID);
    io.io_wait();
    // ICW4: 8086 mode.
    io.outb(Port::PIC1_DATA, PIC_ICW4_8086);
    io.io_wait();
    io.outb(Port::PIC2_DATA, PIC_ICW4_8086);
    io.io_wait();

    io.outb(Port::PIC1_DATA, master_mask);
    io.outb(Port::PIC2_DATA, slave_mask);
}

/// Acknowledge `irq`: slave first when it came through the cascade, then
/// always the master.
pub fn send_eoi<P: PortIo>(io: &mut P, irq: u8) {
    if irq >= 8 {
        io.outb(Port::PIC2_COMMAND, PIC_EOI);
    }
    io.outb(Port::PIC1_COMMAND, PIC_EOI);
}

pub fn set_mask<P: PortIo>(io: &mut P, irq: u8) {
    let (port, bit) = line_port(irq);
    let value = io.inb(port) | (1 << bit);
    io.outb(port, value);
}

pub fn clear_mask<P: PortIo>(io: &mut P, irq: u8) {
    let (port, bit) = line_port(irq);
    let value = io.inb(port) & !(1 << bit);
    io.outb(port, value);
}

pub fn write_masks<P: PortIo>(io: &mut P, master: u8, slave: u8) {
    io.outb(Port::PIC1_DATA, master);
    io.outb(Port::PIC2_DATA, slave);
}

/// Combined in-service register, slave in the high byte.
pub fn read_isr<P: PortIo>(io: &mut P) -> u16 {
    io.outb(Port::PIC1_COMMAND, PIC_OCW3_READ_ISR);
    io.outb(Port::PIC2_COMMAND, PIC_OCW3_READ_ISR);
    ((io.inb(Port::PIC2_COMMAND) as u16) << 8) | io.inb(Port::PIC1_COMMAND) as u16
}

/// IRQ7 and IRQ15 are raised spuriously when a request is withdrawn before
/// the CPU acknowledges it; such deliveries have no in-service bit.
pub fn is_spurious<P: PortIo>(io: &mut P, irq: u8) -> bool {
    if irq != 7 && irq != 15 {
        return false;
    }
    read_isr(io) & (1 << irq) == 0
}

/// Vector a remapped PIC pair delivers `irq` on.
pub const fn effective_vector(master_offset: u8, slave_offset: u8, irq: u8) -> u8 {
    if irq < 8 {
        master_offset + irq
    } else {
        slave_offset + (irq - 8)
    }
}

// =============================================================================
// Hardware entry points
// =============================================================================

pub fn pic_remap(master_offset: u8, slave_offset: u8) {
    remap(&mut hardware_ports(), master_offset, slave_offset);
    MASTER_OFFSET.store(master_offset, Ordering::Relaxed);
    SLAVE_OFFSET.store(slave_offset, Ordering::Relaxed);
    klog_debug!(
        "PIC: remapped master to 0x{:02x}, slave to 0x{:02x}",
        master_offset, slave_offset
    );
}

/// Remap onto the standard kernel vectors 0x20/0x28.
pub fn pic_remap_default() {
    pic_remap(IRQ_BASE_VECTOR, IRQ_SLAVE_BASE_VECTOR);
}

pub fn pic_send_eoi(irq: u8) {
    send_eoi(&mut hardware_ports(), irq);
}

pub fn pic_set_mask(irq: u8) {
    set_mask(&mut hardware_ports(), irq);
}

pub fn pic_clear_mask(irq: u8) {
    clear_mask(&mut hardware_ports(), irq);
}

/// Mask every line except the cascade so slave IRQs can be unmasked later.
pub fn pic_mask_all_but_cascade() {
    write_masks(&mut hardware_ports(), !(1 << PIC_CASCADE_IRQ), 0xFF);
}

pub fn pic_vector_for_irq(irq: u8) -> u8 {
    effective_vector(
        MASTER_OFFSET.load(Ordering::Relaxed),
        SLAVE_OFFSET.load(Ordering::Relaxed),
        irq,
    )
}
