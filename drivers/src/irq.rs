use core::ffi::c_void;
use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use keel_abi::{IRQ_BASE_VECTOR, IRQ_LINES, IrqError, irq_vector, is_irq_vector};
use keel_lib::io::PortIo;
use keel_lib::{InterruptFrame, klog_debug, klog_info, klog_warn};

use crate::hardware_ports;
use crate::pic;
use crate::vectors::{HANDLERS, HandlerTable, InterruptHandler};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IrqStats {
    /// Deliveries acknowledged on this line, spurious ones excluded.
    pub count: u32,
    pub spurious: u32,
}

/// What the dispatcher did with one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqOutcome {
    Handled,
    Unhandled,
    Spurious,
    /// Vector outside 32..48; nothing was acknowledged.
    Rejected,
}

static IRQ_COUNTS: [AtomicU32; IRQ_LINES] = [const { AtomicU32::new(0) }; IRQ_LINES];
static IRQ_SPURIOUS: [AtomicU32; IRQ_LINES] = [const { AtomicU32::new(0) }; IRQ_LINES];
static UNHANDLED_REPORTED: AtomicU16 = AtomicU16::new(0);

fn log_unhandled_irq(line: u8) {
    let bit = 1u16 << line;
    if UNHANDLED_REPORTED.fetch_or(bit, Ordering::Relaxed) & bit == 0 {
        klog_debug!("IRQ: no handler for line {} (vector {})", line, irq_vector(line));
    }
}

/// Core IRQ path: acknowledge first, then run the handler.
///
/// The EOI is issued before the handler so that a handler which re-enables
/// interrupts (e.g. to sleep) still receives further IRQs on its line.
/// Spurious IRQ7/IRQ15 deliveries are acknowledged like any other but never
/// reach the registered handler.
pub fn dispatch_irq<P: PortIo>(
    io: &mut P,
    table: &HandlerTable,
    frame: &mut InterruptFrame,
) -> IrqOutcome {
    if !is_irq_vector(frame.vector) {
        klog_warn!("IRQ: dispatcher called with vector {}", frame.vector);
        return IrqOutcome::Rejected;
    }
    let line = (frame.vector - IRQ_BASE_VECTOR as u32) as u8;

    let spurious = pic::is_spurious(io, line);
    pic::send_eoi(io, line);

    if spurious {
        IRQ_SPURIOUS[line as usize].fetch_add(1, Ordering::Relaxed);
        return IrqOutcome::Spurious;
    }
    IRQ_COUNTS[line as usize].fetch_add(1, Ordering::Relaxed);

    if table.invoke(frame) {
        IrqOutcome::Handled
    } else {
        log_unhandled_irq(line);
        IrqOutcome::Unhandled
    }
}

/// Entry point used by the interrupt trampoline for vectors 32..48.
pub fn irq_dispatch(frame: &mut InterruptFrame) {
    dispatch_irq(&mut hardware_ports(), &HANDLERS, frame);
}

/// Remap the PICs onto 32..48 and mask every line but the cascade.
pub fn irq_init() {
    pic::pic_remap_default();
    pic::pic_mask_all_but_cascade();
    klog_info!(
        "IRQ: PIC remapped to vectors {}..{}",
        IRQ_BASE_VECTOR,
        IRQ_BASE_VECTOR as usize + IRQ_LINES
    );
}

/// Install `handler` for legacy IRQ `line` and unmask the line.
pub fn irq_install_handler(
    line: u8,
    handler: InterruptHandler,
    context: *mut c_void,
    name: &'static str,
) -> Result<(), IrqError> {
    if line as usize >= IRQ_LINES {
        return Err(IrqError::InvalidLine);
    }
    HANDLERS.register(irq_vector(line), handler, context, name);
    UNHANDLED_REPORTED.fetch_and(!(1u16 << line), Ordering::Relaxed);
    pic::pic_clear_mask(line);
    klog_debug!("IRQ: installed '{}' on line {}", name, line);
    Ok(())
}

/// Mask `line` and drop its handler.
pub fn irq_uninstall_handler(line: u8) -> Result<(), IrqError> {
    if line as usize >= IRQ_LINES {
        return Err(IrqError::InvalidLine);
    }
    pic::pic_set_mask(line);
    HANDLERS.unregister(irq_vector(line));
    Ok(())
}

pub fn irq_get_stats(line: u8) -> Option<IrqStats> {
    if line as usize >= IRQ_LINES {
        return None;
    }
    Some(IrqStats {
        count: IRQ_COUNTS[line as usize].load(Ordering::Relaxed),
        spurious: IRQ_SPURIOUS[line as usize].load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;

    use keel_abi::{PIC_EOI, Port};
    use keel_lib::io::mock::RecordingPorts;

    use super::*;
    use crate::vectors::NO_CONTEXT;

    // Each test owns distinct IRQ lines: the stats counters are global.

    struct OrderLog<'a> {
        log: &'a RefCell<Vec<&'static str>>,
    }

    impl PortIo for OrderLog<'_> {
        fn outb(&mut self, port: Port, value: u8) {
            if value == PIC_EOI {
                let what = if port == Port::PIC1_COMMAND { "eoi-master" } else { "eoi-slave" };
                self.log.borrow_mut().push(what);
            }
        }

        fn inb(&mut self, _: Port) -> u8 {
            0
        }

        fn outw(&mut self, _: Port, _: u16) {}

        fn inw(&mut self, _: Port) -> u16 {
            0
        }
    }

    fn log_call(_: &mut InterruptFrame, context: *mut c_void) {
        let log = unsafe { &*(context as *const RefCell<Vec<&'static str>>) };
        log.borrow_mut().push("handler");
    }

    #[test]
    fn eoi_precedes_handler() {
        let log = RefCell::new(Vec::new());
        let table = HandlerTable::new();
        let ctx = &log as *const _ as *mut c_void;
        table.register(irq_vector(3), log_call, ctx, "t");
        table.register(irq_vector(10), log_call, ctx, "t");

        let mut frame = InterruptFrame::synthetic(irq_vector(3) as u32, 0);
        let outcome = dispatch_irq(&mut OrderLog { log: &log }, &table, &mut frame);
        assert_eq!(outcome, IrqOutcome::Handled);
        assert_eq!(*log.borrow(), vec!["eoi-master", "handler"]);

        log.borrow_mut().clear();
        let mut frame = InterruptFrame::synthetic(irq_vector(10) as u32, 0);
        dispatch_irq(&mut OrderLog { log: &log }, &table, &mut frame);
        assert_eq!(*log.borrow(), vec!["eoi-slave", "eoi-master", "handler"]);
        assert_eq!(irq_get_stats(3).map(|s| s.count), Some(1));
    }

    #[test]
    fn slave_line_acknowledges_slave_then_master() {
        let table = HandlerTable::new();
        let mut io = RecordingPorts::new();
        let mut frame = InterruptFrame::synthetic(irq_vector(12) as u32, 0);

        assert_eq!(dispatch_irq(&mut io, &table, &mut frame), IrqOutcome::Unhandled);
        assert_eq!(
            io.byte_writes().collect::<Vec<_>>(),
            vec![(0xA0, PIC_EOI), (0x20, PIC_EOI)]
        );
    }

    #[test]
    fn every_line_is_acknowledged() {
        let table = HandlerTable::new();
        for line in [0u8, 1, 2, 4, 5, 6, 8, 9, 10, 11, 13, 14] {
            let mut io = RecordingPorts::new();
            let mut frame = InterruptFrame::synthetic(irq_vector(line) as u32, 0);
            dispatch_irq(&mut io, &table, &mut frame);
            let writes: Vec<_> = io.writes_to(Port::PIC1_COMMAND).collect();
            assert_eq!(writes, vec![PIC_EOI], "line {line}");
            let slave: Vec<_> = io.writes_to(Port::PIC2_COMMAND).collect();
            assert_eq!(slave.len(), usize::from(line >= 8), "line {line}");
        }
    }

    fn must_not_run(_: &mut InterruptFrame, _: *mut c_void) {
        panic!("spurious IRQ reached its handler");
    }

    #[test]
    fn spurious_irq7_skips_handler_but_is_acknowledged() {
        let table = HandlerTable::new();
        table.register(irq_vector(7), must_not_run, NO_CONTEXT, "lpt");
        let mut io = RecordingPorts::new();
        io.push_input(Port::PIC2_COMMAND, 0);
        io.push_input(Port::PIC1_COMMAND, 0);
        let mut frame = InterruptFrame::synthetic(irq_vector(7) as u32, 0);

        assert_eq!(dispatch_irq(&mut io, &table, &mut frame), IrqOutcome::Spurious);
        assert_eq!(io.writes_to(Port::PIC1_COMMAND).last(), Some(PIC_EOI));
        assert_eq!(irq_get_stats(7).map(|s| s.spurious), Some(1));
    }

    #[test]
    fn non_irq_vectors_are_rejected_without_eoi() {
        let table = HandlerTable::new();
        let mut io = RecordingPorts::new();
        let mut frame = InterruptFrame::synthetic(14, 0);
        assert_eq!(dispatch_irq(&mut io, &table, &mut frame), IrqOutcome::Rejected);
        assert!(io.events().is_empty());
    }

    #[test]
    fn install_rejects_bad_line() {
        assert_eq!(
            irq_install_handler(16, log_call, NO_CONTEXT, "bad"),
            Err(IrqError::InvalidLine)
        );
        assert!(irq_get_stats(16).is_none());
    }
}
