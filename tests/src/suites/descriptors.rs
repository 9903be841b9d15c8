use keel_abi::{IDT_ENTRIES, IDT_TYPE_INTERRUPT_32, IRQ_BASE_VECTOR, IRQ_LINES, SegmentSelector};
use keel_boot::{gdt, idt};
use keel_drivers::pic;
use keel_lib::testing::TestResult;
use keel_lib::{cpu, define_test_suite, ensure, pass};

fn test_segment_registers_hold_kernel_selectors() -> TestResult {
    ensure!(
        cpu::read_cs() == SegmentSelector::KERNEL_CODE.bits(),
        "CS=0x{:x}",
        cpu::read_cs()
    );
    ensure!(
        cpu::read_ds() == SegmentSelector::KERNEL_DATA.bits(),
        "DS=0x{:x}",
        cpu::read_ds()
    );
    ensure!(gdt::gdt_selectors_loaded());
    pass!()
}

fn test_gdt_descriptors_are_flat() -> TestResult {
    let code = gdt::gdt_entry(1).map(|e| e.bits());
    let data = gdt::gdt_entry(2).map(|e| e.bits());
    ensure!(gdt::gdt_entry(0).map(|e| e.bits()) == Some(0));
    ensure!(code == Some(0x00CF_9B00_0000_FFFF), "code {:?}", code);
    ensure!(data == Some(0x00CF_9300_0000_FFFF), "data {:?}", data);
    pass!()
}

fn test_every_idt_gate_is_a_kernel_interrupt_gate() -> TestResult {
    for vector in 0..IDT_ENTRIES {
        let gate = idt::idt_get_gate(vector as u8);
        ensure!(
            gate.is_present()
                && gate.dpl() == 0
                && gate.gate_type() == IDT_TYPE_INTERRUPT_32
                && gate.selector() == SegmentSelector::KERNEL_CODE.bits()
                && gate.offset() != 0,
            "vector {} gate {:?}",
            vector,
            gate
        );
    }
    pass!()
}

fn test_pic_delivers_irqs_on_remapped_vectors() -> TestResult {
    for line in 0..IRQ_LINES as u8 {
        let vector = pic::pic_vector_for_irq(line);
        ensure!(
            vector == IRQ_BASE_VECTOR + line,
            "IRQ{} on vector {}",
            line,
            vector
        );
    }
    pass!()
}

define_test_suite!(descriptors, [
    test_segment_registers_hold_kernel_selectors,
    test_gdt_descriptors_are_flat,
    test_every_idt_gate_is_a_kernel_interrupt_gate,
    test_pic_delivers_irqs_on_remapped_vectors,
]);
