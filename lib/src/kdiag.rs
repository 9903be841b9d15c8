use crate::klog_error;

/// Register state saved by the common interrupt trampoline.
///
/// Field order mirrors the stack from the lowest address up: the data
/// segment pushed by the stub, the `pushad` block, the vector and error
/// code pushed by the per-vector stub, and the CPU-pushed return frame.
/// `useresp`/`ss` are only pushed on a privilege change; for ring-0
/// frames those two slots alias the interrupted stack.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterruptFrame {
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub useresp: u32,
    pub ss: u32,
}

impl InterruptFrame {
    /// A frame as the stub would build it for `vector`; used by tests and
    /// by software-injected interrupts.
    pub const fn synthetic(vector: u32, error_code: u32) -> Self {
        Self {
            ds: 0x10,
            edi: 0,
            esi: 0,
            ebp: 0,
            esp_dummy: 0,
            ebx: 0,
            edx: 0,
            ecx: 0,
            eax: 0,
            vector,
            error_code,
            eip: 0,
            cs: 0x08,
            eflags: 0x202,
            useresp: 0,
            ss: 0x10,
        }
    }

    /// Whether the interrupted code ran in ring 0.
    pub const fn from_kernel(&self) -> bool {
        self.cs & 0x3 == 0
    }
}

/// Log the saved registers of `frame` at error level.
pub fn dump_interrupt_frame(frame: &InterruptFrame) {
    klog_error!(
        "  EAX={:08x} EBX={:08x} ECX={:08x} EDX={:08x}",
        frame.eax, frame.ebx, frame.ecx, frame.edx
    );
    klog_error!(
        "  ESI={:08x} EDI={:08x} EBP={:08x} ESP={:08x}",
        frame.esi, frame.edi, frame.ebp, frame.esp_dummy
    );
    klog_error!(
        "  EIP={:08x} CS={:04x} DS={:04x} EFLAGS={:08x}",
        frame.eip, frame.cs, frame.ds, frame.eflags
    );
    if !frame.from_kernel() {
        klog_error!("  USERESP={:08x} SS={:04x}", frame.useresp, frame.ss);
    }
}
