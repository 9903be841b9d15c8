//! Ordered kernel bring-up.
//!
//! Steps run in table order; the first failure stops the sequence and is
//! reported through the panic path. Each step is logged as it starts so a
//! hang can be pinned to the subsystem that caused it.

use core::sync::atomic::{AtomicUsize, Ordering};

use keel_abi::{BootError, PIT_DEFAULT_FREQUENCY_HZ};
use keel_drivers::{keyboard, pit, serial, vga};
use keel_lib::init_flag::InitFlag;
use keel_lib::{cpu, klog_debug, klog_info, klog_set_level};
use keel_mm::{paging, symbols};

use crate::kernel_panic::kernel_panic_fmt;
use crate::multiboot2::{self, BootInfo};
use crate::{gdt, idt};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootInitPhase {
    EarlyHw = 0,
    Memory = 1,
    Drivers = 2,
    Interrupts = 3,
}

impl BootInitPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EarlyHw => "early_hw",
            Self::Memory => "memory",
            Self::Drivers => "drivers",
            Self::Interrupts => "interrupts",
        }
    }
}

pub struct BootInitStep {
    pub name: &'static str,
    pub phase: BootInitPhase,
    pub run: fn() -> Result<(), BootError>,
}

impl BootInitStep {
    pub const fn new(
        name: &'static str,
        phase: BootInitPhase,
        run: fn() -> Result<(), BootError>,
    ) -> Self {
        Self { name, phase, run }
    }
}

fn step_serial() -> Result<(), BootError> {
    // A missing UART only silences the log.
    serial::init_serial();
    Ok(())
}

fn step_console() -> Result<(), BootError> {
    // Loader output is still on screen.
    vga::vga_clear();
    Ok(())
}

fn step_gdt() -> Result<(), BootError> {
    gdt::gdt_init();
    Ok(())
}

fn step_idt() -> Result<(), BootError> {
    idt::idt_init();
    Ok(())
}

fn step_paging() -> Result<(), BootError> {
    paging::check_image_clear(symbols::kernel_image_end())?;
    // SAFETY: runs once, before anything uses the paging frames.
    unsafe { paging::init_paging() };
    Ok(())
}

fn step_heap() -> Result<(), BootError> {
    // SAFETY: the region after the image is unused until the heap owns it.
    unsafe { keel_mm::init_kernel_memory(symbols::kernel_image_end())? };
    keel_mm::print_memory_layout();
    Ok(())
}

fn step_pit() -> Result<(), BootError> {
    pit::init_pit(PIT_DEFAULT_FREQUENCY_HZ)?;
    Ok(())
}

fn step_keyboard() -> Result<(), BootError> {
    keyboard::init_keyboard()?;
    Ok(())
}

fn step_enable_interrupts() -> Result<(), BootError> {
    cpu::enable_interrupts();
    Ok(())
}

pub static BOOT_STEPS: [BootInitStep; 9] = [
    BootInitStep::new("serial", BootInitPhase::EarlyHw, step_serial),
    BootInitStep::new("console", BootInitPhase::EarlyHw, step_console),
    BootInitStep::new("gdt", BootInitPhase::EarlyHw, step_gdt),
    BootInitStep::new("idt", BootInitPhase::EarlyHw, step_idt),
    BootInitStep::new("paging", BootInitPhase::Memory, step_paging),
    BootInitStep::new("heap", BootInitPhase::Memory, step_heap),
    BootInitStep::new("pit", BootInitPhase::Drivers, step_pit),
    BootInitStep::new("keyboard", BootInitPhase::Drivers, step_keyboard),
    BootInitStep::new("sti", BootInitPhase::Interrupts, step_enable_interrupts),
];

static STEPS_COMPLETED: AtomicUsize = AtomicUsize::new(0);
static KERNEL_INITIALIZED: InitFlag = InitFlag::new();

/// A step that failed, with its error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepFailure {
    pub step: &'static str,
    pub error: BootError,
}

/// Run `steps` in order, stopping at the first error. `progress` is
/// bumped after each step that succeeds.
pub fn run_steps(steps: &[BootInitStep], progress: &AtomicUsize) -> Result<(), StepFailure> {
    for step in steps {
        klog_debug!("BOOT: [{}] {}", step.phase.as_str(), step.name);
        (step.run)().map_err(|error| StepFailure {
            step: step.name,
            error,
        })?;
        progress.fetch_add(1, Ordering::Release);
    }
    Ok(())
}

pub fn boot_init_run_all() -> Result<(), StepFailure> {
    run_steps(&BOOT_STEPS, &STEPS_COMPLETED)
}

/// Steps finished so far, out of `BOOT_STEPS.len()`.
pub fn get_initialization_progress() -> usize {
    STEPS_COMPLETED.load(Ordering::Acquire)
}

pub fn boot_mark_initialized() {
    KERNEL_INITIALIZED.mark_set();
}

pub fn is_kernel_initialized() -> bool {
    KERNEL_INITIALIZED.is_set()
}

fn log_boot_info(info: &BootInfo) {
    klog_info!(
        "BOOT: multiboot2 info {} bytes, loader '{}'",
        info.total_size,
        info.bootloader_name().unwrap_or("unknown")
    );
    if let Some(cmdline) = info.cmdline() {
        klog_info!("BOOT: cmdline '{}'", cmdline);
    }
    if let Some(mem) = info.memory {
        klog_info!(
            "BOOT: {} KiB lower, {} KiB upper memory",
            mem.mem_lower_kib,
            mem.mem_upper_kib
        );
    }
}

/// Validate the loader hand-off and bring every subsystem up. Halts on
/// any failure; on return interrupts are enabled.
///
/// # Safety
/// Must be called once, from the boot entry, with the values the loader
/// left in EAX and EBX.
pub unsafe fn kernel_main(magic: u32, info: *const u8) -> BootInfo {
    if let Err(err) = multiboot2::check_magic(magic) {
        kernel_panic_fmt(format_args!("{} (0x{:08x})", err, magic));
    }
    // SAFETY: the magic matched, so EBX holds the loader's info pointer.
    // Copied out before paging and the heap claim memory it may sit in.
    let info = match unsafe { BootInfo::from_raw(info) } {
        Ok(info) => info,
        Err(err) => kernel_panic_fmt(format_args!("{}", err)),
    };
    if let Some(level) = info.klog_level() {
        klog_set_level(level);
    }

    if let Err(failure) = boot_init_run_all() {
        kernel_panic_fmt(format_args!("boot step '{}': {}", failure.step, failure.error));
    }
    log_boot_info(&info);

    boot_mark_initialized();
    klog_info!("BOOT: {} steps complete", get_initialization_progress());
    info
}
