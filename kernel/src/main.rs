#![no_std]
#![no_main]
#![forbid(unsafe_op_in_unsafe_fn)]

use core::panic::PanicInfo;

use keel_abi::Multiboot2Header;
use keel_boot as boot;
use keel_drivers::{keyboard, pit, print, println, serial_println, speaker};
use keel_lib::{cpu, klog_info};

mod songs;

#[cfg(target_arch = "x86")]
core::arch::global_asm!(include_str!("entry.s"));

#[used]
#[unsafe(link_section = ".multiboot2")]
static MULTIBOOT2_HEADER: Multiboot2Header = Multiboot2Header::new();

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    match info.location() {
        Some(loc) => boot::kernel_panic_fmt(format_args!(
            "{} ({}:{})",
            info.message(),
            loc.file(),
            loc.line()
        )),
        None => boot::kernel_panic_fmt(format_args!("{}", info.message())),
    }
}

#[cfg(feature = "builtin-tests")]
fn run_builtin_tests() -> ! {
    let summary = keel_tests::tests_run_all();
    speaker::play_song(&songs::SHUTDOWN_JINGLE);
    keel_tests::tests_request_shutdown(&summary)
}

/// Echo typed characters to the screen, sleeping between interrupts.
#[cfg_attr(feature = "builtin-tests", allow(dead_code))]
fn idle_loop() -> ! {
    klog_info!("keel: idle after {} ms", pit::uptime_ms());
    println!("Type away.");
    loop {
        while let Some(ch) = keyboard::poll_char() {
            print!("{}", ch as char);
        }
        cpu::hlt();
    }
}

/// Called from `_start` with the Multiboot2 hand-off registers.
#[unsafe(no_mangle)]
pub extern "C" fn kmain(magic: u32, info: *const u8) -> ! {
    // SAFETY: `_start` passes EAX and EBX through untouched, once.
    let boot_info = unsafe { boot::kernel_main(magic, info) };

    println!("keel: i386 kernel up");
    serial_println!("keel: i386 kernel up");
    if let Some(mem) = boot_info.memory {
        println!("{} KiB upper memory", mem.mem_upper_kib);
    }
    speaker::play_song(&songs::STARTUP_JINGLE);

    if boot_info.has_flag("jukebox") {
        speaker::play_song(&songs::OPENING_THEME);
    }

    #[cfg(feature = "builtin-tests")]
    run_builtin_tests();

    #[cfg(not(feature = "builtin-tests"))]
    idle_loop();
}
