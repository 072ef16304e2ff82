//! Entry point for the initrd init.
//!
//! Mounts `<argv[0]>.squashfs` as the system image and execs `/usr/init`.
//! Returning at all means the boot failed.

#[cfg(not(target_os = "linux"))]
compile_error!("bootlite-init is Linux-only; build with a Linux target");

use bootlite::enter::{self, EnterConfig};
use bootlite::util::init_logging;

fn main() {
    // There is no fallback init, so make panics visible before exiting
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("[PANIC] bootlite-init panicked: {}", panic_info);
        std::process::exit(1);
    }));

    let log = init_logging("warn");

    let result = EnterConfig::from_process().and_then(|config| enter::run(&config, &log));

    // Only reachable on failure: success replaced this process
    if let Err(e) = result {
        tracing::error!("Failed to enter system image: {}", e);
        std::process::exit(1);
    }
}
