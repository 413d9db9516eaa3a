//! Flag-based signal handling for graceful shutdown.

use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Register SIGINT/SIGTERM handlers. The returned flag flips to `true` on
/// the first signal so the main loop can flush and restore the terminal; a
/// second signal force-quits with exit code 1.
pub fn shutdown_flag() -> Result<Arc<AtomicBool>, std::io::Error> {
    let flag_now = Arc::new(AtomicBool::new(false));
    for signal in TERM_SIGNALS {
        // Conditional shutdown first: only fires once flag_now is already
        // set, giving the double Ctrl+C escape hatch.
        flag::register_conditional_shutdown(*signal, 1, Arc::clone(&flag_now))?;
        flag::register(*signal, Arc::clone(&flag_now))?;
    }
    Ok(flag_now)
}
