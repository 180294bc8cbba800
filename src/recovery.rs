// CLASSIFICATION: COMMUNITY
// Filename: recovery.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Fabric-wide recovery after an unrecoverable bus error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use crate::master::{LinkState, Master};
use crate::regs::{
    default_smode, Mresb, FSI_BREAK, HUB_BREAK_OFFSET, HUB_CONTROL, HUB_LINK_OFFSET,
    HUB_LINK_SIZE, MRESB0, SLAVE_BASE, SMODE,
};

/// Settle time between the break and the first register write.
pub const FAULT_SPIN: Duration = Duration::from_micros(200);

/// Start of hub link 1, where faults beyond the bridge are cleared.
const FAULT_HUB_WINDOW: u32 = HUB_LINK_OFFSET + HUB_LINK_SIZE;

static IN_ERR_CLEANUP: AtomicBool = AtomicBool::new(false);

struct CleanupLatch;

impl CleanupLatch {
    fn acquire() -> Option<Self> {
        IN_ERR_CLEANUP
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| CleanupLatch)
    }
}

impl Drop for CleanupLatch {
    fn drop(&mut self) {
        IN_ERR_CLEANUP.store(false, Ordering::SeqCst);
    }
}

/// True while a recovery sequence is running.
pub fn in_cleanup() -> bool {
    IN_ERR_CLEANUP.load(Ordering::SeqCst)
}

fn spin(d: Duration) {
    let start = Instant::now();
    while start.elapsed() < d {
        std::hint::spin_loop();
    }
}

/// Re-initialize link 0 of `master` after a bus error at `addr`.
///
/// Returns false without touching the fabric when another caller is
/// already recovering. Individual write failures are logged and the
/// sequence carries on.
pub fn handle_error(master: &Master, addr: u32) -> bool {
    let Some(_latch) = CleanupLatch::acquire() else {
        debug!("{}: recovery already in progress", master.name());
        return false;
    };
    warn!("{}: bus error at {addr:#x}, resetting link 0", master.name());

    match master.send_break(0) {
        Ok(()) => master.set_link_state(0, LinkState::Broken),
        Err(e) => error!("{}: recovery break failed: {e}", master.name()),
    }

    spin(FAULT_SPIN);

    let smode = default_smode(0);
    match master.write_u32(0, 0, SLAVE_BASE + SMODE, smode) {
        Ok(()) => master.set_link_state(0, LinkState::Probed),
        Err(e) => error!("{}: recovery SMODE write failed: {e}", master.name()),
    }

    let reset = (Mresb::RST_GEN | Mresb::RST_ERR).bits();
    if let Err(e) = master.write_u32(0, 0, HUB_CONTROL + MRESB0, reset) {
        error!("{}: recovery bridge reset failed: {e}", master.name());
    }

    if addr > HUB_LINK_OFFSET {
        let writes = [
            (FAULT_HUB_WINDOW + HUB_BREAK_OFFSET, FSI_BREAK),
            (FAULT_HUB_WINDOW + SLAVE_BASE + SMODE, smode),
        ];
        for (target, value) in writes {
            if let Err(e) = master.write_u32(0, 0, target, value) {
                error!("{}: recovery write at {target:#x} failed: {e}", master.name());
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_fault_addresses() {
        assert_eq!(FAULT_HUB_WINDOW + HUB_BREAK_OFFSET, 0x10_0004);
        assert_eq!(FAULT_HUB_WINDOW + SLAVE_BASE + SMODE, 0x10_0800);
    }

    #[test]
    fn spin_waits_at_least_the_duration() {
        let start = Instant::now();
        spin(FAULT_SPIN);
        assert!(start.elapsed() >= FAULT_SPIN);
    }
}
