// CLASSIFICATION: COMMUNITY
// Filename: irq.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Interrupt demultiplexing, mask maintenance and the polling thread.
//!
//! The poller reads the root slave's SI1S every period and walks the tree
//! down to the engines whose bits are set. Hub slaves report their
//! downstream links through SRSIS0; a [`HublinkSelector`] picks which link
//! to service on each pass. Enabling an engine programs its slave's SI1M
//! and every forwarding register between it and the root.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use once_cell::sync::Lazy;

use crate::config::{self, HublinkPolicy};
use crate::engine::Engine;
use crate::error::{FsiError, FsiResult};
use crate::master::Master;
use crate::regs::{
    link_to_msiep_mask, link_to_srsic_mask, link_to_srsim_mask, MMODE, MMODE_IPOLL_CONFIG,
    MSIEP0, SI1M, SI1S, SI1_HUB_SRC, SLAVE_BASE, SRSIC0, SRSIM0, SRSIS0, SRSIX_BITS_PER_LINK,
    SRSIX_IRQ1_MASK, SRSIX_LINKS,
};
use crate::slave::Slave;
use crate::sync;

/// Longest the poller sleeps before looking at the period again.
const PERIOD_RECHECK: Duration = Duration::from_millis(10);

/// Picks the hub link to service from an SRSIS0 value.
pub trait HublinkSelector: Send + Sync {
    fn select(&self, srsis: u32) -> Option<u8>;
}

/// Most significant pending group first, i.e. the lowest-numbered link.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsbFirst;

impl HublinkSelector for MsbFirst {
    fn select(&self, srsis: u32) -> Option<u8> {
        if srsis & SRSIX_IRQ1_MASK == 0 {
            return None;
        }
        Some((srsis.leading_zeros() / SRSIX_BITS_PER_LINK) as u8)
    }
}

/// First pending link after the one served last.
#[derive(Debug)]
pub struct RoundRobin {
    last: AtomicU8,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            last: AtomicU8::new(SRSIX_LINKS - 1),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl HublinkSelector for RoundRobin {
    fn select(&self, srsis: u32) -> Option<u8> {
        let pending = srsis & SRSIX_IRQ1_MASK;
        let last = self.last.load(Ordering::SeqCst);
        let link = (1..=SRSIX_LINKS)
            .map(|step| (last + step) % SRSIX_LINKS)
            .find(|link| pending & link_to_srsic_mask(*link) != 0)?;
        self.last.store(link, Ordering::SeqCst);
        Some(link)
    }
}

/// Walks the master tree for a sampled SI1S value.
pub struct InterruptRouter {
    selector: Box<dyn HublinkSelector>,
}

impl InterruptRouter {
    pub fn new(selector: Box<dyn HublinkSelector>) -> Self {
        Self { selector }
    }

    pub fn from_policy(policy: HublinkPolicy) -> Self {
        match policy {
            HublinkPolicy::MsbFirst => Self::new(Box::new(MsbFirst)),
            HublinkPolicy::RoundRobin => Self::new(Box::new(RoundRobin::new())),
        }
    }

    /// Sample the root SI1S once and dispatch. Returns the number of
    /// handlers invoked.
    pub fn poll_once(&self, root: &Master) -> FsiResult<usize> {
        let ipoll = root.ipoll();
        if ipoll == 0 {
            return Ok(0);
        }
        let si1s = root.read_u32(0, 0, SLAVE_BASE + SI1S)?;
        if si1s & ipoll == 0 {
            return Ok(0);
        }
        Ok(self.dispatch(root, si1s))
    }

    /// Service every slave of `master` against `si1s`.
    pub fn dispatch(&self, master: &Master, si1s: u32) -> usize {
        master
            .slaves()
            .iter()
            .map(|slave| self.service_slave(slave, si1s))
            .sum()
    }

    fn service_slave(&self, slave: &Slave, si1s: u32) -> usize {
        let mut handled = 0;
        for engine in slave.engines() {
            if si1s & engine.si1s_mask() != 0 && engine.invoke_irq() {
                handled += 1;
            }
        }
        if si1s & SI1_HUB_SRC != 0 {
            if let Some(hub) = slave.hub() {
                handled += self.service_hub(slave, &hub);
            }
        }
        handled
    }

    fn service_hub(&self, slave: &Slave, hub: &Master) -> usize {
        let srsis = match slave.read_u32(SLAVE_BASE + SRSIS0) {
            Ok(v) => v,
            Err(e) => {
                debug!("{}: SRSIS0 read failed: {e}", slave.name());
                return 0;
            }
        };
        if srsis == 0 {
            debug!("{}: hub source flagged with empty SRSIS0", slave.name());
            return 0;
        }
        let Some(link) = self.selector.select(srsis) else {
            debug!("{}: unexpected irq source {srsis:#010x}", slave.name());
            return 0;
        };

        let mut handled = 0;
        for child in hub.slaves().iter().filter(|s| s.link() == link) {
            match child.read_u32(SLAVE_BASE + SI1S) {
                Ok(0) => {}
                Ok(si1s) => handled += self.service_slave(child, si1s),
                Err(e) => debug!("{}: SI1S read failed: {e}", child.name()),
            }
        }

        if let Err(e) = slave.write_u32(SLAVE_BASE + SRSIC0, link_to_srsic_mask(link)) {
            debug!("{}: SRSIC0 clear failed: {e}", slave.name());
        }
        handled
    }
}

struct Poller {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

static IPOLL: Lazy<Mutex<Option<Poller>>> = Lazy::new(|| Mutex::new(None));

/// Spawn the polling thread for `root`.
pub fn start_ipoll(root: &Arc<Master>) -> FsiResult<()> {
    let mut slot = sync::lock(&IPOLL);
    if slot.is_some() {
        error!("{}: ipoll thread already running", root.name());
        return Err(FsiError::AlreadyPresent("ipoll thread"));
    }

    let (stop, rx) = mpsc::channel();
    let weak = Arc::downgrade(root);
    let router = InterruptRouter::from_policy(config::get_config().hublink_policy);
    let handle = thread::Builder::new()
        .name("fsi_master_ipoll".into())
        .spawn(move || poll_loop(weak, router, rx))
        .map_err(|e| FsiError::PermanentFailure(format!("ipoll spawn: {e}")))?;

    info!("{}: ipoll started", root.name());
    *slot = Some(Poller { stop, handle });
    Ok(())
}

/// Stop the polling thread. Returns false when none was running.
pub fn stop_ipoll() -> bool {
    let Some(poller) = sync::lock(&IPOLL).take() else {
        return false;
    };
    let _ = poller.stop.send(());
    // The poller may tear itself down from inside a handler.
    if poller.handle.thread().id() != thread::current().id() {
        let _ = poller.handle.join();
    }
    info!("fsi: ipoll stopped");
    true
}

pub fn ipoll_running() -> bool {
    sync::lock(&IPOLL).is_some()
}

/// Block until the current period has elapsed. A period changed while
/// waiting applies to the tick in progress. False once asked to stop.
fn wait_tick(stop: &mpsc::Receiver<()>) -> bool {
    let started = Instant::now();
    loop {
        let period = Duration::from_millis(u64::from(config::ipoll_period_ms()));
        let Some(left) = period.checked_sub(started.elapsed()).filter(|d| !d.is_zero()) else {
            return true;
        };
        match stop.recv_timeout(left.min(PERIOD_RECHECK)) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
}

fn poll_loop(root: Weak<Master>, router: InterruptRouter, stop: mpsc::Receiver<()>) {
    while wait_tick(&stop) {
        let Some(master) = root.upgrade() else {
            break;
        };
        if let Err(e) = router.poll_once(&master) {
            debug!("{}: poll failed: {e}", master.name());
        }
    }
}

/// Unmask `engine`'s interrupt and forward it up to the root.
pub fn enable_irq(engine: &Engine) -> FsiResult<()> {
    if !engine.has_irq_handler() {
        return Err(FsiError::InvalidArgument("engine has no irq handler"));
    }
    set_engine_irq(engine, true)
}

/// Mask `engine`'s interrupt, dropping forwarding that nothing else needs.
pub fn disable_irq(engine: &Engine) -> FsiResult<()> {
    set_engine_irq(engine, false)
}

fn set_engine_irq(engine: &Engine, on: bool) -> FsiResult<()> {
    let mask = engine.si1s_mask();
    if mask == 0 {
        return Err(FsiError::InvalidArgument("engine has no SI1S bit"));
    }
    let slave = engine.slave()?;
    let master = slave.master()?;
    if let Err(e) = check_forwarding(&master, slave.link()) {
        warn!("{}: {e}", engine.name());
        return Err(e);
    }

    slave
        .modify_u32(SLAVE_BASE + SI1M, |v| if on { v | mask } else { v & !mask })
        .map_err(|e| {
            error!("{}: SI1M update failed: {e}", engine.name());
            e
        })?;
    engine.set_irq_enabled(on);
    master.recompute_ipoll();
    sync_upstream(&master, slave.link())
}

/// Fail when a hub link between `master`'s `link` and the root lies past
/// the links SRSIx can forward.
fn check_forwarding(master: &Master, link: u8) -> FsiResult<()> {
    let Some(hub) = master.hub() else {
        return Ok(());
    };
    if link >= SRSIX_LINKS {
        return Err(FsiError::InvalidArgument("hub link cannot forward interrupts"));
    }
    let up_slave = hub.slave()?;
    let up_master = up_slave.master()?;
    check_forwarding(&up_master, up_slave.link())
}

/// Bring the forwarding registers above `master` in line with its IRQ
/// state for `link`, then continue towards the root.
fn sync_upstream(master: &Master, link: u8) -> FsiResult<()> {
    let Some(hub) = master.hub() else {
        return Ok(());
    };
    let up_slave = hub.slave()?;
    let up_master = up_slave.master()?;
    let ctl = hub.control_regs();

    let srsim = link_to_srsim_mask(link);
    let msiep = link_to_msiep_mask(link);
    let result = if master.link_irq_active(link) {
        up_slave
            .modify_u32(SLAVE_BASE + SRSIM0, |v| v | srsim)
            .and_then(|_| up_slave.modify_u32(ctl + MSIEP0, |v| v | msiep))
            .and_then(|_| up_slave.write_u32(ctl + MMODE, MMODE_IPOLL_CONFIG))
    } else {
        up_slave
            .modify_u32(SLAVE_BASE + SRSIM0, |v| v & !srsim)
            .and_then(|_| up_slave.modify_u32(ctl + MSIEP0, |v| v & !msiep))
            .map(|_| ())
    };
    let hub_active = master.ipoll() != 0;
    let result = result.and_then(|_| {
        up_slave.modify_u32(SLAVE_BASE + SI1M, |v| {
            if hub_active {
                v | SI1_HUB_SRC
            } else {
                v & !SI1_HUB_SRC
            }
        })
    });
    if let Err(e) = result {
        error!("{}: upstream irq mask update failed: {e}", master.name());
        return Err(e);
    }

    up_master.recompute_ipoll();
    sync_upstream(&up_master, up_slave.link())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_first_picks_highest_group() {
        assert_eq!(MsbFirst.select(0x0080_0000), Some(1));
        assert_eq!(MsbFirst.select(0x0080_0080), Some(1));
        assert_eq!(MsbFirst.select(0x0000_0080), Some(3));
    }

    #[test]
    fn msb_first_ignores_non_irq1_sources() {
        assert_eq!(MsbFirst.select(0x0200_0000), None);
        assert_eq!(MsbFirst.select(0x0055_5555), None);
    }

    #[test]
    fn round_robin_rotates() {
        let rr = RoundRobin::new();
        let both = 0x0080_0000 | 0x0000_8000;
        assert_eq!(rr.select(both), Some(1));
        assert_eq!(rr.select(both), Some(2));
        assert_eq!(rr.select(both), Some(1));
        assert_eq!(rr.select(0), None);
    }
}
