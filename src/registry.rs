// CLASSIFICATION: COMMUNITY
// Filename: registry.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Master registration and the process-wide index pool.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use once_cell::sync::Lazy;

use crate::config;
use crate::driver;
use crate::engine::Engine;
use crate::error::{FsiError, FsiResult};
use crate::irq;
use crate::master::Master;
use crate::scan;
use crate::sync;

/// Upper bound on concurrently registered masters.
pub const MAX_MASTERS: u32 = 1024;

/// Lowest-free index allocator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexPool {
    next: u32,
    free: BTreeSet<u32>,
}

impl IndexPool {
    pub const fn new() -> Self {
        Self {
            next: 0,
            free: BTreeSet::new(),
        }
    }

    pub fn alloc(&mut self) -> FsiResult<u32> {
        if let Some(idx) = self.free.pop_first() {
            return Ok(idx);
        }
        if self.next >= MAX_MASTERS {
            return Err(FsiError::Capacity);
        }
        let idx = self.next;
        self.next += 1;
        Ok(idx)
    }

    /// Return `idx`; trailing free indices fold back into `next`.
    pub fn free(&mut self, idx: u32) {
        if idx >= self.next {
            return;
        }
        self.free.insert(idx);
        while self.next > 0 && self.free.remove(&(self.next - 1)) {
            self.next -= 1;
        }
    }

    /// Indices currently handed out.
    pub fn in_use(&self) -> usize {
        self.next as usize - self.free.len()
    }
}

static POOL: Lazy<Mutex<IndexPool>> = Lazy::new(|| Mutex::new(IndexPool::new()));
static MASTERS: Lazy<Mutex<Vec<Arc<Master>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Copy of the global index pool.
pub fn pool_snapshot() -> IndexPool {
    sync::lock(&POOL).clone()
}

/// Register `master`, allocate its index and enumerate its links.
///
/// Enumeration failures are logged per link and per slave; the master
/// stays registered with whatever was found.
pub fn register_master(master: &Arc<Master>) -> FsiResult<u32> {
    let idx = master.claim_idx(|| sync::lock(&POOL).alloc())?;
    sync::lock(&MASTERS).push(Arc::clone(master));
    info!("{}: registered, {} links", master.name(), master.n_links());
    scan::scan_master(master);
    Ok(idx)
}

/// Tear down everything below `master` and release its index.
pub fn unregister_master(master: &Arc<Master>) -> FsiResult<()> {
    let idx = master.take_idx().ok_or(FsiError::NotFound("master"))?;
    unscan(master);
    sync::lock(&POOL).free(idx);
    let empty = {
        let mut masters = sync::lock(&MASTERS);
        masters.retain(|m| !Arc::ptr_eq(m, master));
        masters.is_empty()
    };
    info!("{}: unregistered (was index {idx})", master.name());
    if empty {
        irq::stop_ipoll();
    }
    Ok(())
}

fn unscan(master: &Master) {
    for slave in master.take_slaves() {
        for engine in slave.take_engines() {
            driver::unbind_engine(&engine);
        }
        if let Some(hub) = slave.take_hub() {
            if let Err(e) = unregister_master(&hub) {
                debug!("{}: hub already gone: {e}", slave.name());
            }
        }
    }
    master.reset_link_states();
}

/// Snapshot of every registered master, hubs included.
pub fn registered_masters() -> Vec<Arc<Master>> {
    sync::lock(&MASTERS).clone()
}

/// Unregister every master and driver, stop the poller and reload the
/// configuration from the environment.
pub fn reset() {
    loop {
        let next = registered_masters().into_iter().find(|m| !m.is_hub());
        let Some(master) = next.or_else(|| registered_masters().into_iter().next()) else {
            break;
        };
        if unregister_master(&master).is_err() {
            sync::lock(&MASTERS).retain(|m| !Arc::ptr_eq(m, &master));
        }
    }
    for name in driver::registered_drivers() {
        let _ = driver::unregister_driver(&name);
    }
    irq::stop_ipoll();
    let _ = config::set_config(config::FsiConfig::from_env());
}

/// Clears global FSI state on creation and drop.
pub struct TestRegistryGuard;

impl TestRegistryGuard {
    pub fn new() -> Self {
        reset();
        TestRegistryGuard
    }
}

impl Default for TestRegistryGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRegistryGuard {
    fn drop(&mut self) {
        reset();
    }
}

/// Every engine under every registered master.
pub(crate) fn all_engines() -> Vec<Arc<Engine>> {
    registered_masters()
        .iter()
        .flat_map(|m| m.slaves())
        .flat_map(|s| s.engines())
        .collect()
}
