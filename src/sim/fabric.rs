// CLASSIFICATION: COMMUNITY
// Filename: fabric.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Simulated root transport with a transaction log.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use log::trace;

use super::slave::SimSlave;
use crate::error::{FsiError, FsiResult};
use crate::sync;
use crate::transport::LinkTransport;

/// One transaction seen at the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOp {
    Read { link: u8, id: u8, addr: u32, size: usize },
    Write { link: u8, id: u8, addr: u32, value: u32 },
    Break { link: u8 },
    LinkEnable { link: u8 },
}

/// A logged transaction and when it was issued.
#[derive(Debug, Clone, Copy)]
pub struct SimEvent {
    pub at: Instant,
    pub op: SimOp,
}

/// In-memory fabric: one [`SimSlave`] per root link.
///
/// Slave ids are not modelled; every id on a link reaches the same slave.
#[derive(Default)]
pub struct SimFabric {
    links: RwLock<BTreeMap<u8, Arc<SimSlave>>>,
    log: Mutex<Vec<SimEvent>>,
    break_delay: Mutex<Duration>,
    dead_links: Mutex<BTreeSet<u8>>,
}

impl SimFabric {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Put `slave` on root link `link`.
    pub fn attach(&self, link: u8, slave: Arc<SimSlave>) {
        sync::write(&self.links).insert(link, slave);
    }

    pub fn slave(&self, link: u8) -> Option<Arc<SimSlave>> {
        sync::read(&self.links).get(&link).cloned()
    }

    /// Make breaks block for `delay`.
    pub fn set_break_delay(&self, delay: Duration) {
        *sync::lock(&self.break_delay) = delay;
    }

    /// Make `link_enable` fail on `link`.
    pub fn fail_link_enable(&self, link: u8) {
        sync::lock(&self.dead_links).insert(link);
    }

    pub fn events(&self) -> Vec<SimEvent> {
        sync::lock(&self.log).clone()
    }

    pub fn ops(&self) -> Vec<SimOp> {
        sync::lock(&self.log).iter().map(|e| e.op).collect()
    }

    pub fn clear_log(&self) {
        sync::lock(&self.log).clear();
    }

    /// Values written to `addr` on any link, oldest first.
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SimOp::Write { addr: a, value, .. } if a == addr => Some(value),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: SimOp) {
        trace!("sim: {op:?}");
        sync::lock(&self.log).push(SimEvent {
            at: Instant::now(),
            op,
        });
    }

    fn target(&self, link: u8, id: u8, addr: u32) -> FsiResult<Arc<SimSlave>> {
        self.slave(link)
            .ok_or_else(|| FsiError::transport(link, id, addr, "no slave on link"))
    }
}

impl LinkTransport for SimFabric {
    fn read(&self, link: u8, id: u8, addr: u32, buf: &mut [u8]) -> FsiResult<()> {
        self.record(SimOp::Read {
            link,
            id,
            addr,
            size: buf.len(),
        });
        self.target(link, id, addr)?
            .read(addr, buf)
            .map_err(|reason| FsiError::transport(link, id, addr, reason))
    }

    fn write(&self, link: u8, id: u8, addr: u32, data: &[u8]) -> FsiResult<()> {
        let value = data.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
        self.record(SimOp::Write {
            link,
            id,
            addr,
            value,
        });
        self.target(link, id, addr)?
            .write(addr, data)
            .map_err(|reason| FsiError::transport(link, id, addr, reason))
    }

    fn send_break(&self, link: u8) -> FsiResult<()> {
        self.record(SimOp::Break { link });
        let delay = *sync::lock(&self.break_delay);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(())
    }

    fn link_enable(&self, link: u8) -> FsiResult<()> {
        self.record(SimOp::LinkEnable { link });
        if sync::lock(&self.dead_links).contains(&link) {
            return Err(FsiError::transport(link, 0, 0, "link enable refused"));
        }
        Ok(())
    }
}
