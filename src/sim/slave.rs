// CLASSIFICATION: COMMUNITY
// Filename: slave.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Register-file model of one slave.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::crc4::seal;
use crate::regs::{HUB_LINK_OFFSET, HUB_LINK_SIZE, PEEK_BASE};
use crate::scan::{ConfigEntry, CONF_TABLE_START};
use crate::sync;

#[derive(Default)]
struct State {
    regs: HashMap<u32, u32>,
    hub_links: BTreeMap<u8, Arc<SimSlave>>,
    faults: BTreeSet<u32>,
}

/// Simulated slave address space.
///
/// Unset words read as zero. Addresses from [`HUB_LINK_OFFSET`] up are
/// forwarded to the slave attached on the matching hub link.
#[derive(Default)]
pub struct SimSlave {
    state: Mutex<State>,
}

impl SimSlave {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Slave with a chip ID and a configuration table. Continuation bits
    /// are set on every entry but the last; the peek engine mirrors the
    /// table.
    pub fn with_table(chip_payload: u32, entries: &[ConfigEntry]) -> Arc<Self> {
        let slave = Self::new();
        slave.poke(0, seal(chip_payload));
        let last = entries.len().saturating_sub(1);
        for (k, entry) in entries.iter().enumerate() {
            let word = entry.with_next(k != last).encode();
            let k = k as u32;
            slave.poke(CONF_TABLE_START + 4 * k, word);
            slave.poke(PEEK_BASE + 4 * k, word);
        }
        slave
    }

    /// Store a word, bypassing fault injection.
    pub fn poke(&self, addr: u32, value: u32) {
        sync::lock(&self.state).regs.insert(addr & !0x3, value);
    }

    /// Current word at `addr`.
    pub fn reg(&self, addr: u32) -> u32 {
        sync::lock(&self.state)
            .regs
            .get(&(addr & !0x3))
            .copied()
            .unwrap_or(0)
    }

    /// Plug `child` into hub link `link`.
    pub fn attach_hub_link(&self, link: u8, child: Arc<SimSlave>) {
        sync::lock(&self.state).hub_links.insert(link, child);
    }

    /// Make every access to the word at `addr` fail.
    pub fn fail_at(&self, addr: u32) {
        sync::lock(&self.state).faults.insert(addr & !0x3);
    }

    pub fn clear_faults(&self) {
        sync::lock(&self.state).faults.clear();
    }

    fn route(&self, addr: u32) -> Option<(Arc<SimSlave>, u32)> {
        let rel = addr - HUB_LINK_OFFSET;
        let link = u8::try_from(rel / HUB_LINK_SIZE).ok()?;
        let child = sync::lock(&self.state).hub_links.get(&link).cloned()?;
        Some((child, rel % HUB_LINK_SIZE))
    }

    fn check(&self, addr: u32, len: usize) -> Result<(), String> {
        let lane = (addr & 0x3) as usize;
        if !matches!(len, 1 | 2 | 4) || lane + len > 4 {
            return Err(format!("bad access of {len} bytes at {addr:#x}"));
        }
        if sync::lock(&self.state).faults.contains(&(addr & !0x3)) {
            return Err(format!("injected fault at {addr:#x}"));
        }
        Ok(())
    }

    pub(crate) fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), String> {
        if addr >= HUB_LINK_OFFSET {
            let (child, inner) = self
                .route(addr)
                .ok_or_else(|| format!("no slave behind hub address {addr:#x}"))?;
            return child.read(inner, buf);
        }
        self.check(addr, buf.len())?;
        let lane = (addr & 0x3) as usize;
        let bytes = self.reg(addr).to_be_bytes();
        buf.copy_from_slice(&bytes[lane..lane + buf.len()]);
        Ok(())
    }

    pub(crate) fn write(&self, addr: u32, data: &[u8]) -> Result<(), String> {
        if addr >= HUB_LINK_OFFSET {
            let (child, inner) = self
                .route(addr)
                .ok_or_else(|| format!("no slave behind hub address {addr:#x}"))?;
            return child.write(inner, data);
        }
        self.check(addr, data.len())?;
        let lane = (addr & 0x3) as usize;
        let mut bytes = self.reg(addr).to_be_bytes();
        bytes[lane..lane + data.len()].copy_from_slice(data);
        self.poke(addr, u32::from_be_bytes(bytes));
        Ok(())
    }
}
