// CLASSIFICATION: COMMUNITY
// Filename: slave.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! FSI slaves: the addressable endpoint on a link.
//!
//! A slave performs no I/O of its own; every access is routed through the
//! parent master keyed by `(link, id)`. It owns the engines found in its
//! configuration table and, optionally, one hub master.

use std::sync::{Arc, Mutex, RwLock, Weak};

use log::debug;

use crate::engine::Engine;
use crate::error::{FsiError, FsiResult};
use crate::master::Master;
use crate::regs::{SI1_HUB_SRC, SLAVE_BASE, SRSIC0, SRSIC1};
use crate::sync;

/// Highest offset accepted by the raw window.
pub const RAW_MAX_OFFSET: u64 = 0xffff_fffc;

/// A discovered slave.
pub struct Slave {
    master: Weak<Master>,
    link: u8,
    id: u8,
    chip_id: u32,
    name: String,
    engines: RwLock<Vec<Arc<Engine>>>,
    hub: RwLock<Option<Arc<Master>>>,
    // Serializes read-modify-write cycles on this slave's registers.
    regs: Mutex<()>,
}

impl Slave {
    pub(crate) fn new(master: &Arc<Master>, link: u8, id: u8, chip_id: u32) -> Arc<Self> {
        Arc::new(Self {
            master: Arc::downgrade(master),
            link,
            id,
            chip_id,
            name: format!("slave@{link:02x}:{id:02x}"),
            engines: RwLock::new(Vec::new()),
            hub: RwLock::new(None),
            regs: Mutex::new(()),
        })
    }

    /// Parent master.
    pub fn master(&self) -> FsiResult<Arc<Master>> {
        self.master.upgrade().ok_or(FsiError::NotFound("master"))
    }

    pub fn link(&self) -> u8 {
        self.link
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Chip-ID word read during enumeration.
    pub fn chip_id(&self) -> u32 {
        self.chip_id
    }

    /// Stable device name, `slave@LL:II`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read 1, 2 or 4 bytes at slave-relative `addr`.
    pub fn read(&self, addr: u32, buf: &mut [u8]) -> FsiResult<()> {
        check_size(buf.len())?;
        self.master()?.read(self.link, self.id, addr, buf)
    }

    /// Write 1, 2 or 4 bytes at slave-relative `addr`.
    pub fn write(&self, addr: u32, data: &[u8]) -> FsiResult<()> {
        check_size(data.len())?;
        self.master()?.write(self.link, self.id, addr, data)
    }

    pub fn read_u32(&self, addr: u32) -> FsiResult<u32> {
        let mut buf = [0u8; 4];
        self.read(addr, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn write_u32(&self, addr: u32, value: u32) -> FsiResult<()> {
        self.write(addr, &value.to_be_bytes())
    }

    /// Read-modify-write a register word, serialized per slave.
    pub(crate) fn modify_u32(&self, addr: u32, f: impl FnOnce(u32) -> u32) -> FsiResult<u32> {
        let _guard = sync::lock(&self.regs);
        let value = f(self.read_u32(addr)?);
        self.write_u32(addr, value)?;
        Ok(value)
    }

    /// Raw window read: exactly 4 bytes at a word-aligned offset.
    pub fn raw_read(&self, off: u64, buf: &mut [u8]) -> FsiResult<usize> {
        let addr = check_raw(off, buf.len())?;
        self.read(addr, buf)?;
        Ok(buf.len())
    }

    /// Raw window write: exactly 4 bytes at a word-aligned offset.
    pub fn raw_write(&self, off: u64, data: &[u8]) -> FsiResult<usize> {
        let addr = check_raw(off, data.len())?;
        self.write(addr, data)?;
        Ok(data.len())
    }

    /// Clear latched remote IRQ conditions.
    pub(crate) fn irq_clear(&self) -> FsiResult<()> {
        self.write_u32(SLAVE_BASE + SRSIC0, !0).map_err(|e| {
            debug!("{}: failed on write to SRSIC0", self.name);
            e
        })?;
        self.write_u32(SLAVE_BASE + SRSIC1, !0)
    }

    /// Snapshot of the engines in configuration-table order.
    pub fn engines(&self) -> Vec<Arc<Engine>> {
        sync::read(&self.engines).clone()
    }

    pub(crate) fn push_engine(&self, engine: Arc<Engine>) {
        sync::write(&self.engines).push(engine);
    }

    pub(crate) fn take_engines(&self) -> Vec<Arc<Engine>> {
        std::mem::take(&mut *sync::write(&self.engines))
    }

    /// Hub master hosted by this slave, if one registered.
    pub fn hub(&self) -> Option<Arc<Master>> {
        sync::read(&self.hub).clone()
    }

    pub(crate) fn set_hub(&self, hub: Arc<Master>) {
        *sync::write(&self.hub) = Some(hub);
    }

    pub(crate) fn take_hub(&self) -> Option<Arc<Master>> {
        sync::write(&self.hub).take()
    }

    /// SI1S bits this slave can raise with the current IRQ enables.
    pub(crate) fn irq_sources(&self) -> u32 {
        let engines = self
            .engines()
            .iter()
            .filter(|e| e.irq_enabled())
            .fold(0, |acc, e| acc | e.si1s_mask());
        match self.hub() {
            Some(hub) if hub.ipoll() != 0 => engines | SI1_HUB_SRC,
            _ => engines,
        }
    }
}

impl std::fmt::Debug for Slave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slave")
            .field("name", &self.name)
            .field("chip_id", &format_args!("{:#010x}", self.chip_id))
            .finish()
    }
}

fn check_size(len: usize) -> FsiResult<()> {
    match len {
        1 | 2 | 4 => Ok(()),
        _ => Err(FsiError::InvalidArgument("access size must be 1, 2 or 4")),
    }
}

fn check_raw(off: u64, len: usize) -> FsiResult<u32> {
    if len != 4 || off & 0x3 != 0 {
        return Err(FsiError::InvalidArgument("raw access must be 4 aligned bytes"));
    }
    if off > RAW_MAX_OFFSET {
        return Err(FsiError::InvalidArgument("raw offset out of range"));
    }
    Ok(off as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_sizes() {
        assert!(check_size(1).is_ok());
        assert!(check_size(2).is_ok());
        assert!(check_size(4).is_ok());
        assert!(check_size(3).is_err());
        assert!(check_size(8).is_err());
    }

    #[test]
    fn raw_window_bounds() {
        assert_eq!(check_raw(0, 4), Ok(0));
        assert_eq!(check_raw(0xffff_fffc, 4), Ok(0xffff_fffc));
        assert!(check_raw(2, 4).is_err());
        assert!(check_raw(8, 2).is_err());
        assert!(check_raw(0x1_0000_0000, 4).is_err());
    }
}
