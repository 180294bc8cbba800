// CLASSIFICATION: COMMUNITY
// Filename: engine.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Engines: typed sub-regions of a slave's address space.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::driver::EngineDriver;
use crate::error::{FsiError, FsiResult};
use crate::regs::{si1s_mask, PEEK_BASE};
use crate::slave::Slave;
use crate::sync;

/// Interrupt callback installed by a bound driver.
pub type IrqHandler = Arc<dyn Fn(&Engine) + Send + Sync>;

/// Placement of an engine found in a configuration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineInfo {
    pub engine_type: u8,
    pub version: u8,
    /// Configuration-table index, at least 2.
    pub unit: u8,
    /// Slave-relative base address.
    pub addr: u32,
    /// Size in bytes.
    pub size: u32,
    /// SI1S bit assigned in discovery order, starting at 1.
    pub si1s_bit: u8,
}

/// An engine on a slave.
pub struct Engine {
    slave: Weak<Slave>,
    info: EngineInfo,
    name: String,
    driver: RwLock<Option<Arc<dyn EngineDriver>>>,
    irq_handler: RwLock<Option<IrqHandler>>,
    irq_enabled: AtomicBool,
}

impl Engine {
    pub(crate) fn new(slave: &Arc<Slave>, info: EngineInfo, master_idx: u32) -> Arc<Self> {
        let name = format!(
            "{:02x}:{:02x}:{:02x}:{:02x}",
            master_idx,
            slave.link(),
            slave.id(),
            info.unit - 2
        );
        Arc::new(Self {
            slave: Arc::downgrade(slave),
            info,
            name,
            driver: RwLock::new(None),
            irq_handler: RwLock::new(None),
            irq_enabled: AtomicBool::new(false),
        })
    }

    /// Parent slave.
    pub fn slave(&self) -> FsiResult<Arc<Slave>> {
        self.slave.upgrade().ok_or(FsiError::NotFound("slave"))
    }

    /// Device name, `<master>:<link>:<id>:<unit - 2>` in hex.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> EngineInfo {
        self.info
    }

    pub fn engine_type(&self) -> u8 {
        self.info.engine_type
    }

    pub fn version(&self) -> u8 {
        self.info.version
    }

    pub fn unit(&self) -> u8 {
        self.info.unit
    }

    pub fn addr(&self) -> u32 {
        self.info.addr
    }

    pub fn size(&self) -> u32 {
        self.info.size
    }

    pub fn si1s_bit(&self) -> u8 {
        self.info.si1s_bit
    }

    /// SI1S / SI1M bit of this engine.
    pub fn si1s_mask(&self) -> u32 {
        si1s_mask(self.info.si1s_bit)
    }

    /// Slave-relative address of an in-bounds engine access.
    fn slave_addr(&self, addr: u32, len: usize) -> FsiResult<u32> {
        let size = self.info.size;
        let len = u32::try_from(len).map_err(|_| FsiError::InvalidArgument("access too large"))?;
        if addr > size || len > size || addr > size - len {
            return Err(FsiError::InvalidArgument("access outside engine"));
        }
        self.info
            .addr
            .checked_add(addr)
            .ok_or(FsiError::InvalidArgument("access outside engine"))
    }

    /// Read `buf.len()` bytes at engine-relative `addr`.
    pub fn read(&self, addr: u32, buf: &mut [u8]) -> FsiResult<()> {
        let addr = self.slave_addr(addr, buf.len())?;
        self.slave()?.read(addr, buf)
    }

    /// Write `data` at engine-relative `addr`.
    pub fn write(&self, addr: u32, data: &[u8]) -> FsiResult<()> {
        let addr = self.slave_addr(addr, data.len())?;
        self.slave()?.write(addr, data)
    }

    pub fn read_u32(&self, addr: u32) -> FsiResult<u32> {
        let mut buf = [0u8; 4];
        self.read(addr, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn write_u32(&self, addr: u32, value: u32) -> FsiResult<()> {
        self.write(addr, &value.to_be_bytes())
    }

    /// Configuration word that described this engine, via the peek engine.
    pub fn peek(&self) -> FsiResult<u32> {
        let addr = PEEK_BASE + (u32::from(self.info.unit) - 2) * 4;
        self.slave()?.read_u32(addr)
    }

    /// Install the handler invoked when this engine's SI1S bit fires.
    pub fn set_irq_handler(&self, handler: IrqHandler) {
        *sync::write(&self.irq_handler) = Some(handler);
    }

    pub fn clear_irq_handler(&self) {
        *sync::write(&self.irq_handler) = None;
    }

    pub fn has_irq_handler(&self) -> bool {
        sync::read(&self.irq_handler).is_some()
    }

    /// Run the handler if one is installed.
    pub(crate) fn invoke_irq(&self) -> bool {
        let handler = sync::read(&self.irq_handler).clone();
        match handler {
            Some(handler) => {
                handler(self);
                true
            }
            None => false,
        }
    }

    /// True while this engine contributes to its master's `ipoll`.
    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_irq_enabled(&self, on: bool) {
        self.irq_enabled.store(on, Ordering::SeqCst);
    }

    /// Name of the bound driver.
    pub fn driver_name(&self) -> Option<String> {
        sync::read(&self.driver).as_ref().map(|d| d.name().to_string())
    }

    pub(crate) fn driver(&self) -> Option<Arc<dyn EngineDriver>> {
        sync::read(&self.driver).clone()
    }

    pub(crate) fn set_driver(&self, driver: Option<Arc<dyn EngineDriver>>) {
        *sync::write(&self.driver) = driver;
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("info", &self.info)
            .field("driver", &self.driver_name())
            .finish()
    }
}
