// CLASSIFICATION: COMMUNITY
// Filename: hub.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Hub master support.
//!
//! A hub master extends the fabric behind a slave: each of its links is a
//! [`HUB_LINK_SIZE`] window in the owning slave's address space starting at
//! [`HUB_LINK_OFFSET`]. Unlike cascaded masters, a hub carries its own
//! control registers, found at the hub engine's address.

use std::sync::{Arc, Weak};
use std::thread;

use log::debug;

use crate::error::{FsiError, FsiResult};
use crate::master::LINK_ENABLE_SETUP;
use crate::regs::{
    link_msb_mask, mmode_crs0, mmode_crs1, Mectrl, Mmode, Mresb, Mresp, FSI_BREAK,
    HUB_BREAK_OFFSET, HUB_LINK_OFFSET, HUB_LINK_SIZE, MAEB, MCENP0, MDLYR, MDLYR_MAX_DELAYS,
    MECTRL, MLEVP0, MMODE, MRESB0, MRESP0, MSENP0, MVER,
};
use crate::slave::Slave;

/// Bridge from a slave into the hub master it contains.
pub struct HubMaster {
    slave: Weak<Slave>,
    control_regs: u32,
    base: u32,
    parent_idx: u32,
}

impl HubMaster {
    pub(crate) fn new(slave: &Arc<Slave>, control_regs: u32, parent_idx: u32) -> Self {
        Self {
            slave: Arc::downgrade(slave),
            control_regs,
            base: HUB_LINK_OFFSET,
            parent_idx,
        }
    }

    /// Slave that contains this hub.
    pub fn slave(&self) -> FsiResult<Arc<Slave>> {
        self.slave.upgrade().ok_or(FsiError::NotFound("hub slave"))
    }

    /// Slave-relative address of the hub's control register block.
    pub fn control_regs(&self) -> u32 {
        self.control_regs
    }

    /// Slave-relative start of the hub's link address space.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Index of the master that owns the hub's slave.
    pub fn parent_idx(&self) -> u32 {
        self.parent_idx
    }

    /// Translate a hub-link address into the owning slave's space.
    pub fn link_addr(&self, link: u8, addr: u32) -> FsiResult<u32> {
        u32::from(link)
            .checked_mul(HUB_LINK_SIZE)
            .and_then(|off| off.checked_add(self.base))
            .and_then(|off| off.checked_add(addr))
            .ok_or(FsiError::InvalidArgument("hub address out of range"))
    }

    pub(crate) fn read(&self, link: u8, addr: u32, buf: &mut [u8]) -> FsiResult<()> {
        let addr = self.link_addr(link, addr)?;
        self.slave()?.read(addr, buf)
    }

    pub(crate) fn write(&self, link: u8, addr: u32, data: &[u8]) -> FsiResult<()> {
        let addr = self.link_addr(link, addr)?;
        self.slave()?.write(addr, data)
    }

    /// Hub links take their break at offset 4 (hardware workaround).
    pub(crate) fn send_break(&self, link: u8) -> FsiResult<()> {
        let addr = self.link_addr(link, HUB_BREAK_OFFSET)?;
        self.slave()?.write_u32(addr, FSI_BREAK)
    }

    pub(crate) fn link_enable(&self, link: u8) -> FsiResult<()> {
        let rc = self
            .slave()
            .and_then(|slave| slave.write_u32(self.control_regs + MSENP0, link_msb_mask(link)));
        // Link logic needs time to settle before break and friends.
        thread::sleep(LINK_ENABLE_SETUP);
        rc
    }

    fn ctl_read(&self, slave: &Slave, reg: u32) -> FsiResult<u32> {
        slave.read_u32(self.control_regs + reg)
    }

    fn ctl_write(&self, slave: &Slave, reg: u32, value: u32) -> FsiResult<()> {
        slave.write_u32(self.control_regs + reg, value)
    }

    /// Reset and configure the hub master engine. Stops at the first
    /// failing access.
    pub(crate) fn init(&self) -> FsiResult<()> {
        let slave = self.slave()?;

        let mver = self.ctl_read(&slave, MVER)?;
        debug!("{}: hub master version {mver:#010x}", slave.name());

        let reset = Mresp::RST_ALL_MASTER | Mresp::RST_ALL_LINK | Mresp::RST_MCR | Mresp::RST_PYE;
        self.ctl_write(&slave, MRESP0, reset.bits())?;
        self.ctl_write(&slave, MECTRL, (Mectrl::EOAE | Mectrl::P8_AUTO_TERM).bits())?;

        let mmode = (Mmode::EIP | Mmode::ECRC | Mmode::EPC | Mmode::P8_TO_LSB).bits()
            | mmode_crs0(1)
            | mmode_crs1(1);
        self.ctl_write(&slave, MMODE, mmode)?;
        self.ctl_write(&slave, MDLYR, MDLYR_MAX_DELAYS)?;
        self.ctl_write(&slave, MSENP0, !0)?;

        thread::sleep(LINK_ENABLE_SETUP);

        self.ctl_write(&slave, MCENP0, !0)?;
        self.ctl_read(&slave, MAEB)?;
        self.ctl_write(&slave, MRESP0, (Mresp::RST_ALL_MASTER | Mresp::RST_ALL_LINK).bits())?;
        self.ctl_read(&slave, MLEVP0)?;

        self.ctl_write(&slave, MRESB0, Mresb::RST_GEN.bits())?;
        self.ctl_write(&slave, MRESB0, Mresb::RST_ERR.bits())
    }
}
