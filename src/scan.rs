// CLASSIFICATION: COMMUNITY
// Filename: scan.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Link bring-up, slave probing and configuration-table walk.
//!
//! Each link is enabled, broken and probed at the default slave id. A
//! responding slave is assigned its id through SMODE, identified by its
//! CRC-protected chip-ID word, and its configuration table is walked to
//! build the engine list. A hub master entry turns the slave into the
//! parent of a new [`Master`] whose links are scanned the same way.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config;
use crate::crc4::{crc4_valid, seal};
use crate::driver;
use crate::engine::{Engine, EngineInfo};
use crate::error::{FsiError, FsiResult};
use crate::hub::HubMaster;
use crate::master::{LinkState, Master};
use crate::regs::{
    default_smode, DEFAULT_SLAVE_ID, ENGID_HUB_LINK, ENGID_HUB_MASTER, ENGINE_PAGE_SIZE,
    HUB_MASTER_MAX_LINKS, N_SLAVES, SI1S_MAX_BIT, SLAVE_BASE, SMODE,
};
use crate::registry;
use crate::slave::Slave;

const CONF_NEXT: u32 = 0x8000_0000;
const CONF_SLOTS_SHIFT: u32 = 16;
const CONF_SLOTS_MASK: u32 = 0x00ff_0000;
const CONF_VERSION_SHIFT: u32 = 12;
const CONF_VERSION_MASK: u32 = 0x0000_f000;
const CONF_TYPE_SHIFT: u32 = 4;
const CONF_TYPE_MASK: u32 = 0x0000_0ff0;

/// Offset of the first configuration-table entry: after the chip ID and
/// two reserved words.
pub const CONF_TABLE_START: u32 = 4 * 3;
/// First engine address: the table page and two reserved pages precede it.
pub const FIRST_ENGINE_ADDR: u32 = 3 * ENGINE_PAGE_SIZE;
/// Configuration-table entries that fit one page.
pub const CONF_TABLE_ENTRIES: u32 = ENGINE_PAGE_SIZE / 4;

/// One decoded configuration-table word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigEntry {
    pub next: bool,
    pub slots: u8,
    pub version: u8,
    pub engine_type: u8,
}

impl ConfigEntry {
    /// Entry for a regular engine, marked as not last.
    pub const fn engine(engine_type: u8, version: u8, slots: u8) -> Self {
        Self {
            next: true,
            slots,
            version: version & 0xf,
            engine_type,
        }
    }

    pub const fn hub_master(slots: u8) -> Self {
        Self::engine(ENGID_HUB_MASTER, 1, slots)
    }

    pub const fn hub_link() -> Self {
        Self::engine(ENGID_HUB_LINK, 1, 0)
    }

    /// Same entry with the continuation bit set to `next`.
    pub const fn with_next(self, next: bool) -> Self {
        Self { next, ..self }
    }

    /// Decode a word, checking its CRC.
    pub fn decode(word: u32) -> FsiResult<Self> {
        Self::decode_at(0, word)
    }

    /// Decode a word read from `offset`, which is reported on CRC errors.
    pub fn decode_at(offset: u32, word: u32) -> FsiResult<Self> {
        if !crc4_valid(word) {
            return Err(FsiError::CrcMismatch { offset, word });
        }
        Ok(Self {
            next: word & CONF_NEXT != 0,
            slots: ((word & CONF_SLOTS_MASK) >> CONF_SLOTS_SHIFT) as u8,
            version: ((word & CONF_VERSION_MASK) >> CONF_VERSION_SHIFT) as u8,
            engine_type: ((word & CONF_TYPE_MASK) >> CONF_TYPE_SHIFT) as u8,
        })
    }

    /// Wire form with a valid CRC nibble.
    pub fn encode(&self) -> u32 {
        let mut word = (u32::from(self.slots) << CONF_SLOTS_SHIFT)
            | ((u32::from(self.version) << CONF_VERSION_SHIFT) & CONF_VERSION_MASK)
            | (u32::from(self.engine_type) << CONF_TYPE_SHIFT);
        if self.next {
            word |= CONF_NEXT;
        }
        seal(word >> 4)
    }

    /// Bytes of slave address space the entry occupies.
    pub fn size(&self) -> u32 {
        u32::from(self.slots) * ENGINE_PAGE_SIZE
    }
}

/// Enumerate every link of `master`. Failures are confined to the link or
/// slave where they happen.
pub(crate) fn scan_master(master: &Arc<Master>) {
    let cfg = config::get_config();
    for link in 0..master.n_links() {
        if let Err(e) = master.link_enable(link) {
            debug!("{}: link enable on {link} failed: {e}", master.name());
            continue;
        }
        master.set_link_state(link, LinkState::Enabled);

        if let Err(e) = master.send_break(link) {
            debug!("{}: break on link {link} failed: {e}", master.name());
            continue;
        }
        master.set_link_state(link, LinkState::Broken);

        if let Err(e) = master.read_u32(link, DEFAULT_SLAVE_ID, SLAVE_BASE + SMODE) {
            debug!("{}: no slave on link {link}: {e}", master.name());
            continue;
        }
        master.set_link_state(link, LinkState::Probed);

        for id in (0..N_SLAVES).filter(|id| cfg.slave_enabled(*id)) {
            match slave_init(master, link, id) {
                Ok(_) => master.set_link_state(link, LinkState::Populated),
                Err(e) => warn!("{}: slave {link}:{id} init failed: {e}", master.name()),
            }
        }
    }
}

/// Assign `id` to the slave answering at the default id on `link`,
/// register it and walk its configuration table.
pub(crate) fn slave_init(master: &Arc<Master>, link: u8, id: u8) -> FsiResult<Arc<Slave>> {
    master.write_u32(link, DEFAULT_SLAVE_ID, SLAVE_BASE + SMODE, default_smode(id))?;

    let chip_id = master.read_u32(link, id, 0)?;
    if !crc4_valid(chip_id) {
        warn!(
            "{}: invalid chip id CRC on {link}:{id} ({chip_id:#010x})",
            master.name()
        );
        return Err(FsiError::PermanentFailure(format!(
            "chip id {chip_id:#010x} failed crc"
        )));
    }

    let slave = Slave::new(master, link, id, chip_id);
    master.add_slave(Arc::clone(&slave));
    info!("{}: chip id {chip_id:#010x}", slave.name());

    if let Err(e) = slave.irq_clear() {
        warn!("{}: could not clear irq latches: {e}", slave.name());
    }
    if let Err(e) = scan_slave(master, &slave) {
        warn!("{}: table scan aborted: {e}", slave.name());
    }
    Ok(slave)
}

/// Walk the configuration table, creating engines and at most one hub.
pub(crate) fn scan_slave(master: &Arc<Master>, slave: &Arc<Slave>) -> FsiResult<()> {
    let master_idx = master.idx().ok_or(FsiError::NotFound("master index"))?;
    let mut engine_addr = u64::from(FIRST_ENGINE_ADDR);
    let mut si1s_bit: u8 = 1;
    let mut conf_link_count: u32 = 0;
    let mut hub: Option<HubMaster> = None;

    for i in 2..CONF_TABLE_ENTRIES {
        let offset = (i + 1) * 4;
        let word = slave.read_u32(offset).map_err(|e| {
            warn!("{}: error reading slave registers", slave.name());
            e
        })?;
        let entry = ConfigEntry::decode_at(offset, word).map_err(|e| {
            warn!("{}: crc error in slave register at {offset:#06x}", slave.name());
            e
        })?;

        let size = u64::from(entry.size());
        if engine_addr + size > 1 << 32 {
            warn!("{}: engine table runs past the address space", slave.name());
            return Err(FsiError::InvalidArgument("engine outside slave address space"));
        }

        match entry.engine_type {
            0 => {}
            ENGID_HUB_MASTER => {
                if hub.is_some() {
                    warn!("{}: ignoring second hub master at {engine_addr:#x}", slave.name());
                } else {
                    info!("{}: hub master at {engine_addr:#x}", slave.name());
                    hub = Some(HubMaster::new(slave, engine_addr as u32, master_idx));
                }
            }
            ENGID_HUB_LINK => conf_link_count += 1,
            engine_type if entry.slots > 0 => {
                if si1s_bit > SI1S_MAX_BIT {
                    warn!("{}: engine {i} has no SI1S bit left", slave.name());
                }
                let info = EngineInfo {
                    engine_type,
                    version: entry.version,
                    unit: i as u8,
                    addr: engine_addr as u32,
                    size: entry.size(),
                    si1s_bit,
                };
                let engine = Engine::new(slave, info, master_idx);
                info!(
                    "{}: engine type {engine_type:#04x} v{} at {:#x}+{:#x}",
                    engine.name(),
                    entry.version,
                    info.addr,
                    info.size
                );
                slave.push_engine(Arc::clone(&engine));
                driver::bind_engine(&engine);
                si1s_bit = si1s_bit.saturating_add(1);
            }
            _ => {}
        }

        engine_addr += size;
        if !entry.next {
            break;
        }
    }

    if let Some(hub) = hub {
        attach_hub(slave, hub, conf_link_count);
    }
    Ok(())
}

/// Initialize and register a discovered hub. A failure leaves the slave
/// without a hub.
fn attach_hub(slave: &Arc<Slave>, hub: HubMaster, conf_link_count: u32) {
    let n_links = (conf_link_count / 2).min(u32::from(HUB_MASTER_MAX_LINKS)) as u8;
    let hub_master = Master::new_hub(hub, n_links);

    let init = match hub_master.hub() {
        Some(hub) => hub.init(),
        None => Err(FsiError::NotFound("hub")),
    };
    if let Err(e) = init {
        warn!("{}: hub master init failed: {e}", slave.name());
        return;
    }

    match registry::register_master(&hub_master) {
        Ok(_) => slave.set_hub(hub_master),
        Err(e) => warn!("{}: hub registration failed: {e}", slave.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_entry_layout() {
        let word = ConfigEntry::engine(0x5, 1, 1).with_next(false).encode();
        assert_eq!(word >> 4, 0x000_1105);
        assert!(crc4_valid(word));
        let entry = ConfigEntry::decode(word).unwrap();
        assert_eq!(entry.engine_type, 0x5);
        assert_eq!(entry.version, 1);
        assert_eq!(entry.slots, 1);
        assert!(!entry.next);
        assert_eq!(entry.size(), 0x400);
    }

    #[test]
    fn next_bit_is_top_bit() {
        let word = ConfigEntry::engine(0x9, 2, 2).encode();
        assert_ne!(word & CONF_NEXT, 0);
        assert!(ConfigEntry::decode(word).unwrap().next);
    }

    #[test]
    fn poisoned_crc_reports_offset() {
        let word = ConfigEntry::engine(0x9, 2, 2).encode() ^ 0xf;
        assert_eq!(
            ConfigEntry::decode_at(0x10, word),
            Err(FsiError::CrcMismatch { offset: 0x10, word })
        );
    }

    #[test]
    fn hub_entries() {
        assert_eq!(ConfigEntry::hub_master(1).engine_type, ENGID_HUB_MASTER);
        assert_eq!(ConfigEntry::hub_link().engine_type, ENGID_HUB_LINK);
        assert_eq!(ConfigEntry::hub_link().size(), 0);
    }
}
