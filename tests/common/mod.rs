// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cohesix_fsi::scan::ConfigEntry;
use cohesix_fsi::sim::{SimFabric, SimSlave};
use cohesix_fsi::{DeviceId, Engine, EngineDriver, FsiError, FsiResult, Master};

pub const CHIP_ID: u32 = 0x012_3456;
pub const SI1S_ADDR: u32 = 0x800 + 0x1c;
pub const SI1M_ADDR: u32 = 0x800 + 0x18;
pub const SRSIS0_ADDR: u32 = 0x800 + 0x78;
pub const SRSIM0_ADDR: u32 = 0x800 + 0x70;
pub const SRSIC0_ADDR: u32 = 0x800 + 0x68;
/// Hub control block when the hub master is the first table entry.
pub const HUB_CTL: u32 = 0xc00;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Slave with `(type 5, v1, 1 slot)` and `(type 9, v2, 2 slots)`.
pub fn two_engine_slave() -> Arc<SimSlave> {
    SimSlave::with_table(
        CHIP_ID,
        &[ConfigEntry::engine(0x5, 1, 1), ConfigEntry::engine(0x9, 2, 2)],
    )
}

/// Root slave carrying a hub master and three hub links.
pub fn hub_slave() -> Arc<SimSlave> {
    let mut entries = vec![ConfigEntry::hub_master(1)];
    entries.extend(std::iter::repeat(ConfigEntry::hub_link()).take(6));
    SimSlave::with_table(CHIP_ID, &entries)
}

/// Root slave whose hub master advertises eight links.
pub fn wide_hub_slave() -> Arc<SimSlave> {
    let mut entries = vec![ConfigEntry::hub_master(1)];
    entries.extend(std::iter::repeat(ConfigEntry::hub_link()).take(16));
    SimSlave::with_table(CHIP_ID, &entries)
}

/// Slave with a single `(type 5, v1, 1 slot)` engine.
pub fn leaf_slave() -> Arc<SimSlave> {
    SimSlave::with_table(CHIP_ID, &[ConfigEntry::engine(0x5, 1, 1)])
}

pub fn fabric_with(link0: Arc<SimSlave>) -> Arc<SimFabric> {
    let fabric = SimFabric::new();
    fabric.attach(0, link0);
    fabric
}

pub fn root_master(fabric: &Arc<SimFabric>, n_links: u8) -> Arc<Master> {
    Master::new_root(n_links, fabric.clone())
}

/// Driver that counts probes, removes and interrupts.
pub struct CountingDriver {
    name: String,
    ids: Vec<DeviceId>,
    install_handler: bool,
    fail_probe: bool,
    pub probes: AtomicUsize,
    pub removes: AtomicUsize,
    pub irqs: Arc<AtomicUsize>,
}

impl CountingDriver {
    pub fn new(name: &str, ids: &[DeviceId]) -> Arc<Self> {
        Arc::new(Self::plain(name, ids))
    }

    pub fn without_handler(name: &str, ids: &[DeviceId]) -> Arc<Self> {
        Arc::new(Self {
            install_handler: false,
            ..Self::plain(name, ids)
        })
    }

    pub fn failing(name: &str, ids: &[DeviceId]) -> Arc<Self> {
        Arc::new(Self {
            fail_probe: true,
            ..Self::plain(name, ids)
        })
    }

    fn plain(name: &str, ids: &[DeviceId]) -> Self {
        Self {
            name: name.to_string(),
            ids: ids.to_vec(),
            install_handler: true,
            fail_probe: false,
            probes: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            irqs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn irq_count(&self) -> usize {
        self.irqs.load(Ordering::SeqCst)
    }
}

impl EngineDriver for CountingDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn id_table(&self) -> &[DeviceId] {
        &self.ids
    }

    fn probe(&self, engine: &Arc<Engine>) -> FsiResult<()> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.fail_probe {
            return Err(FsiError::NotFound("device"));
        }
        if self.install_handler {
            let irqs = Arc::clone(&self.irqs);
            engine.set_irq_handler(Arc::new(move |_: &Engine| {
                irqs.fetch_add(1, Ordering::SeqCst);
            }));
        }
        Ok(())
    }

    fn remove(&self, _engine: &Engine) {
        self.removes.fetch_add(1, Ordering::SeqCst);
    }
}
