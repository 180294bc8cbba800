// CLASSIFICATION: COMMUNITY
// Filename: fabric.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! TOML description of a simulated fabric.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cohesix_fsi::scan::ConfigEntry;
use cohesix_fsi::sim::{SimFabric, SimSlave};
use serde::Deserialize;

const SI1S: u32 = 0x800 + 0x1c;
const SRSIS0: u32 = 0x800 + 0x78;

#[derive(Debug, Deserialize)]
pub struct FabricSpec {
    /// Links on the root master.
    pub links: u8,
    #[serde(default, rename = "slave")]
    pub slaves: Vec<SlaveSpec>,
}

#[derive(Debug, Deserialize)]
pub struct SlaveSpec {
    pub link: u8,
    /// 28-bit chip ID payload; the CRC nibble is appended.
    pub chip_id: u32,
    #[serde(default)]
    pub engines: Vec<EngineSpec>,
    /// Pending SI1S sources.
    #[serde(default)]
    pub si1s: u32,
    /// Pending hub link sources.
    #[serde(default)]
    pub srsis0: u32,
    #[serde(default)]
    pub hub_links: Vec<SlaveSpec>,
}

#[derive(Debug, Deserialize)]
pub struct EngineSpec {
    #[serde(rename = "type")]
    pub engine_type: u8,
    #[serde(default)]
    pub version: u8,
    #[serde(default)]
    pub slots: u8,
}

impl FabricSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let spec: FabricSpec =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        if spec.links == 0 {
            bail!("{}: fabric needs at least one link", path.display());
        }
        Ok(spec)
    }

    pub fn build(&self) -> Result<Arc<SimFabric>> {
        let fabric = SimFabric::new();
        for slave in &self.slaves {
            if slave.link >= self.links {
                bail!("slave on link {} but root has {} links", slave.link, self.links);
            }
            fabric.attach(slave.link, slave.build());
        }
        Ok(fabric)
    }
}

impl SlaveSpec {
    fn build(&self) -> Arc<SimSlave> {
        let entries: Vec<ConfigEntry> = self
            .engines
            .iter()
            .map(|e| ConfigEntry::engine(e.engine_type, e.version, e.slots))
            .collect();
        let slave = SimSlave::with_table(self.chip_id, &entries);
        slave.poke(SI1S, self.si1s);
        slave.poke(SRSIS0, self.srsis0);
        for child in &self.hub_links {
            slave.attach_hub_link(child.link, child.build());
        }
        slave
    }
}
