// CLASSIFICATION: COMMUNITY
// Filename: master.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Masters: anything that owns a set of FSI links.
//!
//! A root master wraps a [`LinkTransport`] supplied by a controller driver.
//! A hub master is discovered inside a slave and reaches its links through
//! windows in that slave's address space. Both expose the same I/O surface.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use crate::error::{FsiError, FsiResult};
use crate::hub::HubMaster;
use crate::slave::Slave;
use crate::sync;
use crate::transport::LinkTransport;

/// Hardware set-up latency after enabling a link.
pub const LINK_ENABLE_SETUP: Duration = Duration::from_millis(10);

/// Bring-up progress of one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not touched since registration.
    Idle,
    /// Link enable succeeded.
    Enabled,
    /// Break issued.
    Broken,
    /// A slave answered at the default id.
    Probed,
    /// At least one slave registered.
    Populated,
}

/// How a master reaches its links.
pub enum MasterKind {
    /// Controller-backed master at the top of the tree.
    Root(Arc<dyn LinkTransport>),
    /// Master discovered as an engine of an upstream slave.
    Hub(HubMaster),
}

/// A root or hub master and the slaves found on its links.
pub struct Master {
    kind: MasterKind,
    n_links: u8,
    idx: Mutex<Option<u32>>,
    ipoll: AtomicU32,
    ipoll_lock: Mutex<()>,
    slaves: RwLock<Vec<Arc<Slave>>>,
    link_states: Mutex<Vec<LinkState>>,
}

impl Master {
    /// Create an unregistered root master over `transport`.
    pub fn new_root(n_links: u8, transport: Arc<dyn LinkTransport>) -> Arc<Self> {
        Self::with_kind(MasterKind::Root(transport), n_links)
    }

    pub(crate) fn new_hub(hub: HubMaster, n_links: u8) -> Arc<Self> {
        Self::with_kind(MasterKind::Hub(hub), n_links)
    }

    fn with_kind(kind: MasterKind, n_links: u8) -> Arc<Self> {
        Arc::new(Self {
            kind,
            n_links,
            idx: Mutex::new(None),
            ipoll: AtomicU32::new(0),
            ipoll_lock: Mutex::new(()),
            slaves: RwLock::new(Vec::new()),
            link_states: Mutex::new(vec![LinkState::Idle; usize::from(n_links)]),
        })
    }

    /// Device name: `fsi<idx>` for roots, `hub@<parent idx>` for hubs.
    pub fn name(&self) -> String {
        match &self.kind {
            MasterKind::Root(_) => match self.idx() {
                Some(idx) => format!("fsi{idx}"),
                None => "fsi?".to_string(),
            },
            MasterKind::Hub(hub) => format!("hub@{:02x}", hub.parent_idx()),
        }
    }

    /// Pool index while registered.
    pub fn idx(&self) -> Option<u32> {
        *sync::lock(&self.idx)
    }

    pub(crate) fn claim_idx(&self, alloc: impl FnOnce() -> FsiResult<u32>) -> FsiResult<u32> {
        let mut slot = sync::lock(&self.idx);
        if slot.is_some() {
            return Err(FsiError::AlreadyPresent("master"));
        }
        let idx = alloc()?;
        *slot = Some(idx);
        Ok(idx)
    }

    pub(crate) fn take_idx(&self) -> Option<u32> {
        sync::lock(&self.idx).take()
    }

    pub fn n_links(&self) -> u8 {
        self.n_links
    }

    pub fn kind(&self) -> &MasterKind {
        &self.kind
    }

    /// Hub details when this master is a hub.
    pub fn hub(&self) -> Option<&HubMaster> {
        match &self.kind {
            MasterKind::Hub(hub) => Some(hub),
            MasterKind::Root(_) => None,
        }
    }

    pub fn is_hub(&self) -> bool {
        self.hub().is_some()
    }

    /// Upstream-visible IRQ enable mask.
    pub fn ipoll(&self) -> u32 {
        self.ipoll.load(Ordering::SeqCst)
    }

    /// Rebuild `ipoll` from the enabled engines and active child hubs.
    pub(crate) fn recompute_ipoll(&self) -> u32 {
        let _guard = sync::lock(&self.ipoll_lock);
        let mask = self
            .slaves()
            .iter()
            .fold(0, |acc, slave| acc | slave.irq_sources());
        self.ipoll.store(mask, Ordering::SeqCst);
        mask
    }

    /// True when any slave on `link` has an IRQ source enabled.
    pub(crate) fn link_irq_active(&self, link: u8) -> bool {
        self.slaves()
            .iter()
            .any(|slave| slave.link() == link && slave.irq_sources() != 0)
    }

    /// Snapshot of the registered slaves in discovery order.
    pub fn slaves(&self) -> Vec<Arc<Slave>> {
        sync::read(&self.slaves).clone()
    }

    pub(crate) fn add_slave(&self, slave: Arc<Slave>) {
        sync::write(&self.slaves).push(slave);
    }

    pub(crate) fn take_slaves(&self) -> Vec<Arc<Slave>> {
        std::mem::take(&mut *sync::write(&self.slaves))
    }

    /// Bring-up state of `link`, `None` past `n_links`.
    pub fn link_state(&self, link: u8) -> Option<LinkState> {
        sync::lock(&self.link_states).get(usize::from(link)).copied()
    }

    pub(crate) fn set_link_state(&self, link: u8, state: LinkState) {
        if let Some(slot) = sync::lock(&self.link_states).get_mut(usize::from(link)) {
            *slot = state;
        }
    }

    pub(crate) fn reset_link_states(&self) {
        sync::lock(&self.link_states).fill(LinkState::Idle);
    }

    /// Read `buf.len()` bytes from slave `id` on `link`.
    pub fn read(&self, link: u8, id: u8, addr: u32, buf: &mut [u8]) -> FsiResult<()> {
        match &self.kind {
            MasterKind::Root(transport) => transport.read(link, id, addr, buf),
            MasterKind::Hub(hub) => hub.read(link, addr, buf),
        }
    }

    /// Write `data` to slave `id` on `link`.
    pub fn write(&self, link: u8, id: u8, addr: u32, data: &[u8]) -> FsiResult<()> {
        match &self.kind {
            MasterKind::Root(transport) => transport.write(link, id, addr, data),
            MasterKind::Hub(hub) => hub.write(link, addr, data),
        }
    }

    pub fn read_u32(&self, link: u8, id: u8, addr: u32) -> FsiResult<u32> {
        let mut buf = [0u8; 4];
        self.read(link, id, addr, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn write_u32(&self, link: u8, id: u8, addr: u32, value: u32) -> FsiResult<()> {
        self.write(link, id, addr, &value.to_be_bytes())
    }

    /// Issue a break on `link`.
    pub fn send_break(&self, link: u8) -> FsiResult<()> {
        match &self.kind {
            MasterKind::Root(transport) => transport.send_break(link),
            MasterKind::Hub(hub) => hub.send_break(link),
        }
    }

    /// Enable `link` and wait out the set-up latency.
    pub fn link_enable(&self, link: u8) -> FsiResult<()> {
        match &self.kind {
            MasterKind::Root(transport) => {
                let rc = transport.link_enable(link);
                thread::sleep(LINK_ENABLE_SETUP);
                rc
            }
            MasterKind::Hub(hub) => hub.link_enable(link),
        }
    }
}

impl std::fmt::Debug for Master {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Master")
            .field("name", &self.name())
            .field("n_links", &self.n_links)
            .field("ipoll", &format_args!("{:#010x}", self.ipoll()))
            .finish()
    }
}
