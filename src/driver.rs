// CLASSIFICATION: COMMUNITY
// Filename: driver.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Engine drivers and the bus match that binds them.
//!
//! Drivers register process-wide. A newly discovered engine is offered to
//! drivers in registration order and binds to the first whose id table
//! accepts its `{type, version}`; registering a driver also offers it every
//! unbound engine already on the fabric.

use std::sync::{Arc, RwLock};

use log::{info, warn};
use once_cell::sync::Lazy;

use crate::engine::Engine;
use crate::error::{FsiError, FsiResult};
use crate::registry;
use crate::sync;

/// Matches any engine version.
pub const VERSION_ANY: u8 = 0;

/// One `{engine type, version}` a driver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    pub engine_type: u8,
    pub version: u8,
}

impl DeviceId {
    pub const fn new(engine_type: u8, version: u8) -> Self {
        Self {
            engine_type,
            version,
        }
    }

    pub const fn any_version(engine_type: u8) -> Self {
        Self::new(engine_type, VERSION_ANY)
    }

    pub fn matches(&self, engine_type: u8, version: u8) -> bool {
        self.engine_type == engine_type
            && (self.version == VERSION_ANY || self.version == version)
    }
}

/// Driver for one or more engine types.
pub trait EngineDriver: Send + Sync {
    /// Unique driver name.
    fn name(&self) -> &str;

    /// Engines this driver accepts.
    fn id_table(&self) -> &[DeviceId];

    /// Called once when the driver binds. Returning an error leaves the
    /// engine unbound.
    fn probe(&self, _engine: &Arc<Engine>) -> FsiResult<()> {
        Ok(())
    }

    /// Called when the engine goes away or the driver unregisters.
    fn remove(&self, _engine: &Engine) {}
}

fn accepts(driver: &dyn EngineDriver, engine: &Engine) -> bool {
    driver
        .id_table()
        .iter()
        .any(|id| id.matches(engine.engine_type(), engine.version()))
}

static DRIVERS: Lazy<RwLock<Vec<Arc<dyn EngineDriver>>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// Register `driver` and bind it to matching unbound engines.
pub fn register_driver(driver: Arc<dyn EngineDriver>) -> FsiResult<()> {
    if driver.id_table().is_empty() {
        return Err(FsiError::InvalidArgument("driver without id table"));
    }
    {
        let mut drivers = sync::write(&DRIVERS);
        if drivers.iter().any(|d| d.name() == driver.name()) {
            return Err(FsiError::AlreadyPresent("driver"));
        }
        drivers.push(Arc::clone(&driver));
    }
    info!("fsi: driver {} registered", driver.name());

    for engine in registry::all_engines() {
        if engine.driver().is_none() && accepts(driver.as_ref(), &engine) {
            probe(&driver, &engine);
        }
    }
    Ok(())
}

/// Unregister the driver called `name`, unbinding its engines.
pub fn unregister_driver(name: &str) -> FsiResult<()> {
    let driver = {
        let mut drivers = sync::write(&DRIVERS);
        let pos = drivers
            .iter()
            .position(|d| d.name() == name)
            .ok_or(FsiError::NotFound("driver"))?;
        drivers.remove(pos)
    };
    for engine in registry::all_engines() {
        let bound_here = engine
            .driver()
            .is_some_and(|d| Arc::ptr_eq(&d, &driver));
        if bound_here {
            unbind_engine(&engine);
        }
    }
    info!("fsi: driver {name} unregistered");
    Ok(())
}

/// Names of registered drivers in registration order.
pub fn registered_drivers() -> Vec<String> {
    sync::read(&DRIVERS)
        .iter()
        .map(|d| d.name().to_string())
        .collect()
}

/// Offer a freshly discovered engine to the registered drivers.
pub(crate) fn bind_engine(engine: &Arc<Engine>) {
    let candidate = sync::read(&DRIVERS)
        .iter()
        .find(|d| accepts(d.as_ref(), engine))
        .cloned();
    if let Some(driver) = candidate {
        probe(&driver, engine);
    }
}

fn probe(driver: &Arc<dyn EngineDriver>, engine: &Arc<Engine>) {
    engine.set_driver(Some(Arc::clone(driver)));
    match driver.probe(engine) {
        Ok(()) => info!("{}: bound to {}", engine.name(), driver.name()),
        Err(e) => {
            warn!("{}: probe by {} failed: {e}", engine.name(), driver.name());
            engine.set_driver(None);
            engine.clear_irq_handler();
        }
    }
}

/// Detach the bound driver, masking the engine's interrupt first.
pub(crate) fn unbind_engine(engine: &Engine) {
    if engine.irq_enabled() {
        if let Err(e) = crate::irq::disable_irq(engine) {
            warn!("{}: failed to mask irq on unbind: {e}", engine.name());
        }
    }
    if let Some(driver) = engine.driver() {
        driver.remove(engine);
    }
    engine.clear_irq_handler();
    engine.set_driver(None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_any_matches_every_version() {
        let id = DeviceId::any_version(0x5);
        assert!(id.matches(0x5, 1));
        assert!(id.matches(0x5, 15));
        assert!(!id.matches(0x6, 1));
    }

    #[test]
    fn exact_version_match() {
        let id = DeviceId::new(0x9, 2);
        assert!(id.matches(0x9, 2));
        assert!(!id.matches(0x9, 3));
    }
}
