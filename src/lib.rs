// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v2.0
// Date Modified: 2026-10-16
// Author: Lukas Bower

//! FSI (FRU Support Interface) transport core.
//!
//! Discovers slaves and engines behind root and hub masters, routes
//! register accesses through the resulting tree, demultiplexes engine
//! interrupts from a single polling thread and recovers links after bus
//! faults. Physical links are supplied through [`LinkTransport`].

/// Error taxonomy
pub mod error;

/// CRC-4 codec for chip-ID and configuration words
pub mod crc4;

/// Register offsets, flag types and field encoders
pub mod regs;

/// Physical link capability
pub mod transport;

/// Runtime configuration and the poll-period attribute
pub mod config;

/// Root and hub masters
pub mod master;

/// Hub master bridge and init sequence
pub mod hub;

/// Slaves and the raw access window
pub mod slave;

/// Engines on a slave
pub mod engine;

/// Engine drivers and binding
pub mod driver;

/// Enumeration
pub mod scan;

/// Interrupt routing and polling
pub mod irq;

/// Bus fault recovery
pub mod recovery;

/// Master registration and index pool
pub mod registry;

/// Simulated fabric for tests and tooling
pub mod sim;

mod sync;

pub use driver::{register_driver, unregister_driver, DeviceId, EngineDriver, VERSION_ANY};
pub use engine::{Engine, EngineInfo, IrqHandler};
pub use error::{FsiError, FsiResult};
pub use irq::{disable_irq, enable_irq, start_ipoll, stop_ipoll, InterruptRouter};
pub use master::{LinkState, Master, MasterKind};
pub use recovery::handle_error;
pub use registry::{register_master, registered_masters, unregister_master, TestRegistryGuard};
pub use slave::Slave;
pub use transport::LinkTransport;
