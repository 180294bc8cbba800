// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Simulated FSI fabric.
//!
//! [`SimFabric`] implements [`crate::LinkTransport`] over in-memory
//! [`SimSlave`] register files, logs every transaction with a timestamp
//! and supports hub link windows and fault injection.

mod fabric;
mod slave;

pub use fabric::{SimEvent, SimFabric, SimOp};
pub use slave::SimSlave;
