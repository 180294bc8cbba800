// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Error taxonomy shared by every layer of the FSI core.

use thiserror::Error;

/// Errors produced by FSI fabric operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsiError {
    /// The link layer rejected or timed out a transaction.
    #[error("transport error on link {link} slave {id} at {addr:#x}: {reason}")]
    Transport {
        link: u8,
        id: u8,
        addr: u32,
        reason: String,
    },
    /// A configuration-table or chip-ID word failed its CRC-4 check.
    #[error("crc error in word {word:#010x} at offset {offset:#06x}")]
    CrcMismatch { offset: u32, word: u32 },
    /// The device or host cannot be used: a slave with a bad chip ID,
    /// or a worker thread that failed to spawn.
    #[error("permanent failure: {0}")]
    PermanentFailure(String),
    /// Misaligned, oversized or out-of-range access.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Duplicate registration.
    #[error("{0} already present")]
    AlreadyPresent(&'static str),
    /// The entity was never registered or has been torn down.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// No free master index left in the pool.
    #[error("no free master index")]
    Capacity,
}

impl FsiError {
    /// Build a transport error for the given endpoint.
    pub fn transport(link: u8, id: u8, addr: u32, reason: impl Into<String>) -> Self {
        FsiError::Transport {
            link,
            id,
            addr,
            reason: reason.into(),
        }
    }

    /// True for errors raised by the link layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, FsiError::Transport { .. })
    }
}

/// Result alias used across the crate.
pub type FsiResult<T> = Result<T, FsiError>;
