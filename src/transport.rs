// CLASSIFICATION: COMMUNITY
// Filename: transport.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Physical link capability supplied by a root master driver.

use crate::error::FsiResult;

/// One raw transaction on one link.
///
/// Implementations perform blocking I/O; the core never retries. Buffer
/// length is the access size and must be 1, 2 or 4. Words travel
/// big-endian.
pub trait LinkTransport: Send + Sync {
    /// Read `buf.len()` bytes from `addr` of slave `id` on `link`.
    fn read(&self, link: u8, id: u8, addr: u32, buf: &mut [u8]) -> FsiResult<()>;

    /// Write `data` to `addr` of slave `id` on `link`.
    fn write(&self, link: u8, id: u8, addr: u32, data: &[u8]) -> FsiResult<()>;

    /// Issue a break on `link`. Transports without break support succeed.
    fn send_break(&self, _link: u8) -> FsiResult<()> {
        Ok(())
    }

    /// Power up `link`. Transports whose links are always on succeed.
    fn link_enable(&self, _link: u8) -> FsiResult<()> {
        Ok(())
    }
}
