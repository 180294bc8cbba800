// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Runtime configuration of the FSI core and the poll-period attribute.

use std::env;
use std::sync::RwLock;

use log::{debug, warn};
use once_cell::sync::Lazy;

use crate::error::{FsiError, FsiResult};
use crate::sync;

/// Default interval between SI1S polls.
pub const DEFAULT_IPOLL_PERIOD_MS: u32 = 100;
/// Exclusive lower bound of the poll period.
pub const IPOLL_PERIOD_MIN_MS: u32 = 1;
/// Exclusive upper bound of the poll period.
pub const IPOLL_PERIOD_MAX_MS: u32 = 10_000;

/// How the interrupt router picks a hub link when several are pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HublinkPolicy {
    /// Lowest-numbered pending link always wins.
    MsbFirst,
    /// Pending links are served in rotation.
    RoundRobin,
}

impl HublinkPolicy {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "msb" | "msb-first" => Some(HublinkPolicy::MsbFirst),
            "rr" | "round-robin" => Some(HublinkPolicy::RoundRobin),
            _ => None,
        }
    }
}

/// Process-wide FSI settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsiConfig {
    /// Interval between SI1S polls, in the open range (1, 10000).
    pub ipoll_period_ms: u32,
    /// Bit `n` set enables slave id `n` during link scans.
    pub slave_id_mask: u8,
    /// Hub link selection used by newly started pollers.
    pub hublink_policy: HublinkPolicy,
}

impl Default for FsiConfig {
    fn default() -> Self {
        Self {
            ipoll_period_ms: DEFAULT_IPOLL_PERIOD_MS,
            // Break handling limits links to one slave for now.
            slave_id_mask: 0b0001,
            hublink_policy: HublinkPolicy::MsbFirst,
        }
    }
}

impl FsiConfig {
    /// Defaults overridden by `COH_FSI_IPOLL_MS`, `COH_FSI_SLAVE_MASK`
    /// and `COH_FSI_HUBLINK_POLICY`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("COH_FSI_IPOLL_MS") {
            match parse_ulong(&v).and_then(|ms| u32::try_from(ms).ok()) {
                Some(ms) if period_in_range(ms) => cfg.ipoll_period_ms = ms,
                _ => warn!("ignoring COH_FSI_IPOLL_MS={v}"),
            }
        }
        if let Ok(v) = env::var("COH_FSI_SLAVE_MASK") {
            match parse_ulong(&v).and_then(|m| u8::try_from(m).ok()) {
                Some(mask) if mask & 0xf != 0 => cfg.slave_id_mask = mask & 0xf,
                _ => warn!("ignoring COH_FSI_SLAVE_MASK={v}"),
            }
        }
        if let Ok(v) = env::var("COH_FSI_HUBLINK_POLICY") {
            match HublinkPolicy::parse(&v) {
                Some(policy) => cfg.hublink_policy = policy,
                None => warn!("ignoring COH_FSI_HUBLINK_POLICY={v}"),
            }
        }
        cfg
    }

    /// True when scans should probe slave `id`.
    pub fn slave_enabled(&self, id: u8) -> bool {
        id < 8 && self.slave_id_mask & (1 << id) != 0
    }
}

static CONFIG: Lazy<RwLock<FsiConfig>> = Lazy::new(|| RwLock::new(FsiConfig::from_env()));

/// Snapshot of the current configuration.
pub fn get_config() -> FsiConfig {
    sync::read(&CONFIG).clone()
}

/// Replace the configuration. The poll period is validated like the
/// attribute store.
pub fn set_config(cfg: FsiConfig) -> FsiResult<()> {
    if !period_in_range(cfg.ipoll_period_ms) {
        return Err(FsiError::InvalidArgument("poll period out of range"));
    }
    *sync::write(&CONFIG) = cfg;
    Ok(())
}

/// Current poll period in milliseconds.
pub fn ipoll_period_ms() -> u32 {
    sync::read(&CONFIG).ipoll_period_ms
}

/// Set the poll period. Values outside (1, 10000) are rejected and the
/// current period is kept.
pub fn set_ipoll_period_ms(ms: u32) -> FsiResult<()> {
    if !period_in_range(ms) {
        return Err(FsiError::InvalidArgument("poll period out of range"));
    }
    sync::write(&CONFIG).ipoll_period_ms = ms;
    debug!("fsi: ipoll period set to {ms} ms");
    Ok(())
}

/// Attribute read: the period followed by a newline.
pub fn ipoll_period_show() -> String {
    format!("{}\n", ipoll_period_ms())
}

/// Attribute write: accepts decimal, `0x` hex or leading-zero octal text.
/// Returns the number of bytes consumed.
pub fn ipoll_period_store(buf: &str) -> FsiResult<usize> {
    let val = parse_ulong(buf).ok_or(FsiError::InvalidArgument("not a number"))?;
    let ms = u32::try_from(val).map_err(|_| FsiError::InvalidArgument("poll period out of range"))?;
    set_ipoll_period_ms(ms)?;
    Ok(buf.len())
}

fn period_in_range(ms: u32) -> bool {
    ms > IPOLL_PERIOD_MIN_MS && ms < IPOLL_PERIOD_MAX_MS
}

/// Parse an unsigned integer with C-style radix detection.
fn parse_ulong(s: &str) -> Option<u64> {
    let s = s.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    if s.is_empty() {
        return None;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse().ok()
    }
}
