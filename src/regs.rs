// CLASSIFICATION: COMMUNITY
// Filename: regs.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Bit-exact register map of FSI slaves and hub master engines.
//!
//! Slave engine registers sit at [`SLAVE_BASE`] in every slave's address
//! space. Master registers are offsets from a hub engine's control block.

use bitflags::bitflags;

/// Break command word.
pub const FSI_BREAK: u32 = 0xc0de_0000;

/// Maximum slaves addressable on one link.
pub const N_SLAVES: u8 = 4;
/// Slave id every slave answers to before it is assigned one.
pub const DEFAULT_SLAVE_ID: u8 = 3;

/// Engine page size; configuration-table slots are counted in pages.
pub const ENGINE_PAGE_SIZE: u32 = 0x400;
/// Base of the peek engine that mirrors the configuration table.
pub const PEEK_BASE: u32 = 0x410;
/// Base of the slave engine register block.
pub const SLAVE_BASE: u32 = 0x800;
/// Control block of the hub master on a root slave.
pub const HUB_CONTROL: u32 = 0x3400;

/// Engine type of a hub master.
pub const ENGID_HUB_MASTER: u8 = 0x1c;
/// Engine type of a hub link marker.
pub const ENGID_HUB_LINK: u8 = 0x1d;
/// Slave-relative start of a hub's link address space.
pub const HUB_LINK_OFFSET: u32 = 0x80000;
/// Address space per hub link.
pub const HUB_LINK_SIZE: u32 = 0x80000;
/// Hub links supported by the hardware.
pub const HUB_MASTER_MAX_LINKS: u8 = 8;
/// Hub links break at this offset instead of 0.
pub const HUB_BREAK_OFFSET: u32 = 0x4;

// Slave engine registers, relative to SLAVE_BASE.
pub const SMODE: u32 = 0x00;
pub const SI1M: u32 = 0x18;
pub const SI1S: u32 = 0x1c;
pub const SRSIC0: u32 = 0x68;
pub const SRSIC1: u32 = 0x6c;
pub const SRSIM0: u32 = 0x70;
pub const SRSIS0: u32 = 0x78;

// Master registers, relative to the hub control block.
pub const MMODE: u32 = 0x000;
pub const MDLYR: u32 = 0x004;
pub const MCRSP: u32 = 0x008;
pub const MENP0: u32 = 0x010;
pub const MLEVP0: u32 = 0x018;
pub const MSENP0: u32 = 0x018;
pub const MCENP0: u32 = 0x020;
pub const MSIEP0: u32 = 0x030;
pub const MAEB: u32 = 0x070;
pub const MVER: u32 = 0x074;
pub const MRESP0: u32 = 0x0d0;
pub const MRESB0: u32 = 0x1d0;
pub const MECTRL: u32 = 0x2e0;

/// Hub IRQ source bit in SI1S / SI1M.
pub const SI1_HUB_SRC: u32 = 0x0010_0000;
/// SI1 interrupt sources within SRSIS0 / SRSIM0 / SRSIC0.
pub const SRSIX_IRQ1_MASK: u32 = 0x00aa_aaaa;
/// Bits per hub link in the SRSIx registers.
pub const SRSIX_BITS_PER_LINK: u32 = 8;
/// Bits per link in MSIEP0.
pub const MSIEP_BITS_PER_LINK: u32 = 4;
/// MMODE value programmed upstream when a hub starts forwarding IRQs.
pub const MMODE_IPOLL_CONFIG: u32 = 0xd004_0410;
/// Delay register value: maximum send and echo delays.
pub const MDLYR_MAX_DELAYS: u32 = 0xffff_0000;

bitflags! {
    /// Fixed flag bits of the slave mode register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Smode: u32 {
        /// Warm start done.
        const WSC = 0x8000_0000;
        /// Hardware CRC check.
        const ECRC = 0x2000_0000;
    }
}

bitflags! {
    /// Master mode register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mmode: u32 {
        /// Enable interrupt polling.
        const EIP = 0x8000_0000;
        /// Enable error recovery.
        const ECRC = 0x4000_0000;
        /// Enable parity checking.
        const EPC = 0x1000_0000;
        /// Timeout value LSB.
        const P8_TO_LSB = 0x0000_0010;
    }
}

bitflags! {
    /// Port reset register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mresp: u32 {
        const RST_ALL_MASTER = 0x2000_0000;
        const RST_ALL_LINK = 0x1000_0000;
        const RST_MCR = 0x0800_0000;
        const RST_PYE = 0x0400_0000;
    }
}

bitflags! {
    /// Bridge reset register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mresb: u32 {
        const RST_GEN = 0x8000_0000;
        const RST_ERR = 0x4000_0000;
    }
}

bitflags! {
    /// Error control register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mectrl: u32 {
        /// Machine check when master 0 is in error.
        const EOAE = 0x8000;
        const P8_AUTO_TERM = 0x4000;
    }
}

const SMODE_SID_SHIFT: u32 = 24;
const SMODE_SID_MASK: u32 = 0x3;
const SMODE_ED_SHIFT: u32 = 20;
const SMODE_ED_MASK: u32 = 0xf;
const SMODE_SD_SHIFT: u32 = 16;
const SMODE_SD_MASK: u32 = 0xf;
const SMODE_LBCRR_SHIFT: u32 = 8;
const SMODE_LBCRR_MASK: u32 = 0xf;

const MMODE_CRS0_SHIFT: u32 = 18;
const MMODE_CRS1_SHIFT: u32 = 8;
const MMODE_CRS_MASK: u32 = 0x3ff;

/// Encode the slave local bus echo delay.
pub const fn smode_echodly(x: u32) -> u32 {
    (x & SMODE_ED_MASK) << SMODE_ED_SHIFT
}

/// Encode the slave local bus send delay.
pub const fn smode_senddly(x: u32) -> u32 {
    (x & SMODE_SD_MASK) << SMODE_SD_SHIFT
}

/// Encode the slave local bus clock rate ratio.
pub const fn smode_lbcrr(x: u32) -> u32 {
    (x & SMODE_LBCRR_MASK) << SMODE_LBCRR_SHIFT
}

/// Encode a slave id.
pub const fn smode_sid(x: u32) -> u32 {
    (x & SMODE_SID_MASK) << SMODE_SID_SHIFT
}

/// Extract the slave id from an SMODE value.
pub const fn smode_sid_of(smode: u32) -> u8 {
    ((smode >> SMODE_SID_SHIFT) & SMODE_SID_MASK) as u8
}

/// SMODE written to a slave to assign it `id`.
pub fn default_smode(id: u8) -> u32 {
    (Smode::WSC | Smode::ECRC).bits()
        | smode_echodly(0xf)
        | smode_senddly(0xf)
        | smode_lbcrr(1)
        | smode_sid(u32::from(id))
}

/// Encode clock rate selection 0.
pub const fn mmode_crs0(x: u32) -> u32 {
    (x & MMODE_CRS_MASK) << MMODE_CRS0_SHIFT
}

/// Encode clock rate selection 1.
pub const fn mmode_crs1(x: u32) -> u32 {
    (x & MMODE_CRS_MASK) << MMODE_CRS1_SHIFT
}

/// MSB-first bit for `link` in link-enable registers.
pub const fn link_msb_mask(link: u8) -> u32 {
    0x8000_0000 >> link
}

/// Highest engine bit SI1S can report.
pub const SI1S_MAX_BIT: u8 = 31;

/// SI1S bit reported by the engine with the given `si1s_bit`, zero when
/// the bit falls outside the register.
pub fn si1s_mask(si1s_bit: u8) -> u32 {
    0x8000_0000u32.checked_shr(u32::from(si1s_bit)).unwrap_or(0)
}

/// Hub links the SRSIx registers can describe.
pub const SRSIX_LINKS: u8 = (32 / SRSIX_BITS_PER_LINK) as u8;

const fn shr_or_zero(value: u32, shift: u32) -> u32 {
    match value.checked_shr(shift) {
        Some(v) => v,
        None => 0,
    }
}

/// SRSIM0 bit forwarding SI1 interrupts of a hub link, zero past
/// [`SRSIX_LINKS`].
pub const fn link_to_srsim_mask(link: u8) -> u32 {
    shr_or_zero(0x8000_0000u32 >> 6, SRSIX_BITS_PER_LINK * link as u32)
}

/// MSIEP0 bits enabling slave interrupts of a hub link.
pub const fn link_to_msiep_mask(link: u8) -> u32 {
    0xf000_0000 >> (MSIEP_BITS_PER_LINK * link as u32)
}

/// SRSIC0 group clearing every condition of a hub link, zero past
/// [`SRSIX_LINKS`].
pub const fn link_to_srsic_mask(link: u8) -> u32 {
    shr_or_zero(0xff00_0000, SRSIX_BITS_PER_LINK * link as u32)
}
