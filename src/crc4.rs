// CLASSIFICATION: COMMUNITY
// Filename: crc4.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Table-driven CRC-4 used for chip-ID and configuration-table words.

const CRC4_TAB: [u8; 16] = [
    0x0, 0x7, 0xe, 0x9, 0xb, 0xc, 0x5, 0x2, 0x1, 0x6, 0xf, 0x8, 0xa, 0xd, 0x4, 0x3,
];

/// Number of payload bits covered by the CRC in a 32-bit word.
pub const DATA_BITS: u32 = 28;
/// Width of the CRC field at the bottom of a word.
pub const CRC_SHIFT: u32 = 4;
/// Mask of the CRC field.
pub const CRC_MASK: u32 = 0xf;

/// Compute a CRC-4 over `bits` of `payload`, MSB nibble first, starting
/// from `seed`. `bits` is aligned up to a nibble boundary.
pub fn crc4(seed: u8, payload: u64, bits: u32) -> u8 {
    let bits = (bits + 3) & !0x3;
    let mut c = seed & 0xf;
    let mut i = bits as i32;
    while i >= 0 {
        let nibble = ((payload >> i) & 0xf) as u8;
        c = CRC4_TAB[(c ^ nibble) as usize];
        i -= 4;
    }
    c
}

/// CRC nibble for the top 28 bits of `word`.
pub fn word_crc(word: u32) -> u8 {
    crc4(0, u64::from(word >> CRC_SHIFT), DATA_BITS)
}

/// True when the low nibble of `word` matches the CRC of its top 28 bits.
pub fn crc4_valid(word: u32) -> bool {
    u32::from(word_crc(word)) == word & CRC_MASK
}

/// Append a CRC nibble to a 28-bit payload.
pub fn seal(payload: u32) -> u32 {
    let payload = payload & 0x0fff_ffff;
    (payload << CRC_SHIFT) | u32::from(crc4(0, u64::from(payload), DATA_BITS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_word_is_valid() {
        assert_eq!(crc4(0, 0, DATA_BITS), 0);
        assert!(crc4_valid(0));
    }

    #[test]
    fn single_nibble_follows_table() {
        // The leading zero nibble keeps the seed at zero, so the result
        // is the table entry for the last nibble.
        for n in 0..16u64 {
            assert_eq!(crc4(0, n, 4), CRC4_TAB[n as usize]);
        }
    }

    #[test]
    fn sealed_words_validate() {
        for payload in [0x1u32, 0x0050_0110, 0x0ff0_0000, 0x0abc_def1, 0x0fff_ffff] {
            let word = seal(payload);
            assert!(crc4_valid(word), "word {word:#010x}");
            assert_eq!(word >> CRC_SHIFT, payload);
        }
    }

    #[test]
    fn flipped_crc_nibble_is_rejected() {
        let word = seal(0x0001_1050);
        let poisoned = word ^ CRC_MASK;
        assert!(!crc4_valid(poisoned));
    }

    #[test]
    fn seed_changes_result() {
        assert_ne!(crc4(0, 0x123_4567, DATA_BITS), crc4(5, 0x123_4567, DATA_BITS));
    }
}
