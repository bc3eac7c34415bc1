//! Software Hamming code over the raw FCB copy.
//!
//! Each data byte carries five parity bits in its own parity byte. The code is
//! checked before the BCH engine is configured, so it is the only protection
//! the FCB has on its first read.

use crate::error::NandError;

/// Syndrome of a single flipped bit, indexed by bit position.
/// Positions 0..8 are data bits, 8..13 parity bits.
const SYNDROME_TABLE: [u8; 13] = [
    0x1c, 0x16, 0x13, 0x19, 0x1a, 0x07, 0x15, 0x0e, 0x01, 0x02, 0x04, 0x08, 0x10,
];

/// Five parity bits protecting `d`
pub fn parity(d: u8) -> u8 {
    let bit = |n: u8| (d >> n) & 1;
    let p0 = bit(6) ^ bit(5) ^ bit(3) ^ bit(2);
    let p1 = bit(7) ^ bit(5) ^ bit(4) ^ bit(2) ^ bit(1);
    let p2 = bit(7) ^ bit(6) ^ bit(5) ^ bit(1) ^ bit(0);
    let p3 = bit(7) ^ bit(4) ^ bit(3) ^ bit(0);
    let p4 = bit(6) ^ bit(4) ^ bit(3) ^ bit(2) ^ bit(1) ^ bit(0);
    p0 | p1 << 1 | p2 << 2 | p3 << 3 | p4 << 4
}

/// Bit position a single-error syndrome points at
fn lookup_syndrome(syndrome: u8) -> Result<u8, NandError> {
    SYNDROME_TABLE
        .iter()
        .position(|&s| s == syndrome)
        .map(|i| i as u8)
        .ok_or(NandError::FcbSyndromeTableMismatch)
}

/// Check `data` against `parity_bytes`, correcting single bit errors in place.
///
/// A double error in any byte fails the whole block; nothing is corrected
/// after it.
pub fn hamming_check(data: &mut [u8], parity_bytes: &[u8]) -> Result<(), NandError> {
    for (i, (d, &p)) in data.iter_mut().zip(parity_bytes).enumerate() {
        let syndrome = parity(*d) ^ p;
        if syndrome == 0 {
            continue;
        }
        if syndrome.count_ones() % 2 == 0 {
            debug!("hamming double error at byte {}", i);
            return Err(NandError::FcbHammingDoubleError);
        }
        let bit = lookup_syndrome(syndrome)?;
        if bit < 8 {
            *d ^= 1 << bit;
            debug!("hamming corrected byte {} bit {}", i, bit);
        }
    }
    Ok(())
}
