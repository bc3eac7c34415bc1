use byteorder::{ByteOrder, LittleEndian};

use crate::constant::BCB_CHECKED_SIZE;

/// Fingerprint and version identifying one kind of boot control block
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fingerprint {
    pub fingerprint: u32,
    pub version: u32,
}

const CHECKSUM_OFFSET: usize = 0;
const FINGERPRINT_OFFSET: usize = 4;
const VERSION_OFFSET: usize = 8;

/// Additive byte sum, inverted
pub fn bcb_checksum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |sum, b| sum.wrapping_add(*b as u32)) ^ 0xffff_ffff
}

/// Checksum word, fingerprint and version of the block at the head of `block` all match
pub fn is_valid_block(block: &[u8], expected: &Fingerprint) -> bool {
    if block.len() < BCB_CHECKED_SIZE {
        return false;
    }
    let stored = LittleEndian::read_u32(&block[CHECKSUM_OFFSET..]);
    bcb_checksum(&block[FINGERPRINT_OFFSET..BCB_CHECKED_SIZE]) == stored
        && LittleEndian::read_u32(&block[FINGERPRINT_OFFSET..]) == expected.fingerprint
        && LittleEndian::read_u32(&block[VERSION_OFFSET..]) == expected.version
}

/// Write checksum, fingerprint and version into a block image
#[cfg(test)]
pub fn seal_block(block: &mut [u8], id: &Fingerprint) {
    LittleEndian::write_u32(&mut block[FINGERPRINT_OFFSET..], id.fingerprint);
    LittleEndian::write_u32(&mut block[VERSION_OFFSET..], id.version);
    let sum = bcb_checksum(&block[FINGERPRINT_OFFSET..BCB_CHECKED_SIZE]);
    LittleEndian::write_u32(&mut block[CHECKSUM_OFFSET..], sum);
}
