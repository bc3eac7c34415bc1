use byteorder::{ByteOrder, LittleEndian};

use crate::constant::{BCB_CHECKED_SIZE, FCB_FINGERPRINT, FCB_VERSION};
use crate::error::NandError;
use crate::gpmi::{EccParams, NandTiming};

use super::checksum::Fingerprint;

pub const FCB_ID: Fingerprint = Fingerprint {
    fingerprint: FCB_FINGERPRINT,
    version: FCB_VERSION,
};

/// BCH ECC types are even levels from 0 (none) to 20
const MAX_ECC_TYPE: u32 = 10;

/// Byte offsets inside the FCB structure
mod offset {
    pub const TIMING: usize = 12;
    pub const DATA_PAGE_SIZE: usize = 20;
    pub const TOTAL_PAGE_SIZE: usize = 24;
    pub const SECTORS_PER_BLOCK: usize = 28;
    pub const ECC_BLOCKN_TYPE: usize = 44;
    pub const ECC_BLOCK0_SIZE: usize = 48;
    pub const ECC_BLOCKN_SIZE: usize = 52;
    pub const ECC_BLOCK0_TYPE: usize = 56;
    pub const METADATA_BYTES: usize = 60;
    pub const NUM_ECC_BLOCKS_PER_PAGE: usize = 64;
    pub const ERASE_THRESHOLD: usize = 92;
    pub const BOOT_PATCH: usize = 96;
    pub const PATCH_SECTORS: usize = 100;
    pub const FIRMWARE1_START: usize = 104;
    pub const FIRMWARE2_START: usize = 108;
    pub const FIRMWARE1_SECTORS: usize = 112;
    pub const FIRMWARE2_SECTORS: usize = 116;
    pub const DBBT_SEARCH_AREA_START: usize = 120;
    pub const BB_MARK_BYTE: usize = 124;
    pub const BB_MARK_BIT: usize = 128;
    pub const BB_MARK_PHYSICAL_OFFSET: usize = 132;
}

/// Firmware configuration block as laid out on media
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fcb {
    pub timing: NandTiming,
    pub data_page_size: u32,
    pub total_page_size: u32,
    pub sectors_per_block: u32,
    pub ecc_blockn_type: u32,
    pub ecc_block0_size: u32,
    pub ecc_blockn_size: u32,
    pub ecc_block0_type: u32,
    pub metadata_bytes: u32,
    /// Number of N blocks per page
    pub ecc_blocks_per_page: u32,
    pub erase_threshold: u32,
    pub boot_patch: u32,
    pub patch_sectors: u32,
    pub firmware1_start: u32,
    pub firmware2_start: u32,
    pub firmware1_sectors: u32,
    pub firmware2_sectors: u32,
    pub dbbt_search_area_start: u32,
    pub bb_mark_byte: u32,
    pub bb_mark_bit: u32,
    pub bb_mark_physical_offset: u32,
}

impl Fcb {
    /// Parse the fields after checksum, fingerprint and version.
    /// `block` must hold the whole checked region.
    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() < BCB_CHECKED_SIZE {
            return None;
        }
        let word = |at: usize| LittleEndian::read_u32(&block[at..]);
        let t = &block[offset::TIMING..];
        Some(Self {
            timing: NandTiming {
                data_setup: t[0],
                data_hold: t[1],
                address_setup: t[2],
                dsample: t[3],
            },
            data_page_size: word(offset::DATA_PAGE_SIZE),
            total_page_size: word(offset::TOTAL_PAGE_SIZE),
            sectors_per_block: word(offset::SECTORS_PER_BLOCK),
            ecc_blockn_type: word(offset::ECC_BLOCKN_TYPE),
            ecc_block0_size: word(offset::ECC_BLOCK0_SIZE),
            ecc_blockn_size: word(offset::ECC_BLOCKN_SIZE),
            ecc_block0_type: word(offset::ECC_BLOCK0_TYPE),
            metadata_bytes: word(offset::METADATA_BYTES),
            ecc_blocks_per_page: word(offset::NUM_ECC_BLOCKS_PER_PAGE),
            erase_threshold: word(offset::ERASE_THRESHOLD),
            boot_patch: word(offset::BOOT_PATCH),
            patch_sectors: word(offset::PATCH_SECTORS),
            firmware1_start: word(offset::FIRMWARE1_START),
            firmware2_start: word(offset::FIRMWARE2_START),
            firmware1_sectors: word(offset::FIRMWARE1_SECTORS),
            firmware2_sectors: word(offset::FIRMWARE2_SECTORS),
            dbbt_search_area_start: word(offset::DBBT_SEARCH_AREA_START),
            bb_mark_byte: word(offset::BB_MARK_BYTE),
            bb_mark_bit: word(offset::BB_MARK_BIT),
            bb_mark_physical_offset: word(offset::BB_MARK_PHYSICAL_OFFSET),
        })
    }

    /// BCH geometry described by this FCB.
    ///
    /// The FCB stores an ECC type per block, not a level. The level is twice
    /// the type; types above 10 are beyond the decoder.
    pub fn ecc_params(&self) -> Result<EccParams, NandError> {
        if self.ecc_blockn_type > MAX_ECC_TYPE || self.ecc_block0_type > MAX_ECC_TYPE {
            return Err(NandError::FcbInvalidEcc);
        }
        if self.sectors_per_block == 0 {
            return Err(NandError::NoFcb);
        }
        Ok(EccParams {
            block0_size: self.ecc_block0_size,
            blockn_size: self.ecc_blockn_size,
            block0_level: self.ecc_block0_type * 2,
            blockn_level: self.ecc_blockn_type * 2,
            blocks_per_page: self.ecc_blocks_per_page,
            metadata_bytes: self.metadata_bytes,
            page_size: self.total_page_size,
            erase_threshold: self.erase_threshold,
        })
    }

    /// (first sector, sector count) of the firmware copy to boot
    pub fn firmware(&self, secondary: bool) -> (u32, u32) {
        if secondary {
            (self.firmware2_start, self.firmware2_sectors)
        } else {
            (self.firmware1_start, self.firmware1_sectors)
        }
    }
}

/// Builders for FCB images used across the crate's tests
#[cfg(test)]
pub mod image {
    use super::*;
    use crate::bcb::checksum::seal_block;
    use crate::bcb::hamming::parity;
    use crate::constant::{FCB_HAMMING_DATA_OFFSET, FCB_HAMMING_PARITY_OFFSET};

    /// A 2K-page geometry with 4 x 512 byte BCH blocks at ECC8
    pub fn sample_fcb() -> Fcb {
        Fcb {
            timing: NandTiming {
                data_setup: 20,
                data_hold: 10,
                address_setup: 25,
                dsample: 6,
            },
            data_page_size: 2048,
            total_page_size: 2112,
            sectors_per_block: 64,
            ecc_blockn_type: 4,
            ecc_block0_size: 512,
            ecc_blockn_size: 512,
            ecc_block0_type: 4,
            metadata_bytes: 10,
            ecc_blocks_per_page: 3,
            erase_threshold: 0,
            boot_patch: 0,
            patch_sectors: 0,
            firmware1_start: 256,
            firmware2_start: 1024,
            firmware1_sectors: 40,
            firmware2_sectors: 40,
            dbbt_search_area_start: 0,
            bb_mark_byte: 1999,
            bb_mark_bit: 0,
            bb_mark_physical_offset: 2048,
        }
    }

    /// Checked 512 byte FCB structure
    pub fn encode(fcb: &Fcb) -> Vec<u8> {
        let mut block = vec![0u8; BCB_CHECKED_SIZE];
        let mut put = |at: usize, v: u32| LittleEndian::write_u32(&mut block[at..], v);
        put(offset::DATA_PAGE_SIZE, fcb.data_page_size);
        put(offset::TOTAL_PAGE_SIZE, fcb.total_page_size);
        put(offset::SECTORS_PER_BLOCK, fcb.sectors_per_block);
        put(offset::ECC_BLOCKN_TYPE, fcb.ecc_blockn_type);
        put(offset::ECC_BLOCK0_SIZE, fcb.ecc_block0_size);
        put(offset::ECC_BLOCKN_SIZE, fcb.ecc_blockn_size);
        put(offset::ECC_BLOCK0_TYPE, fcb.ecc_block0_type);
        put(offset::METADATA_BYTES, fcb.metadata_bytes);
        put(offset::NUM_ECC_BLOCKS_PER_PAGE, fcb.ecc_blocks_per_page);
        put(offset::ERASE_THRESHOLD, fcb.erase_threshold);
        put(offset::BOOT_PATCH, fcb.boot_patch);
        put(offset::PATCH_SECTORS, fcb.patch_sectors);
        put(offset::FIRMWARE1_START, fcb.firmware1_start);
        put(offset::FIRMWARE2_START, fcb.firmware2_start);
        put(offset::FIRMWARE1_SECTORS, fcb.firmware1_sectors);
        put(offset::FIRMWARE2_SECTORS, fcb.firmware2_sectors);
        put(offset::DBBT_SEARCH_AREA_START, fcb.dbbt_search_area_start);
        put(offset::BB_MARK_BYTE, fcb.bb_mark_byte);
        put(offset::BB_MARK_BIT, fcb.bb_mark_bit);
        put(offset::BB_MARK_PHYSICAL_OFFSET, fcb.bb_mark_physical_offset);
        let t = fcb.timing;
        block[offset::TIMING..offset::TIMING + 4]
            .copy_from_slice(&[t.data_setup, t.data_hold, t.address_setup, t.dsample]);
        seal_block(&mut block, &FCB_ID);
        block
    }

    /// Raw page as written to media: Hamming protected copy plus parity
    pub fn raw_page(fcb: &Fcb) -> Vec<u8> {
        let block = encode(fcb);
        let mut page = vec![0u8; 2112];
        page[FCB_HAMMING_DATA_OFFSET..FCB_HAMMING_PARITY_OFFSET].copy_from_slice(&block);
        for (i, &b) in block.iter().enumerate() {
            page[FCB_HAMMING_PARITY_OFFSET + i] = parity(b);
        }
        page
    }
}
