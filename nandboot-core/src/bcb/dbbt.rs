use byteorder::{ByteOrder, LittleEndian};

use crate::constant::{DBBT_FINGERPRINT, DBBT_VERSION, MAX_BAD_BLOCKS};

use super::checksum::Fingerprint;

pub const DBBT_ID: Fingerprint = Fingerprint {
    fingerprint: DBBT_FINGERPRINT,
    version: DBBT_VERSION,
};

const NUMBER_BB_OFFSET: usize = 12;
const NUMBER_2K_PAGES_OFFSET: usize = 16;

const ENTRY_NAND_OFFSET: usize = 0;
const ENTRY_COUNT_OFFSET: usize = 4;
const ENTRY_BLOCKS_OFFSET: usize = 8;

/// Counts carried by the DBBT header page
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DbbtHeader {
    pub number_bb: u32,
    /// 2K pages of entries following the header area
    pub number_2k_pages_bb: u32,
}

impl DbbtHeader {
    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() < NUMBER_2K_PAGES_OFFSET + 4 {
            return None;
        }
        Some(Self {
            number_bb: LittleEndian::read_u32(&block[NUMBER_BB_OFFSET..]),
            number_2k_pages_bb: LittleEndian::read_u32(&block[NUMBER_2K_PAGES_OFFSET..]),
        })
    }
}

/// Bad blocks loaded from the DBBT; block numbers are kept as 16 bits
#[derive(Clone)]
pub struct BadBlockTable {
    blocks: [u16; MAX_BAD_BLOCKS],
    len: usize,
}

impl Default for BadBlockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BadBlockTable {
    pub const fn new() -> Self {
        Self {
            blocks: [0; MAX_BAD_BLOCKS],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= MAX_BAD_BLOCKS
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.blocks[..self.len]
    }

    /// Append a block; returns false once the table is full
    pub fn push(&mut self, block: u32) -> bool {
        if self.is_full() {
            return false;
        }
        self.blocks[self.len] = block as u16;
        self.len += 1;
        true
    }

    pub fn contains(&self, block: u32) -> bool {
        self.as_slice().iter().any(|&b| b as u32 == block)
    }

    /// Append the entries of one 2K DBBT page.
    ///
    /// The page holds the NAND index, an entry count and the entries as 32-bit
    /// words. Entries past the page end or the table capacity are dropped.
    /// Returns the NAND index the page belongs to.
    pub fn load_entry_page(&mut self, page: &[u8]) -> u32 {
        if page.len() < ENTRY_BLOCKS_OFFSET {
            return 0;
        }
        let nand = LittleEndian::read_u32(&page[ENTRY_NAND_OFFSET..]);
        let count = LittleEndian::read_u32(&page[ENTRY_COUNT_OFFSET..]) as usize;
        for entry in page[ENTRY_BLOCKS_OFFSET..].chunks_exact(4).take(count) {
            if !self.push(LittleEndian::read_u32(entry)) {
                break;
            }
        }
        nand
    }
}
