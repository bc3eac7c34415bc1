use nandboot_nandio::cmd::NandCommandId;

use crate::config::{NandFuseConfig, BA_NAND_ROW_ADDRESS_BYTES};
use crate::dma::descriptor::WordLength;

/// Geometry and command set of the boot NAND
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NandDescriptor {
    pub row_bytes: u8,
    pub column_bytes: u8,
    /// Raw bytes moved by a read with ECC off
    pub total_page_size: u32,
    /// Data bytes per sector (BA NAND: per LBA read)
    pub sector_size: u32,
    pub read_id_code: u8,
    pub reset_code: u8,
    pub read1_code: u8,
    pub read2_code: u8,
    pub word_length: WordLength,
    pub total_blocks: u32,
    /// 512 byte LBAs covered by one sector read
    pub lba_per_read: u32,
    pub is_ba_nand: bool,
}

impl Default for NandDescriptor {
    fn default() -> Self {
        Self {
            row_bytes: 3,
            column_bytes: 2,
            total_page_size: 2112,
            sector_size: 2048,
            read_id_code: NandCommandId::IdRead.code(),
            reset_code: NandCommandId::Reset.code(),
            read1_code: NandCommandId::ReadFirst.code(),
            read2_code: NandCommandId::ReadSecond.code(),
            word_length: WordLength::EightBit,
            total_blocks: 256,
            lba_per_read: 1,
            is_ba_nand: false,
        }
    }
}

impl NandDescriptor {
    /// Defaults with the addressing and read command fuses applied
    pub fn from_fuses(fuses: &NandFuseConfig) -> Self {
        Self {
            row_bytes: fuses.row_address_bytes,
            column_bytes: fuses.column_address_bytes,
            read1_code: fuses.read_cmd_code1,
            read2_code: fuses.read_cmd_code2,
            ..Self::default()
        }
    }

    /// Switch to LBA reads. Blank fuses fall back to the BA command set.
    pub fn apply_ba_defaults(&mut self, fuses: &NandFuseConfig) {
        if fuses.row_address_bytes_blank {
            self.row_bytes = BA_NAND_ROW_ADDRESS_BYTES;
        }
        if fuses.read_cmd_code1_blank {
            self.read1_code = NandCommandId::LbaRead.code();
        }
        if fuses.read_cmd_code2_blank {
            self.read2_code = NandCommandId::ReadSecond.code();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuse_overrides() {
        let fuses = NandFuseConfig::decode(0, (0x31 << 16) | (0x01 << 8) | (1 << 4) | 4, 0);
        let d = NandDescriptor::from_fuses(&fuses);
        assert_eq!(d.row_bytes, 4);
        assert_eq!(d.column_bytes, 1);
        assert_eq!(d.read1_code, 0x01);
        assert_eq!(d.read2_code, 0x31);
        assert_eq!(d.total_page_size, 2112);
        assert_eq!(d.reset_code, 0xff);
    }

    #[test]
    fn test_ba_defaults_only_for_blank_fuses() {
        let blank = NandFuseConfig::decode(0, 0, 0);
        let mut d = NandDescriptor::from_fuses(&blank);
        d.apply_ba_defaults(&blank);
        assert_eq!(d.row_bytes, 5);
        assert_eq!(d.read1_code, 0xc0);
        assert_eq!(d.read2_code, 0x30);

        let burnt = NandFuseConfig::decode(0, (0x05 << 8) | 3, 0);
        let mut d = NandDescriptor::from_fuses(&burnt);
        d.apply_ba_defaults(&burnt);
        assert_eq!(d.row_bytes, 3);
        assert_eq!(d.read1_code, 0x05);
    }
}
