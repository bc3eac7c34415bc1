//! Boot layout of BA NAND: an MBR names the firmware partition, whose first
//! sector holds a config block listing the firmware drives.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::NandError;

const MBR_PARTITION_TABLE: usize = 0x1be;
const MBR_SIGNATURE: usize = 0x1fe;
const PARTITION_SYSTEM_ID: usize = 0x04;
const PARTITION_FIRST_SECTOR: usize = 0x08;
const PARTITION_ENTRY_SIZE: usize = 0x10;
/// System id marking the firmware partition
pub const FIRMWARE_PARTITION_ID: u8 = b'S';

pub const CONFIG_BLOCK_SIGNATURE: u32 = 0x0011_2233;
const CONFIG_PRIMARY_TAG: usize = 4;
const CONFIG_SECONDARY_TAG: usize = 8;
const CONFIG_NUM_COPIES: usize = 12;
const CONFIG_DRIVES: usize = 16;
const DRIVE_INFO_SIZE: usize = 20;

/// First sector of the firmware partition named by the MBR in `mbr`
pub fn firmware_partition_start(mbr: &[u8]) -> Result<u32, NandError> {
    if mbr.len() < MBR_SIGNATURE + 2 || mbr[MBR_SIGNATURE..MBR_SIGNATURE + 2] != [0x55, 0xaa] {
        return Err(NandError::MbrInvalid);
    }
    mbr[MBR_PARTITION_TABLE..MBR_SIGNATURE]
        .chunks_exact(PARTITION_ENTRY_SIZE)
        .find(|entry| entry[PARTITION_SYSTEM_ID] == FIRMWARE_PARTITION_ID)
        .map(|entry| LittleEndian::read_u32(&entry[PARTITION_FIRST_SECTOR..]))
        .ok_or(NandError::MbrInvalid)
}

/// One firmware drive listed in the config block
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriveInfo {
    pub chip: u32,
    pub drive_type: u32,
    pub tag: u32,
    /// Relative to the sector holding the config block
    pub first_sector: u32,
    pub sector_count: u32,
}

impl DriveInfo {
    fn parse(entry: &[u8]) -> Self {
        let word = |n: usize| LittleEndian::read_u32(&entry[4 * n..]);
        Self {
            chip: word(0),
            drive_type: word(1),
            tag: word(2),
            first_sector: word(3),
            sector_count: word(4),
        }
    }
}

/// Drive to boot from chip `chip`, picked by the primary or secondary tag
pub fn select_drive(block: &[u8], chip: u32, secondary: bool) -> Result<DriveInfo, NandError> {
    if block.len() < CONFIG_DRIVES || LittleEndian::read_u32(block) != CONFIG_BLOCK_SIGNATURE {
        return Err(NandError::ConfigBlockInvalid);
    }
    let tag = if secondary {
        LittleEndian::read_u32(&block[CONFIG_SECONDARY_TAG..])
    } else {
        LittleEndian::read_u32(&block[CONFIG_PRIMARY_TAG..])
    };
    let copies = LittleEndian::read_u32(&block[CONFIG_NUM_COPIES..]) as usize;
    block[CONFIG_DRIVES..]
        .chunks_exact(DRIVE_INFO_SIZE)
        .take(copies)
        .map(DriveInfo::parse)
        .find(|d| d.chip == chip && d.tag == tag)
        .ok_or(NandError::ConfigBlockInvalid)
}


#[cfg(test)]
mod tests {
    use super::image::*;
    use super::*;

    #[test]
    fn test_firmware_partition_found() {
        let block = mbr(&[(0x0b, 2048), (FIRMWARE_PARTITION_ID, 64)]);
        assert_eq!(firmware_partition_start(&block), Ok(64));
    }

    #[test]
    fn test_mbr_without_signature() {
        let mut block = mbr(&[(FIRMWARE_PARTITION_ID, 64)]);
        block[MBR_SIGNATURE + 1] = 0;
        assert_eq!(firmware_partition_start(&block), Err(NandError::MbrInvalid));
        assert_eq!(firmware_partition_start(&block[..100]), Err(NandError::MbrInvalid));
    }

    #[test]
    fn test_mbr_without_firmware_partition() {
        let block = mbr(&[(0x0b, 2048), (0x83, 4096)]);
        assert_eq!(firmware_partition_start(&block), Err(NandError::MbrInvalid));
    }

    #[test]
    fn test_drive_selected_by_tag() {
        let block = config_block(0x50, 0x60, &[drive(0x60, 400, 80), drive(0x50, 4, 80)]);
        assert_eq!(select_drive(&block, 0, false), Ok(drive(0x50, 4, 80)));
        assert_eq!(select_drive(&block, 0, true), Ok(drive(0x60, 400, 80)));
    }

    #[test]
    fn test_drive_on_other_chip_is_ignored() {
        let other = DriveInfo {
            chip: 1,
            ..drive(0x50, 4, 80)
        };
        let block = config_block(0x50, 0x60, &[other]);
        assert_eq!(select_drive(&block, 0, false), Err(NandError::ConfigBlockInvalid));
    }

    #[test]
    fn test_copies_count_bounds_the_scan() {
        let mut block = config_block(0x50, 0x60, &[drive(0x60, 400, 80), drive(0x50, 4, 80)]);
        LittleEndian::write_u32(&mut block[CONFIG_NUM_COPIES..], 1);
        assert_eq!(select_drive(&block, 0, false), Err(NandError::ConfigBlockInvalid));
    }

    #[test]
    fn test_bad_signature() {
        let mut block = config_block(0x50, 0x60, &[drive(0x50, 4, 80)]);
        block[0] ^= 1;
        assert_eq!(select_drive(&block, 0, false), Err(NandError::ConfigBlockInvalid));
    }
}
