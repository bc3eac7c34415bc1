//! Boot configuration burnt into eFuses.

use bit_field::BitField;

use crate::common::io_driver::NandPinConfig;
use crate::constant::SEARCH_STRIDE_UNIT;

/// Boot mode word bit selecting 1.8 V pads (TM0)
pub const VOLTAGE_SEL_BIT: usize = 4;

/// BA NAND row cycles when the fuse is blank
pub const BA_NAND_ROW_ADDRESS_BYTES: u8 = 5;

const ROM1_NUMBER_OF_NANDS: core::ops::Range<usize> = 0..3;
const ROM1_BOOT_SEARCH_STRIDE: core::ops::Range<usize> = 4..8;
const ROM1_BOOT_SEARCH_COUNT: core::ops::Range<usize> = 8..12;
const ROM1_CE_RDY_PULLUPS: core::ops::Range<usize> = 20..28;
const ROM1_DISABLE_SECONDARY_BOOT: usize = 30;

const ROM4_ROW_ADDRESS_BYTES: core::ops::Range<usize> = 0..4;
const ROM4_COLUMN_ADDRESS_BYTES: core::ops::Range<usize> = 4..8;
const ROM4_READ_CMD_CODE1: core::ops::Range<usize> = 8..16;
const ROM4_READ_CMD_CODE2: core::ops::Range<usize> = 16..24;
const ROM4_BI_PRESERVE_DISABLE: usize = 31;

/// NAND related eFuse settings, with blank fields replaced by defaults
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NandFuseConfig {
    pub nands_in_use: u32,
    /// Sectors between two boot block candidates
    pub search_stride: u32,
    /// Candidates visited per search
    pub search_limit: u32,
    /// Pull-up enables, still at their ROM1 bit positions
    pub pullups: u32,
    pub disable_secondary_boot: bool,
    pub row_address_bytes: u8,
    pub column_address_bytes: u8,
    /// Raw field, 0 when blank
    pub read_cmd_code1: u8,
    pub read_cmd_code2: u8,
    /// Swap the bad block marker back into the payload after each read
    pub bi_preserve: bool,
    /// Raw ROM4 fields that BA NAND detection re-examines
    pub row_address_bytes_blank: bool,
    pub read_cmd_code1_blank: bool,
    pub read_cmd_code2_blank: bool,
    pub use_1v8: bool,
}

impl NandFuseConfig {
    pub fn decode(rom1: u32, rom4: u32, boot_mode: u32) -> Self {
        let stride = match rom1.get_bits(ROM1_BOOT_SEARCH_STRIDE) {
            0 => 1,
            n => n,
        };
        let count = match rom1.get_bits(ROM1_BOOT_SEARCH_COUNT) {
            0 => 2,
            n => n,
        };

        let row = rom4.get_bits(ROM4_ROW_ADDRESS_BYTES) as u8;
        let column = rom4.get_bits(ROM4_COLUMN_ADDRESS_BYTES) as u8;
        let cmd1 = rom4.get_bits(ROM4_READ_CMD_CODE1) as u8;
        let cmd2 = rom4.get_bits(ROM4_READ_CMD_CODE2) as u8;

        Self {
            nands_in_use: rom1.get_bits(ROM1_NUMBER_OF_NANDS),
            search_stride: stride * SEARCH_STRIDE_UNIT,
            search_limit: 1 << count,
            pullups: rom1.get_bits(ROM1_CE_RDY_PULLUPS) << ROM1_CE_RDY_PULLUPS.start,
            disable_secondary_boot: rom1.get_bit(ROM1_DISABLE_SECONDARY_BOOT),
            row_address_bytes: if row == 0 { 3 } else { row },
            column_address_bytes: if column == 0 { 2 } else { column },
            read_cmd_code1: cmd1,
            read_cmd_code2: if cmd2 == 0 { 0x30 } else { cmd2 },
            bi_preserve: !rom4.get_bit(ROM4_BI_PRESERVE_DISABLE),
            row_address_bytes_blank: row == 0,
            read_cmd_code1_blank: cmd1 == 0,
            read_cmd_code2_blank: cmd2 == 0,
            use_1v8: boot_mode.get_bit(VOLTAGE_SEL_BIT),
        }
    }

    /// Pad setup for the GPMI bus
    pub fn pin_config(&self, use_16bit_data: bool, number_of_nands: u32) -> NandPinConfig {
        NandPinConfig {
            use_16bit_data,
            number_of_nands,
            pullups: self.pullups,
            use_1v8_drive: self.use_1v8,
        }
    }
}
