use num_enum::{IntoPrimitive, TryFromPrimitive};

use bitflags::bitflags;

/// NAND IC Command ID
///
/// First-cycle opcodes used by the boot path. Raw NAND and block-abstracted
/// (BA) NAND share the reset, ID, status and parameter page opcodes.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(test, derive(Debug))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NandCommandId {
    Reset = 0xff,
    IdRead = 0x90,
    ReadParameterPage = 0xec,
    StatusRead = 0x70,
    ReadFirst = 0x00,
    ReadSecond = 0x30,
    AutoPageProgramFirst = 0x80,
    AutoPageProgramSecond = 0x10,
    AutoBlockEraseFirst = 0x60,
    AutoBlockEraseSecond = 0xd0,
    /// BA NAND: read logical sectors
    LbaRead = 0xc0,
    /// BA NAND: abort an LBA transfer in progress
    LbaAbort = 0xca,
}

impl NandCommandId {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Number of bytes returned by the ID read command
pub const READ_ID_RESULT_SIZE: usize = 6;
/// Number of bytes returned by the status read command
pub const READ_STATUS_RESULT_SIZE: usize = 1;

/// NAND IC Status Output
///
/// | Bit | Description            | Value                      |
/// | --- | ---------------------- | -------------------------- |
/// | 0   | Chip Status0           | Pass:0 , Fail: 1           |
/// | 1   | Chip Status1           | Pass:0 , Fail: 1           |
/// | 2   | -                      | -                          |
/// | 3   | -                      | -                          |
/// | 4   | -                      | -                          |
/// | 5   | Page Buffer Ready/Busy | Ready: 1, Busy: 0          |
/// | 6   | Data Cache Ready/Busy  | Ready: 1, Busy: 0          |
/// | 7   | Write Protect          | Not Protect: 1, Protect: 0 |
bitflags! {
    #[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
    pub struct NandStatusOutput: u8 {
        const CHIP_STATUS0_FAIL = 0b0000_0001;
        const CHIP_STATUS1_FAIL = 0b0000_0010;
        const PAGE_BUFFER_READY = 0b0010_0000;
        const DATA_CACHE_READY = 0b0100_0000;
        const WRITE_PROTECT_DISABLE = 0b1000_0000;
    }
}

impl NandStatusOutput {
    /// Mask used by the program/erase status compare step (ready + fail)
    pub const PROGRAM_COMPARE_MASK: u8 = 0x81;
    /// Expected masked value after a good program/erase
    pub const PROGRAM_COMPARE_MATCH: u8 = 0x80;

    pub fn is_pass(&self) -> bool {
        (*self & NandStatusOutput::CHIP_STATUS0_FAIL).is_empty()
    }

    /// Check if page buffer is ready
    pub fn is_page_buffer_ready(&self) -> bool {
        !(*self & NandStatusOutput::PAGE_BUFFER_READY).is_empty()
    }

    /// Check if data cache is ready
    pub fn is_data_cache_ready(&self) -> bool {
        !(*self & NandStatusOutput::DATA_CACHE_READY).is_empty()
    }

    /// Check if write protect is enabled
    pub fn is_write_protect(&self) -> bool {
        (*self & NandStatusOutput::WRITE_PROTECT_DISABLE).is_empty()
    }

    /// Check the program/erase outcome the way the status compare descriptor does
    pub fn is_program_ok(&self) -> bool {
        (self.bits() & Self::PROGRAM_COMPARE_MASK) == Self::PROGRAM_COMPARE_MATCH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_output_with_different_values() {
        let status = NandStatusOutput::from_bits_truncate(0b0000_0000);
        assert!(status.is_pass());
        assert!(!status.is_page_buffer_ready());
        assert!(!status.is_data_cache_ready());
        assert!(status.is_write_protect());
        assert!(!status.is_program_ok());

        let status = NandStatusOutput::from_bits_truncate(0b1110_0000);
        assert!(status.is_pass());
        assert!(status.is_page_buffer_ready());
        assert!(status.is_data_cache_ready());
        assert!(!status.is_write_protect());
        assert!(status.is_program_ok());

        let status = NandStatusOutput::from_bits_truncate(0b1110_0001);
        assert!(!status.is_pass());
        assert!(!status.is_program_ok());
    }

    #[test]
    fn test_command_id_from_code() {
        assert!(matches!(
            NandCommandId::try_from(0xec),
            Ok(NandCommandId::ReadParameterPage)
        ));
        assert_eq!(NandCommandId::LbaAbort.code(), 0xca);
        assert!(NandCommandId::try_from(0x42).is_err());
    }
}
