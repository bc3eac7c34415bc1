use num_enum::{IntoPrimitive, TryFromPrimitive};

/// ROM NAND driver status codes.
///
/// Discriminants are the status words the ROM reports, so a value can be
/// handed to the loader (or written as a DMA terminal BAR) unchanged.
#[repr(u32)]
#[derive(Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(test, derive(Debug))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NandError {
    NoBcb = 0x8050_8001,
    NoFcb = 0x8050_8002,
    NoDbbt = 0x8050_8004,
    Fatal = 0x8050_8005,
    InitFailed = 0x8050_8006,
    SearchFailed = 0x8050_8007,
    DmaTimeout = 0x8050_8008,
    ResetFailed = 0x8050_8009,
    NoReadInProgress = 0x8050_800a,
    NoGpmiPresent = 0x8050_800b,
    ProgramFailed = 0x8050_800c,
    EraseFailed = 0x8050_800d,
    LoadCompleted = 0x8050_800e,
    /// Uncorrectable page (or erased page where data was expected)
    EccFailed = 0x8050_800f,
    NoEccPresent = 0x8050_8010,
    FcbTripleRedChkFailed = 0x8050_8011,
    FcbHammingDoubleError = 0x8050_8012,
    FcbSyndromeTableMismatch = 0x8050_8013,
    FcbInvalidEcc = 0x8050_8014,
    EccAllOnes = 0x8050_8015,
    /// DMA still running, poll again
    DmaBusy = 0x8050_8016,
    /// Page corrected at the configured limit
    EccThreshold = 0x8050_8017,
    MbrInvalid = 0x8020_b001,
    ConfigBlockInvalid = 0x8020_b002,
    PersistentLoadFailed = 0x8050_4015,
    PersistentStoreFailed = 0x8050_4016,
    /// Generic ROM failure
    Rom = 0xffff_ffff,
}

impl NandError {
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Interpret the BAR word left behind by a chain terminator.
    /// Unknown words are reported as [`NandError::Fatal`].
    pub fn from_bar(bar: u32) -> Result<(), NandError> {
        if bar == 0 {
            Ok(())
        } else {
            Err(NandError::try_from(bar).unwrap_or(NandError::Fatal))
        }
    }

    /// Errors that leave the page data readable
    pub fn is_readable(self) -> bool {
        matches!(self, NandError::EccThreshold)
    }
}
