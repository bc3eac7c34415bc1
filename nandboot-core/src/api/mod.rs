//! Interface between the boot loader and a boot media driver.
//!
//! The loader picks one driver at startup, initialises it and pulls the boot
//! image through it in 16 byte cipher chunks.

mod nand;

pub use nand::{BufferRole, NandBootDriver};

/// Media a boot driver serves
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootDeviceKind {
    Usb,
    I2c,
    Nand,
    Spi,
    Ssp,
    Sd,
}

/// Parameters handed to [`BootDriver::init`]
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootInit {
    /// Bytes the loader set aside for driver state
    pub memory_size: u32,
    /// Boot mode word latched at reset
    pub boot_mode: u32,
    pub redundant_boot_id: u32,
}

/// Requests the loader makes around clock and voltage changes
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootAction {
    /// Finish anything in flight before the system changes
    Pause,
    /// System conditions changed, carry on
    Resume,
}

/// A boot media driver as the loader sees it.
///
/// Calls come from a single polling loop; nothing here blocks longer than one
/// media transaction.
pub trait BootDriver {
    type Error;

    fn kind(&self) -> BootDeviceKind;

    /// Bring up the media and find the boot image
    fn init(&mut self, init: &BootInit) -> Result<(), Self::Error>;

    /// Up to `chunks` cipher chunks of the image.
    ///
    /// An empty slice means nothing is ready yet and the caller should poll
    /// again; a shorter slice is a partial delivery. The slice is valid until
    /// the next call.
    fn next(&mut self, chunks: u32) -> Result<&[u8], Self::Error>;

    /// Drop the next `chunks` chunks of the image
    fn skip(&mut self, chunks: u32) -> Result<(), Self::Error>;

    /// Quiesce the media; no calls are accepted afterwards
    fn stop(&mut self) -> Result<(), Self::Error>;

    fn control(&mut self, action: BootAction) -> Result<(), Self::Error>;
}
