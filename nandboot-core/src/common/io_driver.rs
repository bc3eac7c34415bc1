#[cfg(test)]
use mockall::automock;

use super::clock::MicrosClock;
use super::register::Register;
use crate::dma::engine::DmaEngine;
use crate::persistent::PersistentStore;

/// Word-wide access to peripheral registers, including the SET/CLR aliases
#[cfg_attr(test, automock)]
pub trait RegisterIo {
    fn read(&mut self, reg: Register) -> u32;
    fn write(&mut self, reg: Register, value: u32);
    /// Write `mask` to the SET alias
    fn set(&mut self, reg: Register, mask: u32);
    /// Write `mask` to the CLR alias
    fn clear(&mut self, reg: Register, mask: u32);
}

/// eFuse words read by the boot driver
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FuseWord {
    Rom1,
    Rom4,
}

/// Pad setup requested from the board for the GPMI bus
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NandPinConfig {
    pub use_16bit_data: bool,
    pub number_of_nands: u32,
    /// Internal pull-up enables, one bit per chip-select/ready pin
    pub pullups: u32,
    pub use_1v8_drive: bool,
}

/// Board services outside the NAND controller (clocks, pins, fuses, reset)
#[cfg_attr(test, automock)]
pub trait BoardControl {
    fn read_fuse(&mut self, word: FuseWord) -> u32;
    /// Ungate the GPMI clock in the clock controller
    fn ungate_gpmi_clock(&mut self);
    fn configure_nand_pins(&mut self, pins: &NandPinConfig);
    /// Full chip reset; on hardware this does not return
    fn chip_reset(&mut self);
    /// Power the chip off; on hardware this does not return
    fn chip_power_down(&mut self);
}

/// Hardware the NAND HAL drives directly
pub trait NandBus: RegisterIo + DmaEngine + MicrosClock + BoardControl {}

impl<T: RegisterIo + DmaEngine + MicrosClock + BoardControl + ?Sized> NandBus for T {}

/// Everything the NAND boot driver needs from the SoC
pub trait NandPlatform: NandBus {
    type Store<'a>: PersistentStore
    where
        Self: 'a;

    /// Borrow the persistent (battery backed) bit store
    fn persistent_store(&mut self) -> Self::Store<'_>;
}
