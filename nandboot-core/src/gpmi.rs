//! GPMI bus controller and BCH engine setup.

use bitfield::bitfield;
use bitflags::bitflags;

use crate::common::clock::{poll_with_deadline, MicrosClock};
use crate::common::io_driver::{BoardControl, NandPinConfig, RegisterIo};
use crate::common::register::Register;
use crate::constant::MAX_TRANSACTION_TIMEOUT_US;
use crate::error::NandError;

/// GPMI clock period assumed when the caller passes 0 (24 MHz)
pub const GPMI_DEFAULT_CLK_PERIOD_NS: u32 = 42;
/// Busy timeout written to TIMING1 when the caller passes 0 (10 ms / 41.6 ns / 4096)
pub const DEFAULT_FLASH_BUSY_TIMEOUT: u32 = 58;
/// Strongest correction the decoder handles
pub const MAX_ECC_LEVEL: u32 = 20;
/// GF(2^13) symbols: parity bits per corrected bit
pub const BCH_PARITY_BITS_PER_LEVEL: u32 = 13;

const FLASH_BUSY_TIMEOUT_NS: u32 = 10_000_000;
const FLASH_BUSY_TIMEOUT_DIV_4096: u32 = (FLASH_BUSY_TIMEOUT_NS + 4095) / 4096;
const BUSY_TIMEOUT_SEARCH_CYCLES: u32 = FLASH_BUSY_TIMEOUT_DIV_4096 / 5;
const NORMAL_CLOCKS_SEARCH_CYCLES: u32 = 100 / 5;

const CTRL0_SFTRST: u32 = 1 << 31;
const CTRL0_CLKGATE: u32 = 1 << 30;
const STAT_PRESENT: u32 = 1 << 31;
const CTRL1_DEV_RESET_DISABLED: u32 = 1 << 3;
const CTRL1_ATA_IRQRDY_ACTIVE_HIGH: u32 = 1 << 2;
const CTRL1_BCH_MODE: u32 = 1 << 18;
const TIMING1_BUSY_TIMEOUT_SHIFT: u32 = 16;
const BCH_MODE_ERASE_THRESHOLD_MASK: u32 = 0xff;

bitflags! {
    /// BCH CTRL bits the driver touches
    #[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
    pub struct BchCtrl: u32 {
        const COMPLETE_IRQ = 1 << 0;
        const BM_ERROR_IRQ = 1 << 3;
        const CLKGATE = 1 << 30;
        const SFTRST = 1 << 31;
    }
}

bitflags! {
    /// BCH STATUS0 summary flags
    #[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
    pub struct BchStatus0: u32 {
        const UNCORRECTABLE = 1 << 2;
        const CORRECTED = 1 << 3;
        const ALLONES = 1 << 4;
    }
}

bitflags! {
    /// APBH CTRL0 reset/gate bits
    #[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
    pub struct ApbhCtrl0: u32 {
        const CLKGATE = 1 << 30;
        const SFTRST = 1 << 31;
    }
}

bitfield! {
    /// GPMI TIMING0
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct GpmiTiming0(u32);
    impl Debug;
    pub u8, address_setup, set_address_setup: 23, 16;
    pub u8, data_hold, set_data_hold: 15, 8;
    pub u8, data_setup, set_data_setup: 7, 0;
}

bitfield! {
    /// BCH FLASH0LAYOUT0
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct FlashLayout0(u32);
    impl Debug;
    pub u8, nblocks, set_nblocks: 31, 24;
    pub u8, meta_size, set_meta_size: 23, 16;
    pub u8, ecc0, set_ecc0: 15, 12;
    pub u16, data0_size, set_data0_size: 9, 0;
}

bitfield! {
    /// BCH FLASH0LAYOUT1
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct FlashLayout1(u32);
    impl Debug;
    pub u16, page_size, set_page_size: 31, 16;
    pub u8, eccn, set_eccn: 15, 12;
    pub u16, datan_size, set_datan_size: 9, 0;
}

/// NAND interface timing in nanoseconds
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NandTiming {
    pub data_setup: u8,
    pub data_hold: u8,
    pub address_setup: u8,
    pub dsample: u8,
}

/// Slow enough for any part, used until the FCB supplies real timing
pub const FAILSAFE_TIMING: NandTiming = NandTiming {
    data_setup: 100,
    data_hold: 80,
    address_setup: 120,
    dsample: 10,
};

/// BCH geometry of one page
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EccParams {
    pub block0_size: u32,
    pub blockn_size: u32,
    /// Correctable bits in block 0
    pub block0_level: u32,
    /// Correctable bits in each of the N blocks
    pub blockn_level: u32,
    /// Number of N blocks (block 0 not counted)
    pub blocks_per_page: u32,
    pub metadata_bytes: u32,
    /// BCH page size last programmed into the layout
    pub page_size: u32,
    pub erase_threshold: u32,
}

impl EccParams {
    /// Payload bytes delivered per page
    pub fn data_size(&self) -> u32 {
        self.block0_size + self.blockn_size * self.blocks_per_page
    }

    /// Parity bytes, rounded up to whole bytes
    pub fn parity_bytes(&self) -> u32 {
        let bits = self.block0_level * BCH_PARITY_BITS_PER_LEVEL
            + self.blocks_per_page * self.blockn_level * BCH_PARITY_BITS_PER_LEVEL;
        (bits + 7) / 8
    }

    /// Bytes the BCH engine reads from the NAND for one page
    pub fn total_page_size(&self) -> u32 {
        self.metadata_bytes + self.data_size() + self.parity_bytes()
    }
}

/// GPMI clock cycles derived from [`NandTiming`]
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingCycles {
    pub address_setup: u32,
    pub data_setup: u32,
    pub data_hold: u32,
    pub dsample: u32,
    pub busy_timeout: u32,
}

impl TimingCycles {
    pub fn compute(timing: &NandTiming, period_ns: u32) -> Self {
        let period_ns = if period_ns == 0 { GPMI_DEFAULT_CLK_PERIOD_NS } else { period_ns };
        Self {
            address_setup: find_gpmi_cycles(timing.address_setup as u32, period_ns, NORMAL_CLOCKS_SEARCH_CYCLES),
            data_setup: find_gpmi_cycles(timing.data_setup as u32, period_ns, NORMAL_CLOCKS_SEARCH_CYCLES),
            data_hold: find_gpmi_cycles(timing.data_hold as u32, period_ns, NORMAL_CLOCKS_SEARCH_CYCLES),
            // half-period resolution, rounded
            dsample: find_gpmi_cycles(
                timing.dsample as u32 + (period_ns >> 2),
                period_ns >> 1,
                NORMAL_CLOCKS_SEARCH_CYCLES,
            ) - 1,
            busy_timeout: find_gpmi_cycles(FLASH_BUSY_TIMEOUT_DIV_4096, period_ns, BUSY_TIMEOUT_SEARCH_CYCLES),
        }
    }
}

/// Smallest cycle count whose duration exceeds `nand_time_ns`, capped below `max_search`
pub fn find_gpmi_cycles(nand_time_ns: u32, period_ns: u32, max_search: u32) -> u32 {
    let mut cycle_time = period_ns;
    let mut cycles = 1;
    while cycles < max_search {
        if cycle_time > nand_time_ns {
            break;
        }
        cycle_time += period_ns;
        cycles += 1;
    }
    cycles
}

/// Program TIMING0/TIMING1 for `timing` at a GPMI clock of `period_ns` (0 = default)
pub fn set_nand_timing<R: RegisterIo + ?Sized>(io: &mut R, timing: &NandTiming, period_ns: u32) {
    let cycles = TimingCycles::compute(timing, period_ns);
    let mut t0 = GpmiTiming0(0);
    t0.set_address_setup(cycles.address_setup as u8);
    t0.set_data_setup(cycles.data_setup as u8);
    t0.set_data_hold(cycles.data_hold as u8);
    io.write(Register::GpmiTiming0, t0.0);
    io.write(Register::GpmiTiming1, cycles.busy_timeout << TIMING1_BUSY_TIMEOUT_SHIFT);
    debug!(
        "gpmi timing as={} ds={} dh={} dsample={}",
        cycles.address_setup,
        cycles.data_setup,
        cycles.data_hold,
        cycles.dsample
    );
}

/// Bring the GPMI block out of reset and hand the pads to it.
///
/// Fails with [`NandError::NoGpmiPresent`] when the block is fused off.
pub fn enable_gpmi<P>(platform: &mut P, pins: &NandPinConfig) -> Result<(), NandError>
where
    P: RegisterIo + MicrosClock + BoardControl + ?Sized,
{
    if platform.read(Register::GpmiStat) & STAT_PRESENT == 0 {
        warn!("gpmi not present");
        return Err(NandError::NoGpmiPresent);
    }
    platform.ungate_gpmi_clock();

    platform.clear(Register::GpmiCtrl0, CTRL0_SFTRST | CTRL0_CLKGATE);
    platform.set(Register::GpmiCtrl0, CTRL0_SFTRST);
    // soft reset gates the clock once it has taken effect
    poll_with_deadline(platform, MAX_TRANSACTION_TIMEOUT_US, |p| {
        p.read(Register::GpmiCtrl0) & CTRL0_CLKGATE != 0
    })
    .map_err(|_| NandError::InitFailed)?;
    platform.clear(Register::GpmiCtrl0, CTRL0_SFTRST | CTRL0_CLKGATE);

    set_nand_timing(platform, &FAILSAFE_TIMING, 0);
    platform.configure_nand_pins(pins);
    platform.write(
        Register::GpmiCtrl1,
        CTRL1_DEV_RESET_DISABLED | CTRL1_ATA_IRQRDY_ACTIVE_HIGH,
    );
    Ok(())
}

pub fn disable_gpmi<R: RegisterIo + ?Sized>(io: &mut R) {
    io.set(Register::GpmiCtrl0, CTRL0_CLKGATE);
}

/// Device busy timeout in units of 4096 GPMI clocks (0 = default)
pub fn set_gpmi_timeout<R: RegisterIo + ?Sized>(io: &mut R, timeout: u32) {
    let timeout = if timeout == 0 { DEFAULT_FLASH_BUSY_TIMEOUT } else { timeout };
    io.write(Register::GpmiTiming1, timeout << TIMING1_BUSY_TIMEOUT_SHIFT);
}

pub fn reset_bch<R: RegisterIo + ?Sized>(io: &mut R) {
    io.set(Register::BchCtrl, BchCtrl::SFTRST.bits());
    io.clear(Register::BchCtrl, BchCtrl::SFTRST.bits());
    io.set(Register::BchCtrl, BchCtrl::CLKGATE.bits());
    io.clear(Register::BchCtrl, BchCtrl::CLKGATE.bits());
}

pub fn disable_bch<R: RegisterIo + ?Sized>(io: &mut R) {
    io.set(Register::BchCtrl, BchCtrl::CLKGATE.bits());
}

/// Route page data through BCH and program its erased-page threshold
pub fn update_ecc_params<R: RegisterIo + ?Sized>(io: &mut R, ecc: &EccParams) {
    io.set(Register::GpmiCtrl1, CTRL1_BCH_MODE);
    let mode = io.read(Register::BchMode) & !BCH_MODE_ERASE_THRESHOLD_MASK;
    io.write(Register::BchMode, mode | (ecc.erase_threshold & BCH_MODE_ERASE_THRESHOLD_MASK));
}

/// Layout field value for a correction level (2, 4 .. 20 bits map to 1 .. 10)
pub fn ecc_type_field(level: u32) -> u8 {
    if level > MAX_ECC_LEVEL {
        0
    } else {
        (level / 2) as u8
    }
}

/// Load FLASH0LAYOUT0/1 from `ecc`, leaving other bits as they are
pub fn set_flash_layout<R: RegisterIo + ?Sized>(io: &mut R, ecc: &EccParams) {
    let mut l0 = FlashLayout0(io.read(Register::BchFlash0Layout0));
    l0.set_nblocks(ecc.blocks_per_page as u8);
    l0.set_meta_size(ecc.metadata_bytes as u8);
    l0.set_ecc0(ecc_type_field(ecc.block0_level));
    l0.set_data0_size(ecc.block0_size as u16);
    io.write(Register::BchFlash0Layout0, l0.0);

    let mut l1 = FlashLayout1(io.read(Register::BchFlash0Layout1));
    l1.set_page_size(ecc.page_size as u16);
    l1.set_eccn(ecc_type_field(ecc.blockn_level));
    l1.set_datan_size(ecc.blockn_size as u16);
    io.write(Register::BchFlash0Layout1, l1.0);
}

/// Only even levels up to [`MAX_ECC_LEVEL`] can be decoded
pub fn check_ecc_decode_capability(level: u32) -> Result<(), NandError> {
    if level > MAX_ECC_LEVEL || level % 2 != 0 {
        return Err(NandError::NoEccPresent);
    }
    Ok(())
}

pub fn clear_ecc_complete<R: RegisterIo + ?Sized>(io: &mut R) {
    io.clear(Register::BchCtrl, BchCtrl::COMPLETE_IRQ.bits());
}

/// Wait for the decoder to finish and return STATUS0.
///
/// The wait is bounded; on timeout STATUS0 is read anyway so a stuck engine
/// shows up as whatever summary bits it left behind.
pub fn find_ecc_errors<P: RegisterIo + MicrosClock + ?Sized>(platform: &mut P) -> BchStatus0 {
    let done = poll_with_deadline(platform, MAX_TRANSACTION_TIMEOUT_US, |p| {
        let ctrl = BchCtrl::from_bits_retain(p.read(Register::BchCtrl));
        ctrl.intersects(BchCtrl::COMPLETE_IRQ | BchCtrl::BM_ERROR_IRQ)
    });
    if done.is_err() {
        warn!("bch completion timeout");
    }
    let status = platform.read(Register::BchStatus0);
    trace!("bch status0 {=u32:x}", status);
    BchStatus0::from_bits_retain(status)
}
