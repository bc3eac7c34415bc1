//! NAND hardware abstraction: device geometry, DMA bookkeeping and the
//! per-operation chains built on [`DescriptorArena`].

mod ba;
pub mod device;
mod read;

use core::ops::{Deref, DerefMut};

use nandboot_nandio::cmd::{NandStatusOutput, READ_ID_RESULT_SIZE, READ_STATUS_RESULT_SIZE};
use nandboot_nandio::onfi::{OnfiParameterPage, PARAMETER_PAGE_SIZE};

pub use device::NandDescriptor;

use crate::common::clock::{poll_with_deadline, Deadline};
use crate::common::io_driver::NandBus;
use crate::common::register::Register;
use crate::config::NandFuseConfig;
use crate::constant::{MAX_NUMBER_NANDS, MAX_TRANSACTION_TIMEOUT_US, NAND0_APBH_CH, READ_BUFFER_SIZE};
use crate::dma::descriptor::WordLength;
use crate::dma::DescriptorArena;
use crate::error::NandError;
use crate::gpmi::{self, ApbhCtrl0, EccParams};

/// Busy timeout used while probing the device, in 4096 GPMI clock units
const PROBE_BUSY_TIMEOUT: u32 = 6;
/// Only chip select the boot path talks to
const BOOT_CS: u8 = 0;

/// One DMA target buffer: page payload up front, auxiliary data at
/// [`crate::constant::AUX_BUFFER_INDEX`].
#[repr(C, align(4))]
#[derive(Clone)]
pub struct PageBuffer([u8; READ_BUFFER_SIZE]);

impl PageBuffer {
    pub const fn new() -> Self {
        Self([0; READ_BUFFER_SIZE])
    }

    /// Bus address the DMA engine is given
    pub fn bus_address(&self) -> u32 {
        self.0.as_ptr() as usize as u32
    }
}

impl Default for PageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for PageBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for PageBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// State of the NAND interface between calls.
///
/// Holds the descriptor arena, so chains built here stay valid until the next
/// build. All hardware access goes through the [`NandBus`] passed to each call.
pub struct NandHal {
    pub device: NandDescriptor,
    pub ecc: EccParams,
    /// Route page reads through the BCH decoder
    pub hw_ecc: bool,
    pub nands_in_use: u32,
    arena: DescriptorArena,
    dma_deadline: Deadline,
    dma_timeout_us: u32,
    hw_ready: bool,
}

impl Default for NandHal {
    fn default() -> Self {
        Self::new()
    }
}

impl NandHal {
    pub fn new() -> Self {
        Self {
            device: NandDescriptor::default(),
            ecc: EccParams::default(),
            hw_ecc: false,
            nands_in_use: 1,
            arena: DescriptorArena::new(),
            dma_deadline: Deadline::default(),
            dma_timeout_us: MAX_TRANSACTION_TIMEOUT_US,
            hw_ready: false,
        }
    }

    /// Chain most recently built
    pub fn arena(&self) -> &DescriptorArena {
        &self.arena
    }

    /// Set up the descriptor from fuses, bring up the controller and probe
    /// for a BA NAND through the ONFI parameter page (read into `scratch`).
    ///
    /// A device that does not answer the parameter page read is treated as
    /// raw NAND.
    pub fn init<P: NandBus + ?Sized>(
        &mut self,
        p: &mut P,
        fuses: &NandFuseConfig,
        scratch: &mut PageBuffer,
    ) -> Result<(), NandError> {
        self.device = NandDescriptor::from_fuses(fuses);
        self.hw_init(p, fuses)?;

        if let Err(e) = self.read_parameter_page(p, scratch) {
            debug!("parameter page read failed {=u32:x}", e.code());
        }
        if let Some(page) = OnfiParameterPage::parse(&scratch[..PARAMETER_PAGE_SIZE]) {
            if page.is_ba_nand() {
                self.device.is_ba_nand = true;
                self.device.sector_size = page.sector_size();
                self.device.total_page_size = page.sector_size();
                self.device.lba_per_read = page.lbas_per_read();
                info!(
                    "ba nand sector {} lba/read {}",
                    self.device.sector_size,
                    self.device.lba_per_read
                );
            }
        }
        self.dma_timeout_us = MAX_TRANSACTION_TIMEOUT_US;
        Ok(())
    }

    /// Enable GPMI, BCH and the APBH channel, then reset and identify the
    /// device. Runs once; later calls return immediately.
    pub fn hw_init<P: NandBus + ?Sized>(&mut self, p: &mut P, fuses: &NandFuseConfig) -> Result<(), NandError> {
        if self.hw_ready {
            return Ok(());
        }
        gpmi::check_ecc_decode_capability(self.ecc.blockn_level)?;

        let nands = fuses.nands_in_use.max(1);
        let pins = fuses.pin_config(self.device.word_length == WordLength::SixteenBit, nands);
        gpmi::enable_gpmi(p, &pins)?;
        self.nands_in_use = nands.min(MAX_NUMBER_NANDS);

        gpmi::reset_bch(p);
        p.clear(Register::ApbhCtrl0, (ApbhCtrl0::SFTRST | ApbhCtrl0::CLKGATE).bits());

        gpmi::set_gpmi_timeout(p, PROBE_BUSY_TIMEOUT);
        p.reset_channel(NAND0_APBH_CH);
        p.clear(Register::ApbhCtrl1, 1 << NAND0_APBH_CH);

        if let Err(e) = self.reset_nand(p) {
            warn!("nand reset failed {=u32:x}", e.code());
        }
        let mut id = [0u8; READ_ID_RESULT_SIZE];
        match self.read_nand_id(p, &mut id) {
            Ok(()) => info!("nand id {=[u8]:x}", id[..]),
            Err(e) => warn!("nand id read failed {=u32:x}", e.code()),
        }
        gpmi::set_gpmi_timeout(p, 0);
        gpmi::update_ecc_params(p, &self.ecc);

        self.hw_ready = true;
        Ok(())
    }

    /// Gate the GPMI and BCH clocks
    pub fn shutdown<P: NandBus + ?Sized>(&mut self, p: &mut P) {
        gpmi::disable_gpmi(p);
        gpmi::disable_bch(p);
        self.hw_ready = false;
    }

    /// Resolve the arena and hand it to the NAND channel
    fn start_dma<P: NandBus + ?Sized>(&mut self, p: &mut P, target: &mut [u8]) {
        self.arena.resolve();
        p.start(NAND0_APBH_CH, &self.arena, target);
        self.dma_deadline = Deadline::start(p, self.dma_timeout_us);
    }

    /// Block until the running chain ends and report its terminal status
    pub fn wait_dma<P: NandBus + ?Sized>(&mut self, p: &mut P) -> Result<(), NandError> {
        let done = poll_with_deadline(p, self.dma_timeout_us, |p| p.is_complete(NAND0_APBH_CH));
        if done.is_err() {
            warn!("nand dma timeout");
            p.reset_channel(NAND0_APBH_CH);
            return Err(NandError::DmaTimeout);
        }
        NandError::from_bar(p.terminal_bar(NAND0_APBH_CH))
    }

    /// Non-blocking check of the running chain.
    ///
    /// [`NandError::DmaBusy`] means poll again. A chain that ended on a
    /// failure terminator, or ran past the deadline, reports a timeout.
    pub fn get_dma_status<P: NandBus + ?Sized>(&mut self, p: &mut P) -> Result<(), NandError> {
        if p.is_complete(NAND0_APBH_CH) {
            if p.terminal_bar(NAND0_APBH_CH) != 0 {
                return Err(NandError::DmaTimeout);
            }
            Ok(())
        } else if self.dma_deadline.is_expired(p) {
            Err(NandError::DmaTimeout)
        } else {
            Err(NandError::DmaBusy)
        }
    }

    /// Issue the reset opcode and wait for ready
    pub fn reset_nand<P: NandBus + ?Sized>(&mut self, p: &mut P) -> Result<(), NandError> {
        self.arena.build_reset(BOOT_CS, self.device.reset_code);
        self.start_dma(p, &mut []);
        self.wait_dma(p).map_err(|_| NandError::ResetFailed)
    }

    pub fn read_nand_id<P: NandBus + ?Sized>(
        &mut self,
        p: &mut P,
        id: &mut [u8; READ_ID_RESULT_SIZE],
    ) -> Result<(), NandError> {
        self.arena.build_read_id(BOOT_CS, id.as_ptr() as usize as u32);
        self.start_dma(p, id);
        self.wait_dma(p)
    }

    /// ONFI parameter page into the head of `buf`
    pub fn read_parameter_page<P: NandBus + ?Sized>(&mut self, p: &mut P, buf: &mut PageBuffer) -> Result<(), NandError> {
        self.arena
            .build_params_page(BOOT_CS, buf.bus_address(), PARAMETER_PAGE_SIZE as u32);
        self.start_dma(p, buf);
        self.wait_dma(p)
    }

    pub fn read_status<P: NandBus + ?Sized>(&mut self, p: &mut P) -> Result<NandStatusOutput, NandError> {
        let mut status = [0u8; READ_STATUS_RESULT_SIZE];
        self.arena.build_read_status(BOOT_CS, status.as_ptr() as usize as u32);
        self.start_dma(p, &mut status);
        self.wait_dma(p)?;
        Ok(NandStatusOutput::from_bits_retain(status[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPlatform;

    fn ready_hal(sim: &mut SimPlatform) -> NandHal {
        let mut hal = NandHal::new();
        let fuses = NandFuseConfig::decode(0, 0, 0);
        let mut scratch = PageBuffer::new();
        hal.init(sim, &fuses, &mut scratch).unwrap();
        hal
    }

    #[test]
    fn test_init_raw_nand_keeps_defaults() {
        let mut sim = SimPlatform::new();
        let hal = ready_hal(&mut sim);
        assert!(!hal.device.is_ba_nand);
        assert_eq!(hal.device.total_page_size, 2112);
        assert_eq!(hal.nands_in_use, 1);
        assert_eq!(sim.resets_seen(), 1);
        assert_eq!(sim.pins().map(|p| p.number_of_nands), Some(1));
    }

    #[test]
    fn test_init_detects_ba_nand() {
        let mut sim = SimPlatform::new().with_ba_nand(11);
        let hal = ready_hal(&mut sim);
        assert!(hal.device.is_ba_nand);
        assert_eq!(hal.device.sector_size, 2048);
        assert_eq!(hal.device.total_page_size, 2048);
        assert_eq!(hal.device.lba_per_read, 4);
    }

    #[test]
    fn test_hw_init_runs_once() {
        let mut sim = SimPlatform::new();
        let mut hal = ready_hal(&mut sim);
        let fuses = NandFuseConfig::decode(0, 0, 0);
        hal.hw_init(&mut sim, &fuses).unwrap();
        assert_eq!(sim.resets_seen(), 1);
    }

    #[test]
    fn test_hw_init_rejects_odd_ecc_level() {
        let mut sim = SimPlatform::new();
        let mut hal = NandHal::new();
        hal.ecc.blockn_level = 3;
        let fuses = NandFuseConfig::decode(0, 0, 0);
        assert_eq!(hal.hw_init(&mut sim, &fuses), Err(NandError::NoEccPresent));
    }

    #[test]
    fn test_hw_init_without_gpmi() {
        let mut sim = SimPlatform::new().without_gpmi();
        let mut hal = NandHal::new();
        let fuses = NandFuseConfig::decode(0, 0, 0);
        assert_eq!(hal.hw_init(&mut sim, &fuses), Err(NandError::NoGpmiPresent));
    }

    #[test]
    fn test_read_id() {
        let mut sim = SimPlatform::new();
        let mut hal = ready_hal(&mut sim);
        let mut id = [0u8; READ_ID_RESULT_SIZE];
        hal.read_nand_id(&mut sim, &mut id).unwrap();
        assert_eq!(id, crate::sim::NAND_ID);
    }

    #[test]
    fn test_read_status_reports_ready() {
        let mut sim = SimPlatform::new();
        let mut hal = ready_hal(&mut sim);
        let status = hal.read_status(&mut sim).unwrap();
        assert!(status.contains(NandStatusOutput::PAGE_BUFFER_READY));
        assert!(!status.contains(NandStatusOutput::CHIP_STATUS0_FAIL));
    }

    #[test]
    fn test_wait_dma_timeout_resets_channel() {
        let mut sim = SimPlatform::new();
        let mut hal = ready_hal(&mut sim);
        sim.hang_next_dma();
        assert_eq!(hal.reset_nand(&mut sim), Err(NandError::ResetFailed));
        assert!(sim.channel_resets() >= 2);
    }

    #[test]
    fn test_dma_status_busy_then_done() {
        let mut sim = SimPlatform::new();
        let mut hal = ready_hal(&mut sim);
        sim.set_dma_latency(2);
        let mut buf = PageBuffer::new();
        hal.read_page(&mut sim, 0, &mut buf);
        assert_eq!(hal.get_dma_status(&mut sim), Err(NandError::DmaBusy));
        assert_eq!(hal.get_dma_status(&mut sim), Err(NandError::DmaBusy));
        assert_eq!(hal.get_dma_status(&mut sim), Ok(()));
    }

    #[test]
    fn test_dma_status_failure_terminator_is_timeout() {
        let mut sim = SimPlatform::new();
        let mut hal = ready_hal(&mut sim);
        sim.fail_next_dma(NandError::DmaTimeout.code());
        let mut buf = PageBuffer::new();
        hal.read_page(&mut sim, 0, &mut buf);
        assert_eq!(hal.get_dma_status(&mut sim), Err(NandError::DmaTimeout));
    }

    #[test]
    fn test_shutdown_gates_clocks() {
        let mut sim = SimPlatform::new();
        let mut hal = ready_hal(&mut sim);
        hal.shutdown(&mut sim);
        assert_ne!(sim.register(Register::GpmiCtrl0) & (1 << 30), 0);
        assert_ne!(sim.register(Register::BchCtrl) & (1 << 30), 0);
    }
}
