//! Sequential firmware reads: sector bookkeeping, bad block skipping and the
//! recovery policy applied when a page read goes wrong.

use nandboot_nandio::onfi::LBA_SIZE;

use crate::common::io_driver::NandPlatform;
use crate::constant::{AUX_BUFFER_INDEX, MAX_BAD_BLOCKS};
use crate::context::NandContext;
use crate::error::NandError;
use crate::hal::PageBuffer;
use crate::persistent::{self, PersistentBits};

/// Where the firmware stream stands
#[derive(Clone, Default, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerializerState {
    pub current_nand: u32,
    pub current_block: u32,
    /// Next sector (BA NAND: LBA) to read
    pub current_sector: u32,
    pub sectors_to_read: u32,
    pub sectors_read: u32,
    pub sectors_per_block: u32,
    /// Payload bytes one read delivers
    pub page_data_size: u32,
    /// Bytes fetched from BA NAND so far
    pub sector_data_read: u32,
    pub chunks_per_read: u32,
    /// 0 when no DBBT was found
    pub bb_area_start_page: u32,
    pub bb_marker_byte: u32,
    pub bb_marker_bit: u32,
    pub bb_marker_physical_offset: u32,
    pub use_secondary_boot: bool,
    pub boot_patch: bool,
}

/// Move the bad block marker stored in the first metadata byte back into the
/// page payload, `bit` bits into `data[byte]`.
pub fn swap_bad_block_marker(data: &mut [u8], byte: u32, bit: u32, meta0: u8) {
    let byte = byte as usize;
    if bit > 7 || byte + 1 >= data.len() {
        return;
    }
    let meta = meta0 as u32;
    let low = data[byte] as u32;
    let high = data[byte + 1] as u32;
    data[byte] = ((meta << bit) | (low & (0xff >> (8 - bit)))) as u8;
    data[byte + 1] = ((meta >> (8 - bit)) | (high & (0xff << bit))) as u8;
}

impl NandContext {
    /// Sectors one successful read moves the stream by
    fn sector_step(&self) -> u32 {
        if self.hal.device.is_ba_nand {
            (self.state.page_data_size / LBA_SIZE).max(1)
        } else {
            1
        }
    }

    /// The stream cannot move past the last addressable sector
    fn advance(&mut self, sectors: u32) -> Result<(), NandError> {
        let state = &mut self.state;
        state.current_sector = state.current_sector.checked_add(sectors).ok_or(NandError::SearchFailed)?;
        state.sectors_to_read = state.sectors_to_read.saturating_sub(sectors);
        state.sectors_read = state.sectors_read.saturating_add(sectors);
        Ok(())
    }

    fn on_block_boundary(&self) -> bool {
        let spb = self.state.sectors_per_block;
        !self.hal.device.is_ba_nand && spb != 0 && self.state.current_sector % spb == 0
    }

    /// Kick off the read of the current sector into `buf`.
    ///
    /// Raw NAND reads are left running; collect them with
    /// [`NandContext::wait_on_read`]. BA NAND reads finish before this
    /// returns.
    pub fn start_sector_read<P: NandPlatform>(&mut self, p: &mut P, buf: &mut PageBuffer) -> Result<(), NandError> {
        if self.hal.device.is_ba_nand {
            let size = self.state.page_data_size;
            self.hal.ba_send_read(p, 1, self.state.current_sector, size, buf)?;
            self.state.sector_data_read += size;
            if size < self.hal.device.sector_size {
                self.hal.ba_abort(p)?;
            }
            return Ok(());
        }

        if self.on_block_boundary() {
            self.find_next_good_block(p, buf)?;
        }
        trace!("read sector {}", self.state.current_sector);
        self.hal.read_page(p, self.state.current_sector, buf);
        Ok(())
    }

    /// Poll the read started by [`NandContext::start_sector_read`].
    ///
    /// [`NandError::DmaBusy`] means nothing changed. A timeout steps the
    /// stream back by one read. An uncorrectable page arms the redundant boot
    /// for the next attempt, or powers down when that already failed.
    pub fn wait_on_read<P: NandPlatform>(&mut self, p: &mut P, buf: &mut PageBuffer) -> Result<(), NandError> {
        let mut result = self.hal.get_dma_status(p);
        if result == Err(NandError::DmaBusy) {
            return result;
        }

        if result.is_ok() && self.hal.hw_ecc {
            result = match self.hal.check_ecc_status(p, &buf[AUX_BUFFER_INDEX..]) {
                Err(NandError::EccThreshold) => {
                    warn!("ecc threshold at sector {}", self.state.current_sector);
                    self.request_block_rewrite(p);
                    Ok(())
                }
                Err(NandError::EccFailed) => {
                    error!("uncorrectable sector {}", self.state.current_sector);
                    self.fall_back_to_redundant_boot(p);
                    Err(NandError::EccFailed)
                }
                other => other,
            };
        }

        let step = self.sector_step();
        match result {
            Err(NandError::DmaTimeout) => {
                warn!("read timeout at sector {}", self.state.current_sector);
                self.state.current_sector = self.state.current_sector.saturating_sub(step);
            }
            Ok(()) => {
                self.advance(step)?;
                if !self.hal.device.is_ba_nand && self.fuses.bi_preserve {
                    let meta0 = buf[AUX_BUFFER_INDEX];
                    swap_bad_block_marker(buf, self.state.bb_marker_byte, self.state.bb_marker_bit, meta0);
                }
            }
            Err(_) => {}
        }
        result
    }

    /// Second uncorrectable read in a row powers the chip down; the first
    /// one records it and resets into the secondary firmware.
    fn fall_back_to_redundant_boot<P: NandPlatform>(&self, p: &mut P) {
        let bits = persistent::load_bits(&mut p.persistent_store()).unwrap_or(PersistentBits::empty());
        if bits.contains(PersistentBits::REDUNDANT_BOOT) {
            error!("secondary firmware unreadable, powering down");
            p.chip_power_down();
            return;
        }
        if let Err(e) = persistent::set_bits(&mut p.persistent_store(), PersistentBits::REDUNDANT_BOOT) {
            warn!("redundant boot flag not stored {=u32:x}", e.code());
        }
        info!("resetting into secondary firmware");
        p.chip_reset();
    }

    /// Move the stream `count` reads forward without touching the media,
    /// except for bad block checks at block boundaries. `buf` is scratch.
    pub fn skip_sectors<P: NandPlatform>(&mut self, p: &mut P, count: u32, buf: &mut PageBuffer) -> Result<(), NandError> {
        debug!("skip {} sectors", count);
        let step = self.sector_step();
        for _ in 0..count {
            self.advance(step)?;
            if self.on_block_boundary() {
                self.find_next_good_block(p, buf)?;
            }
        }
        Ok(())
    }

    /// Settle the stream on the first good block at or after the current one.
    ///
    /// Uses the DBBT when one was loaded, factory markers otherwise (read into
    /// `buf`). Gives up with [`NandError::SearchFailed`] after more bad blocks
    /// than a table can hold.
    pub fn find_next_good_block<P: NandPlatform>(&mut self, p: &mut P, buf: &mut PageBuffer) -> Result<(), NandError> {
        let spb = self.state.sectors_per_block;
        if spb == 0 {
            return Err(NandError::SearchFailed);
        }
        let mut block = self.state.current_sector / spb;

        for _ in 0..=MAX_BAD_BLOCKS {
            let bad = if self.state.bb_area_start_page == 0 {
                let offset = self.state.bb_marker_physical_offset;
                self.hal.is_block_bad(p, block, spb, offset, buf)
            } else {
                self.bad_blocks.contains(block)
            };
            if !bad {
                self.state.current_block = block;
                self.state.current_sector = block.checked_mul(spb).ok_or(NandError::SearchFailed)?;
                return Ok(());
            }
            info!("skipping bad block {}", block);
            block = block.checked_add(1).ok_or(NandError::SearchFailed)?;
        }

        error!("no good block after {}", block);
        Err(NandError::SearchFailed)
    }
}
