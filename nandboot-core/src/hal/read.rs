//! Raw NAND page reads and BCH status interpretation.

use nandboot_nandio::address::NandAddress;

use super::{NandHal, PageBuffer, BOOT_CS};
use crate::common::io_driver::NandBus;
use crate::common::register::Register;
use crate::constant::AUX_BUFFER_INDEX;
use crate::dma::descriptor::BCH_PAGE_MASK;
use crate::dma::ReadSeed;
use crate::error::NandError;
use crate::gpmi::{self, BchCtrl, BchStatus0};

/// Per-block status byte: the block could not be corrected
pub const BCH_BLOCK_UNCORRECTABLE: u8 = 0xfe;
/// Per-block status byte: the block was erased
pub const BCH_BLOCK_ERASED: u8 = 0xff;

/// Pages sampled at each end of a block by [`NandHal::is_block_bad`]
const BAD_BLOCK_SAMPLE_PAGES: u32 = 3;

impl NandHal {
    fn page_seed(&self, column: u16, page: u32, read_size: u32, buf: &PageBuffer) -> ReadSeed {
        let address = NandAddress::new(column, page as u64)
            .to_cycles(self.device.column_bytes as usize, self.device.row_bytes as usize);
        ReadSeed {
            cs: BOOT_CS,
            command1: self.device.read1_code,
            command2: self.device.read2_code,
            address,
            read_size,
            word_length: self.device.word_length,
            ecc_enabled: self.hw_ecc,
            ecc_mask: BCH_PAGE_MASK,
            data_buffer: buf.bus_address(),
            aux_buffer: buf.bus_address() + AUX_BUFFER_INDEX as u32,
            command_only: false,
        }
    }

    /// Start a full page read of `page` into `buf`.
    ///
    /// Builds the whole read chain and programs the BCH layout when hardware
    /// ECC is on. Completion is collected with
    /// [`NandHal::wait_for_read_complete`] or [`NandHal::get_dma_status`].
    pub fn read_page<P: NandBus + ?Sized>(&mut self, p: &mut P, page: u32, buf: &mut PageBuffer) {
        self.ecc.page_size = self.ecc.total_page_size();
        let read_size = if self.hw_ecc {
            self.ecc.page_size
        } else {
            self.device.total_page_size
        };
        let seed = self.page_seed(0, page, read_size, buf);
        if self.hw_ecc {
            gpmi::set_flash_layout(p, &self.ecc);
        }
        self.arena.build_read(&seed);
        gpmi::clear_ecc_complete(p);
        self.start_dma(p, buf);
    }

    /// Start a read that reuses the chain left by [`NandHal::read_page`],
    /// patching only address, size and buffers.
    pub fn read_nand<P: NandBus + ?Sized>(
        &mut self,
        p: &mut P,
        column: u16,
        page: u32,
        read_size: u32,
        buf: &mut PageBuffer,
    ) {
        let seed = self.page_seed(column, page, read_size, buf);
        self.arena.build_quick_read(&seed);
        gpmi::clear_ecc_complete(p);
        self.start_dma(p, buf);
    }

    /// Wait for the running read and, with hardware ECC, judge the page
    pub fn wait_for_read_complete<P: NandBus + ?Sized>(&mut self, p: &mut P, buf: &PageBuffer) -> Result<(), NandError> {
        self.wait_dma(p)?;
        if self.hw_ecc {
            self.check_ecc_status(p, &buf[AUX_BUFFER_INDEX..])
        } else {
            Ok(())
        }
    }

    /// Combine BCH STATUS0 with the per-block status bytes in `aux`.
    ///
    /// Erased (all ones) or uncorrectable pages fail. A page where some block
    /// needed exactly its configured correction level reports
    /// [`NandError::EccThreshold`]; its data is still good.
    pub fn check_ecc_status<P: NandBus + ?Sized>(&mut self, p: &mut P, aux: &[u8]) -> Result<(), NandError> {
        let status = gpmi::find_ecc_errors(p);
        let mut result = Ok(());

        if !status.is_empty() {
            let meta = self.ecc.metadata_bytes as usize;
            let first = meta + meta % 4;
            let mut at_threshold = false;
            let mut uncorrectable = false;

            for block in 0..=self.ecc.blocks_per_page as usize {
                let Some(&byte) = aux.get(first + block) else {
                    break;
                };
                let level = if block == 0 {
                    self.ecc.block0_level
                } else {
                    self.ecc.blockn_level
                };
                match byte {
                    BCH_BLOCK_UNCORRECTABLE => uncorrectable = true,
                    BCH_BLOCK_ERASED => {}
                    corrected if corrected as u32 == level => at_threshold = true,
                    _ => {}
                }
            }

            result = if status.contains(BchStatus0::ALLONES) {
                Err(NandError::EccFailed)
            } else if status.contains(BchStatus0::UNCORRECTABLE) || uncorrectable {
                Err(NandError::EccFailed)
            } else if status.contains(BchStatus0::CORRECTED) && at_threshold {
                Err(NandError::EccThreshold)
            } else {
                Ok(())
            };
            debug!("ecc status {=u32:x}", status.bits());
        }

        p.clear(Register::BchCtrl, BchCtrl::COMPLETE_IRQ.bits());
        result
    }

    /// Sample the first and last pages of `block` for a bad block marker.
    ///
    /// Reads are raw; the marker byte at `marker_offset` must read 0xFF on
    /// every sampled page and every read must succeed. `buf` is scratch.
    pub fn is_block_bad<P: NandBus + ?Sized>(
        &mut self,
        p: &mut P,
        block: u32,
        pages_per_block: u32,
        marker_offset: u32,
        buf: &mut PageBuffer,
    ) -> bool {
        let Some(first) = block.checked_mul(pages_per_block) else {
            debug!("block {} past the page range", block);
            return true;
        };
        let last_start = first.checked_add(pages_per_block.saturating_sub(BAD_BLOCK_SAMPLE_PAGES));

        let saved_ecc = self.hw_ecc;
        self.hw_ecc = false;
        let size = self.device.total_page_size;
        let mut bad = false;

        for n in 0..2 * BAD_BLOCK_SAMPLE_PAGES {
            let page = if n < BAD_BLOCK_SAMPLE_PAGES {
                first.checked_add(n)
            } else {
                last_start.and_then(|start| start.checked_add(n - BAD_BLOCK_SAMPLE_PAGES))
            };
            let Some(page) = page else {
                bad = true;
                break;
            };
            if n == 0 {
                self.read_page(p, page, buf);
            } else {
                self.read_nand(p, 0, page, size, buf);
            }
            let status = self.wait_for_read_complete(p, buf);
            let marker = buf.get(marker_offset as usize).copied();
            if status.is_err() || marker != Some(0xff) {
                debug!("block {} bad at page {}", block, page);
                bad = true;
                break;
            }
        }

        self.hw_ecc = saved_ecc;
        bad
    }
}
