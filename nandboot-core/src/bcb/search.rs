use crate::common::io_driver::NandPlatform;
use crate::constant::{
    BB_HEADER_SIZE_IN_2K, BCB_CHECKED_SIZE, BYTES_PER_CHUNK, FCB_HAMMING_DATA_OFFSET, FCB_HAMMING_PARITY_OFFSET,
    MAX_BAD_BLOCKS,
};
use crate::context::NandContext;
use crate::error::NandError;
use crate::gpmi;
use crate::hal::PageBuffer;

use super::checksum::{is_valid_block, Fingerprint};
use super::dbbt::{DbbtHeader, DBBT_ID};
use super::fcb::{Fcb, FCB_ID};
use super::hamming::hamming_check;

/// Result of a strided search and the last sector it read
#[derive(Copy, Clone, Eq, PartialEq)]
#[cfg_attr(test, derive(Debug))]
pub struct SearchOutcome {
    pub sector: u32,
    pub result: Result<(), NandError>,
}

/// Pages that failed ECC or carried something else are skipped; anything
/// else ends the scan.
fn keep_searching(result: &Result<(), NandError>) -> bool {
    matches!(
        result,
        Ok(())
            | Err(NandError::EccFailed)
            | Err(NandError::FcbHammingDoubleError)
            | Err(NandError::FcbSyndromeTableMismatch)
    )
}

/// Correct the Hamming protected FCB copy in `buf` and check its identity
fn verify_fcb(buf: &mut [u8]) -> Result<Fcb, NandError> {
    let (head, parity) = buf.split_at_mut(FCB_HAMMING_PARITY_OFFSET);
    let data = &mut head[FCB_HAMMING_DATA_OFFSET..];
    hamming_check(data, &parity[..BCB_CHECKED_SIZE])?;
    if !is_valid_block(data, &FCB_ID) {
        return Err(NandError::NoBcb);
    }
    Fcb::parse(data).ok_or(NandError::NoBcb)
}

impl NandContext {
    /// Read `base + i * stride` for `i` below the search limit until a block
    /// identified by `id` turns up in `buf`.
    ///
    /// A match read at the ECC threshold still counts; the media owner is
    /// asked to rewrite it.
    pub fn boot_block_search<P: NandPlatform>(
        &mut self,
        p: &mut P,
        id: &Fingerprint,
        base: u32,
        buf: &mut PageBuffer,
    ) -> SearchOutcome {
        let stride = self.fuses.search_stride;
        let mut sector = base;
        let mut result = Ok(());

        for i in 0..self.fuses.search_limit {
            let Some(next) = i.checked_mul(stride).and_then(|offset| base.checked_add(offset)) else {
                warn!("search past sector range from {}", base);
                result = Err(NandError::NoBcb);
                break;
            };
            sector = next;
            self.hal.read_page(p, sector, buf);
            result = self.hal.wait_for_read_complete(p, buf);

            let readable = result.err().map_or(true, NandError::is_readable);
            if readable && is_valid_block(buf, id) {
                if result.is_err() {
                    self.request_block_rewrite(p);
                }
                debug!("bcb {=u32:x} at sector {}", id.fingerprint, sector);
                return SearchOutcome { sector, result: Ok(()) };
            }
            if result == Err(NandError::EccThreshold) {
                result = Ok(());
            }
            if !keep_searching(&result) {
                break;
            }
        }

        debug!("bcb {=u32:x} search ended at {}", id.fingerprint, sector);
        SearchOutcome {
            sector,
            result: Err(result.err().unwrap_or(NandError::NoBcb)),
        }
    }

    /// Scan raw pages for the FCB, then program ECC, timing and serializer
    /// state from it. Returns the sector it was found at.
    ///
    /// Hardware ECC is off during the scan and on afterwards, whatever the
    /// outcome. Candidates failing the Hamming check are passed over.
    pub fn find_fcb<P: NandPlatform>(&mut self, p: &mut P, buf: &mut PageBuffer) -> Result<u32, NandError> {
        self.hal.hw_ecc = false;
        let stride = self.fuses.search_stride;
        let mut result = Ok(());
        let mut found = None;

        for i in 0..self.fuses.search_limit {
            let sector = i * stride;
            self.hal.read_page(p, sector, buf);
            result = self.hal.wait_for_read_complete(p, buf);
            if result.is_ok() {
                match verify_fcb(buf) {
                    Ok(fcb) => {
                        found = Some((sector, fcb));
                        break;
                    }
                    Err(NandError::NoBcb) => {}
                    Err(e) => result = Err(e),
                }
            }
            if !keep_searching(&result) {
                break;
            }
        }
        self.hal.hw_ecc = true;

        let Some((sector, fcb)) = found else {
            return Err(match result {
                Err(e) if !keep_searching(&Err(e)) => e,
                _ => NandError::NoBcb,
            });
        };
        info!("fcb at sector {}", sector);
        self.apply_fcb(p, &fcb)?;
        Ok(sector)
    }

    fn apply_fcb<P: NandPlatform>(&mut self, p: &mut P, fcb: &Fcb) -> Result<(), NandError> {
        self.hal.ecc = fcb.ecc_params()?;
        gpmi::update_ecc_params(p, &self.hal.ecc);
        gpmi::set_nand_timing(p, &fcb.timing, 0);
        self.hal.device.total_page_size = fcb.total_page_size;

        let (start, count) = fcb.firmware(self.state.use_secondary_boot);
        let state = &mut self.state;
        state.sectors_per_block = fcb.sectors_per_block;
        state.page_data_size = fcb.data_page_size;
        state.chunks_per_read = self.hal.ecc.data_size() / BYTES_PER_CHUNK as u32;
        state.boot_patch = fcb.boot_patch == 1;
        state.current_nand = 0;
        state.current_sector = start;
        state.current_block = start / fcb.sectors_per_block;
        state.sectors_to_read = count;
        state.sectors_read = 0;
        state.bb_area_start_page = fcb.dbbt_search_area_start;
        state.bb_marker_byte = fcb.bb_mark_byte;
        state.bb_marker_bit = fcb.bb_mark_bit;
        state.bb_marker_physical_offset = fcb.bb_mark_physical_offset;
        Ok(())
    }

    /// Find the DBBT from `area_start` and load its entry pages.
    ///
    /// Entry pages follow the header area and are read with hardware ECC. A
    /// page read at the ECC threshold is loaded and flagged for rewrite; a
    /// page that cannot be read is passed over. No more pages are read than
    /// the table has entries.
    pub fn read_bad_block_table<P: NandPlatform>(
        &mut self,
        p: &mut P,
        area_start: u32,
        buf: &mut PageBuffer,
    ) -> Result<(), NandError> {
        let outcome = self.boot_block_search(p, &DBBT_ID, area_start, buf);
        if outcome.result.is_err() {
            return Err(NandError::NoDbbt);
        }
        let header = DbbtHeader::parse(buf).ok_or(NandError::NoDbbt)?;
        info!("dbbt at sector {} pages {}", outcome.sector, header.number_2k_pages_bb);

        let pages = header.number_2k_pages_bb.min(MAX_BAD_BLOCKS as u32);
        let first = outcome.sector.checked_add(BB_HEADER_SIZE_IN_2K).ok_or(NandError::NoDbbt)?;
        let end = first.checked_add(pages).ok_or(NandError::NoDbbt)?;

        self.bad_blocks.clear();
        for page in first..end {
            if self.bad_blocks.is_full() {
                break;
            }
            self.hal.read_page(p, page, buf);
            match self.hal.wait_for_read_complete(p, buf) {
                Ok(()) => {}
                Err(NandError::EccThreshold) => self.request_block_rewrite(p),
                Err(e) => {
                    warn!("dbbt page {} unreadable {=u32:x}", page, e.code());
                    continue;
                }
            }
            self.bad_blocks.load_entry_page(&buf[..self.hal.ecc.data_size() as usize]);
        }
        info!("{} bad blocks", self.bad_blocks.len());
        Ok(())
    }
}
