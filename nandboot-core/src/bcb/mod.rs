//! Boot control block discovery.
//!
//! Raw NAND carries an FCB describing geometry and firmware location, and
//! optionally a DBBT listing bad blocks. BA NAND replaces both with an MBR and
//! a config block.

pub mod checksum;
pub mod dbbt;
pub mod fcb;
pub mod hamming;
pub mod mbr;
mod search;

pub use checksum::{bcb_checksum, Fingerprint};
pub use dbbt::BadBlockTable;
pub use fcb::Fcb;
pub use search::SearchOutcome;

use crate::common::io_driver::NandPlatform;
use crate::context::NandContext;
use crate::error::NandError;
use crate::hal::PageBuffer;

/// Largest BA transfer a page buffer takes
pub const MAX_BA_TRANSFER: u32 = 2048;
/// Chip the boot drive must live on
const BOOT_CHIP: u32 = 0;

impl NandContext {
    /// Locate the FCB, seed the serializer from it and load the DBBT.
    ///
    /// A missing DBBT is not fatal; the boot then relies on factory bad block
    /// markers. `buf` is scratch.
    pub fn find_boot_control_blocks<P: NandPlatform>(
        &mut self,
        p: &mut P,
        buf: &mut PageBuffer,
    ) -> Result<(), NandError> {
        self.state.use_secondary_boot = self.secondary_boot_requested(p);
        info!(
            "{=str} boot",
            if self.state.use_secondary_boot { "secondary" } else { "primary" }
        );

        match self.find_fcb(p, buf) {
            Ok(_) => {}
            Err(NandError::FcbInvalidEcc) => return Err(NandError::FcbInvalidEcc),
            Err(e) => {
                warn!("fcb not found {=u32:x}", e.code());
                return Err(NandError::NoFcb);
            }
        }

        let area = self.state.bb_area_start_page;
        if area > 0 {
            if let Err(e) = self.read_bad_block_table(p, area, buf) {
                warn!("dbbt not loaded {=u32:x}", e.code());
                self.bad_blocks.clear();
            }
        }
        Ok(())
    }

    /// BA NAND discovery: MBR at LBA 0, config block at the start of the
    /// firmware partition.
    pub fn ba_find_boot_control_blocks<P: NandPlatform>(
        &mut self,
        p: &mut P,
        buf: &mut PageBuffer,
    ) -> Result<(), NandError> {
        let secondary = self.secondary_boot_requested(p);
        self.state.use_secondary_boot = secondary;
        let read_size = self.state.page_data_size;

        self.hal.ba_send_read(p, 1, 0, read_size, buf)?;
        let partition = mbr::firmware_partition_start(buf).map_err(|_| NandError::NoBcb)?;
        debug!("firmware partition at {}", partition);

        self.hal.ba_send_read(p, 1, partition, read_size, buf)?;
        let drive = mbr::select_drive(buf, BOOT_CHIP, secondary)?;
        let start = partition + drive.first_sector;
        info!("ba firmware at lba {} count {}", start, drive.sector_count);

        self.state.current_nand = 0;
        self.state.current_sector = start;
        self.state.current_block = 0;
        self.state.sectors_per_block = 1;
        self.state.sectors_read = 0;
        self.state.sectors_to_read = drive.sector_count;
        self.state.bb_area_start_page = 0;
        self.state.bb_marker_byte = 0;
        self.state.bb_marker_bit = 0;
        self.bad_blocks.clear();
        Ok(())
    }
}
