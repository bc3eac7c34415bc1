//! Block abstracted (BA) NAND: sector reads addressed by LBA.

use nandboot_nandio::address::NandAddress;
use nandboot_nandio::cmd::NandCommandId;

use super::{NandHal, PageBuffer, BOOT_CS};
use crate::common::io_driver::NandBus;
use crate::dma::descriptor::WordLength;
use crate::dma::ReadSeed;
use crate::error::NandError;

impl NandHal {
    /// Read `count` sectors starting at LBA `sector` into `buf`.
    ///
    /// The column cycles carry the sector count and the row cycles the LBA.
    /// `read_size` bytes are moved with ECC off; the device corrects itself.
    pub fn ba_send_read<P: NandBus + ?Sized>(
        &mut self,
        p: &mut P,
        count: u16,
        sector: u32,
        read_size: u32,
        buf: &mut PageBuffer,
    ) -> Result<(), NandError> {
        let address = NandAddress::new(count, sector as u64)
            .to_cycles(self.device.column_bytes as usize, self.device.row_bytes as usize);
        let seed = ReadSeed {
            cs: BOOT_CS,
            command1: self.device.read1_code,
            command2: self.device.read2_code,
            address,
            read_size,
            word_length: WordLength::EightBit,
            ecc_enabled: false,
            data_buffer: buf.bus_address(),
            ..Default::default()
        };
        self.arena.build_read(&seed);
        self.start_dma(p, buf);
        self.wait_dma(p)
    }

    /// Abort an LBA transfer the device is still streaming
    pub fn ba_abort<P: NandBus + ?Sized>(&mut self, p: &mut P) -> Result<(), NandError> {
        self.arena.build_reset(BOOT_CS, NandCommandId::LbaAbort.code());
        self.start_dma(p, &mut []);
        self.wait_dma(p).map_err(|_| NandError::ResetFailed)
    }
}
