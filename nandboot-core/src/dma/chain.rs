//! Builders for the NAND descriptor chains.
//!
//! Each [`ChainShape`] has a fixed slot layout in the arena. Every chain ends
//! in a success terminator (BAR 0) or a failure terminator whose BAR holds
//! the status word, so the outcome is read back from the channel BAR alone.

use nandboot_nandio::address::AddressCycles;
use nandboot_nandio::cmd::{NandCommandId, READ_ID_RESULT_SIZE, READ_STATUS_RESULT_SIZE};

use super::descriptor::*;
use crate::error::NandError;

/// Kinds of chain the builder produces
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChainShape {
    Reset,
    ReadId,
    Read,
    /// ONFI parameter page read (read shape without the second command cycle)
    ParamsPage,
    Program,
    Erase,
    ReadStatus,
}

const NAND_LOCK: bool = true;
const ASSERT_CS: bool = true;
const STATUS_SUCCESS: u32 = 0;
const STATUS_TIMEOUT: u32 = NandError::DmaTimeout.code();
const STATUS_PROGRAM_FAILED: u32 = NandError::ProgramFailed.code();

/// Slot layout of the reset chain
pub mod reset {
    use super::DescIndex;
    pub const WAIT4RDY: DescIndex = DescIndex(0);
    pub const SENSE_RDY: DescIndex = DescIndex(1);
    pub const TX: DescIndex = DescIndex(2);
    pub const WAIT: DescIndex = DescIndex(3);
    pub const SENSE: DescIndex = DescIndex(4);
    pub const SUCCESS: DescIndex = DescIndex(5);
    pub const TIMEOUT: DescIndex = DescIndex(6);
}

/// Slot layout of the read ID chain
pub mod read_id {
    use super::DescIndex;
    pub const WAIT4RDY: DescIndex = DescIndex(0);
    pub const SENSE_RDY: DescIndex = DescIndex(1);
    pub const TX: DescIndex = DescIndex(2);
    pub const RX: DescIndex = DescIndex(3);
    pub const SUCCESS: DescIndex = DescIndex(4);
    pub const TIMEOUT: DescIndex = DescIndex(5);
}

/// Slot layout of the page read chain
pub mod read {
    use super::DescIndex;
    pub const TX_CLE1_ADDR: DescIndex = DescIndex(0);
    pub const TX_CLE2: DescIndex = DescIndex(1);
    pub const WAIT: DescIndex = DescIndex(2);
    pub const SENSE: DescIndex = DescIndex(3);
    pub const RX_DATA: DescIndex = DescIndex(4);
    pub const RX_WAIT4DONE: DescIndex = DescIndex(5);
    pub const SUCCESS: DescIndex = DescIndex(6);
    pub const TIMEOUT: DescIndex = DescIndex(7);
}

/// Slot layout of the parameter page chain
pub mod params_page {
    use super::DescIndex;
    pub const TX_CLE1_ADDR: DescIndex = DescIndex(0);
    pub const WAIT: DescIndex = DescIndex(1);
    pub const SENSE: DescIndex = DescIndex(2);
    pub const RX_DATA: DescIndex = DescIndex(3);
    pub const RX_WAIT4DONE: DescIndex = DescIndex(4);
    pub const SUCCESS: DescIndex = DescIndex(5);
    pub const TIMEOUT: DescIndex = DescIndex(6);
}

/// Slot layout of the program chain
pub mod program {
    use super::DescIndex;
    pub const TX_CLE1_ADDR: DescIndex = DescIndex(0);
    pub const TX_DATA: DescIndex = DescIndex(1);
    pub const TX_CLE2: DescIndex = DescIndex(2);
    pub const WAIT: DescIndex = DescIndex(3);
    pub const SENSE: DescIndex = DescIndex(4);
    pub const STATUS_TX: DescIndex = DescIndex(5);
    pub const STATUS_RX: DescIndex = DescIndex(6);
    pub const STAT_BRANCH: DescIndex = DescIndex(7);
    pub const SUCCESS: DescIndex = DescIndex(8);
    pub const PROGRAM_FAILED: DescIndex = DescIndex(9);
}

/// Slot layout of the block erase chain
pub mod erase {
    use super::DescIndex;
    pub const TX_CLE1_ROW: DescIndex = DescIndex(0);
    pub const TX_CLE2: DescIndex = DescIndex(1);
    pub const WAIT: DescIndex = DescIndex(2);
    pub const SENSE: DescIndex = DescIndex(3);
    pub const STATUS_TX: DescIndex = DescIndex(4);
    pub const STATUS_RX: DescIndex = DescIndex(5);
    pub const STAT_BRANCH: DescIndex = DescIndex(6);
    pub const SUCCESS: DescIndex = DescIndex(7);
    pub const PROGRAM_FAILED: DescIndex = DescIndex(8);
}

/// Slot layout of the read status chain
pub mod read_status {
    use super::DescIndex;
    pub const TX: DescIndex = DescIndex(0);
    pub const RX: DescIndex = DescIndex(1);
    pub const SUCCESS: DescIndex = DescIndex(2);
}

/// Per-read inputs to the read chain
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct ReadSeed {
    pub cs: u8,
    /// First command cycle (0x00, or 0xC0 for BA NAND)
    pub command1: u8,
    /// Confirm cycle (0x30)
    pub command2: u8,
    pub address: AddressCycles,
    /// Bytes moved by the data phase
    pub read_size: u32,
    pub word_length: WordLength,
    pub ecc_enabled: bool,
    pub ecc_mask: u16,
    pub data_buffer: u32,
    pub aux_buffer: u32,
    /// Stop after the busy wait, no data phase
    pub command_only: bool,
}

/// Inputs to the page program chain
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct ProgramSeed {
    pub cs: u8,
    pub address: AddressCycles,
    /// Raw bytes written when ECC is off
    pub write_size: u32,
    /// BCH page size when ECC is on
    pub ecc_page_size: u32,
    pub ecc_enabled: bool,
    pub data_buffer: u32,
    pub aux_buffer: u32,
    /// Where the status byte lands
    pub status_buffer: u32,
}

/// Inputs to the block erase chain
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct EraseSeed {
    pub cs: u8,
    /// Row cycles only
    pub row: AddressCycles,
    pub status_buffer: u32,
}

fn load_command(arena: &mut DescriptorArena, i: DescIndex, cle: u8, address: &[u8]) -> u32 {
    let bytes = arena.command_bytes_mut(i);
    bytes[0] = cle;
    let n = address.len().min(MAX_COMMAND_BYTES - 1);
    bytes[1..1 + n].copy_from_slice(&address[..n]);
    (1 + n) as u32
}

impl DescriptorArena {
    /// Reset (or BA abort when `command` is 0xCA)
    pub fn build_reset(&mut self, cs: u8, command: u8) {
        use reset::*;
        self.clear();
        let ctrl_wait = GpmiCtrl0::wait4ready(cs).0;

        self.put(WAIT4RDY, Some(SENSE_RDY), DmaCmd::wait4ready(), BarRef::Branch(TIMEOUT), &[ctrl_wait]);
        self.put(SENSE_RDY, Some(TX), DmaCmd::sense(false), BarRef::Branch(TIMEOUT), &[0]);

        let n = load_command(self, TX, command, &[]);
        self.put(
            TX,
            Some(WAIT),
            DmaCmd::command(n, false, NAND_LOCK, 3),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, false, ASSERT_CS).0, 0, GpmiEccCtrl::disabled().0],
        );
        self.put(WAIT, Some(SENSE), DmaCmd::wait4ready(), BarRef::Zero, &[ctrl_wait]);
        self.put(SENSE, Some(SUCCESS), DmaCmd::sense(false), BarRef::Branch(TIMEOUT), &[0]);
        self.put_terminator(SUCCESS, STATUS_SUCCESS, false);
        self.put_terminator(TIMEOUT, STATUS_TIMEOUT, false);
        self.shape = Some(ChainShape::Reset);
    }

    /// Read ID: CLE 0x90, ALE 0x00, six result bytes into `buffer`
    pub fn build_read_id(&mut self, cs: u8, buffer: u32) {
        use read_id::*;
        self.clear();
        let ctrl_wait = GpmiCtrl0::wait4ready(cs).0;

        self.put(WAIT4RDY, Some(SENSE_RDY), DmaCmd::wait4ready(), BarRef::Zero, &[ctrl_wait]);
        self.put(SENSE_RDY, Some(TX), DmaCmd::sense(false), BarRef::Branch(TIMEOUT), &[0]);

        let n = load_command(self, TX, NandCommandId::IdRead.code(), &[0x00]);
        self.put(
            TX,
            Some(RX),
            DmaCmd::command(n, false, NAND_LOCK, 3),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, true, ASSERT_CS).0, 0, GpmiEccCtrl::disabled().0],
        );
        let count = READ_ID_RESULT_SIZE as u32;
        self.put(
            RX,
            Some(SUCCESS),
            DmaCmd::rx_no_ecc(count, false),
            BarRef::Buffer(buffer),
            &[GpmiCtrl0::rx(cs, WordLength::EightBit, count).0],
        );
        self.put_terminator(SUCCESS, STATUS_SUCCESS, false);
        self.put_terminator(TIMEOUT, STATUS_TIMEOUT, false);
        self.shape = Some(ChainShape::ReadId);
    }

    /// Full page read.
    ///
    /// With ECC the receive step moves nothing itself (`NO_DMA_XFER`); the BCH
    /// block masters the bus and writes payload and auxiliary data. Without
    /// ECC the receive step is a plain `DMA_WRITE` of `read_size` bytes.
    pub fn build_read(&mut self, seed: &ReadSeed) {
        use read::*;
        self.clear();
        let cs = seed.cs;

        let n = load_command(self, TX_CLE1_ADDR, seed.command1, seed.address.as_slice());
        self.put(
            TX_CLE1_ADDR,
            Some(TX_CLE2),
            DmaCmd::command(n, false, NAND_LOCK, 3),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, true, ASSERT_CS).0, 0, GpmiEccCtrl::disabled().0],
        );

        let n = load_command(self, TX_CLE2, seed.command2, &[]);
        self.put(
            TX_CLE2,
            Some(WAIT),
            DmaCmd::command(n, false, NAND_LOCK, 1),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, false, ASSERT_CS).0],
        );

        self.put(WAIT, Some(SENSE), DmaCmd::wait4ready(), BarRef::Zero, &[GpmiCtrl0::wait4ready(cs).0]);
        let after_sense = if seed.command_only { SUCCESS } else { RX_DATA };
        self.put(SENSE, Some(after_sense), DmaCmd::sense(false), BarRef::Branch(TIMEOUT), &[0]);

        self.put_rx_data(RX_DATA, Some(RX_WAIT4DONE), seed);

        self.put(
            RX_WAIT4DONE,
            Some(SUCCESS),
            DmaCmd::disable_ecc_transfer(),
            BarRef::Zero,
            &[GpmiCtrl0::disable_ecc(cs).0, 0, GpmiEccCtrl::disabled().0],
        );
        self.put_terminator(SUCCESS, STATUS_SUCCESS, false);
        self.put_terminator(TIMEOUT, STATUS_TIMEOUT, false);
        self.shape = Some(ChainShape::Read);
        self.read_ecc = seed.ecc_enabled;
    }

    fn put_rx_data(&mut self, i: DescIndex, next: Option<DescIndex>, seed: &ReadSeed) {
        let payload = seed.data_buffer & !0x3;
        let aux = seed.aux_buffer & !0x3;
        // rx ctrl0 is always programmed for an 8 bit bus on a full build
        let ctrl0 = GpmiCtrl0::rx(seed.cs, WordLength::EightBit, seed.read_size).0;
        if seed.ecc_enabled {
            self.put(
                i,
                next,
                DmaCmd::rx_ecc(0, false),
                BarRef::Zero,
                &[
                    ctrl0,
                    0,
                    GpmiEccCtrl::enabled(seed.ecc_mask, EccCommand::Decode).0,
                    seed.read_size,
                    payload,
                    aux,
                ],
            );
        } else {
            self.put(
                i,
                next,
                DmaCmd::rx_no_ecc(seed.read_size, false),
                BarRef::Buffer(payload),
                &[ctrl0, 0, 0, 0, payload, aux],
            );
        }
    }

    /// Patch an existing read chain in place.
    ///
    /// Only chip select, address cycles, read size, buffers and the ECC mask
    /// are touched. Falls back to [`Self::build_read`] when the arena does not
    /// hold a read chain of the same ECC mode.
    pub fn build_quick_read(&mut self, seed: &ReadSeed) {
        use read::*;
        if self.shape != Some(ChainShape::Read) || self.read_ecc != seed.ecc_enabled {
            self.build_read(seed);
            return;
        }
        let cs = seed.cs;

        let n = load_command(self, TX_CLE1_ADDR, seed.command1, seed.address.as_slice());
        {
            let d = self.descriptor_mut(TX_CLE1_ADDR);
            d.cmd.set_xfer_count(n);
            let mut ctrl0 = d.ctrl0();
            ctrl0.set_cs(cs);
            ctrl0.set_xfer_count(n);
            d.pio[PIO_CTRL0] = ctrl0.0;
        }
        load_command(self, TX_CLE2, seed.command2, &[]);
        for i in [TX_CLE2, WAIT, RX_WAIT4DONE] {
            let d = self.descriptor_mut(i);
            let mut ctrl0 = d.ctrl0();
            ctrl0.set_cs(cs);
            d.pio[PIO_CTRL0] = ctrl0.0;
        }

        let payload = seed.data_buffer & !0x3;
        let aux = seed.aux_buffer & !0x3;
        if seed.ecc_enabled {
            let d = self.descriptor_mut(RX_DATA);
            let mut ecc = d.ecc_ctrl();
            ecc.set_buffer_mask(seed.ecc_mask);
            d.pio[PIO_ECCCTRL] = ecc.0;
            d.pio[PIO_ECCCOUNT] = seed.read_size;
        } else {
            self.descriptor_mut(RX_DATA).cmd.set_xfer_count(seed.read_size);
            self.set_bar_ref(RX_DATA, BarRef::Buffer(payload));
            let d = self.descriptor_mut(RX_DATA);
            d.pio[PIO_ECCCTRL] = 0;
            d.pio[PIO_ECCCOUNT] = 0;
        }
        let d = self.descriptor_mut(RX_DATA);
        d.pio[PIO_PAYLOAD] = payload;
        d.pio[PIO_AUXILIARY] = aux;
        let mut ctrl0 = d.ctrl0();
        ctrl0.set_cs(cs);
        ctrl0.set_xfer_count(seed.word_length.transfer_count(seed.read_size));
        d.pio[PIO_CTRL0] = ctrl0.0;

        let after_sense = if seed.command_only { SUCCESS } else { RX_DATA };
        self.set_link(SENSE, Some(after_sense));
    }

    /// ONFI parameter page: CLE 0xEC, ALE 0x00, raw read of `size` bytes
    pub fn build_params_page(&mut self, cs: u8, buffer: u32, size: u32) {
        use params_page::*;
        self.clear();

        let n = load_command(self, TX_CLE1_ADDR, NandCommandId::ReadParameterPage.code(), &[0x00]);
        self.put(
            TX_CLE1_ADDR,
            Some(WAIT),
            DmaCmd::command(n, false, NAND_LOCK, 3),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, true, ASSERT_CS).0, 0, GpmiEccCtrl::disabled().0],
        );
        self.put(WAIT, Some(SENSE), DmaCmd::wait4ready(), BarRef::Zero, &[GpmiCtrl0::wait4ready(cs).0]);
        self.put(SENSE, Some(RX_DATA), DmaCmd::sense(false), BarRef::Branch(TIMEOUT), &[0]);
        let buffer = buffer & !0x3;
        self.put(
            RX_DATA,
            Some(RX_WAIT4DONE),
            DmaCmd::rx_no_ecc(size, false),
            BarRef::Buffer(buffer),
            &[GpmiCtrl0::rx(cs, WordLength::EightBit, size).0, 0, 0, 0, buffer, 0],
        );
        self.put(
            RX_WAIT4DONE,
            Some(SUCCESS),
            DmaCmd::disable_ecc_transfer(),
            BarRef::Zero,
            &[GpmiCtrl0::disable_ecc(cs).0, 0, GpmiEccCtrl::disabled().0],
        );
        self.put_terminator(SUCCESS, STATUS_SUCCESS, false);
        self.put_terminator(TIMEOUT, STATUS_TIMEOUT, false);
        self.shape = Some(ChainShape::ParamsPage);
    }

    /// Page program with status check.
    /// Any failed status or ready timeout ends in the program-failed terminator.
    pub fn build_program(&mut self, seed: &ProgramSeed) {
        use program::*;
        self.clear();
        let cs = seed.cs;

        let n = load_command(
            self,
            TX_CLE1_ADDR,
            NandCommandId::AutoPageProgramFirst.code(),
            seed.address.as_slice(),
        );
        self.put(
            TX_CLE1_ADDR,
            Some(TX_DATA),
            DmaCmd::command(n, false, NAND_LOCK, 3),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, true, ASSERT_CS).0, 0, GpmiEccCtrl::disabled().0],
        );

        if seed.ecc_enabled {
            self.put(
                TX_DATA,
                Some(TX_CLE2),
                DmaCmd::tx_data(0, false, 6, true, DmaCommand::NoDmaXfer),
                BarRef::Buffer(seed.data_buffer),
                &[
                    GpmiCtrl0::tx_data(cs, WordLength::EightBit, 0).0,
                    0,
                    GpmiEccCtrl::enabled(BCH_PAGE_MASK, EccCommand::Encode).0,
                    seed.ecc_page_size,
                    seed.data_buffer,
                    seed.aux_buffer,
                ],
            );
        } else {
            self.put(
                TX_DATA,
                Some(TX_CLE2),
                DmaCmd::tx_data(seed.write_size, false, 4, true, DmaCommand::DmaRead),
                BarRef::Buffer(seed.data_buffer),
                &[GpmiCtrl0::tx_data(cs, WordLength::EightBit, seed.write_size).0, 0, 0, 0],
            );
        }

        let n = load_command(self, TX_CLE2, NandCommandId::AutoPageProgramSecond.code(), &[]);
        self.put(
            TX_CLE2,
            Some(WAIT),
            DmaCmd::command(n, false, NAND_LOCK, 3),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, false, ASSERT_CS).0, 0, GpmiEccCtrl::disabled().0],
        );
        self.put_status_tail(
            cs,
            seed.status_buffer,
            3,
            [WAIT, SENSE, STATUS_TX, STATUS_RX, STAT_BRANCH, SUCCESS, PROGRAM_FAILED],
        );
        self.shape = Some(ChainShape::Program);
    }

    /// Block erase with status check
    pub fn build_erase(&mut self, seed: &EraseSeed) {
        use erase::*;
        self.clear();
        let cs = seed.cs;

        let n = load_command(self, TX_CLE1_ROW, NandCommandId::AutoBlockEraseFirst.code(), seed.row.as_slice());
        self.put(
            TX_CLE1_ROW,
            Some(TX_CLE2),
            DmaCmd::command(n, false, NAND_LOCK, 3),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, true, ASSERT_CS).0, 0, GpmiEccCtrl::disabled().0],
        );
        let n = load_command(self, TX_CLE2, NandCommandId::AutoBlockEraseSecond.code(), &[]);
        self.put(
            TX_CLE2,
            Some(WAIT),
            DmaCmd::command(n, false, NAND_LOCK, 1),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, false, ASSERT_CS).0],
        );
        self.put_status_tail(
            cs,
            seed.status_buffer,
            1,
            [WAIT, SENSE, STATUS_TX, STATUS_RX, STAT_BRANCH, SUCCESS, PROGRAM_FAILED],
        );
        self.shape = Some(ChainShape::Erase);
    }

    /// wait -> sense -> status command -> status byte -> branch -> terminators
    fn put_status_tail(&mut self, cs: u8, status_buffer: u32, status_cmd_words: u8, slots: [DescIndex; 7]) {
        let [wait, sense, status_tx, status_rx, stat_branch, success, failed] = slots;

        self.put(wait, Some(sense), DmaCmd::wait4ready(), BarRef::Zero, &[GpmiCtrl0::wait4ready(cs).0]);
        self.put(sense, Some(status_tx), DmaCmd::sense(false), BarRef::Branch(failed), &[]);

        let n = load_command(self, status_tx, NandCommandId::StatusRead.code(), &[]);
        let words = [GpmiCtrl0::command(cs, n, false, ASSERT_CS).0, 0, 0];
        self.put(
            status_tx,
            Some(status_rx),
            DmaCmd::command(n, false, NAND_LOCK, status_cmd_words),
            BarRef::CommandBytes,
            &words[..status_cmd_words as usize],
        );
        let count = READ_STATUS_RESULT_SIZE as u32;
        self.put(
            status_rx,
            Some(stat_branch),
            DmaCmd::rx_no_ecc(count, false),
            BarRef::Buffer(status_buffer),
            &[GpmiCtrl0::rx(cs, WordLength::EightBit, count).0],
        );
        self.put(stat_branch, Some(success), DmaCmd::sense(false), BarRef::Branch(failed), &[]);
        self.put_terminator(success, STATUS_SUCCESS, false);
        self.put_terminator(failed, STATUS_PROGRAM_FAILED, false);
    }

    /// Status read: CLE 0x70 then one byte into `buffer`
    pub fn build_read_status(&mut self, cs: u8, buffer: u32) {
        use read_status::*;
        self.clear();

        let n = load_command(self, TX, NandCommandId::StatusRead.code(), &[]);
        self.put(
            TX,
            Some(RX),
            DmaCmd::command(n, false, NAND_LOCK, 3),
            BarRef::CommandBytes,
            &[GpmiCtrl0::command(cs, n, false, ASSERT_CS).0, 0, GpmiEccCtrl::disabled().0],
        );
        let count = READ_STATUS_RESULT_SIZE as u32;
        self.put(
            RX,
            Some(SUCCESS),
            DmaCmd::rx_no_ecc(count, false),
            BarRef::Buffer(buffer),
            &[GpmiCtrl0::rx(cs, WordLength::EightBit, count).0],
        );
        self.put_terminator(SUCCESS, STATUS_SUCCESS, true);
        self.shape = Some(ChainShape::ReadStatus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nandboot_nandio::address::NandAddress;

    fn read_seed(ecc: bool) -> ReadSeed {
        ReadSeed {
            cs: 0,
            command1: 0x00,
            command2: 0x30,
            address: NandAddress::new(0, 0x40).to_cycles(2, 3),
            read_size: 2112,
            word_length: WordLength::EightBit,
            ecc_enabled: ecc,
            ecc_mask: BCH_PAGE_MASK,
            data_buffer: 0x2000_0001,
            aux_buffer: 0x2000_09c6,
            command_only: false,
        }
    }

    fn shape_of(arena: &DescriptorArena) -> Vec<DescIndex> {
        arena.walk().collect()
    }

    #[test]
    fn test_reset_chain() {
        let mut arena = DescriptorArena::new();
        arena.build_reset(0, 0xff);
        assert_eq!(arena.shape(), Some(ChainShape::Reset));
        assert_eq!(
            shape_of(&arena),
            vec![reset::WAIT4RDY, reset::SENSE_RDY, reset::TX, reset::WAIT, reset::SENSE, reset::SUCCESS]
        );
        assert_eq!(arena.command_bytes(reset::TX), &[0xff]);
        assert_eq!(arena.bar_ref(reset::SENSE), BarRef::Branch(reset::TIMEOUT));
        assert_eq!(arena.bar_ref(reset::WAIT4RDY), BarRef::Branch(reset::TIMEOUT));
        assert_eq!(arena.bar_ref(reset::TIMEOUT), BarRef::Status(0x8050_8008));
        assert!(!arena.descriptor(reset::TX).ctrl0().address_increment());
    }

    #[test]
    fn test_read_id_chain() {
        let mut arena = DescriptorArena::new();
        arena.build_read_id(0, 0x1000);
        assert_eq!(arena.command_bytes(read_id::TX), &[0x90, 0x00]);
        assert!(arena.descriptor(read_id::TX).ctrl0().address_increment());
        assert_eq!(arena.descriptor(read_id::RX).cmd.xfer_count(), 6);
        assert_eq!(arena.bar_ref(read_id::RX), BarRef::Buffer(0x1000));
        assert_eq!(arena.link(read_id::RX), Some(read_id::SUCCESS));
    }

    #[test]
    fn test_read_chain_with_ecc_moves_no_bytes_itself() {
        let mut arena = DescriptorArena::new();
        arena.build_read(&read_seed(true));
        let rx = arena.descriptor(read::RX_DATA);
        assert_eq!(rx.cmd.dma_command(), DmaCommand::NoDmaXfer);
        assert_eq!(rx.cmd.xfer_count(), 0);
        assert_eq!(rx.cmd.cmd_words(), 6);
        assert_eq!(arena.bar_ref(read::RX_DATA), BarRef::Zero);
        assert!(rx.ecc_ctrl().enable_ecc());
        assert_eq!(rx.ecc_ctrl().buffer_mask(), BCH_PAGE_MASK);
        assert_eq!(rx.pio[PIO_ECCCOUNT], 2112);
        assert_eq!(rx.pio[PIO_PAYLOAD], 0x2000_0000);
        assert_eq!(rx.pio[PIO_AUXILIARY], 0x2000_09c4);
        assert_eq!(arena.command_bytes(read::TX_CLE1_ADDR), &[0x00, 0x00, 0x00, 0x40, 0x00, 0x00]);
        assert_eq!(arena.command_bytes(read::TX_CLE2), &[0x30]);
    }

    #[test]
    fn test_read_chain_without_ecc_is_plain_dma_write() {
        let mut arena = DescriptorArena::new();
        arena.build_read(&read_seed(false));
        let rx = arena.descriptor(read::RX_DATA);
        assert_eq!(rx.cmd.dma_command(), DmaCommand::DmaWrite);
        assert_eq!(rx.cmd.xfer_count(), 2112);
        assert_eq!(rx.pio[PIO_ECCCTRL], 0);
        assert_eq!(rx.pio[PIO_ECCCOUNT], 0);
        assert_eq!(arena.bar_ref(read::RX_DATA), BarRef::Buffer(0x2000_0000));
        assert_eq!(
            shape_of(&arena),
            vec![
                read::TX_CLE1_ADDR,
                read::TX_CLE2,
                read::WAIT,
                read::SENSE,
                read::RX_DATA,
                read::RX_WAIT4DONE,
                read::SUCCESS
            ]
        );
    }

    #[test]
    fn test_command_only_read_skips_data_phase() {
        let mut arena = DescriptorArena::new();
        let mut seed = read_seed(false);
        seed.command_only = true;
        arena.build_read(&seed);
        assert_eq!(arena.link(read::SENSE), Some(read::SUCCESS));
    }

    #[test]
    fn test_quick_read_patches_only_per_call_fields() {
        let mut arena = DescriptorArena::new();
        arena.build_read(&read_seed(true));
        let before = arena.clone();

        let mut seed = read_seed(true);
        seed.address = NandAddress::new(0, 0x41).to_cycles(2, 3);
        seed.data_buffer = 0x3000_0000;
        seed.aux_buffer = 0x3000_09c4;
        seed.read_size = 4096;
        arena.build_quick_read(&seed);

        assert_eq!(arena.command_bytes(read::TX_CLE1_ADDR), &[0x00, 0x00, 0x00, 0x41, 0x00, 0x00]);
        let rx = arena.descriptor(read::RX_DATA);
        assert_eq!(rx.pio[PIO_ECCCOUNT], 4096);
        assert_eq!(rx.pio[PIO_PAYLOAD], 0x3000_0000);
        assert_eq!(rx.ctrl0().xfer_count(), 4096);
        assert_eq!(rx.cmd, before.descriptor(read::RX_DATA).cmd);
        for i in [read::WAIT, read::SENSE, read::RX_WAIT4DONE, read::SUCCESS, read::TIMEOUT] {
            assert_eq!(arena.descriptor(i), before.descriptor(i));
            assert_eq!(arena.link(i), before.link(i));
        }
    }

    #[test]
    fn test_quick_raw_read_aligns_buffer() {
        let mut arena = DescriptorArena::new();
        arena.build_read(&read_seed(false));
        assert_eq!(arena.bar_ref(read::RX_DATA), BarRef::Buffer(0x2000_0000));

        let mut seed = read_seed(false);
        seed.data_buffer = 0x3000_0003;
        arena.build_quick_read(&seed);
        assert_eq!(arena.bar_ref(read::RX_DATA), BarRef::Buffer(0x3000_0000));
        assert_eq!(arena.descriptor(read::RX_DATA).pio[PIO_PAYLOAD], 0x3000_0000);
    }

    #[test]
    fn test_quick_read_without_previous_chain_builds_full() {
        let mut quick = DescriptorArena::new();
        quick.build_quick_read(&read_seed(false));
        let mut full = DescriptorArena::new();
        full.build_read(&read_seed(false));
        for i in full.walk() {
            assert_eq!(quick.descriptor(i), full.descriptor(i));
        }
    }

    #[test]
    fn test_quick_read_16bit_halves_transfer_count() {
        let mut arena = DescriptorArena::new();
        arena.build_read(&read_seed(false));
        let mut seed = read_seed(false);
        seed.word_length = WordLength::SixteenBit;
        arena.build_quick_read(&seed);
        assert_eq!(arena.descriptor(read::RX_DATA).ctrl0().xfer_count(), 1056);
        assert_eq!(arena.descriptor(read::RX_DATA).cmd.xfer_count(), 2112);
    }

    #[test]
    fn test_params_page_chain() {
        let mut arena = DescriptorArena::new();
        arena.build_params_page(0, 0x4000, 1024);
        assert_eq!(arena.command_bytes(params_page::TX_CLE1_ADDR), &[0xec, 0x00]);
        assert_eq!(arena.descriptor(params_page::RX_DATA).cmd.xfer_count(), 1024);
        assert_eq!(arena.bar_ref(params_page::SENSE), BarRef::Branch(params_page::TIMEOUT));
    }

    #[test]
    fn test_program_chain_branches_to_program_failed() {
        let mut arena = DescriptorArena::new();
        arena.build_program(&ProgramSeed {
            address: NandAddress::new(0, 0x80).to_cycles(2, 3),
            write_size: 2112,
            data_buffer: 0x1000,
            status_buffer: 0x2000,
            ..Default::default()
        });
        assert_eq!(arena.command_bytes(program::TX_CLE1_ADDR), &[0x80, 0x00, 0x00, 0x80, 0x00, 0x00]);
        let tx = arena.descriptor(program::TX_DATA);
        assert_eq!(tx.cmd.dma_command(), DmaCommand::DmaRead);
        assert_eq!(tx.cmd.xfer_count(), 2112);
        assert!(tx.cmd.wait4end());
        assert_eq!(arena.link(program::TX_DATA), Some(program::TX_CLE2));
        assert_eq!(arena.bar_ref(program::SENSE), BarRef::Branch(program::PROGRAM_FAILED));
        assert_eq!(arena.bar_ref(program::STAT_BRANCH), BarRef::Branch(program::PROGRAM_FAILED));
        assert_eq!(arena.bar_ref(program::PROGRAM_FAILED), BarRef::Status(0x8050_800c));
        assert_eq!(arena.command_bytes(program::STATUS_TX), &[0x70]);
    }

    #[test]
    fn test_program_chain_with_ecc_encodes() {
        let mut arena = DescriptorArena::new();
        arena.build_program(&ProgramSeed {
            ecc_enabled: true,
            ecc_page_size: 2112,
            ..Default::default()
        });
        let tx = arena.descriptor(program::TX_DATA);
        assert_eq!(tx.cmd.dma_command(), DmaCommand::NoDmaXfer);
        assert_eq!(tx.ecc_ctrl().ecc_cmd(), EccCommand::Encode as u8);
        assert_eq!(tx.pio[PIO_ECCCOUNT], 2112);
    }

    #[test]
    fn test_erase_chain() {
        let mut arena = DescriptorArena::new();
        arena.build_erase(&EraseSeed {
            cs: 0,
            row: NandAddress::new(0, 0x0140).to_cycles(0, 3),
            status_buffer: 0x2000,
        });
        assert_eq!(arena.command_bytes(erase::TX_CLE1_ROW), &[0x60, 0x40, 0x01, 0x00]);
        assert_eq!(arena.command_bytes(erase::TX_CLE2), &[0xd0]);
        assert_eq!(arena.bar_ref(erase::STAT_BRANCH), BarRef::Branch(erase::PROGRAM_FAILED));
        assert_eq!(arena.descriptor(erase::STATUS_TX).cmd.cmd_words(), 1);
    }

    #[test]
    fn test_read_status_terminator_waits_for_end() {
        let mut arena = DescriptorArena::new();
        arena.build_read_status(0, 0x2000);
        assert!(arena.descriptor(read_status::SUCCESS).cmd.wait4end());
        assert_eq!(shape_of(&arena), vec![read_status::TX, read_status::RX, read_status::SUCCESS]);
    }
}
