//! In-memory i.MX28 NAND subsystem for tests.
//!
//! Registers are a flat map with SET/CLR semantics. Starting a chain walks the
//! descriptor arena, decodes the command bytes and serves the transfer from a
//! page image before the channel reports completion.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use nandboot_nandio::address::NandAddress;
use nandboot_nandio::cmd::NandCommandId;
use nandboot_nandio::onfi::{LBA_SIZE, ONFI_SIGNATURE, PARAMETER_PAGE_SIZE};

use crate::common::clock::MicrosClock;
use crate::common::io_driver::{BoardControl, FuseWord, NandPinConfig, NandPlatform, RegisterIo};
use crate::common::register::Register;
use crate::dma::chain::{read, reset, ChainShape};
use crate::dma::descriptor::{PIO_AUXILIARY, PIO_ECCCOUNT, PIO_PAYLOAD};
use crate::dma::{DescriptorArena, DmaEngine};
use crate::gpmi::{BchCtrl, BchStatus0, EccParams, FlashLayout0, FlashLayout1};
use crate::persistent::RtcPersistentStore;

pub const NAND_ID: [u8; 6] = [0x2c, 0xda, 0x90, 0x95, 0x06, 0x00];

const GPMI_STAT_PRESENT: u32 = 1 << 31;
const GPMI_CTRL0_SFTRST: u32 = 1 << 31;
const GPMI_CTRL0_CLKGATE: u32 = 1 << 30;
/// Microseconds the counter moves per read
const CLOCK_STEP_US: u32 = 10;

/// What the BCH decoder reports for one page
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EccOutcome {
    Clean,
    /// Bits corrected in block 0 and the first three N blocks
    Corrected([u8; 4]),
    /// Index of the block that could not be corrected
    Uncorrectable(usize),
    Erased,
}

#[derive(Clone)]
struct SimPage {
    data: Vec<u8>,
    metadata: Vec<u8>,
    ecc: EccOutcome,
}

#[derive(Default)]
struct DmaState {
    polls_left: u32,
    bar: u32,
    hung: bool,
}

pub struct SimPlatform {
    now: u32,
    registers: Vec<(Register, u32)>,
    pages: HashMap<u32, SimPage>,
    lbas: HashMap<u32, [u8; LBA_SIZE as usize]>,
    parameter_page: Option<[u8; PARAMETER_PAGE_SIZE]>,
    gpmi_present: bool,
    column_bytes: usize,
    rom1: u32,
    rom4: u32,
    pins: Option<NandPinConfig>,
    dma: DmaState,
    dma_latency: u32,
    next_fail_bar: Option<u32>,
    next_hang: bool,
    pages_read: Vec<u32>,
    lba_reads: Vec<(u32, u16)>,
    resets: usize,
    aborts: usize,
    channel_resets: usize,
    chip_resets: usize,
    power_downs: usize,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            now: 0,
            registers: Vec::new(),
            pages: HashMap::new(),
            lbas: HashMap::new(),
            parameter_page: None,
            gpmi_present: true,
            column_bytes: 2,
            rom1: 0,
            rom4: 0,
            pins: None,
            dma: DmaState::default(),
            dma_latency: 0,
            next_fail_bar: None,
            next_hang: false,
            pages_read: Vec::new(),
            lba_reads: Vec::new(),
            resets: 0,
            aborts: 0,
            channel_resets: 0,
            chip_resets: 0,
            power_downs: 0,
        }
    }

    /// Answer the parameter page read as a BA NAND with 2^`sector_shift` byte sectors
    pub fn with_ba_nand(mut self, sector_shift: u16) -> Self {
        let mut page = [0u8; PARAMETER_PAGE_SIZE];
        LittleEndian::write_u32(&mut page[0..], ONFI_SIGNATURE);
        LittleEndian::write_u16(&mut page[6..], 1 << 7);
        LittleEndian::write_u16(&mut page[88..], sector_shift);
        self.parameter_page = Some(page);
        self
    }

    pub fn without_gpmi(mut self) -> Self {
        self.gpmi_present = false;
        self
    }

    pub fn with_fuses(mut self, rom1: u32, rom4: u32) -> Self {
        self.rom1 = rom1;
        self.rom4 = rom4;
        self
    }

    /// BCH geometry tests program before ECC reads
    pub fn ecc_params(&self) -> EccParams {
        EccParams {
            block0_size: 512,
            blockn_size: 512,
            block0_level: 8,
            blockn_level: 8,
            blocks_per_page: 3,
            metadata_bytes: 10,
            page_size: 0,
            erase_threshold: 0,
        }
    }

    pub fn write_page(&mut self, page: u32, data: &[u8]) {
        let entry = self.pages.entry(page).or_insert(SimPage {
            data: Vec::new(),
            metadata: Vec::new(),
            ecc: EccOutcome::Clean,
        });
        entry.data = data.to_vec();
    }

    pub fn set_metadata(&mut self, page: u32, metadata: &[u8]) {
        if let Some(p) = self.pages.get_mut(&page) {
            p.metadata = metadata.to_vec();
        }
    }

    pub fn set_ecc_outcome(&mut self, page: u32, ecc: EccOutcome) {
        if let Some(p) = self.pages.get_mut(&page) {
            p.ecc = ecc;
        }
    }

    /// Fill consecutive LBAs starting at `lba`
    pub fn write_lbas(&mut self, lba: u32, data: &[u8]) {
        for (i, chunk) in data.chunks(LBA_SIZE as usize).enumerate() {
            let mut block = [0u8; LBA_SIZE as usize];
            block[..chunk.len()].copy_from_slice(chunk);
            self.lbas.insert(lba + i as u32, block);
        }
    }

    /// Latch STATUS0 and raise COMPLETE_IRQ as if a decode had finished
    pub fn force_bch_status(&mut self, status: u32) {
        self.store(Register::BchStatus0, status);
        self.set(Register::BchCtrl, BchCtrl::COMPLETE_IRQ.bits());
    }

    pub fn set_dma_latency(&mut self, polls: u32) {
        self.dma_latency = polls;
    }

    /// Next chain ends on a terminator with this BAR
    pub fn fail_next_dma(&mut self, bar: u32) {
        self.next_fail_bar = Some(bar);
    }

    /// Next chain never completes
    pub fn hang_next_dma(&mut self) {
        self.next_hang = true;
    }

    pub fn register(&self, reg: Register) -> u32 {
        self.registers
            .iter()
            .find(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    fn store(&mut self, reg: Register, value: u32) {
        match self.registers.iter_mut().find(|(r, _)| *r == reg) {
            Some(slot) => slot.1 = value,
            None => self.registers.push((reg, value)),
        }
    }

    pub fn pins(&self) -> Option<NandPinConfig> {
        self.pins
    }

    pub fn pages_read(&self) -> Vec<u32> {
        self.pages_read.clone()
    }

    /// (first LBA, count) of every BA read
    pub fn lba_reads(&self) -> Vec<(u32, u16)> {
        self.lba_reads.clone()
    }

    pub fn resets_seen(&self) -> usize {
        self.resets
    }

    pub fn aborts_seen(&self) -> usize {
        self.aborts
    }

    pub fn channel_resets(&self) -> usize {
        self.channel_resets
    }

    pub fn chip_resets(&self) -> usize {
        self.chip_resets
    }

    pub fn power_downs(&self) -> usize {
        self.power_downs
    }

    pub fn persistent_bits(&self) -> u32 {
        self.register(Register::RtcPersistent1)
    }

    pub fn set_persistent_bits(&mut self, bits: u32) {
        self.store(Register::RtcPersistent1, bits);
    }

    fn serve_read(&mut self, arena: &DescriptorArena, target: &mut [u8]) {
        let bytes = arena.command_bytes(read::TX_CLE1_ADDR);
        let Some((&command1, address)) = bytes.split_first() else {
            return;
        };
        let address = NandAddress::from_cycles(address, self.column_bytes);
        if arena.link(read::SENSE) == Some(read::SUCCESS) {
            return;
        }
        let rx = arena.descriptor(read::RX_DATA);

        if command1 == NandCommandId::LbaRead.code() {
            let size = (rx.cmd.xfer_count() as usize).min(target.len());
            let first = address.row() as u32;
            self.lba_reads.push((first, address.column()));
            for (i, chunk) in target[..size].chunks_mut(LBA_SIZE as usize).enumerate() {
                let block = self.lbas.get(&(first + i as u32)).copied().unwrap_or([0xff; LBA_SIZE as usize]);
                chunk.copy_from_slice(&block[..chunk.len()]);
            }
            return;
        }

        let page_no = address.row() as u32;
        self.pages_read.push(page_no);
        let page = self.pages.get(&page_no).cloned();

        if !rx.ecc_ctrl().enable_ecc() {
            let size = (rx.cmd.xfer_count() as usize).min(target.len());
            let column = address.column() as usize;
            for (i, b) in target[..size].iter_mut().enumerate() {
                *b = page
                    .as_ref()
                    .and_then(|p| p.data.get(column + i).copied())
                    .unwrap_or(0xff);
            }
            return;
        }

        let l0 = FlashLayout0(self.register(Register::BchFlash0Layout0));
        let l1 = FlashLayout1(self.register(Register::BchFlash0Layout1));
        let meta = l0.meta_size() as usize;
        let nblocks = l0.nblocks() as usize;
        let data_size = l0.data0_size() as usize + l1.datan_size() as usize * nblocks;
        let aux = rx.pio[PIO_AUXILIARY].wrapping_sub(rx.pio[PIO_PAYLOAD]) as usize;
        debug_assert!(rx.pio[PIO_ECCCOUNT] > 0);

        let outcome = page.as_ref().map(|p| p.ecc).unwrap_or(EccOutcome::Erased);
        for (i, b) in target[..data_size].iter_mut().enumerate() {
            *b = match (&page, outcome) {
                (_, EccOutcome::Erased) | (None, _) => 0xff,
                (Some(p), _) => p.data.get(i).copied().unwrap_or(0xff),
            };
        }
        for i in 0..meta {
            target[aux + i] = match (&page, outcome) {
                (Some(p), o) if o != EccOutcome::Erased => p.metadata.get(i).copied().unwrap_or(0xff),
                _ => 0xff,
            };
        }

        let first_status = aux + meta + meta % 4;
        let mut status = BchStatus0::empty();
        for block in 0..=nblocks {
            target[first_status + block] = match outcome {
                EccOutcome::Clean => 0,
                EccOutcome::Erased => 0xff,
                EccOutcome::Corrected(counts) => {
                    let c = counts.get(block).copied().unwrap_or(0);
                    if c > 0 {
                        status |= BchStatus0::CORRECTED;
                    }
                    c
                }
                EccOutcome::Uncorrectable(bad) if bad == block => {
                    status |= BchStatus0::UNCORRECTABLE;
                    0xfe
                }
                EccOutcome::Uncorrectable(_) => 0,
            };
        }
        if outcome == EccOutcome::Erased {
            status |= BchStatus0::ALLONES;
        }
        self.store(Register::BchStatus0, status.bits());
        self.set(Register::BchCtrl, BchCtrl::COMPLETE_IRQ.bits());
    }
}

impl MicrosClock for SimPlatform {
    fn now_us(&mut self) -> u32 {
        self.now = self.now.wrapping_add(CLOCK_STEP_US);
        self.now
    }
}

impl RegisterIo for SimPlatform {
    fn read(&mut self, reg: Register) -> u32 {
        match reg {
            Register::GpmiStat if self.gpmi_present => GPMI_STAT_PRESENT,
            Register::GpmiStat => 0,
            _ => self.register(reg),
        }
    }

    fn write(&mut self, reg: Register, value: u32) {
        self.store(reg, value);
    }

    fn set(&mut self, reg: Register, mask: u32) {
        let mut value = self.register(reg) | mask;
        // soft reset gates the block clock
        if reg == Register::GpmiCtrl0 && mask & GPMI_CTRL0_SFTRST != 0 {
            value |= GPMI_CTRL0_CLKGATE;
        }
        self.store(reg, value);
    }

    fn clear(&mut self, reg: Register, mask: u32) {
        let value = self.register(reg) & !mask;
        self.store(reg, value);
    }
}

impl DmaEngine for SimPlatform {
    fn start(&mut self, _channel: u32, arena: &DescriptorArena, target: &mut [u8]) {
        self.dma = DmaState {
            polls_left: self.dma_latency,
            bar: 0,
            hung: core::mem::take(&mut self.next_hang),
        };
        if self.dma.hung {
            return;
        }
        if let Some(bar) = self.next_fail_bar.take() {
            self.dma.bar = bar;
            return;
        }

        match arena.shape() {
            Some(ChainShape::Reset) => match arena.command_bytes(reset::TX).first() {
                Some(&0xff) => self.resets += 1,
                Some(&0xca) => self.aborts += 1,
                _ => {}
            },
            Some(ChainShape::ReadId) => {
                let n = target.len().min(NAND_ID.len());
                target[..n].copy_from_slice(&NAND_ID[..n]);
            }
            Some(ChainShape::ParamsPage) => {
                let page = self.parameter_page.unwrap_or([0; PARAMETER_PAGE_SIZE]);
                let n = target.len().min(PARAMETER_PAGE_SIZE);
                target[..n].copy_from_slice(&page[..n]);
            }
            Some(ChainShape::ReadStatus) => {
                if let Some(b) = target.first_mut() {
                    *b = 0xe0;
                }
            }
            Some(ChainShape::Read) => self.serve_read(arena, target),
            _ => {}
        }
    }

    fn reset_channel(&mut self, _channel: u32) {
        self.channel_resets += 1;
        self.dma.hung = false;
    }

    fn is_complete(&mut self, _channel: u32) -> bool {
        if self.dma.hung {
            return false;
        }
        if self.dma.polls_left > 0 {
            self.dma.polls_left -= 1;
            return false;
        }
        true
    }

    fn terminal_bar(&mut self, _channel: u32) -> u32 {
        self.dma.bar
    }
}

impl BoardControl for SimPlatform {
    fn read_fuse(&mut self, word: FuseWord) -> u32 {
        match word {
            FuseWord::Rom1 => self.rom1,
            FuseWord::Rom4 => self.rom4,
        }
    }

    fn ungate_gpmi_clock(&mut self) {}

    fn configure_nand_pins(&mut self, pins: &NandPinConfig) {
        self.pins = Some(*pins);
    }

    fn chip_reset(&mut self) {
        self.chip_resets += 1;
    }

    fn chip_power_down(&mut self) {
        self.power_downs += 1;
    }
}

impl NandPlatform for SimPlatform {
    type Store<'a> = RtcPersistentStore<'a, SimPlatform>;

    fn persistent_store(&mut self) -> Self::Store<'_> {
        RtcPersistentStore::new(self)
    }
}
