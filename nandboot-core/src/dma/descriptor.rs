//! APBH descriptor records and the fixed arena that holds one chain.
//!
//! Descriptors are linked by arena index. Hardware addresses (`next`, and a
//! `bar` that points at another descriptor or at command bytes) are filled in
//! by [`DescriptorArena::resolve`] right before a chain is handed to the
//! engine.

use bitfield::bitfield;

use super::chain::ChainShape;

/// PIO words a NAND descriptor can carry (GPMI CTRL0 .. AUXILIARY)
pub const MAX_PIO_WORDS: usize = 6;
pub const PIO_CTRL0: usize = 0;
pub const PIO_COMPARE: usize = 1;
pub const PIO_ECCCTRL: usize = 2;
pub const PIO_ECCCOUNT: usize = 3;
pub const PIO_PAYLOAD: usize = 4;
pub const PIO_AUXILIARY: usize = 5;

/// Largest chain (program) plus headroom
pub const ARENA_SLOTS: usize = 12;
/// CLE byte plus up to 7 address cycles
pub const MAX_COMMAND_BYTES: usize = 8;

/// DMA transfer direction in the APBH command word
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaCommand {
    NoDmaXfer = 0,
    /// Peripheral to memory
    DmaWrite = 1,
    /// Memory to peripheral
    DmaRead = 2,
    DmaSense = 3,
}

/// APBH Channel Command Word
///
/// | Bits  | Field           |
/// | ----- | --------------- |
/// | 31:16 | XFER_COUNT      |
/// | 15:12 | CMDWORDS        |
/// | 8     | HALTONTERMINATE |
/// | 7     | WAIT4ENDCMD     |
/// | 6     | SEMAPHORE       |
/// | 5     | NANDWAIT4READY  |
/// | 4     | NANDLOCK        |
/// | 3     | IRQONCMPLT      |
/// | 2     | CHAIN           |
/// | 1:0   | COMMAND         |
bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct DmaCmd(u32);
    impl Debug;
    pub u32, xfer_count, set_xfer_count: 31, 16;
    pub u8, cmd_words, set_cmd_words: 15, 12;
    pub halt_on_terminate, set_halt_on_terminate: 8;
    pub wait4end, set_wait4end: 7;
    pub semaphore, set_semaphore: 6;
    pub nand_wait4ready, set_nand_wait4ready: 5;
    pub nand_lock, set_nand_lock: 4;
    pub irq_on_complete, set_irq_on_complete: 3;
    pub chain, set_chain: 2;
    pub u8, command_kind, set_command: 1, 0;
}

impl DmaCmd {
    pub fn dma_command(&self) -> DmaCommand {
        match self.command_kind() {
            0 => DmaCommand::NoDmaXfer,
            1 => DmaCommand::DmaWrite,
            2 => DmaCommand::DmaRead,
            _ => DmaCommand::DmaSense,
        }
    }

    fn chained(command: DmaCommand) -> Self {
        let mut c = DmaCmd(0);
        c.set_chain(true);
        c.set_command(command as u8);
        c
    }

    /// Wait for the NAND ready line, one PIO word
    pub fn wait4ready() -> Self {
        let mut c = Self::chained(DmaCommand::NoDmaXfer);
        c.set_cmd_words(1);
        c.set_wait4end(true);
        c.set_nand_wait4ready(true);
        c
    }

    /// Branch to BAR if the preceding wait timed out
    pub fn sense(semaphore: bool) -> Self {
        let mut c = Self::chained(DmaCommand::DmaSense);
        c.set_semaphore(semaphore);
        c
    }

    /// Push `count` command/address bytes from memory to the GPMI
    pub fn command(count: u32, semaphore: bool, lock: bool, cmd_words: u8) -> Self {
        let mut c = Self::chained(DmaCommand::DmaRead);
        c.set_xfer_count(count);
        c.set_cmd_words(cmd_words);
        c.set_wait4end(true);
        c.set_semaphore(semaphore);
        c.set_nand_lock(lock);
        c
    }

    /// Receive `count` bytes straight into memory
    pub fn rx_no_ecc(count: u32, semaphore: bool) -> Self {
        let mut c = Self::chained(DmaCommand::DmaWrite);
        c.set_xfer_count(count);
        c.set_cmd_words(1);
        c.set_wait4end(true);
        c.set_semaphore(semaphore);
        c
    }

    /// Receive through the BCH engine, which masters the bus itself
    pub fn rx_ecc(count: u32, semaphore: bool) -> Self {
        let mut c = Self::chained(DmaCommand::NoDmaXfer);
        c.set_xfer_count(count);
        c.set_cmd_words(6);
        c.set_wait4end(true);
        c.set_semaphore(semaphore);
        c.set_nand_lock(true);
        c
    }

    pub fn tx_data(count: u32, semaphore: bool, cmd_words: u8, wait4end: bool, command: DmaCommand) -> Self {
        let mut c = Self::chained(command);
        c.set_xfer_count(count);
        c.set_cmd_words(cmd_words);
        c.set_halt_on_terminate(true);
        c.set_wait4end(wait4end);
        c.set_nand_lock(true);
        c.set_semaphore(semaphore);
        c
    }

    /// Wait for the ECC transfer to finish and turn the ECC block off
    pub fn disable_ecc_transfer() -> Self {
        let mut c = Self::chained(DmaCommand::NoDmaXfer);
        c.set_cmd_words(3);
        c.set_wait4end(true);
        c.set_nand_wait4ready(true);
        c.set_nand_lock(true);
        c
    }

    pub fn compare(cmd_words: u8) -> Self {
        let mut c = Self::chained(DmaCommand::NoDmaXfer);
        c.set_cmd_words(cmd_words);
        c.set_nand_lock(true);
        c
    }

    /// End of chain: raise IRQ and decrement the semaphore
    pub fn terminator(wait4end: bool) -> Self {
        let mut c = DmaCmd(0);
        c.set_irq_on_complete(true);
        c.set_semaphore(true);
        c.set_wait4end(wait4end);
        c.set_command(DmaCommand::NoDmaXfer as u8);
        c
    }
}

/// GPMI CTRL0 command modes
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpmiCommandMode {
    Write = 0,
    Read = 1,
    ReadAndCompare = 2,
    WaitForReady = 3,
}

/// GPMI address phase selector
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpmiAddress {
    Data = 0,
    Cle = 1,
    Ale = 2,
}

/// NAND data bus width
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordLength {
    #[default]
    EightBit,
    SixteenBit,
}

impl WordLength {
    fn bit(self) -> bool {
        matches!(self, WordLength::EightBit)
    }

    /// Bus cycles needed for `bytes`
    pub fn transfer_count(self, bytes: u32) -> u32 {
        match self {
            WordLength::EightBit => bytes,
            WordLength::SixteenBit => bytes >> 1,
        }
    }
}

/// GPMI CTRL0 PIO word
///
/// | Bits  | Field             |
/// | ----- | ----------------- |
/// | 27    | LOCK_CS           |
/// | 25:24 | COMMAND_MODE      |
/// | 23    | WORD_LENGTH (1=8) |
/// | 22:20 | CS                |
/// | 19:17 | ADDRESS           |
/// | 16    | ADDRESS_INCREMENT |
/// | 15:0  | XFER_COUNT        |
bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct GpmiCtrl0(u32);
    impl Debug;
    pub lock_cs, set_lock_cs: 27;
    pub u8, command_mode, set_command_mode: 25, 24;
    pub word_length_8bit, set_word_length_8bit: 23;
    pub u8, cs, set_cs: 22, 20;
    pub u8, address_sel, set_address: 19, 17;
    pub address_increment, set_address_increment: 16;
    pub u32, xfer_count, set_xfer_count: 15, 0;
}

impl GpmiCtrl0 {
    fn with(mode: GpmiCommandMode, cs: u8, address: GpmiAddress) -> Self {
        let mut w = GpmiCtrl0(0);
        w.set_command_mode(mode as u8);
        w.set_cs(cs);
        w.set_address(address as u8);
        w
    }

    pub fn wait4ready(cs: u8) -> Self {
        let mut w = Self::with(GpmiCommandMode::WaitForReady, cs, GpmiAddress::Data);
        w.set_word_length_8bit(true);
        w
    }

    /// CLE phase followed by ALE bytes when `address_increment` is set
    pub fn command(cs: u8, count: u32, address_increment: bool, assert_cs: bool) -> Self {
        let mut w = Self::with(GpmiCommandMode::Write, cs, GpmiAddress::Cle);
        w.set_word_length_8bit(true);
        w.set_lock_cs(assert_cs);
        w.set_address_increment(address_increment);
        w.set_xfer_count(count);
        w
    }

    pub fn address(cs: u8, count: u32) -> Self {
        let mut w = Self::with(GpmiCommandMode::Write, cs, GpmiAddress::Ale);
        w.set_word_length_8bit(true);
        w.set_lock_cs(true);
        w.set_xfer_count(count);
        w
    }

    pub fn rx(cs: u8, word: WordLength, count: u32) -> Self {
        let mut w = Self::with(GpmiCommandMode::Read, cs, GpmiAddress::Data);
        w.set_word_length_8bit(word.bit());
        w.set_xfer_count(count);
        w
    }

    pub fn tx_data(cs: u8, word: WordLength, count: u32) -> Self {
        let mut w = Self::with(GpmiCommandMode::Write, cs, GpmiAddress::Data);
        w.set_word_length_8bit(word.bit());
        w.set_lock_cs(true);
        w.set_xfer_count(count);
        w
    }

    pub fn disable_ecc(cs: u8) -> Self {
        let mut w = Self::with(GpmiCommandMode::WaitForReady, cs, GpmiAddress::Data);
        w.set_word_length_8bit(true);
        w
    }

    pub fn compare(cs: u8, count: u32) -> Self {
        let mut w = Self::with(GpmiCommandMode::ReadAndCompare, cs, GpmiAddress::Data);
        w.set_word_length_8bit(true);
        w.set_xfer_count(count);
        w
    }
}

/// Decode or encode through the BCH block
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EccCommand {
    Decode = 0,
    Encode = 1,
}

/// Buffer mask covering the whole BCH page (all data blocks + auxiliary)
pub const BCH_PAGE_MASK: u16 = 0x1ff;

bitfield! {
    /// GPMI ECCCTRL PIO word
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct GpmiEccCtrl(u32);
    impl Debug;
    pub u8, ecc_cmd, set_ecc_cmd: 14, 13;
    pub enable_ecc, set_enable_ecc: 12;
    pub u16, buffer_mask, set_buffer_mask: 8, 0;
}

impl GpmiEccCtrl {
    pub fn enabled(mask: u16, command: EccCommand) -> Self {
        let mut w = GpmiEccCtrl(0);
        w.set_ecc_cmd(command as u8);
        w.set_enable_ecc(true);
        w.set_buffer_mask(mask);
        w
    }

    pub fn disabled() -> Self {
        GpmiEccCtrl(0)
    }
}

/// Index of a descriptor inside the arena
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescIndex(pub u8);

impl DescIndex {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a descriptor's BAR word refers to
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BarRef {
    #[default]
    Zero,
    /// Terminal status word (0 = success)
    Status(u32),
    /// Sense branch target
    Branch(DescIndex),
    /// This descriptor's own command byte buffer
    CommandBytes,
    /// Caller supplied memory
    Buffer(u32),
}

/// One APBH descriptor as the hardware reads it
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct DmaDescriptor {
    pub next: u32,
    pub cmd: DmaCmd,
    pub bar: u32,
    pub pio: [u32; MAX_PIO_WORDS],
}

impl DmaDescriptor {
    pub fn ctrl0(&self) -> GpmiCtrl0 {
        GpmiCtrl0(self.pio[PIO_CTRL0])
    }

    pub fn ecc_ctrl(&self) -> GpmiEccCtrl {
        GpmiEccCtrl(self.pio[PIO_ECCCTRL])
    }
}

/// Fixed storage for one descriptor chain
#[derive(Clone)]
pub struct DescriptorArena {
    descriptors: [DmaDescriptor; ARENA_SLOTS],
    links: [Option<DescIndex>; ARENA_SLOTS],
    bars: [BarRef; ARENA_SLOTS],
    command_bytes: [[u8; MAX_COMMAND_BYTES]; ARENA_SLOTS],
    pub(super) shape: Option<ChainShape>,
    pub(super) read_ecc: bool,
}

impl Default for DescriptorArena {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorArena {
    pub const HEAD: DescIndex = DescIndex(0);

    pub const fn new() -> Self {
        Self {
            descriptors: [DmaDescriptor {
                next: 0,
                cmd: DmaCmd(0),
                bar: 0,
                pio: [0; MAX_PIO_WORDS],
            }; ARENA_SLOTS],
            links: [None; ARENA_SLOTS],
            bars: [BarRef::Zero; ARENA_SLOTS],
            command_bytes: [[0; MAX_COMMAND_BYTES]; ARENA_SLOTS],
            shape: None,
            read_ecc: false,
        }
    }

    /// Chain currently held, if any
    pub fn shape(&self) -> Option<ChainShape> {
        self.shape
    }

    pub fn descriptor(&self, i: DescIndex) -> &DmaDescriptor {
        &self.descriptors[i.index()]
    }

    pub(super) fn descriptor_mut(&mut self, i: DescIndex) -> &mut DmaDescriptor {
        &mut self.descriptors[i.index()]
    }

    pub fn link(&self, i: DescIndex) -> Option<DescIndex> {
        self.links[i.index()]
    }

    pub(super) fn set_link(&mut self, i: DescIndex, next: Option<DescIndex>) {
        self.links[i.index()] = next;
    }

    pub fn bar_ref(&self, i: DescIndex) -> BarRef {
        self.bars[i.index()]
    }

    pub(super) fn set_bar_ref(&mut self, i: DescIndex, bar: BarRef) {
        self.bars[i.index()] = bar;
    }

    /// Bytes a command descriptor pushes to the bus
    pub fn command_bytes(&self, i: DescIndex) -> &[u8] {
        let count = (self.descriptors[i.index()].cmd.xfer_count() as usize).min(MAX_COMMAND_BYTES);
        &self.command_bytes[i.index()][..count]
    }

    pub(super) fn command_bytes_mut(&mut self, i: DescIndex) -> &mut [u8; MAX_COMMAND_BYTES] {
        &mut self.command_bytes[i.index()]
    }

    /// Write one descriptor. PIO words not given are cleared.
    pub(super) fn put(&mut self, i: DescIndex, next: Option<DescIndex>, cmd: DmaCmd, bar: BarRef, pio: &[u32]) {
        let d = &mut self.descriptors[i.index()];
        d.cmd = cmd;
        d.pio = [0; MAX_PIO_WORDS];
        for (dst, src) in d.pio.iter_mut().zip(pio) {
            *dst = *src;
        }
        self.links[i.index()] = next;
        self.bars[i.index()] = bar;
    }

    pub(super) fn put_terminator(&mut self, i: DescIndex, status: u32, wait4end: bool) {
        self.put(i, None, DmaCmd::terminator(wait4end), BarRef::Status(status), &[]);
    }

    pub(super) fn clear(&mut self) {
        *self = Self::new();
    }

    /// Follow the straight-line path from the head.
    /// Sense branches are not taken.
    pub fn walk(&self) -> ChainWalk<'_> {
        ChainWalk {
            arena: self,
            next: Some(Self::HEAD),
            remaining: ARENA_SLOTS,
        }
    }

    /// Bus address of a descriptor
    pub fn descriptor_address(&self, i: DescIndex) -> u32 {
        let base = self.descriptors.as_ptr() as usize;
        (base + i.index() * core::mem::size_of::<DmaDescriptor>()) as u32
    }

    /// Fill the hardware `next`/`bar` words from the index links
    pub fn resolve(&mut self) {
        for i in 0..ARENA_SLOTS {
            let idx = DescIndex(i as u8);
            let next = match self.links[i] {
                Some(n) => self.descriptor_address(n),
                None => 0,
            };
            let bar = match self.bars[i] {
                BarRef::Zero => 0,
                BarRef::Status(s) => s,
                BarRef::Branch(target) => self.descriptor_address(target),
                BarRef::CommandBytes => self.command_bytes[i].as_ptr() as usize as u32,
                BarRef::Buffer(addr) => addr,
            };
            let d = &mut self.descriptors[idx.index()];
            d.next = next;
            d.bar = bar;
        }
    }
}

/// Iterator returned by [`DescriptorArena::walk`]
pub struct ChainWalk<'a> {
    arena: &'a DescriptorArena,
    next: Option<DescIndex>,
    remaining: usize,
}

impl Iterator for ChainWalk<'_> {
    type Item = DescIndex;

    fn next(&mut self) -> Option<DescIndex> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next?;
        self.next = self.arena.link(current);
        Some(current)
    }
}
