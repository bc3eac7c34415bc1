//! Battery backed bits that survive a chip reset.

use bitflags::bitflags;

use crate::common::clock::{poll_with_deadline, MicrosClock};
use crate::common::io_driver::RegisterIo;
use crate::common::register::Register;
use crate::error::NandError;

/// Longest wait for the RTC shadow copy to settle
pub const MAX_PERSISTENT_WAIT_US: u32 = 3100;
/// Attempts, each after an RTC soft reset but the first
pub const PERSISTENT_TRIES: usize = 2;

const RTC_CTRL_SFTRST: u32 = 1 << 31;
const RTC_CTRL_CLKGATE: u32 = 1 << 30;
const RTC_STAT_NEW_REGS: u32 = 0xff << 8;
const RTC_STAT_STALE_REGS: u32 = 0xff << 16;
const RTC_STAT_STALE_SHIFT: u32 = 16;
/// Stale bits of the shadow registers the ROM uses
const ROM_USE_MASK: u32 = 0x3;

bitflags! {
    /// Bits in the ROM's persistent word
    #[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
    pub struct PersistentBits: u32 {
        /// Boot the secondary firmware copy
        const REDUNDANT_BOOT = 0x2;
        /// A block read at the ECC threshold; the owner should rewrite it
        const SDK_BLOCK_REWRITE = 0x4;
    }
}

/// Which alias of the persistent word an access goes through
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistentWord {
    Bits1,
    /// Stored value is OR-ed in
    Bits1Set,
    /// Stored value is cleared
    Bits1Clear,
}

/// Cross-boot storage.
///
/// Implementations own whatever handshake the backing store needs,
/// including any reset-and-retry.
pub trait PersistentStore {
    fn load(&mut self, word: PersistentWord) -> Result<u32, NandError>;
    fn store(&mut self, word: PersistentWord, value: u32) -> Result<(), NandError>;
}

impl<T: PersistentStore + ?Sized> PersistentStore for &mut T {
    fn load(&mut self, word: PersistentWord) -> Result<u32, NandError> {
        (**self).load(word)
    }

    fn store(&mut self, word: PersistentWord, value: u32) -> Result<(), NandError> {
        (**self).store(word, value)
    }
}

pub fn load_bits<S: PersistentStore + ?Sized>(store: &mut S) -> Result<PersistentBits, NandError> {
    store.load(PersistentWord::Bits1).map(PersistentBits::from_bits_retain)
}

pub fn set_bits<S: PersistentStore + ?Sized>(store: &mut S, bits: PersistentBits) -> Result<(), NandError> {
    store.store(PersistentWord::Bits1Set, bits.bits())
}

/// Persistent word held in the i.MX28 RTC shadow registers
pub struct RtcPersistentStore<'a, R: RegisterIo + MicrosClock + ?Sized> {
    rtc: &'a mut R,
}

impl<'a, R: RegisterIo + MicrosClock + ?Sized> RtcPersistentStore<'a, R> {
    pub fn new(rtc: &'a mut R) -> Self {
        Self { rtc }
    }

    fn ungate(&mut self) {
        self.rtc.clear(Register::RtcCtrl, RTC_CTRL_SFTRST | RTC_CTRL_CLKGATE);
    }

    /// Force the shadow copy to reload
    fn force_update(&mut self) {
        self.rtc.set(Register::RtcCtrl, RTC_CTRL_SFTRST);
        self.rtc.read(Register::RtcCtrl);
        self.rtc.read(Register::RtcCtrl);
        self.ungate();
    }

    fn wait_stat_clear(&mut self, mask: u32, shift: u32, bits: u32) -> bool {
        poll_with_deadline(&mut *self.rtc, MAX_PERSISTENT_WAIT_US, |r| {
            ((r.read(Register::RtcStat) & mask) >> shift) & bits == 0
        })
        .is_ok()
    }
}

impl<R: RegisterIo + MicrosClock + ?Sized> PersistentStore for RtcPersistentStore<'_, R> {
    fn load(&mut self, _word: PersistentWord) -> Result<u32, NandError> {
        self.ungate();
        for _ in 0..PERSISTENT_TRIES {
            if self.wait_stat_clear(RTC_STAT_STALE_REGS, RTC_STAT_STALE_SHIFT, ROM_USE_MASK) {
                return Ok(self.rtc.read(Register::RtcPersistent1));
            }
            debug!("persistent word stale, forcing update");
            self.force_update();
        }
        warn!("persistent word load failed");
        Err(NandError::PersistentLoadFailed)
    }

    fn store(&mut self, word: PersistentWord, value: u32) -> Result<(), NandError> {
        self.ungate();
        for _ in 0..PERSISTENT_TRIES {
            if !self.wait_stat_clear(RTC_STAT_NEW_REGS | RTC_STAT_STALE_REGS, 0, u32::MAX) {
                debug!("rtc busy, forcing update");
                self.force_update();
                continue;
            }
            match word {
                PersistentWord::Bits1 => self.rtc.write(Register::RtcPersistent1, value),
                PersistentWord::Bits1Set => self.rtc.set(Register::RtcPersistent1, value),
                PersistentWord::Bits1Clear => self.rtc.clear(Register::RtcPersistent1, value),
            }
            if self.wait_stat_clear(RTC_STAT_NEW_REGS, 0, u32::MAX) {
                return Ok(());
            }
        }
        warn!("persistent word store failed");
        Err(NandError::PersistentStoreFailed)
    }
}
