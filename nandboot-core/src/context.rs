use crate::bcb::dbbt::BadBlockTable;
use crate::common::io_driver::NandPlatform;
use crate::config::NandFuseConfig;
use crate::hal::NandHal;
use crate::persistent::{self, PersistentBits};
use crate::serializer::SerializerState;

/// Everything the NAND boot path keeps between calls, except the page buffers
pub struct NandContext {
    pub hal: NandHal,
    pub fuses: NandFuseConfig,
    pub state: SerializerState,
    pub bad_blocks: BadBlockTable,
}

impl NandContext {
    pub fn new(fuses: NandFuseConfig) -> Self {
        Self {
            hal: NandHal::new(),
            fuses,
            state: SerializerState::default(),
            bad_blocks: BadBlockTable::new(),
        }
    }

    /// Secondary firmware is booted after a failed first attempt, unless the
    /// fuses forbid it. An unreadable persistent word means primary.
    pub(crate) fn secondary_boot_requested<P: NandPlatform>(&self, p: &mut P) -> bool {
        if self.fuses.disable_secondary_boot {
            return false;
        }
        match persistent::load_bits(&mut p.persistent_store()) {
            Ok(bits) => bits.contains(PersistentBits::REDUNDANT_BOOT),
            Err(_) => false,
        }
    }

    /// Leave a note for the owner of the media that a block is wearing out
    pub(crate) fn request_block_rewrite<P: NandPlatform>(&self, p: &mut P) {
        if let Err(e) = persistent::set_bits(&mut p.persistent_store(), PersistentBits::SDK_BLOCK_REWRITE) {
            warn!("block rewrite flag not stored {=u32:x}", e.code());
        }
    }
}
