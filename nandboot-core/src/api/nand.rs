use crate::bcb::MAX_BA_TRANSFER;
use crate::common::io_driver::{FuseWord, NandPlatform};
use crate::config::NandFuseConfig;
use crate::constant::{AUX_BUFFER_INDEX, BYTES_PER_CHUNK};
use crate::context::NandContext;
use crate::error::NandError;
use crate::hal::PageBuffer;

use super::{BootAction, BootDeviceKind, BootDriver, BootInit};

/// Owner of one of the two page buffers
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferRole {
    /// Chunks are handed out of it
    Loader,
    /// Target of the next or running read
    Dma,
}

/// NAND boot driver.
///
/// Reads run one page ahead: while the loader consumes one buffer the next
/// page is read into the other. Exactly one buffer holds each role.
pub struct NandBootDriver<P: NandPlatform> {
    platform: P,
    /// `None` until `init` succeeds and again after `stop`
    context: Option<NandContext>,
    buffers: [PageBuffer; 2],
    roles: [BufferRole; 2],
    in_flight: bool,
    /// Next chunk of the loader buffer to hand out
    next_chunk: u32,
    /// Chunks still to be dropped
    skip_count: u32,
}

impl<P: NandPlatform> NandBootDriver<P> {
    /// Driver state the loader must reserve memory for
    pub const CONTEXT_SIZE: usize = core::mem::size_of::<NandContext>();

    pub fn new(platform: P) -> Self {
        Self {
            platform,
            context: None,
            buffers: [PageBuffer::new(), PageBuffer::new()],
            roles: [BufferRole::Dma, BufferRole::Loader],
            in_flight: false,
            next_chunk: 0,
            skip_count: 0,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn context(&self) -> Option<&NandContext> {
        self.context.as_ref()
    }

    pub fn roles(&self) -> [BufferRole; 2] {
        self.roles
    }

    fn buffer_index(&self, role: BufferRole) -> usize {
        if self.roles[0] == role {
            0
        } else {
            1
        }
    }

    /// Collect the running read and hand its buffer to the loader.
    ///
    /// [`NandError::DmaBusy`] leaves everything as it was. Any other failure
    /// ends the read; the serializer has already arranged a retry or a reset.
    fn collect_read(&mut self) -> Result<(), NandError> {
        let dma = self.buffer_index(BufferRole::Dma);
        let ctx = self.context.as_mut().ok_or(NandError::Rom)?;
        match ctx.wait_on_read(&mut self.platform, &mut self.buffers[dma]) {
            Ok(()) => {
                self.roles.swap(0, 1);
                self.in_flight = false;
                self.next_chunk = 0;
                Ok(())
            }
            Err(NandError::DmaBusy) => Err(NandError::DmaBusy),
            Err(e) => {
                self.in_flight = false;
                Err(e)
            }
        }
    }

    /// Chunks of the loader buffer not handed out yet
    fn ready(&self, chunks_per_read: u32) -> u32 {
        chunks_per_read.saturating_sub(self.next_chunk)
    }
}

impl<P: NandPlatform> BootDriver for NandBootDriver<P> {
    type Error = NandError;

    fn kind(&self) -> BootDeviceKind {
        BootDeviceKind::Nand
    }

    /// Decode the fuses, bring up the HAL and find the firmware.
    ///
    /// Nothing is kept unless every step succeeds.
    fn init(&mut self, init: &BootInit) -> Result<(), NandError> {
        if (init.memory_size as usize) < Self::CONTEXT_SIZE {
            error!("boot memory too small {}", init.memory_size);
            return Err(NandError::Rom);
        }
        self.context = None;
        self.in_flight = false;

        let rom1 = self.platform.read_fuse(FuseWord::Rom1);
        let rom4 = self.platform.read_fuse(FuseWord::Rom4);
        let fuses = NandFuseConfig::decode(rom1, rom4, init.boot_mode);
        debug!("fuses rom1 {=u32:x} rom4 {=u32:x}", rom1, rom4);

        let mut ctx = NandContext::new(fuses);
        let scratch = &mut self.buffers[0];
        ctx.hal.init(&mut self.platform, &fuses, scratch)?;
        ctx.hal.hw_ecc = true;

        if ctx.hal.device.is_ba_nand {
            ctx.hal.hw_ecc = false;
            ctx.hal.device.apply_ba_defaults(&fuses);
            ctx.state.page_data_size = ctx.hal.device.sector_size.min(MAX_BA_TRANSFER);
            ctx.state.sector_data_read = 0;
            ctx.state.chunks_per_read = ctx.state.page_data_size / BYTES_PER_CHUNK as u32;
            ctx.ba_find_boot_control_blocks(&mut self.platform, scratch)?;
        } else {
            ctx.find_boot_control_blocks(&mut self.platform, scratch)?;
        }

        let per_read = ctx.state.chunks_per_read;
        if per_read == 0 || per_read as usize * BYTES_PER_CHUNK > AUX_BUFFER_INDEX {
            error!("unusable page data size {}", ctx.state.page_data_size);
            return Err(NandError::InitFailed);
        }
        info!(
            "nand boot from sector {} redundant id {}",
            ctx.state.current_sector,
            init.redundant_boot_id
        );

        self.roles = [BufferRole::Dma, BufferRole::Loader];
        self.next_chunk = per_read;
        self.skip_count = 0;
        self.context = Some(ctx);
        Ok(())
    }

    fn next(&mut self, chunks: u32) -> Result<&[u8], NandError> {
        if self.in_flight {
            match self.collect_read() {
                Ok(()) => {}
                Err(NandError::DmaBusy) => return Ok(&[]),
                Err(e) => return Err(e),
            }
        }

        let per_read = self.context.as_ref().ok_or(NandError::Rom)?.state.chunks_per_read;
        let mut ready = self.ready(per_read);

        if self.skip_count > 0 {
            if self.skip_count > ready {
                self.next_chunk = per_read;
                self.skip_count -= ready;
                let scratch = self.buffer_index(BufferRole::Dma);
                let ctx = self.context.as_mut().ok_or(NandError::Rom)?;
                ctx.skip_sectors(&mut self.platform, self.skip_count / per_read, &mut self.buffers[scratch])?;
                // the remainder is taken from the next page read
                self.skip_count %= per_read;
            } else {
                self.next_chunk += self.skip_count;
                self.skip_count = 0;
            }
            ready = self.ready(per_read);
        }

        let mut count = chunks;
        if count > ready {
            count = ready;
            let dma = self.buffer_index(BufferRole::Dma);
            let ctx = self.context.as_mut().ok_or(NandError::Rom)?;
            ctx.start_sector_read(&mut self.platform, &mut self.buffers[dma])?;
            self.in_flight = true;
        }

        let loader = self.buffer_index(BufferRole::Loader);
        let start = self.next_chunk as usize * BYTES_PER_CHUNK;
        let end = start + count as usize * BYTES_PER_CHUNK;
        self.next_chunk += count;
        self.buffers[loader].get(start..end).ok_or(NandError::Fatal)
    }

    fn skip(&mut self, chunks: u32) -> Result<(), NandError> {
        self.skip_count = self.skip_count.saturating_add(chunks);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), NandError> {
        let mut ctx = self.context.take().ok_or(NandError::Rom)?;
        ctx.hal.shutdown(&mut self.platform);
        self.in_flight = false;
        info!("nand boot stopped after {} sectors", ctx.state.sectors_read);
        Ok(())
    }

    fn control(&mut self, action: BootAction) -> Result<(), NandError> {
        match action {
            BootAction::Pause => {
                while self.in_flight {
                    match self.collect_read() {
                        Ok(()) | Err(NandError::DmaBusy) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
            BootAction::Resume => Ok(()),
        }
    }
}
