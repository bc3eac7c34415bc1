//! The APBH channel that runs NAND descriptor chains.

#[cfg(test)]
use mockall::automock;

use super::descriptor::DescriptorArena;
use crate::common::io_driver::RegisterIo;
use crate::common::register::Register;

/// DMA channel serving the NAND controller
#[cfg_attr(test, automock)]
pub trait DmaEngine {
    /// Reset `channel`, point it at the head of `arena` and kick it.
    ///
    /// `arena` must already be resolved. `target` is the memory the chain
    /// reads from or writes to; it must stay untouched until the channel
    /// reports completion.
    fn start(&mut self, channel: u32, arena: &DescriptorArena, target: &mut [u8]);

    /// Abort whatever the channel is doing
    fn reset_channel(&mut self, channel: u32);

    /// Command-complete IRQ raised by a terminator
    fn is_complete(&mut self, channel: u32) -> bool;

    /// BAR left behind by the terminator that ended the chain
    fn terminal_bar(&mut self, channel: u32) -> u32;
}

/// [`DmaEngine`] steps for APBH channels reached through [`RegisterIo`].
pub mod apbh {
    use super::*;

    const RESET_CHANNEL_SHIFT: u32 = 16;

    fn mask(channel: u32) -> u32 {
        1 << channel
    }

    pub fn start<R: RegisterIo + ?Sized>(io: &mut R, channel: u32, arena: &DescriptorArena) {
        let ch = channel as u8;
        io.set(Register::ApbhChannelCtrl, mask(channel) << RESET_CHANNEL_SHIFT);
        io.clear(Register::ApbhCtrl1, mask(channel));
        io.write(Register::ApbhChNxtCmdAr(ch), arena.descriptor_address(DescriptorArena::HEAD));
        io.write(Register::ApbhChSema(ch), 1);
    }

    pub fn reset_channel<R: RegisterIo + ?Sized>(io: &mut R, channel: u32) {
        io.set(Register::ApbhChannelCtrl, mask(channel) << RESET_CHANNEL_SHIFT);
    }

    pub fn is_complete<R: RegisterIo + ?Sized>(io: &mut R, channel: u32) -> bool {
        io.read(Register::ApbhCtrl1) & mask(channel) != 0
    }

    pub fn terminal_bar<R: RegisterIo + ?Sized>(io: &mut R, channel: u32) -> u32 {
        io.read(Register::ApbhChBar(channel as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::io_driver::MockRegisterIo;
    use mockall::predicate::eq;
    use mockall::Sequence;

    #[test]
    fn test_start_sequence() {
        let arena = DescriptorArena::new();
        let head = arena.descriptor_address(DescriptorArena::HEAD);
        let mut io = MockRegisterIo::new();
        let mut seq = Sequence::new();
        io.expect_set()
            .with(eq(Register::ApbhChannelCtrl), eq(1u32 << 20))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        io.expect_clear()
            .with(eq(Register::ApbhCtrl1), eq(1u32 << 4))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        io.expect_write()
            .with(eq(Register::ApbhChNxtCmdAr(4)), eq(head))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        io.expect_write()
            .with(eq(Register::ApbhChSema(4)), eq(1u32))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        apbh::start(&mut io, 4, &arena);
    }

    #[test]
    fn test_completion_and_bar() {
        let mut io = MockRegisterIo::new();
        io.expect_read().with(eq(Register::ApbhCtrl1)).return_const(1u32 << 4);
        io.expect_read()
            .with(eq(Register::ApbhChBar(4)))
            .return_const(0x8050_8008u32);
        assert!(apbh::is_complete(&mut io, 4));
        assert!(!apbh::is_complete(&mut io, 5));
        assert_eq!(apbh::terminal_bar(&mut io, 4), 0x8050_8008);
    }
}
