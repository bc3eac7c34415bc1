//! Peripheral registers touched by the NAND boot path.

const GPMI_BASE: u32 = 0x8000_c000;
const BCH_BASE: u32 = 0x8000_a000;
const APBH_BASE: u32 = 0x8000_4000;
const RTC_BASE: u32 = 0x8005_6000;

/// Offset of the write-1-to-set alias
pub const SET_OFFSET: u32 = 0x4;
/// Offset of the write-1-to-clear alias
pub const CLR_OFFSET: u32 = 0x8;

/// Register name, independent of how the platform reaches it
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    GpmiCtrl0,
    GpmiCompare,
    GpmiEccCtrl,
    GpmiEccCount,
    GpmiPayload,
    GpmiAuxiliary,
    GpmiCtrl1,
    GpmiTiming0,
    GpmiTiming1,
    GpmiStat,

    BchCtrl,
    BchStatus0,
    BchMode,
    BchLayoutSelect,
    BchFlash0Layout0,
    BchFlash0Layout1,

    ApbhCtrl0,
    ApbhCtrl1,
    ApbhChannelCtrl,
    /// Next command address of an APBH channel
    ApbhChNxtCmdAr(u8),
    /// Buffer address of an APBH channel
    ApbhChBar(u8),
    /// Semaphore of an APBH channel
    ApbhChSema(u8),

    RtcCtrl,
    RtcStat,
    RtcPersistent1,
}

impl Register {
    /// Physical address on i.MX28
    pub const fn address(self) -> u32 {
        match self {
            Register::GpmiCtrl0 => GPMI_BASE,
            Register::GpmiCompare => GPMI_BASE + 0x10,
            Register::GpmiEccCtrl => GPMI_BASE + 0x20,
            Register::GpmiEccCount => GPMI_BASE + 0x30,
            Register::GpmiPayload => GPMI_BASE + 0x40,
            Register::GpmiAuxiliary => GPMI_BASE + 0x50,
            Register::GpmiCtrl1 => GPMI_BASE + 0x60,
            Register::GpmiTiming0 => GPMI_BASE + 0x70,
            Register::GpmiTiming1 => GPMI_BASE + 0x80,
            Register::GpmiStat => GPMI_BASE + 0xb0,

            Register::BchCtrl => BCH_BASE,
            Register::BchStatus0 => BCH_BASE + 0x10,
            Register::BchMode => BCH_BASE + 0x20,
            Register::BchLayoutSelect => BCH_BASE + 0x70,
            Register::BchFlash0Layout0 => BCH_BASE + 0x80,
            Register::BchFlash0Layout1 => BCH_BASE + 0x90,

            Register::ApbhCtrl0 => APBH_BASE,
            Register::ApbhCtrl1 => APBH_BASE + 0x10,
            Register::ApbhChannelCtrl => APBH_BASE + 0x30,
            Register::ApbhChNxtCmdAr(ch) => APBH_BASE + 0x110 + 0x70 * ch as u32,
            Register::ApbhChBar(ch) => APBH_BASE + 0x130 + 0x70 * ch as u32,
            Register::ApbhChSema(ch) => APBH_BASE + 0x140 + 0x70 * ch as u32,

            Register::RtcCtrl => RTC_BASE,
            Register::RtcStat => RTC_BASE + 0x10,
            Register::RtcPersistent1 => RTC_BASE + 0x70,
        }
    }

    pub const fn set_address(self) -> u32 {
        self.address() + SET_OFFSET
    }

    pub const fn clear_address(self) -> u32 {
        self.address() + CLR_OFFSET
    }
}
