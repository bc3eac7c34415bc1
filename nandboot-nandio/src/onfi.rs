use bit_field::BitField;
use byteorder::{ByteOrder, LittleEndian};

/// "ONFI" read little-endian
pub const ONFI_SIGNATURE: u32 = 0x4946_4e4f;
/// Bytes transferred by the parameter page read
pub const PARAMETER_PAGE_SIZE: usize = 1024;
/// Sector size exponent used when a BA device reports zero
pub const DEFAULT_SECTOR_SIZE_SHIFT: u16 = 12;
/// BA NAND logical sector granularity
pub const LBA_SIZE: u32 = 512;

const SIGNATURE_OFFSET: usize = 0;
const REVISION_OFFSET: usize = 4;
const FEATURES_OFFSET: usize = 6;
const MANUFACTURER_OFFSET: usize = 32;
const MODEL_OFFSET: usize = 44;
const NUMBER_OF_LBAS_OFFSET: usize = 80;
const SECTOR_SIZE_OFFSET: usize = 88;
const SECTOR_MULTIPLE_OFFSET: usize = 90;
const METADATA_BYTES_OFFSET: usize = 92;
/// Bit of the features word announcing block abstracted access
const FEATURE_BLOCK_ABSTRACTED: usize = 7;

/// ONFI BA NAND Parameter Page (the fields the boot path needs)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OnfiParameterPage {
    pub signature: u32,
    pub revision: u16,
    pub features: u16,
    pub manufacturer: [u8; 12],
    pub model: [u8; 20],
    pub number_of_lbas: u64,
    /// log2 of the sector size in bytes
    pub sector_size_shift: u16,
    pub sector_multiple: u16,
    pub metadata_bytes_per_sector: u8,
}

impl OnfiParameterPage {
    /// Parse the leading bytes of a parameter page.
    /// Returns `None` when the buffer is too short to hold the fixed fields.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() <= METADATA_BYTES_OFFSET {
            return None;
        }
        let mut manufacturer = [0u8; 12];
        manufacturer.copy_from_slice(&buf[MANUFACTURER_OFFSET..MANUFACTURER_OFFSET + 12]);
        let mut model = [0u8; 20];
        model.copy_from_slice(&buf[MODEL_OFFSET..MODEL_OFFSET + 20]);

        Some(Self {
            signature: LittleEndian::read_u32(&buf[SIGNATURE_OFFSET..]),
            revision: LittleEndian::read_u16(&buf[REVISION_OFFSET..]),
            features: LittleEndian::read_u16(&buf[FEATURES_OFFSET..]),
            manufacturer,
            model,
            number_of_lbas: LittleEndian::read_u64(&buf[NUMBER_OF_LBAS_OFFSET..]),
            sector_size_shift: LittleEndian::read_u16(&buf[SECTOR_SIZE_OFFSET..]),
            sector_multiple: LittleEndian::read_u16(&buf[SECTOR_MULTIPLE_OFFSET..]),
            metadata_bytes_per_sector: buf[METADATA_BYTES_OFFSET],
        })
    }

    pub fn has_signature(&self) -> bool {
        self.signature == ONFI_SIGNATURE
    }

    /// Only the dedicated feature bit counts; other feature bits are ignored.
    pub fn supports_block_abstracted_access(&self) -> bool {
        self.features.get_bit(FEATURE_BLOCK_ABSTRACTED)
    }

    /// Device speaks the BA NAND protocol
    pub fn is_ba_nand(&self) -> bool {
        self.has_signature() && self.supports_block_abstracted_access()
    }

    /// Sector size in bytes, falling back to 4096 when the device reports 0
    pub fn sector_size(&self) -> u32 {
        let shift = match self.sector_size_shift {
            0 => DEFAULT_SECTOR_SIZE_SHIFT,
            s => s.min(31),
        };
        1u32 << shift
    }

    /// Logical blocks covered by one sector read
    pub fn lbas_per_read(&self) -> u32 {
        self.sector_size() / LBA_SIZE
    }
}
