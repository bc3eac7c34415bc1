use bitfield::bitfield;

/// Maximum column address cycles
pub const MAX_COLUMN_BYTES: usize = 2;
/// Maximum row address cycles (BA NAND uses 5)
pub const MAX_ROW_BYTES: usize = 5;
/// Maximum address cycles in one command
pub const MAX_ADDRESS_BYTES: usize = MAX_COLUMN_BYTES + MAX_ROW_BYTES;

/// Address for NAND
///
/// Column cycles go out first, then row cycles, each least significant byte
/// first.
///
/// |               | Value       |
/// | ------------- | ----------- |
/// | Cycle 1       | CA7..CA0    |
/// | Cycle 2       | CA15..CA8   |
/// | Cycle 3       | RA7..RA0    |
/// | Cycle 4       | RA15..RA8   |
/// | Cycle 5..7    | RA39..RA16  |
///
/// For BA NAND the column cycles carry the sector count and the row cycles
/// carry the logical sector address.
bitfield! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct NandAddress(u64);
    pub u16, column, set_column: 15, 0;
    pub u64, row, set_row: 55, 16;
}

/// Packed address cycles ready for an ALE phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AddressCycles {
    bytes: [u8; MAX_ADDRESS_BYTES],
    len: usize,
}

impl AddressCycles {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl NandAddress {
    pub fn new(column: u16, row: u64) -> Self {
        let mut addr = NandAddress(0);
        addr.set_column(column);
        addr.set_row(row);
        addr
    }

    /// Pack into `column_bytes` column cycles followed by `row_bytes` row cycles.
    /// Counts beyond the supported maximum are clamped.
    pub fn to_cycles(&self, column_bytes: usize, row_bytes: usize) -> AddressCycles {
        let column_bytes = column_bytes.min(MAX_COLUMN_BYTES);
        let row_bytes = row_bytes.min(MAX_ROW_BYTES);

        let mut cycles = AddressCycles::default();
        let column = self.column().to_le_bytes();
        let row = self.row().to_le_bytes();
        cycles.bytes[..column_bytes].copy_from_slice(&column[..column_bytes]);
        cycles.bytes[column_bytes..column_bytes + row_bytes].copy_from_slice(&row[..row_bytes]);
        cycles.len = column_bytes + row_bytes;
        cycles
    }

    /// Unpack cycles produced by [`NandAddress::to_cycles`].
    pub fn from_cycles(cycles: &[u8], column_bytes: usize) -> Self {
        let column_bytes = column_bytes.min(MAX_COLUMN_BYTES).min(cycles.len());
        let mut column = 0u16;
        for (i, b) in cycles[..column_bytes].iter().enumerate() {
            column |= (*b as u16) << (8 * i);
        }
        let mut row = 0u64;
        for (i, b) in cycles[column_bytes..].iter().take(MAX_ROW_BYTES).enumerate() {
            row |= (*b as u64) << (8 * i);
        }
        Self::new(column, row)
    }
}
