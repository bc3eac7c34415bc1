/// Size of each ping-pong buffer
pub const READ_BUFFER_SIZE: usize = 3000;
/// Offset of the auxiliary (metadata + ECC status) region inside a buffer
pub const AUX_BUFFER_INDEX: usize = 2500;
/// Size of the auxiliary region
pub const AUX_BUFFER_SIZE: usize = 256;
/// Loader chunk size
pub const BYTES_PER_CHUNK: usize = 16;

/// Single chip select supported by the boot path
pub const MAX_NUMBER_NANDS: u32 = 1;
/// APBH channel wired to chip select 0
pub const NAND0_APBH_CH: u32 = 4;
/// Upper bound for one NAND transaction in microseconds
pub const MAX_TRANSACTION_TIMEOUT_US: u32 = 12_000;

/// Bad block table capacity
pub const MAX_BAD_BLOCKS: usize = 425;
/// DBBT header occupies this many 2K pages before the first entry page
pub const BB_HEADER_SIZE_IN_2K: u32 = 4;

/// "FCB " read little-endian
pub const FCB_FINGERPRINT: u32 = 0x2042_4346;
pub const FCB_VERSION: u32 = 0x0100_0000;
/// "DBBT" read little-endian
pub const DBBT_FINGERPRINT: u32 = 0x5442_4244;
pub const DBBT_VERSION: u32 = 0x0100_0000;

/// Bytes covered by a boot control block checksum
pub const BCB_CHECKED_SIZE: usize = 512;
/// Hamming protected FCB copy starts after this many raw bytes
pub const FCB_HAMMING_DATA_OFFSET: usize = 12;
/// Parity bytes follow the protected FCB copy
pub const FCB_HAMMING_PARITY_OFFSET: usize = FCB_HAMMING_DATA_OFFSET + BCB_CHECKED_SIZE;

/// Sectors per search stride unit
pub const SEARCH_STRIDE_UNIT: u32 = 64;
