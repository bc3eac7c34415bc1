#![cfg_attr(not(test), no_std)]

// Must be first to share macros across crate
mod fmt;

pub mod api;
pub mod bcb;
pub mod common;
pub mod config;
pub mod constant;
pub mod context;
pub mod dma;
pub mod error;
pub mod gpmi;
pub mod hal;
pub mod persistent;
pub mod serializer;

#[cfg(test)]
mod sim;

pub use api::{BootAction, BootDeviceKind, BootDriver, BootInit, NandBootDriver};
pub use error::NandError;
