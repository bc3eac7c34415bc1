#![cfg_attr(not(test), no_std)]

pub mod address;
pub mod cmd;
pub mod onfi;
