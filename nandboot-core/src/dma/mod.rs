pub mod chain;
pub mod descriptor;
pub mod engine;

pub use chain::{ChainShape, EraseSeed, ProgramSeed, ReadSeed};
pub use descriptor::{BarRef, DescIndex, DescriptorArena, DmaDescriptor};
pub use engine::DmaEngine;
