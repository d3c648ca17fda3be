//! Chunk, compressor and rounding validation for writing labeled datasets
//! with [`zarrs`].

pub mod benchmark;
pub mod chunks;
pub mod codecs;
pub mod compressor;
pub mod dataset;
mod error;
pub mod reader;
pub mod rechunk;
pub mod rounding;
pub mod store;
pub mod writer;

pub use zarrs;

pub use error::{Error, Result};
