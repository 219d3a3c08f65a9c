//! Clip loading and sampling toolkit for video action recognition.
//!
//! The crate turns a MECCANO-style split manifest into `(tensor, label)`
//! pairs. A [ClipCatalog](dataset::ClipCatalog) is parsed once per split,
//! frames are decoded on demand by a [FrameStore](processor::FrameStore),
//! and the temporal and spatial samplers in [processor] reduce every clip
//! to a fixed `(channels, frames, crop, crop)` tensor.

mod common;
pub mod config;
pub mod dataset;
pub mod error;
pub mod processor;
pub mod stats;

pub use error::{DatasetError, Result};
