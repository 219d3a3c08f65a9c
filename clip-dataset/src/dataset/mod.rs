//! Dataset processing toolkit.

mod catalog;
mod dataset_;
mod meccano;
mod record;
mod vocabulary;

pub use catalog::*;
pub use dataset_::*;
pub use meccano::*;
pub use record::*;
pub use vocabulary::*;
