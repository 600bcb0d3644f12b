//! Component storage: per-type sparse stores and lock-step zipping over them.

pub mod sparse;
pub mod zip;

pub use sparse::SparseStore;
pub use zip::{Zip, ZipIndexed, zip, zip_filtered};
