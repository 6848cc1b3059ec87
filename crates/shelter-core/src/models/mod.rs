//! Data models
//!
//! Row types for animals and their images, and the storage-level object
//! descriptors returned by uploads.

mod animal;
mod image;
mod storage;

pub use animal::*;
pub use image::*;
pub use storage::*;
