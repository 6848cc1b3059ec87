//! Image codec: decode → conditional resize → canonical JPEG re-encode.

mod codec;

pub use codec::{normalize_image, target_dimensions, NormalizedImage};
