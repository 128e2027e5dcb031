pub mod decoder;
pub mod encoder;
pub mod normalize;
pub mod resample;

pub use normalize::{AudioNormalizer, LoudnessTarget};
