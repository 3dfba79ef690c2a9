//! Chip backends implementing the [`crate::driver::Codec`] trait.

pub mod es8311;
pub mod es8388;

pub use es8311::Es8311;
pub use es8388::{Es8388, VolumeHack};
