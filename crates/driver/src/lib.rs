//! Chip-agnostic driver core for I2C-controlled audio codec chips.
//!
//! The crate separates board description from chip control:
//!
//! ```text
//! Board (composition: driver + pin registry)
//!         ↓
//! CodecDriver (lifecycle state machine)
//!         ↓
//! Codec backends (es8388, es8311: register sequences)
//!         ↓
//! CodecTransport (blocking register reads/writes, embedded-hal I2C)
//! ```
//!
//! Everything is synchronous and `no_std`; the platform supplies the bus
//! implementations and a [`pins::BusActivation`] for bring-up.
//!
//! # Features
//!
//! - `defmt`: enable defmt logging and `Format` derives
//!
//! # Example
//!
//! ```no_run
//! use audio_driver::{pins, Board, Es8388};
//!
//! fn bring_up<T, P>(i2c: &mut T, platform: &mut P)
//! where
//!     T: embedded_hal::i2c::I2c,
//!     P: pins::BusActivation,
//! {
//!     let mut board = Board::new(Es8388::default(), pins::presets::audiokit_es8388_v1());
//!     board.begin(i2c, platform).unwrap();
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this driver crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::match_same_arms)] // intentional for readability in register tables
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod backends;
pub mod board;
pub mod clock;
pub mod driver;
pub mod error;
pub mod format;
pub mod pins;

// Re-export the composition layer
pub use board::{Board, DriverConfig};

// Re-export the driver core
pub use driver::{Bus, Codec, CodecDriver, CodecTransport, DriverState};

// Re-export backends
pub use backends::{Es8311, Es8388, VolumeHack};

// Re-export format types
pub use format::{
    AudioFormat, BitDepth, Channels, FrameFormat, InputRoute, OperatingMode, OutputRoute, Role,
    SampleRate,
};

// Re-export errors
pub use error::{ClockError, DriverError, FormatError, PinsError};
