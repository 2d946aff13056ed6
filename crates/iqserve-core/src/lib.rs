//! iqserve-core: Core traits, types, and error definitions for iqserve.
//!
//! This crate defines the backend-agnostic abstractions the rest of the
//! workspace builds on. The server and protocol crates depend on these
//! types without pulling in any specific receiver backend.
//!
//! # Key types
//!
//! - [`Tuner`] -- the unified trait for driving any receiver backend
//! - [`RadioParameters`] -- the session-owned parameter mirror
//! - [`RadioBand`] -- coarse band classification for gain arbitration
//! - [`SampleBuffer`] / [`RawSamples`] -- sample flow and bit-depth reduction
//! - [`TunerEvent`] -- asynchronous hardware notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod band;
pub mod error;
pub mod events;
pub mod samples;
pub mod tuner;
pub mod types;

// Re-export key types at crate root for ergonomic `use iqserve_core::*`.
pub use band::RadioBand;
pub use error::{Error, Result};
pub use events::TunerEvent;
pub use samples::{RawSamples, SampleBuffer};
pub use tuner::{SampleSink, Tuner};
pub use types::{
    DirectSampling, GainMode, ParseEnumError, RadioParameters, TunerInfo, TunerKind,
};
