//! iqserve-sim: simulated receiver backend.
//!
//! Provides [`SimTuner`], a [`Tuner`](iqserve_core::Tuner) implementation
//! that streams generated noise instead of hardware samples. Used for
//! development, integration tests, and running the server on hosts with no
//! receiver attached.

pub mod tuner;

pub use tuner::{SIM_GAIN_LEVELS, SimSnapshot, SimTuner};
