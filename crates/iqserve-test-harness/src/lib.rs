//! iqserve-test-harness: scripted doubles for iqserve testing.
//!
//! Provides [`MockDriver`], a recording, scriptable implementation of the
//! RSP driver boundary, enabling deterministic testing of the backend's
//! gain arbitration and of the radio control session without hardware.

pub mod mock_driver;

pub use mock_driver::{MockDriver, OpenFailure, shared_mock_driver};
