//! iqserve-rsp: RSP receiver backend family.
//!
//! Implements the [`Tuner`](iqserve_core::Tuner) capability for the RSP
//! receiver family. The defining trait of this hardware is that gain is
//! band-dependent: a client-visible gain level index resolves to different
//! physical (LNA state, IF gain) pairs depending on the tuned band, so the
//! backend re-arbitrates gain on every band crossing.
//!
//! The vendor driver is an opaque collaborator behind the [`Driver`] trait;
//! see `iqserve-test-harness` for the scripted mock used in tests.

pub mod builder;
pub mod driver;
pub mod gain;
pub mod models;
pub mod tuner;

pub use builder::RspBuilder;
pub use driver::{DeviceUpdate, Driver, DriverEvent, DriverStatus, STATUS_OK, UpdateReason};
pub use gain::{BandGains, GainSetting, GainTable};
pub use models::{RspModel, all_rsp_models, rsp_one, rsp_two};
pub use tuner::{
    BANDWIDTH_LADDER_HZ, DECIMATION_BASE_RATE, MAX_DECIMATION, RspTuner, bandwidth_for_rate,
    decimation_factor,
};
