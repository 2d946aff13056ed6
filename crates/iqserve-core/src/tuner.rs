//! The `Tuner` trait -- unified interface for all receiver backends.
//!
//! This trait is the capability boundary of iqserve. The radio control
//! session programs against `dyn Tuner` without knowing which backend
//! family is in use; the backend is chosen once at startup from
//! configuration and never changes for the life of the process.
//!
//! Each backend crate (iqserve-rsp, iqserve-sim) provides a concrete type
//! that implements this trait.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::error::{Error, Result};
use crate::events::TunerEvent;
use crate::samples::RawSamples;
use crate::types::{DirectSampling, GainMode, TunerInfo};

/// The channel a running backend delivers raw sample blocks into.
///
/// The sender side lives on the backend's streaming path (its callback
/// task); the receiver side is owned by the radio control session's pump.
pub type SampleSink = mpsc::Sender<RawSamples>;

/// Unified asynchronous interface for driving a receiver backend.
///
/// All parameter setters are `async` because the underlying driver call may
/// involve a grouped hardware update. Setters return an error when the
/// hardware rejects the change; the caller (the session) decides whether to
/// propagate or to log and retain the previous value.
///
/// # Event subscription
///
/// Use [`subscribe()`](Tuner::subscribe) to obtain a broadcast receiver for
/// hardware event notifications (overload, device removal). Events outside
/// the sample flow arrive only through this channel.
#[async_trait]
pub trait Tuner: Send + Sync {
    /// Return static information about the backend (model, kind, gain levels).
    fn info(&self) -> &TunerInfo;

    /// Start streaming samples into `sink`.
    ///
    /// Returns [`Error::AlreadyRunning`] if streaming is already active.
    async fn start(&self, sink: SampleSink) -> Result<()>;

    /// Stop streaming. Idempotent; stopping a stopped backend is a no-op.
    async fn stop(&self) -> Result<()>;

    /// Tune to a center frequency in hertz.
    async fn set_frequency(&self, freq_hz: u64) -> Result<()>;

    /// Set the sample rate in samples per second.
    async fn set_sample_rate(&self, rate: u32) -> Result<()>;

    /// Apply a gain level index (`0..info().gain_levels`).
    ///
    /// The backend resolves the index against its own gain scale; for
    /// band-dependent hardware the physical meaning varies with the
    /// current band.
    async fn set_gain_level(&self, level: u32) -> Result<()>;

    /// Switch between automatic and manual gain control.
    async fn set_gain_mode(&self, mode: GainMode) -> Result<()>;

    /// Enable or disable the hardware AGC.
    async fn set_agc(&self, enabled: bool) -> Result<()>;

    /// Set the frequency correction in parts per million.
    async fn set_frequency_correction(&self, ppm: i32) -> Result<()>;

    /// Set the direct sampling mode.
    async fn set_direct_sampling(&self, _mode: DirectSampling) -> Result<()> {
        Err(Error::Unsupported("direct sampling".into()))
    }

    /// Enable or disable offset tuning.
    async fn set_offset_tuning(&self, _enabled: bool) -> Result<()> {
        Err(Error::Unsupported("offset tuning".into()))
    }

    /// Enable or disable the bias tee.
    async fn set_bias_tee(&self, _enabled: bool) -> Result<()> {
        Err(Error::Unsupported("bias tee".into()))
    }

    /// Subscribe to hardware event notifications.
    ///
    /// Returns a broadcast receiver. The channel is bounded; if the
    /// consumer falls behind, older events are dropped (lagged).
    fn subscribe(&self) -> broadcast::Receiver<TunerEvent>;
}
