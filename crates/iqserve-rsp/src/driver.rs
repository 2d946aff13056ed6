//! The opaque driver boundary for RSP hardware.
//!
//! Real devices are driven through a vendor API that iqserve treats as an
//! external collaborator: open/close a device, apply grouped parameter
//! updates, and receive samples and hardware events asynchronously. The
//! [`Driver`] trait captures exactly that surface; the FFI implementation
//! ships separately, and the test harness provides a scripted mock.
//!
//! The vendor API applies grouped changes transactionally and expects each
//! update to be tagged with the reasons that changed, so [`DeviceUpdate`]
//! always carries the complete parameter set alongside an [`UpdateReason`]
//! flag block.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;

use iqserve_core::{Result, SampleSink};

/// Numeric status returned by the driver's update call. Zero is success.
pub type DriverStatus = i32;

/// The success status code.
pub const STATUS_OK: DriverStatus = 0;

/// The complete device parameter set, applied as one transaction.
///
/// Every apply carries all parameters; [`UpdateReason`] tells the driver
/// which of them actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceUpdate {
    /// Center frequency in hertz.
    pub frequency_hz: u64,
    /// Hardware ADC sample rate in samples per second (before decimation).
    pub sample_rate: u32,
    /// Decimation factor; 1 disables decimation.
    pub decimation: u32,
    /// IF filter bandwidth in hertz.
    pub bandwidth_hz: u32,
    /// LNA state (0 = no reduction; higher states attenuate more).
    pub lna_state: u8,
    /// IF gain reduction in dB.
    pub if_gain: u8,
    /// Whether the hardware AGC loop is enabled.
    pub agc_enabled: bool,
    /// Frequency correction in parts per million.
    pub correction_ppm: i32,
    /// Whether the bias tee is powered.
    pub bias_tee: bool,
}

/// Flags naming which parameters changed in a [`DeviceUpdate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReason {
    /// Center frequency changed.
    pub frequency: bool,
    /// ADC sample rate changed.
    pub sample_rate: bool,
    /// Gain settings (LNA state or IF gain) changed.
    pub gain: bool,
    /// AGC enable changed.
    pub agc: bool,
    /// Decimation factor changed.
    pub decimation: bool,
    /// IF bandwidth changed.
    pub bandwidth: bool,
    /// Frequency correction changed.
    pub correction: bool,
    /// Bias tee state changed.
    pub bias_tee: bool,
}

impl UpdateReason {
    /// Returns `true` if any flag is set.
    pub fn any(&self) -> bool {
        self.frequency
            || self.sample_rate
            || self.gain
            || self.agc
            || self.decimation
            || self.bandwidth
            || self.correction
            || self.bias_tee
    }
}

impl fmt::Display for UpdateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.frequency, "frequency"),
            (self.sample_rate, "sample-rate"),
            (self.gain, "gain"),
            (self.agc, "agc"),
            (self.decimation, "decimation"),
            (self.bandwidth, "bandwidth"),
            (self.correction, "correction"),
            (self.bias_tee, "bias-tee"),
        ];
        let mut first = true;
        for (set, name) in names {
            if set {
                if !first {
                    write!(f, "+")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

/// An event raised on the driver's own notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// The ADC input power overload condition changed.
    PowerOverload {
        /// `true` while the overload condition is present.
        active: bool,
    },
    /// The device was removed from the host.
    Removed,
}

/// Asynchronous capability provider for one RSP device.
///
/// Implementations own the vendor API handle. `apply` is assumed to
/// tolerate sequential calls from any task but never concurrent calls;
/// [`RspTuner`](crate::RspTuner) serializes all calls through its state
/// lock.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Select and open a device, optionally filtered by serial number.
    ///
    /// Errors distinguish the three startup failure classes:
    /// [`Error::DriverUnavailable`](iqserve_core::Error::DriverUnavailable),
    /// [`Error::NoDevices`](iqserve_core::Error::NoDevices), and
    /// [`Error::SerialNotFound`](iqserve_core::Error::SerialNotFound).
    async fn open(&self, serial: Option<&str>) -> Result<()>;

    /// Apply a grouped parameter update transactionally.
    ///
    /// Returns the driver's numeric status; [`STATUS_OK`] means the whole
    /// group was applied, any other value means none of it was.
    async fn apply(&self, update: &DeviceUpdate, reasons: UpdateReason) -> DriverStatus;

    /// Begin streaming sample blocks into `sink`.
    async fn start_stream(&self, sink: SampleSink) -> Result<()>;

    /// Stop the sample stream. Idempotent.
    async fn stop_stream(&self);

    /// Release the device handle. Idempotent.
    async fn release(&self);

    /// Subscribe to the driver's hardware event channel.
    fn subscribe(&self) -> broadcast::Receiver<DriverEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_display_empty() {
        assert_eq!(UpdateReason::default().to_string(), "none");
        assert!(!UpdateReason::default().any());
    }

    #[test]
    fn reason_display_single() {
        let reasons = UpdateReason {
            frequency: true,
            ..UpdateReason::default()
        };
        assert_eq!(reasons.to_string(), "frequency");
        assert!(reasons.any());
    }

    #[test]
    fn reason_display_combined() {
        let reasons = UpdateReason {
            sample_rate: true,
            decimation: true,
            bandwidth: true,
            ..UpdateReason::default()
        };
        assert_eq!(reasons.to_string(), "sample-rate+decimation+bandwidth");
    }
}
