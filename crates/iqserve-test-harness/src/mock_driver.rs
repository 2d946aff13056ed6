//! Scripted mock implementation of the RSP driver boundary.
//!
//! [`MockDriver`] records every grouped update (with its reason flags) so
//! tests can assert exactly what reached the hardware, and can be scripted
//! to fail opens and updates the way a real driver would. Samples and
//! hardware events are injected on demand.
//!
//! # Example
//!
//! ```
//! use iqserve_test_harness::MockDriver;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let driver = Arc::new(MockDriver::new());
//! driver.fail_next_apply(3).await;
//! // ... build an RspTuner over `driver`, exercise it, then:
//! let updates = driver.applied().await;
//! assert!(updates.is_empty());
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use iqserve_core::{Error, RawSamples, Result, SampleSink};
use iqserve_rsp::{DeviceUpdate, Driver, DriverEvent, DriverStatus, STATUS_OK, UpdateReason};

/// How a scripted `open` call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure {
    /// The vendor library is unavailable on this host.
    Unavailable,
    /// Enumeration found no devices.
    NoDevices,
    /// No device matches the serial filter.
    SerialNotFound,
}

#[derive(Default)]
struct MockState {
    opened: bool,
    streaming: bool,
    released: bool,
    open_failure: Option<OpenFailure>,
    fail_next_apply: Option<DriverStatus>,
    applied: Vec<(DeviceUpdate, UpdateReason)>,
    rejected: usize,
    sink: Option<SampleSink>,
}

/// A scripted, recording [`Driver`] for tests.
///
/// All scripting methods take `&self`; wrap the driver in an `Arc` and keep
/// a clone alongside the tuner under test.
pub struct MockDriver {
    state: Mutex<MockState>,
    event_tx: broadcast::Sender<DriverEvent>,
    /// Kept so the event channel stays open for late subscribers.
    _event_rx: std::sync::Mutex<Option<broadcast::Receiver<DriverEvent>>>,
}

impl MockDriver {
    /// Create a mock driver that accepts everything.
    pub fn new() -> Self {
        let (event_tx, event_rx) = broadcast::channel(64);
        MockDriver {
            state: Mutex::new(MockState::default()),
            event_tx,
            _event_rx: std::sync::Mutex::new(Some(event_rx)),
        }
    }

    /// Script the next `open` call to fail.
    pub async fn fail_open(&self, failure: OpenFailure) {
        self.state.lock().await.open_failure = Some(failure);
    }

    /// Script the next `apply` call to return `status` (non-zero).
    pub async fn fail_next_apply(&self, status: DriverStatus) {
        self.state.lock().await.fail_next_apply = Some(status);
    }

    /// Every accepted update, in application order.
    pub async fn applied(&self) -> Vec<(DeviceUpdate, UpdateReason)> {
        self.state.lock().await.applied.clone()
    }

    /// The most recently accepted update, if any.
    pub async fn last_applied(&self) -> Option<(DeviceUpdate, UpdateReason)> {
        self.state.lock().await.applied.last().copied()
    }

    /// Number of accepted updates.
    pub async fn apply_count(&self) -> usize {
        self.state.lock().await.applied.len()
    }

    /// Number of scripted rejections that were exercised.
    pub async fn rejected_count(&self) -> usize {
        self.state.lock().await.rejected
    }

    /// Whether the device is currently open.
    pub async fn is_open(&self) -> bool {
        self.state.lock().await.opened
    }

    /// Whether the sample stream is running.
    pub async fn is_streaming(&self) -> bool {
        self.state.lock().await.streaming
    }

    /// Whether the device handle has been released since the last open.
    pub async fn was_released(&self) -> bool {
        self.state.lock().await.released
    }

    /// Deliver a sample block as if the hardware callback produced it.
    ///
    /// Returns `false` when no stream is active or the sink is gone.
    pub async fn inject_samples(&self, samples: RawSamples) -> bool {
        let sink = {
            let state = self.state.lock().await;
            if !state.streaming {
                return false;
            }
            state.sink.clone()
        };
        match sink {
            Some(sink) => sink.send(samples).await.is_ok(),
            None => false,
        }
    }

    /// Raise a hardware event on the driver's notification channel.
    pub fn inject_event(&self, event: DriverEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        MockDriver::new()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn open(&self, serial: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(failure) = state.open_failure.take() {
            return Err(match failure {
                OpenFailure::Unavailable => {
                    Error::DriverUnavailable("mock driver scripted unavailable".into())
                }
                OpenFailure::NoDevices => Error::NoDevices,
                OpenFailure::SerialNotFound => {
                    Error::SerialNotFound(serial.unwrap_or("").to_string())
                }
            });
        }
        state.opened = true;
        state.released = false;
        Ok(())
    }

    async fn apply(&self, update: &DeviceUpdate, reasons: UpdateReason) -> DriverStatus {
        let mut state = self.state.lock().await;
        if let Some(status) = state.fail_next_apply.take() {
            state.rejected += 1;
            return status;
        }
        state.applied.push((*update, reasons));
        STATUS_OK
    }

    async fn start_stream(&self, sink: SampleSink) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.opened {
            return Err(Error::NotRunning);
        }
        state.sink = Some(sink);
        state.streaming = true;
        Ok(())
    }

    async fn stop_stream(&self) {
        let mut state = self.state.lock().await;
        state.streaming = false;
        state.sink = None;
    }

    async fn release(&self) {
        let mut state = self.state.lock().await;
        state.opened = false;
        state.released = true;
    }

    fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        self.event_tx.subscribe()
    }
}

/// `Arc<MockDriver>` convenience: build the pair most tests want.
pub fn shared_mock_driver() -> (Arc<MockDriver>, Arc<dyn Driver>) {
    let driver = Arc::new(MockDriver::new());
    let as_dyn: Arc<dyn Driver> = Arc::clone(&driver) as Arc<dyn Driver>;
    (driver, as_dyn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_applies_in_order() {
        let driver = MockDriver::new();
        driver.open(None).await.unwrap();

        let update = DeviceUpdate {
            frequency_hz: 100_000_000,
            sample_rate: 2_048_000,
            decimation: 1,
            bandwidth_hz: 1_536_000,
            lna_state: 0,
            if_gain: 40,
            agc_enabled: true,
            correction_ppm: 0,
            bias_tee: false,
        };
        let reasons = UpdateReason {
            frequency: true,
            ..UpdateReason::default()
        };
        assert_eq!(driver.apply(&update, reasons).await, STATUS_OK);
        assert_eq!(driver.apply_count().await, 1);
        assert_eq!(driver.last_applied().await, Some((update, reasons)));
    }

    #[tokio::test]
    async fn scripted_apply_failure_not_recorded() {
        let driver = MockDriver::new();
        driver.open(None).await.unwrap();
        driver.fail_next_apply(7).await;

        let update = DeviceUpdate {
            frequency_hz: 1,
            sample_rate: 2_000_000,
            decimation: 1,
            bandwidth_hz: 200_000,
            lna_state: 0,
            if_gain: 20,
            agc_enabled: false,
            correction_ppm: 0,
            bias_tee: false,
        };
        assert_eq!(driver.apply(&update, UpdateReason::default()).await, 7);
        assert_eq!(driver.apply_count().await, 0);
        assert_eq!(driver.rejected_count().await, 1);

        // The failure is one-shot.
        assert_eq!(driver.apply(&update, UpdateReason::default()).await, STATUS_OK);
        assert_eq!(driver.apply_count().await, 1);
    }

    #[tokio::test]
    async fn scripted_open_failures() {
        let driver = MockDriver::new();
        driver.fail_open(OpenFailure::NoDevices).await;
        assert!(matches!(driver.open(None).await, Err(Error::NoDevices)));

        driver.fail_open(OpenFailure::SerialNotFound).await;
        match driver.open(Some("ABC123")).await {
            Err(Error::SerialNotFound(serial)) => assert_eq!(serial, "ABC123"),
            other => panic!("expected SerialNotFound, got {other:?}"),
        }

        // Unscripted open succeeds.
        driver.open(None).await.unwrap();
        assert!(driver.is_open().await);
    }

    #[tokio::test]
    async fn sample_injection_requires_stream() {
        let driver = MockDriver::new();
        assert!(!driver.inject_samples(RawSamples::U8(vec![1, 2])).await);

        driver.open(None).await.unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        driver.start_stream(tx).await.unwrap();
        assert!(driver.is_streaming().await);

        assert!(driver.inject_samples(RawSamples::U8(vec![1, 2])).await);
        assert_eq!(rx.recv().await, Some(RawSamples::U8(vec![1, 2])));

        driver.stop_stream().await;
        assert!(!driver.inject_samples(RawSamples::U8(vec![3])).await);
    }

    #[tokio::test]
    async fn event_injection_reaches_subscribers() {
        let driver = MockDriver::new();
        let mut rx = driver.subscribe();
        driver.inject_event(DriverEvent::PowerOverload { active: true });
        assert_eq!(
            rx.recv().await.unwrap(),
            DriverEvent::PowerOverload { active: true }
        );
    }
}
