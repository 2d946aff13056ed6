//! RspTuner -- the [`Tuner`] trait implementation for RSP receivers.
//!
//! This module ties a [`Driver`] to the band-dependent [`GainTable`] of a
//! specific [`RspModel`] to produce a working backend. It owns the gain
//! arbitration rules:
//!
//! - On every frequency change the band is reclassified; if the band
//!   changed while gain control is manual, the current level index is
//!   re-resolved against the new band's table and re-applied.
//! - Switching to automatic gain enables the hardware AGC and forces the
//!   LNA to the band's zero-reduction floor so the loop starts from a
//!   known point.
//! - Sample rates below the 2 MHz ADC floor are achieved by decimation;
//!   the factor doubles from 2 until the decimated rate fits.
//! - The IF bandwidth follows the requested rate down a fixed 8-step
//!   ladder.
//!
//! All of a change's consequences go to the driver as one grouped update
//! tagged with the reasons that changed, because the driver applies groups
//! transactionally.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use iqserve_core::{
    Error, GainMode, RadioBand, Result, SampleSink, Tuner, TunerEvent, TunerInfo,
};

use crate::driver::{DeviceUpdate, Driver, DriverEvent, STATUS_OK, UpdateReason};
use crate::models::RspModel;

/// ADC rate the hardware runs at while decimating.
pub const DECIMATION_BASE_RATE: u32 = 2_000_000;

/// Largest supported decimation factor.
pub const MAX_DECIMATION: u32 = 64;

/// The fixed rate-to-bandwidth ladder, ascending.
pub const BANDWIDTH_LADDER_HZ: [u32; 8] = [
    200_000, 300_000, 600_000, 1_536_000, 5_000_000, 6_000_000, 7_000_000, 8_000_000,
];

/// Select the IF bandwidth for a requested sample rate: the widest ladder
/// step that still fits inside the rate, or the narrowest step for rates
/// below the whole ladder.
pub fn bandwidth_for_rate(rate: u32) -> u32 {
    BANDWIDTH_LADDER_HZ
        .iter()
        .rev()
        .copied()
        .find(|&bw| bw <= rate)
        .unwrap_or(BANDWIDTH_LADDER_HZ[0])
}

/// Compute the decimation factor for a sub-2MHz requested rate.
///
/// Doubles from 2 until the decimated base rate fits under the request
/// (or the hardware's factor limit is reached).
pub fn decimation_factor(rate: u32) -> u32 {
    let mut factor = 2;
    while DECIMATION_BASE_RATE / factor > rate && factor < MAX_DECIMATION {
        factor *= 2;
    }
    factor
}

/// Mutable tuner state, guarded by one lock so driver updates are strictly
/// serialized.
struct RspState {
    opened: bool,
    running: bool,
    band: RadioBand,
    gain_mode: GainMode,
    gain_level: u32,
    /// The parameter set last accepted by the driver.
    applied: DeviceUpdate,
}

/// A receiver from the RSP family, driven through an opaque [`Driver`].
///
/// Constructed via [`RspBuilder`](crate::builder::RspBuilder).
pub struct RspTuner {
    info: TunerInfo,
    model: RspModel,
    serial: Option<String>,
    driver: Arc<dyn Driver>,
    state: Mutex<RspState>,
    event_tx: broadcast::Sender<TunerEvent>,
    /// Set during teardown so late driver events cannot escalate.
    ignore_events: Arc<AtomicBool>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

/// The parameter set applied when a device is first opened: 100 MHz at
/// 2.048 MS/s, automatic gain from the VHF band's zero-reduction floor.
fn initial_update(model: &RspModel) -> DeviceUpdate {
    let band = RadioBand::from_frequency(100_000_000);
    let gains = model.gain_table.band(band);
    DeviceUpdate {
        frequency_hz: 100_000_000,
        sample_rate: 2_048_000,
        decimation: 1,
        bandwidth_hz: bandwidth_for_rate(2_048_000),
        lna_state: gains.agc_floor_lna(),
        if_gain: gains.if_gains[0],
        agc_enabled: true,
        correction_ppm: 0,
        bias_tee: false,
    }
}

impl RspTuner {
    /// Create a tuner over an already-opened driver.
    ///
    /// Called by [`RspBuilder`](crate::builder::RspBuilder); callers should
    /// use the builder API instead.
    pub(crate) fn new(model: RspModel, serial: Option<String>, driver: Arc<dyn Driver>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let info = TunerInfo {
            model_name: model.name,
            kind: model.advertised_kind,
            gain_levels: model.gain_levels,
        };
        RspTuner {
            info,
            model,
            serial,
            driver,
            state: Mutex::new(RspState {
                opened: true,
                running: false,
                band: RadioBand::from_frequency(100_000_000),
                gain_mode: GainMode::Automatic,
                gain_level: 0,
                applied: initial_update(&model),
            }),
            event_tx,
            ignore_events: Arc::new(AtomicBool::new(false)),
            event_task: Mutex::new(None),
        }
    }

    /// The model this tuner was built for.
    pub fn model(&self) -> &RspModel {
        &self.model
    }

    /// Submit a grouped update; on success commit it as the applied set.
    async fn apply(
        &self,
        state: &mut RspState,
        update: DeviceUpdate,
        reasons: UpdateReason,
        operation: &'static str,
    ) -> Result<()> {
        debug!(%reasons, "submitting grouped driver update");
        let status = self.driver.apply(&update, reasons).await;
        if status != STATUS_OK {
            return Err(Error::DriverStatus { operation, status });
        }
        state.applied = update;
        Ok(())
    }

    /// Spawn the task that forwards driver events as tuner events.
    async fn spawn_event_pump(&self) {
        let mut rx = self.driver.subscribe();
        let event_tx = self.event_tx.clone();
        let ignore = Arc::clone(&self.ignore_events);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if ignore.load(Ordering::SeqCst) {
                            debug!(?event, "driver event during teardown, ignored");
                            continue;
                        }
                        let mapped = match event {
                            DriverEvent::PowerOverload { active } => {
                                TunerEvent::Overload { active }
                            }
                            DriverEvent::Removed => TunerEvent::DeviceRemoved,
                        };
                        let _ = event_tx.send(mapped);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "driver event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.event_task.lock().await = Some(handle);
    }
}

#[async_trait]
impl Tuner for RspTuner {
    fn info(&self) -> &TunerInfo {
        &self.info
    }

    async fn start(&self, sink: SampleSink) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.running {
            return Err(Error::AlreadyRunning);
        }
        if !state.opened {
            self.driver.open(self.serial.as_deref()).await?;
            state.opened = true;
        }
        self.ignore_events.store(false, Ordering::SeqCst);
        self.driver.start_stream(sink).await?;
        state.running = true;
        drop(state);
        self.spawn_event_pump().await;
        debug!(model = self.model.name, "tuner started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Ok(());
        }
        // Overload events fire while the device winds down; silence the
        // event path before touching the hardware so they cannot escalate
        // into removal handling.
        self.ignore_events.store(true, Ordering::SeqCst);
        self.driver.stop_stream().await;
        self.driver.release().await;
        state.running = false;
        state.opened = false;
        drop(state);
        if let Some(handle) = self.event_task.lock().await.take() {
            handle.abort();
        }
        debug!(model = self.model.name, "tuner stopped");
        Ok(())
    }

    async fn set_frequency(&self, freq_hz: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        let new_band = RadioBand::from_frequency(freq_hz);
        let mut update = state.applied;
        let mut reasons = UpdateReason::default();
        update.frequency_hz = freq_hz;
        reasons.frequency = true;

        // Same level index, new band: the physical meaning changed, so the
        // gain settings must be re-resolved in the same transaction.
        if new_band != state.band && state.gain_mode == GainMode::Manual {
            let setting = self
                .model
                .gain_table
                .resolve(new_band, state.gain_level)
                .ok_or_else(|| {
                    Error::InvalidParameter(format!(
                        "gain level {} out of range for {new_band}",
                        state.gain_level
                    ))
                })?;
            update.lna_state = setting.lna_state;
            update.if_gain = setting.if_gain;
            reasons.gain = true;
            debug!(
                band = %new_band,
                level = state.gain_level,
                lna_state = setting.lna_state,
                if_gain = setting.if_gain,
                "band changed, re-resolving manual gain"
            );
        }

        self.apply(&mut state, update, reasons, "frequency").await?;
        state.band = new_band;
        Ok(())
    }

    async fn set_sample_rate(&self, rate: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        if rate < self.model.min_sample_rate || rate > self.model.max_sample_rate {
            return Err(Error::InvalidParameter(format!(
                "sample rate {rate} outside supported range {}-{}",
                self.model.min_sample_rate, self.model.max_sample_rate
            )));
        }

        let (device_rate, decimation) = if rate < DECIMATION_BASE_RATE {
            let factor = decimation_factor(rate);
            let achieved = DECIMATION_BASE_RATE / factor;
            if achieved != rate {
                warn!(
                    requested = rate,
                    achieved,
                    factor,
                    "decimated rate does not match request exactly"
                );
            }
            (DECIMATION_BASE_RATE, factor)
        } else {
            (rate, 1)
        };
        let bandwidth = bandwidth_for_rate(rate);

        // Tag only what actually changed; the driver applies the group
        // transactionally and keys its work off the reason flags.
        let mut update = state.applied;
        let mut reasons = UpdateReason::default();
        if device_rate != state.applied.sample_rate {
            update.sample_rate = device_rate;
            reasons.sample_rate = true;
        }
        if decimation != state.applied.decimation {
            update.decimation = decimation;
            reasons.decimation = true;
        }
        if bandwidth != state.applied.bandwidth_hz {
            update.bandwidth_hz = bandwidth;
            reasons.bandwidth = true;
        }

        if reasons.any() {
            self.apply(&mut state, update, reasons, "sample rate").await?;
        } else {
            debug!(rate, "sample rate request changes nothing on the device");
        }
        Ok(())
    }

    async fn set_gain_level(&self, level: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        let setting = self
            .model
            .gain_table
            .resolve(state.band, level)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "gain level {level} out of range (0-{})",
                    self.model.gain_levels - 1
                ))
            })?;

        let mut update = state.applied;
        update.lna_state = setting.lna_state;
        update.if_gain = setting.if_gain;
        let reasons = UpdateReason {
            gain: true,
            ..UpdateReason::default()
        };
        self.apply(&mut state, update, reasons, "gain level").await?;
        state.gain_level = level;
        Ok(())
    }

    async fn set_gain_mode(&self, mode: GainMode) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut update = state.applied;
        let mut reasons = UpdateReason::default();
        match mode {
            GainMode::Manual => {
                update.agc_enabled = false;
                reasons.agc = true;
            }
            GainMode::Automatic => {
                // Hand the loop a known floor: AGC on, LNA at the current
                // band's zero-reduction entry.
                update.agc_enabled = true;
                update.lna_state = self.model.gain_table.band(state.band).agc_floor_lna();
                reasons.agc = true;
                reasons.gain = true;
            }
        }
        self.apply(&mut state, update, reasons, "gain mode").await?;
        state.gain_mode = mode;
        Ok(())
    }

    async fn set_agc(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut update = state.applied;
        update.agc_enabled = enabled;
        let reasons = UpdateReason {
            agc: true,
            ..UpdateReason::default()
        };
        self.apply(&mut state, update, reasons, "agc").await
    }

    async fn set_frequency_correction(&self, ppm: i32) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut update = state.applied;
        update.correction_ppm = ppm;
        let reasons = UpdateReason {
            correction: true,
            ..UpdateReason::default()
        };
        self.apply(&mut state, update, reasons, "frequency correction")
            .await
    }

    async fn set_bias_tee(&self, enabled: bool) -> Result<()> {
        if !self.model.has_bias_tee {
            return Err(Error::Unsupported(format!(
                "{} has no bias tee",
                self.model.name
            )));
        }
        let mut state = self.state.lock().await;
        let mut update = state.applied;
        update.bias_tee = enabled;
        let reasons = UpdateReason {
            bias_tee: true,
            ..UpdateReason::default()
        };
        self.apply(&mut state, update, reasons, "bias tee").await
    }

    fn subscribe(&self) -> broadcast::Receiver<TunerEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------
    // bandwidth_for_rate
    // -------------------------------------------------------------------

    #[test]
    fn bandwidth_ladder_is_ascending() {
        for pair in BANDWIDTH_LADDER_HZ.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn bandwidth_widest_fitting_step() {
        assert_eq!(bandwidth_for_rate(2_048_000), 1_536_000);
        assert_eq!(bandwidth_for_rate(1_536_000), 1_536_000);
        assert_eq!(bandwidth_for_rate(600_000), 600_000);
        assert_eq!(bandwidth_for_rate(5_500_000), 5_000_000);
        assert_eq!(bandwidth_for_rate(10_000_000), 8_000_000);
    }

    #[test]
    fn bandwidth_below_ladder_uses_narrowest() {
        assert_eq!(bandwidth_for_rate(62_500), 200_000);
        assert_eq!(bandwidth_for_rate(199_999), 200_000);
    }

    // -------------------------------------------------------------------
    // decimation_factor
    // -------------------------------------------------------------------

    #[test]
    fn decimation_exact_divisions() {
        assert_eq!(decimation_factor(1_000_000), 2);
        assert_eq!(decimation_factor(500_000), 4);
        assert_eq!(decimation_factor(250_000), 8);
        assert_eq!(decimation_factor(125_000), 16);
        assert_eq!(decimation_factor(62_500), 32);
    }

    #[test]
    fn decimation_result_never_exceeds_request() {
        // The decimated base rate must fit under the request for every
        // plausible sub-2MHz rate.
        for rate in [62_500u32, 96_000, 192_000, 240_000, 900_001, 1_999_999] {
            let factor = decimation_factor(rate);
            assert!(
                DECIMATION_BASE_RATE / factor <= rate,
                "rate {rate}: factor {factor} leaves {} > {rate}",
                DECIMATION_BASE_RATE / factor
            );
        }
    }

    #[test]
    fn decimation_factor_is_power_of_two() {
        for rate in [62_500u32, 100_000, 333_333, 1_999_999] {
            let factor = decimation_factor(rate);
            assert!(factor.is_power_of_two(), "factor {factor} for rate {rate}");
            assert!(factor >= 2);
            assert!(factor <= MAX_DECIMATION);
        }
    }

    // -------------------------------------------------------------------
    // initial_update
    // -------------------------------------------------------------------

    #[test]
    fn initial_update_defaults() {
        let model = crate::models::rsp_one();
        let update = initial_update(&model);
        assert_eq!(update.frequency_hz, 100_000_000);
        assert_eq!(update.sample_rate, 2_048_000);
        assert_eq!(update.decimation, 1);
        assert_eq!(update.bandwidth_hz, 1_536_000);
        assert_eq!(update.lna_state, 0);
        assert!(update.agc_enabled);
        assert!(!update.bias_tee);
        assert_eq!(update.correction_ppm, 0);
    }
}
