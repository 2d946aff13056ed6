//! SimTuner -- a simulated receiver backend.
//!
//! Generates centered-noise 8-bit I/Q blocks at the configured sample rate
//! so the full server stack can run with no hardware attached. The noise
//! amplitude follows the selected gain level, which makes gain changes
//! visible to connected clients.
//!
//! The gain state is written by command handling and read by the generator
//! task; it is guarded by its own dedicated lock rather than the tuner's
//! state lock so the generator never contends with parameter updates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use iqserve_core::{
    DirectSampling, Error, GainMode, RawSamples, Result, SampleSink, Tuner, TunerEvent,
    TunerInfo, TunerKind,
};

/// Number of gain levels the simulated backend advertises.
pub const SIM_GAIN_LEVELS: u32 = 29;

/// Complex samples per generated block (twice as many bytes).
const BLOCK_COMPLEX_SAMPLES: usize = 16_384;

/// Gain state shared with the generator task.
#[derive(Debug, Clone, Copy)]
struct GainState {
    level: u32,
    mode: GainMode,
}

/// State the generator task reads while streaming.
struct SimShared {
    /// Dedicated lock: written by setters, read once per generated block.
    gain: std::sync::Mutex<GainState>,
    sample_rate: AtomicU32,
}

impl SimShared {
    fn gain(&self) -> GainState {
        match self.gain.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_gain(&self, state: GainState) {
        match self.gain.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}

/// Remaining tuner parameters, owned by the control side only.
struct SimState {
    running: bool,
    frequency_hz: u64,
    correction_ppm: i32,
    direct_sampling: DirectSampling,
    offset_tuning: bool,
    bias_tee: bool,
    agc_enabled: bool,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

/// A simulated receiver: accepts every parameter, streams noise.
pub struct SimTuner {
    info: TunerInfo,
    shared: Arc<SimShared>,
    state: Mutex<SimState>,
    event_tx: broadcast::Sender<TunerEvent>,
}

/// Snapshot of the simulated device's control state, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimSnapshot {
    /// Last tuned frequency in hertz.
    pub frequency_hz: u64,
    /// Last applied correction in ppm.
    pub correction_ppm: i32,
    /// Last applied direct sampling mode.
    pub direct_sampling: DirectSampling,
    /// Whether offset tuning is on.
    pub offset_tuning: bool,
    /// Whether the bias tee is on.
    pub bias_tee: bool,
    /// Whether the AGC is on.
    pub agc_enabled: bool,
}

/// Half-range of the generated noise for a gain state.
fn noise_span(gain: GainState) -> i16 {
    match gain.mode {
        // The simulated loop just holds a medium level.
        GainMode::Automatic => 40,
        GainMode::Manual => (2 + gain.level as i16 * 4).min(120),
    }
}

impl SimTuner {
    /// Create a simulated tuner with the default parameters.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        SimTuner {
            info: TunerInfo {
                model_name: "Simulated",
                kind: TunerKind::R820t,
                gain_levels: SIM_GAIN_LEVELS,
            },
            shared: Arc::new(SimShared {
                gain: std::sync::Mutex::new(GainState {
                    level: 0,
                    mode: GainMode::Automatic,
                }),
                sample_rate: AtomicU32::new(2_048_000),
            }),
            state: Mutex::new(SimState {
                running: false,
                frequency_hz: 100_000_000,
                correction_ppm: 0,
                direct_sampling: DirectSampling::Off,
                offset_tuning: false,
                bias_tee: false,
                agc_enabled: false,
                stop_tx: None,
                task: None,
            }),
            event_tx,
        }
    }

    /// Raise a hardware event as if the simulated device reported it.
    ///
    /// Fault-injection hook for exercising the overload and removal paths
    /// without hardware.
    pub fn raise_event(&self, event: TunerEvent) {
        let _ = self.event_tx.send(event);
    }

    /// The control state the simulated device has accepted so far.
    pub async fn snapshot(&self) -> SimSnapshot {
        let state = self.state.lock().await;
        SimSnapshot {
            frequency_hz: state.frequency_hz,
            correction_ppm: state.correction_ppm,
            direct_sampling: state.direct_sampling,
            offset_tuning: state.offset_tuning,
            bias_tee: state.bias_tee,
            agc_enabled: state.agc_enabled,
        }
    }
}

impl Default for SimTuner {
    fn default() -> Self {
        SimTuner::new()
    }
}

/// The generator loop: one noise block per block period.
async fn generator_loop(
    shared: Arc<SimShared>,
    sink: SampleSink,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut rng = StdRng::from_entropy();
    loop {
        let rate = shared.sample_rate.load(Ordering::Relaxed).max(1);
        let period =
            std::time::Duration::from_secs_f64(BLOCK_COMPLEX_SAMPLES as f64 / rate as f64);
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(period) => {}
        }

        let span = noise_span(shared.gain());
        let mut block = vec![0u8; BLOCK_COMPLEX_SAMPLES * 2];
        for byte in block.iter_mut() {
            let delta: i16 = rng.gen_range(-span..=span);
            *byte = (128 + delta).clamp(0, 255) as u8;
        }
        if sink.send(RawSamples::U8(block)).await.is_err() {
            // Consumer gone; nothing left to stream to.
            break;
        }
    }
}

#[async_trait]
impl Tuner for SimTuner {
    fn info(&self) -> &TunerInfo {
        &self.info
    }

    async fn start(&self, sink: SampleSink) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.running {
            return Err(Error::AlreadyRunning);
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(generator_loop(Arc::clone(&self.shared), sink, stop_rx));
        state.stop_tx = Some(stop_tx);
        state.task = Some(task);
        state.running = true;
        debug!("simulated tuner started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Ok(());
        }
        if let Some(stop_tx) = state.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = state.task.take() {
            let _ = task.await;
        }
        state.running = false;
        debug!("simulated tuner stopped");
        Ok(())
    }

    async fn set_frequency(&self, freq_hz: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.frequency_hz = freq_hz;
        debug!(freq_hz, "simulated frequency set");
        Ok(())
    }

    async fn set_sample_rate(&self, rate: u32) -> Result<()> {
        if rate == 0 {
            return Err(Error::InvalidParameter("sample rate 0".into()));
        }
        self.shared.sample_rate.store(rate, Ordering::Relaxed);
        debug!(rate, "simulated sample rate set");
        Ok(())
    }

    async fn set_gain_level(&self, level: u32) -> Result<()> {
        if level >= SIM_GAIN_LEVELS {
            return Err(Error::InvalidParameter(format!(
                "gain level {level} out of range (0-{})",
                SIM_GAIN_LEVELS - 1
            )));
        }
        let mut gain = self.shared.gain();
        gain.level = level;
        self.shared.set_gain(gain);
        debug!(level, "simulated gain level set");
        Ok(())
    }

    async fn set_gain_mode(&self, mode: GainMode) -> Result<()> {
        let mut gain = self.shared.gain();
        gain.mode = mode;
        self.shared.set_gain(gain);
        debug!(%mode, "simulated gain mode set");
        Ok(())
    }

    async fn set_agc(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.agc_enabled = enabled;
        debug!(enabled, "simulated agc set");
        Ok(())
    }

    async fn set_frequency_correction(&self, ppm: i32) -> Result<()> {
        let mut state = self.state.lock().await;
        state.correction_ppm = ppm;
        debug!(ppm, "simulated frequency correction set");
        Ok(())
    }

    async fn set_direct_sampling(&self, mode: DirectSampling) -> Result<()> {
        let mut state = self.state.lock().await;
        state.direct_sampling = mode;
        debug!(%mode, "simulated direct sampling set");
        Ok(())
    }

    async fn set_offset_tuning(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.offset_tuning = enabled;
        debug!(enabled, "simulated offset tuning set");
        Ok(())
    }

    async fn set_bias_tee(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.bias_tee = enabled;
        debug!(enabled, "simulated bias tee set");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TunerEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streams_blocks_after_start() {
        let tuner = SimTuner::new();
        tuner.set_sample_rate(2_048_000).await.unwrap();
        let (sink, mut samples) = tokio::sync::mpsc::channel(4);
        tuner.start(sink).await.unwrap();

        let block = samples.recv().await.expect("generator must produce");
        match block {
            RawSamples::U8(bytes) => {
                assert_eq!(bytes.len(), BLOCK_COMPLEX_SAMPLES * 2);
            }
            other => panic!("expected U8 block, got {other:?}"),
        }
        tuner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let tuner = SimTuner::new();
        let (sink, _samples) = tokio::sync::mpsc::channel(4);
        tuner.start(sink).await.unwrap();

        let (sink2, _samples2) = tokio::sync::mpsc::channel(4);
        assert!(matches!(
            tuner.start(sink2).await,
            Err(Error::AlreadyRunning)
        ));
        tuner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_before_start_is_noop() {
        let tuner = SimTuner::new();
        tuner.stop().await.unwrap();
        tuner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn low_manual_gain_bounds_noise_tightly() {
        let tuner = SimTuner::new();
        tuner.set_gain_mode(GainMode::Manual).await.unwrap();
        tuner.set_gain_level(0).await.unwrap();
        let (sink, mut samples) = tokio::sync::mpsc::channel(4);
        tuner.start(sink).await.unwrap();

        if let Some(RawSamples::U8(bytes)) = samples.recv().await {
            // Level 0 spans +/-2 around the midpoint.
            assert!(bytes.iter().all(|&b| (126..=130).contains(&b)));
        } else {
            panic!("expected a U8 block");
        }
        tuner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn high_manual_gain_widens_noise() {
        let tuner = SimTuner::new();
        tuner.set_gain_mode(GainMode::Manual).await.unwrap();
        tuner.set_gain_level(SIM_GAIN_LEVELS - 1).await.unwrap();
        let (sink, mut samples) = tokio::sync::mpsc::channel(4);
        tuner.start(sink).await.unwrap();

        if let Some(RawSamples::U8(bytes)) = samples.recv().await {
            assert!(
                bytes.iter().any(|&b| !(126..=130).contains(&b)),
                "a 32k-sample block at max gain cannot stay inside the level-0 span"
            );
        } else {
            panic!("expected a U8 block");
        }
        tuner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn gain_level_out_of_range_rejected() {
        let tuner = SimTuner::new();
        assert!(matches!(
            tuner.set_gain_level(SIM_GAIN_LEVELS).await,
            Err(Error::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn accepts_rtl_only_controls() {
        let tuner = SimTuner::new();
        tuner
            .set_direct_sampling(DirectSampling::QBranch)
            .await
            .unwrap();
        tuner.set_offset_tuning(true).await.unwrap();
        tuner.set_bias_tee(true).await.unwrap();
        tuner.set_frequency(7_200_000).await.unwrap();
        tuner.set_frequency_correction(-3).await.unwrap();
        tuner.set_agc(true).await.unwrap();

        let snapshot = tuner.snapshot().await;
        assert_eq!(snapshot.direct_sampling, DirectSampling::QBranch);
        assert!(snapshot.offset_tuning);
        assert!(snapshot.bias_tee);
        assert_eq!(snapshot.frequency_hz, 7_200_000);
        assert_eq!(snapshot.correction_ppm, -3);
        assert!(snapshot.agc_enabled);
    }

    #[tokio::test]
    async fn raised_events_reach_subscribers() {
        let tuner = SimTuner::new();
        let mut events = tuner.subscribe();
        tuner.raise_event(TunerEvent::Overload { active: true });
        assert_eq!(
            events.recv().await.unwrap(),
            TunerEvent::Overload { active: true }
        );
    }

    #[test]
    fn noise_span_scales_with_level() {
        let manual = |level| {
            noise_span(GainState {
                level,
                mode: GainMode::Manual,
            })
        };
        assert_eq!(manual(0), 2);
        assert!(manual(10) > manual(1));
        assert_eq!(manual(28), 114);
        assert_eq!(manual(100), 120, "span must saturate");
    }
}
