//! The radio control session -- single control point between clients and
//! the tuner backend.
//!
//! The session owns the [`RadioParameters`] mirror and is the only writer
//! of backend parameters. Every setter follows the same contract: log the
//! intent, delegate to the backend, and on a backend rejection log an
//! error and leave the prior value in effect. Failures never propagate to
//! the network layer; the system is observed through its logs.
//!
//! All parameter writes go through one lock, so backend updates are
//! strictly serialized even when several clients issue commands at once.
//!
//! On the sample path the session is deliberately thin: raw blocks from
//! the backend get at most a bit-depth reduction, then are republished to
//! all subscribers through a broadcast channel that never blocks on any
//! of them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use iqserve_core::{
    DirectSampling, GainMode, RadioParameters, Result, SampleBuffer, Tuner, TunerEvent,
    TunerInfo,
};

/// Queue depth between the backend's sample callback and the session pump.
const RAW_SAMPLE_QUEUE: usize = 64;

/// Background tasks owned by a running session.
#[derive(Default)]
struct SessionTasks {
    pump: Option<JoinHandle<()>>,
    events: Option<JoinHandle<()>>,
    events_stop: Option<watch::Sender<bool>>,
}

/// One radio control session per selected backend.
///
/// Created once at startup; [`start()`](RadioSession::start) and
/// [`stop()`](RadioSession::stop) are idempotent in the directions that
/// matter (`stop` before `start` is a no-op, double `start` is rejected),
/// and the server guarantees `stop()` runs on every shutdown path.
pub struct RadioSession {
    tuner: Arc<dyn Tuner>,
    params: Mutex<RadioParameters>,
    running: AtomicBool,
    sample_tx: broadcast::Sender<SampleBuffer>,
    event_tx: broadcast::Sender<TunerEvent>,
    /// Set while teardown is in progress so late hardware events cannot
    /// escalate into removal handling.
    ignore_events: Arc<AtomicBool>,
    tasks: Mutex<SessionTasks>,
}

impl RadioSession {
    /// Create a session over the selected backend.
    pub fn new(tuner: Arc<dyn Tuner>) -> Self {
        let params = RadioParameters::initial(tuner.info());
        let (sample_tx, _) = broadcast::channel(256);
        let (event_tx, _) = broadcast::channel(64);
        RadioSession {
            tuner,
            params: Mutex::new(params),
            running: AtomicBool::new(false),
            sample_tx,
            event_tx,
            ignore_events: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(SessionTasks::default()),
        }
    }

    /// Static information about the selected backend.
    pub fn tuner_info(&self) -> TunerInfo {
        self.tuner.info().clone()
    }

    /// Whether the session is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribe to wire-format sample buffers.
    pub fn subscribe_samples(&self) -> broadcast::Receiver<SampleBuffer> {
        self.sample_tx.subscribe()
    }

    /// Subscribe to republished hardware events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TunerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the backend and the session's pump tasks.
    ///
    /// Returns [`Error::AlreadyRunning`](iqserve_core::Error::AlreadyRunning)
    /// on a second start.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("session start requested while already running");
            return Err(iqserve_core::Error::AlreadyRunning);
        }
        self.ignore_events.store(false, Ordering::SeqCst);

        let (raw_tx, mut raw_rx) = mpsc::channel(RAW_SAMPLE_QUEUE);
        if let Err(e) = self.tuner.start(raw_tx).await {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        // Sample pump: reduce and republish. Ends when the backend drops
        // its sink on stop.
        let sample_tx = self.sample_tx.clone();
        let pump = tokio::spawn(async move {
            while let Some(raw) = raw_rx.recv().await {
                // Send errors just mean nobody is connected right now.
                let _ = sample_tx.send(SampleBuffer::from_raw(raw));
            }
            debug!("sample pump finished");
        });

        // Event pump: log and republish hardware events unless teardown
        // has begun.
        let mut tuner_events = self.tuner.subscribe();
        let event_tx = self.event_tx.clone();
        let ignore = Arc::clone(&self.ignore_events);
        let (events_stop, mut events_stop_rx) = watch::channel(false);
        let events = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = events_stop_rx.changed() => break,
                    received = tuner_events.recv() => match received {
                        Ok(event) => {
                            if ignore.load(Ordering::SeqCst) {
                                debug!(?event, "hardware event during teardown, suppressed");
                                continue;
                            }
                            match event {
                                TunerEvent::Overload { active } => {
                                    warn!(active, "ADC overload condition reported");
                                }
                                TunerEvent::DeviceRemoved => {
                                    error!("device removed while running");
                                }
                            }
                            let _ = event_tx.send(event);
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "hardware event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.pump = Some(pump);
        tasks.events = Some(events);
        tasks.events_stop = Some(events_stop);
        info!(model = self.tuner.info().model_name, "radio session started");
        Ok(())
    }

    /// Stop the backend and drain the pump tasks.
    ///
    /// Idempotent; stopping a session that never started is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // Silence the event path before touching the hardware so teardown
        // cannot look like a device fault.
        self.ignore_events.store(true, Ordering::SeqCst);
        if let Err(e) = self.tuner.stop().await {
            error!(error = %e, "tuner stop failed");
        }

        let mut tasks = self.tasks.lock().await;
        if let Some(stop) = tasks.events_stop.take() {
            let _ = stop.send(true);
        }
        if let Some(handle) = tasks.events.take() {
            let _ = handle.await;
        }
        if let Some(handle) = tasks.pump.take() {
            let _ = handle.await;
        }
        info!("radio session stopped");
    }

    // -------------------------------------------------------------------
    // Parameter setters: log intent, delegate, retain prior value on
    // rejection. Getters answer from the mirror.
    // -------------------------------------------------------------------

    /// Tune to a center frequency in hertz.
    pub async fn set_frequency(&self, freq_hz: u64) {
        let mut params = self.params.lock().await;
        debug!(freq_hz, "setting frequency");
        match self.tuner.set_frequency(freq_hz).await {
            Ok(()) => params.frequency_hz = freq_hz,
            Err(e) => error!(freq_hz, error = %e, "frequency change rejected"),
        }
    }

    /// Set the sample rate in samples per second.
    pub async fn set_sample_rate(&self, rate: u32) {
        let mut params = self.params.lock().await;
        debug!(rate, "setting sample rate");
        match self.tuner.set_sample_rate(rate).await {
            Ok(()) => params.sample_rate = rate,
            Err(e) => error!(rate, error = %e, "sample rate change rejected"),
        }
    }

    /// Apply a gain level index.
    ///
    /// Rejected without a backend call while gain mode is automatic or
    /// when the level is out of range.
    pub async fn set_gain_level(&self, level: u32) {
        let mut params = self.params.lock().await;
        if params.gain_mode == GainMode::Automatic {
            warn!(level, "gain write rejected: gain mode is automatic");
            return;
        }
        if level >= params.gain_levels_supported {
            warn!(
                level,
                supported = params.gain_levels_supported,
                "gain write rejected: level out of range"
            );
            return;
        }
        debug!(level, "setting gain level");
        match self.tuner.set_gain_level(level).await {
            Ok(()) => params.gain_level = level,
            Err(e) => error!(level, error = %e, "gain change rejected"),
        }
    }

    /// Switch between automatic and manual gain control.
    ///
    /// When switching to manual, the last gain level is re-issued so the
    /// backend re-applies an absolute setting; automatic mode may have
    /// left it at an arbitrary internal reduction.
    pub async fn set_gain_mode(&self, mode: GainMode) {
        let mut params = self.params.lock().await;
        debug!(%mode, "setting gain mode");
        match self.tuner.set_gain_mode(mode).await {
            Ok(()) => {
                params.gain_mode = mode;
                if mode == GainMode::Manual {
                    let level = params.gain_level;
                    debug!(level, "re-issuing gain level after switch to manual");
                    if let Err(e) = self.tuner.set_gain_level(level).await {
                        error!(level, error = %e, "gain re-issue rejected");
                    }
                }
            }
            Err(e) => error!(%mode, error = %e, "gain mode change rejected"),
        }
    }

    /// Enable or disable the hardware AGC.
    pub async fn set_agc(&self, enabled: bool) {
        let mut params = self.params.lock().await;
        debug!(enabled, "setting agc");
        match self.tuner.set_agc(enabled).await {
            Ok(()) => params.agc_enabled = enabled,
            Err(e) => error!(enabled, error = %e, "agc change rejected"),
        }
    }

    /// Set the frequency correction in parts per million.
    pub async fn set_frequency_correction(&self, ppm: i32) {
        let mut params = self.params.lock().await;
        debug!(ppm, "setting frequency correction");
        match self.tuner.set_frequency_correction(ppm).await {
            Ok(()) => params.frequency_correction_ppm = ppm,
            Err(e) => error!(ppm, error = %e, "frequency correction rejected"),
        }
    }

    /// Set the direct sampling mode.
    pub async fn set_direct_sampling(&self, mode: DirectSampling) {
        let mut params = self.params.lock().await;
        debug!(%mode, "setting direct sampling");
        match self.tuner.set_direct_sampling(mode).await {
            Ok(()) => params.direct_sampling = mode,
            Err(e) => error!(%mode, error = %e, "direct sampling change rejected"),
        }
    }

    /// Enable or disable offset tuning.
    pub async fn set_offset_tuning(&self, enabled: bool) {
        let mut params = self.params.lock().await;
        debug!(enabled, "setting offset tuning");
        match self.tuner.set_offset_tuning(enabled).await {
            Ok(()) => params.offset_tuning = enabled,
            Err(e) => error!(enabled, error = %e, "offset tuning change rejected"),
        }
    }

    /// Enable or disable the bias tee.
    pub async fn set_bias_tee(&self, enabled: bool) {
        let mut params = self.params.lock().await;
        debug!(enabled, "setting bias tee");
        match self.tuner.set_bias_tee(enabled).await {
            Ok(()) => params.bias_tee_enabled = enabled,
            Err(e) => error!(enabled, error = %e, "bias tee change rejected"),
        }
    }

    /// The last applied center frequency in hertz.
    pub async fn frequency(&self) -> u64 {
        self.params.lock().await.frequency_hz
    }

    /// The last applied sample rate.
    pub async fn sample_rate(&self) -> u32 {
        self.params.lock().await.sample_rate
    }

    /// The last applied gain level index.
    pub async fn gain_level(&self) -> u32 {
        self.params.lock().await.gain_level
    }

    /// The current gain mode.
    pub async fn gain_mode(&self) -> GainMode {
        self.params.lock().await.gain_mode
    }

    /// A snapshot of the full parameter block.
    pub async fn parameters(&self) -> RadioParameters {
        self.params.lock().await.clone()
    }
}

impl Drop for RadioSession {
    fn drop(&mut self) {
        // The server stops the session on every exit path; a running
        // session at drop means a path skipped its teardown.
        if self.running.load(Ordering::SeqCst) {
            warn!("radio session dropped while running");
        }
    }
}
