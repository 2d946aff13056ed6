//! Radio control session tests: the setter contract against both the
//! simulated backend and the RSP backend over a scripted mock driver.

use std::sync::Arc;

use iqserve_core::{GainMode, RadioBand, RawSamples, Tuner, TunerEvent};
use iqserve_rsp::{RspBuilder, RspModel, rsp_one, rsp_two};
use iqserve_server::RadioSession;
use iqserve_sim::SimTuner;
use iqserve_test_harness::MockDriver;

async fn rsp_session(model: RspModel) -> (Arc<MockDriver>, RadioSession) {
    let driver = Arc::new(MockDriver::new());
    let tuner = RspBuilder::new(model)
        .build_with_driver(driver.clone())
        .await
        .expect("mock open must succeed");
    (driver, RadioSession::new(Arc::new(tuner)))
}

fn sim_session() -> (Arc<SimTuner>, RadioSession) {
    let sim = Arc::new(SimTuner::new());
    let session = RadioSession::new(Arc::clone(&sim) as Arc<dyn Tuner>);
    (sim, session)
}

/// A representative frequency inside each band.
fn frequency_in(band: RadioBand) -> u64 {
    match band {
        RadioBand::Am => 7_200_000,
        RadioBand::Vhf => 100_000_000,
        RadioBand::Band3 => 174_000_000,
        RadioBand::UhfLower => 315_000_000,
        RadioBand::UhfUpper => 868_000_000,
        RadioBand::LBand => 1_420_000_000,
    }
}

#[tokio::test]
async fn setters_update_the_mirror() {
    let (_sim, session) = sim_session();
    session.set_frequency(106_000_000).await;
    session.set_sample_rate(1_024_000).await;
    session.set_frequency_correction(-7).await;

    assert_eq!(session.frequency().await, 106_000_000);
    assert_eq!(session.sample_rate().await, 1_024_000);
    let params = session.parameters().await;
    assert_eq!(params.frequency_correction_ppm, -7);
}

#[tokio::test]
async fn gain_round_trip_every_level_and_band() {
    for model in [rsp_one(), rsp_two()] {
        let (_driver, session) = rsp_session(model).await;
        session.set_gain_mode(GainMode::Manual).await;

        for &band in RadioBand::all() {
            session.set_frequency(frequency_in(band)).await;
            for level in 0..model.gain_levels {
                session.set_gain_level(level).await;
                assert_eq!(
                    session.gain_level().await,
                    level,
                    "{}: {band} level {level} round trip",
                    model.name
                );
            }
        }
    }
}

#[tokio::test]
async fn gain_write_rejected_while_automatic() {
    let (driver, session) = rsp_session(rsp_one()).await;
    assert_eq!(session.gain_mode().await, GainMode::Automatic);
    let applies_before = driver.apply_count().await;

    session.set_gain_level(5).await;

    assert_eq!(session.gain_level().await, 0, "level must stay prior");
    assert_eq!(
        driver.apply_count().await,
        applies_before,
        "rejection must not reach the backend"
    );
}

#[tokio::test]
async fn gain_level_out_of_range_rejected_without_backend_call() {
    let (driver, session) = rsp_session(rsp_one()).await;
    session.set_gain_mode(GainMode::Manual).await;
    let applies_before = driver.apply_count().await;

    session.set_gain_level(rsp_one().gain_levels).await;

    assert_eq!(session.gain_level().await, 0);
    assert_eq!(driver.apply_count().await, applies_before);
}

#[tokio::test]
async fn switch_to_manual_reissues_absolute_gain() {
    let model = rsp_one();
    let (driver, session) = rsp_session(model).await;

    session.set_gain_mode(GainMode::Manual).await;

    let updates = driver.applied().await;
    assert!(updates.len() >= 2, "mode change plus gain re-issue expected");
    let (mode_update, mode_reasons) = updates[updates.len() - 2];
    let (gain_update, gain_reasons) = updates[updates.len() - 1];

    assert!(mode_reasons.agc);
    assert!(!mode_update.agc_enabled);

    // The re-issue resolves level 0 against the current (VHF) band.
    assert!(gain_reasons.gain);
    let expected = model.gain_table.band(RadioBand::Vhf);
    assert_eq!(gain_update.lna_state, expected.lna_states[0]);
    assert_eq!(gain_update.if_gain, expected.if_gains[0]);
}

#[tokio::test]
async fn rejected_sample_rate_retains_prior_value() {
    let model = rsp_one();
    let (driver, session) = rsp_session(model).await;
    session.set_sample_rate(2_048_000).await;
    let applies_before = driver.apply_count().await;

    session.set_sample_rate(model.max_sample_rate + 1).await;

    assert_eq!(
        session.sample_rate().await,
        2_048_000,
        "prior rate must remain observable"
    );
    assert_eq!(
        driver.apply_count().await,
        applies_before,
        "out-of-range rate must not reach the backend"
    );
}

#[tokio::test]
async fn backend_rejection_retains_prior_frequency() {
    let (driver, session) = rsp_session(rsp_one()).await;
    session.set_frequency(106_000_000).await;

    driver.fail_next_apply(12).await;
    session.set_frequency(433_920_000).await;

    assert_eq!(
        session.frequency().await,
        106_000_000,
        "failed apply must leave the prior value in effect"
    );
}

#[tokio::test]
async fn double_start_rejected_stop_idempotent() {
    let (_sim, session) = sim_session();

    // Stop before start is a no-op.
    session.stop().await;

    session.start().await.unwrap();
    assert!(session.is_running());
    assert!(session.start().await.is_err(), "double start disallowed");

    session.stop().await;
    assert!(!session.is_running());
    session.stop().await;
}

#[tokio::test]
async fn session_reduces_wide_samples_to_wire_format() {
    let (driver, session) = rsp_session(rsp_one()).await;
    let mut samples = session.subscribe_samples();
    session.start().await.unwrap();

    assert!(
        driver
            .inject_samples(RawSamples::I16(vec![0, i16::MAX, i16::MIN]))
            .await
    );
    let buf = samples.recv().await.unwrap();
    assert_eq!(buf.as_bytes(), &[128, 255, 0]);

    session.stop().await;
}

#[tokio::test]
async fn overload_events_are_republished() {
    let (sim, session) = sim_session();
    let mut events = session.subscribe_events();
    session.start().await.unwrap();

    sim.raise_event(TunerEvent::Overload { active: true });
    assert_eq!(
        events.recv().await.unwrap(),
        TunerEvent::Overload { active: true }
    );
    session.stop().await;
}

#[tokio::test]
async fn events_after_stop_are_suppressed() {
    let (sim, session) = sim_session();
    let mut events = session.subscribe_events();
    session.start().await.unwrap();
    session.stop().await;

    sim.raise_event(TunerEvent::DeviceRemoved);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(
        events.try_recv().is_err(),
        "teardown must suppress hardware events"
    );
}
