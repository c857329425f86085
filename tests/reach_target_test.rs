//! Control-loop behavior against scripted sensor readings. Each scripted
//! value is one logical (averaged) reading; the loop consumes them in the
//! order it measures: initial reading, post-probe reading, volume reading,
//! loop-start reading, then one per control round.

mod common;

use auto_compressor::CompressorError;
use common::{open_durations, scripted_rig, Level, INLET_PIN, OUTLET_PIN, SAMPLES_PER_READ};

#[tokio::test(start_paused = true)]
async fn test_deflation_runs_only_the_bleed_valve() {
    let mut rig = scripted_rig(&[40.0, 38.0, 38.0, 38.0, 38.0, 20.0, 10.0]);

    let report = rig.compressor.reach_target(10.0).await.unwrap();

    assert_eq!(report.inflations, 0);
    assert_eq!(report.deflations, 3);
    assert_eq!(report.rounds, 2);
    assert!((report.start_pressure - 40.0).abs() < 1e-9);
    assert!((report.final_pressure - 10.0).abs() < 1e-9);

    let writes = rig.writes.lock().unwrap();
    assert!(open_durations(&writes, INLET_PIN, Level::High).is_empty());

    let deflations = open_durations(&writes, OUTLET_PIN, Level::High);
    assert_eq!(deflations.len(), 3);
    assert!((deflations[0] - 5.0).abs() < 1e-6, "probe was {}", deflations[0]);
    for duration in &deflations[1..] {
        assert!(*duration > 0.0 && *duration < 150.0, "duration was {}", duration);
    }
}

#[tokio::test(start_paused = true)]
async fn test_inflation_runs_only_the_pump() {
    let mut rig = scripted_rig(&[10.0, 12.0, 12.0, 12.0, 12.0, 28.0, 38.0, 40.0]);

    let report = rig.compressor.reach_target(40.0).await.unwrap();

    assert_eq!(report.deflations, 0);
    assert_eq!(report.inflations, 4);
    assert_eq!(report.rounds, 3);
    assert!((report.final_pressure - 40.0).abs() < 1e-9);

    let writes = rig.writes.lock().unwrap();
    assert!(open_durations(&writes, OUTLET_PIN, Level::High).is_empty());

    let inflations = open_durations(&writes, INLET_PIN, Level::High);
    assert_eq!(inflations.len(), 4);
    assert!((inflations[0] - 5.0).abs() < 1e-6);
    for duration in &inflations[1..] {
        assert!(*duration > 0.0 && *duration < 150.0, "duration was {}", duration);
    }
}

#[tokio::test(start_paused = true)]
async fn test_overshoot_recovers_by_deflating() {
    let mut rig = scripted_rig(&[10.0, 12.0, 12.0, 12.0, 12.0, 50.0, 36.0, 40.0]);

    let report = rig.compressor.reach_target(40.0).await.unwrap();

    assert_eq!(report.inflations, 3);
    assert_eq!(report.deflations, 1);
    assert_eq!(report.rounds, 3);
    assert!((report.final_pressure - 40.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_reading_already_at_target_is_a_no_op() {
    let mut rig = scripted_rig(&[10.0]);

    let report = rig.compressor.reach_target(10.0).await.unwrap();

    assert_eq!(report.rounds, 0);
    assert_eq!(report.inflations, 0);
    assert_eq!(report.deflations, 0);
    assert!((report.actuation_secs - 0.0).abs() < 1e-12);

    // One logical reading, nothing more.
    assert_eq!(
        rig.reads.load(std::sync::atomic::Ordering::SeqCst),
        SAMPLES_PER_READ
    );

    // No valve was opened; only the registration drove the off-levels.
    let writes = rig.writes.lock().unwrap();
    assert!(open_durations(&writes, INLET_PIN, Level::High).is_empty());
    assert!(open_durations(&writes, OUTLET_PIN, Level::High).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flat_probe_is_an_estimation_error() {
    // The pump runs but the reading never moves (dead pump, or a sensor
    // stuck on one value).
    let mut rig = scripted_rig(&[30.0, 30.0]);

    let err = rig.compressor.reach_target(40.0).await.unwrap_err();
    assert!(matches!(err, CompressorError::EstimationError { .. }));

    // The probe must have closed the pump again on its way out.
    assert!(!rig.compressor.is_inlet_open().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_check_pressure_closes_open_valves_first() {
    let mut rig = scripted_rig(&[25.0]);

    rig.compressor.open_inlet().unwrap();
    assert!(rig.compressor.is_inlet_open().unwrap());

    let reading = rig.compressor.check_pressure().await.unwrap();
    assert!((reading - 25.0).abs() < 1e-9);
    assert!(!rig.compressor.is_inlet_open().unwrap());
}
