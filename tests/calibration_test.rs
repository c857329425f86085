//! Calibration persistence through the storage port.

mod common;

use auto_compressor::core::calibration::CalibrationSample;
use auto_compressor::{CalibrationStore, CompressorError, LocalStorage, Storage};
use common::{psi_calibration, ScriptedAdc};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_calibration_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let store = CalibrationStore::new(storage);

    let calibration = psi_calibration();
    store.save("calibration.json", &calibration).await.unwrap();

    let loaded = store.load("calibration.json").await.unwrap();
    assert_eq!(loaded, calibration);

    // The file keeps the human-readable equation alongside the coefficients.
    let raw = std::fs::read_to_string(temp_dir.path().join("calibration.json")).unwrap();
    assert!(raw.contains("\"equation\""));
    assert!(raw.contains("-80"));
}

#[tokio::test]
async fn test_loading_missing_calibration_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let store = CalibrationStore::new(storage);

    let err = store.load("calibration.json").await.unwrap_err();
    assert!(matches!(err, CompressorError::IoError(_)));
}

#[tokio::test]
async fn test_loading_corrupt_calibration_is_serialization_error() {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

    storage
        .write_file("calibration.json", b"{ not json")
        .await
        .unwrap();

    let store = CalibrationStore::new(storage);
    let err = store.load("calibration.json").await.unwrap_err();
    assert!(matches!(err, CompressorError::SerializationError(_)));
}

#[tokio::test]
async fn test_zero_gradient_calibration_is_rejected_on_save() {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let store = CalibrationStore::new(storage);

    let mut calibration = psi_calibration();
    calibration.m = 0.0;

    let err = store.save("calibration.json", &calibration).await.unwrap_err();
    assert!(matches!(err, CompressorError::SensorError { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_sample_batch_persists_with_stats() {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

    let calibration = psi_calibration();
    let mut adc = ScriptedAdc::from_pressures(&calibration, &[40.0], 30);
    let sample = CalibrationSample::capture("40PSI", &mut adc, Duration::from_secs(3), 30)
        .await
        .unwrap();
    sample.save(&storage, "40PSI_data.json").await.unwrap();

    let raw = std::fs::read_to_string(temp_dir.path().join("40PSI_data.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(parsed["label"], "40PSI");
    assert_eq!(parsed["data"].as_array().unwrap().len(), 30);
    let avg = parsed["avg"].as_f64().unwrap();
    assert!((avg - calibration.invert(40.0)).abs() < 1e-9);
    assert!((parsed["std_dev"].as_f64().unwrap()).abs() < 1e-12);
}
