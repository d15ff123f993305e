//! Integration tests for the record and result files
//!
//! These tests validate that files written by one stage load in the next:
//! - Sample CSV export and re-analysis
//! - Natural-frequency files feeding comparison
//! - Spectrum export

mod common;

use common::builders::RecordBuilder;
use modal_rs::analysis::{analyze_record, AnalysisRequest};
use modal_rs::config::{AnalysisSettings, Calibration, SpectrumMode};
use modal_rs::files::{
    export_report, natural_frequencies_path, read_natural_frequencies, read_samples_csv,
    spectrum_path, write_natural_frequencies_csv, write_samples_csv, write_spectrum_csv,
    SpectrumColumn,
};
use modal_rs::types::Axis;

fn settings() -> AnalysisSettings {
    AnalysisSettings::new(2, SpectrumMode::Fft).with_calibration(Calibration::identity())
}

#[test]
fn test_samples_survive_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.csv");

    let record = common::builders::merge(vec![
        RecordBuilder::new(600, 1000.0).sensor(1).x_tone(45.0, 0.3).gravity(1.0).build(),
        RecordBuilder::new(600, 1000.0).sensor(4).y_tone(90.0, 0.1).gravity(1.0).build(),
    ]);
    write_samples_csv(&path, &record).unwrap();

    let loaded = read_samples_csv(&path).unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.sensor_ids(), vec![1, 4]);

    let header = std::fs::read_to_string(&path).unwrap();
    assert!(header.starts_with(
        "Time [microseconds],Accelerometer ID,X Acceleration,Y Acceleration,Z Acceleration\n"
    ));
}

#[test]
fn test_reanalysis_of_exported_samples_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("impact.csv");

    let record = RecordBuilder::new(2048, 1000.0)
        .x_tone(30.0, 1.0)
        .x_tone(75.0, 0.6)
        .build();
    write_samples_csv(&path, &record).unwrap();
    let loaded = read_samples_csv(&path).unwrap();

    let request = AnalysisRequest::default().with_axes(&[Axis::X]);
    let before = analyze_record(&record, &request, &settings());
    let after = analyze_record(&loaded, &request, &settings());

    assert_eq!(before.results.len(), 1);
    assert_eq!(before.results[0].peaks, after.results[0].peaks);
    assert_eq!(before.results[0].spectrum.magnitudes, after.results[0].spectrum.magnitudes);
}

#[test]
fn test_natural_frequency_file_feeds_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run1.csv");

    let record = RecordBuilder::new(2048, 1000.0)
        .sensor(7)
        .z_tone(30.0, 1.0)
        .z_tone(75.0, 0.6)
        .build();
    let report = analyze_record(&record, &AnalysisRequest::default(), &settings());
    assert_eq!(report.peak_count(), 2);

    let out = natural_frequencies_path(&input, None);
    assert!(out.ends_with("run1_natural_frequencies.csv"));
    write_natural_frequencies_csv(&out, &report).unwrap();

    let observations = read_natural_frequencies(&out).unwrap();
    assert_eq!(observations.len(), 2);
    for (obs, peak) in observations.iter().zip(&report.results[0].peaks) {
        assert_eq!(obs.value, peak.frequency);
        assert_eq!(obs.source, out.display().to_string());
        assert!(obs.sensor_ids.contains("7"));
        assert!(obs.axes.contains(&Axis::Z));
    }
}

#[test]
fn test_spectrum_export_has_one_row_per_bin() {
    let dir = tempfile::tempdir().unwrap();
    let record = RecordBuilder::new(512, 1000.0).x_tone(100.0, 1.0).build();
    let report = analyze_record(
        &record,
        &AnalysisRequest::default().with_axes(&[Axis::X]),
        &settings(),
    );
    let spectrum = &report.results[0].spectrum;

    for column in [SpectrumColumn::Raw, SpectrumColumn::Normalized, SpectrumColumn::Decibels] {
        let path = dir.path().join("spectrum.csv");
        write_spectrum_csv(&path, spectrum, column).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            format!("Frequency (Hz),{}", column.header())
        );
        assert_eq!(lines.count(), spectrum.len());
    }
}

#[test]
fn test_failed_export_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    // A directory in the way makes the final rename fail
    let target = dir.path().join("run.csv");
    std::fs::create_dir(&target).unwrap();
    let record = RecordBuilder::new(4, 1000.0).build();

    let err = write_samples_csv(&target, &record).unwrap_err();
    assert!(matches!(err, modal_rs::ModalError::ExportIo { .. }));
    assert!(target.is_dir());
    assert!(!dir.path().join(".run.csv.tmp").exists());
}

#[test]
fn test_failed_result_file_does_not_stop_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let record = RecordBuilder::new(1024, 1000.0)
        .sensor(2)
        .x_tone(60.0, 1.0)
        .build();
    let report = analyze_record(
        &record,
        &AnalysisRequest::default().with_axes(&[Axis::X]),
        &settings(),
    );

    // A directory occupies the first input's natural-frequency path
    let blocked = dir.path().join("blocked.csv");
    std::fs::create_dir(natural_frequencies_path(&blocked, None)).unwrap();
    let export = export_report(&blocked, &report, None, Some(SpectrumColumn::Decibels));
    assert!(!export.is_complete());
    assert_eq!(export.failed.len(), 1);
    assert!(matches!(export.failed[0], modal_rs::ModalError::ExportIo { .. }));
    let spectrum = spectrum_path(dir.path(), &blocked, 2, Axis::X);
    assert_eq!(export.written, vec![spectrum.clone()]);
    assert!(spectrum.is_file());

    // The next input of the batch is unaffected
    let next = dir.path().join("next.csv");
    let export = export_report(&next, &report, None, None);
    assert!(export.is_complete());
    assert_eq!(read_natural_frequencies(&export.written[0]).unwrap().len(), report.peak_count());
}
