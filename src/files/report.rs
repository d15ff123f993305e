//! Result files for one analysed input
//!
//! Every file is attempted even when an earlier one fails; failures are
//! collected so a batch can report them and move on to the next input.

use std::path::{Path, PathBuf};

use crate::analysis::AnalysisReport;
use crate::error::ModalError;
use crate::types::Axis;

use super::modes::{natural_frequencies_path, write_natural_frequencies_csv};
use super::spectra::{write_spectrum_csv, SpectrumColumn};

/// `<stem>_sensor<id>_<axis>_spectrum.csv` in `dir`
pub fn spectrum_path(dir: &Path, input: &Path, sensor_id: u32, axis: Axis) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "analysis".to_string());
    dir.join(format!("{}_sensor{}_{}_spectrum.csv", stem, sensor_id, axis))
}

/// Outcome of [`export_report`]
#[derive(Debug, Default)]
pub struct ReportExport {
    /// Files written successfully
    pub written: Vec<PathBuf>,
    /// Files that could not be written
    pub failed: Vec<ModalError>,
}

impl ReportExport {
    /// Check if every file was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Write the natural-frequency file and, when `spectra` is set, one
/// spectrum file per analysed (sensor, axis)
///
/// Files go next to `input`, or into `out_dir` when given.
pub fn export_report(
    input: &Path,
    report: &AnalysisReport,
    out_dir: Option<&Path>,
    spectra: Option<SpectrumColumn>,
) -> ReportExport {
    let mut export = ReportExport::default();

    let nf_path = natural_frequencies_path(input, out_dir);
    match write_natural_frequencies_csv(&nf_path, report) {
        Ok(()) => export.written.push(nf_path.clone()),
        Err(e) => {
            tracing::error!("{}", e);
            export.failed.push(e);
        }
    }

    if let Some(column) = spectra {
        let dir = nf_path.parent().map(Path::to_path_buf).unwrap_or_default();
        for result in &report.results {
            let path = spectrum_path(&dir, input, result.sensor_id, result.axis);
            match write_spectrum_csv(&path, &result.spectrum, column) {
                Ok(()) => export.written.push(path),
                Err(e) => {
                    tracing::error!("{}", e);
                    export.failed.push(e);
                }
            }
        }
    }

    export
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_path() {
        let p = spectrum_path(Path::new("out"), Path::new("/data/run1.csv"), 3, Axis::Z);
        assert_eq!(p, PathBuf::from("out/run1_sensor3_Z_spectrum.csv"));
    }

    #[test]
    fn test_empty_report_writes_header_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("run.csv");
        let export = export_report(
            &input,
            &AnalysisReport::default(),
            None,
            Some(SpectrumColumn::Raw),
        );
        assert!(export.is_complete());
        assert_eq!(export.written, vec![dir.path().join("run_natural_frequencies.csv")]);
    }
}
