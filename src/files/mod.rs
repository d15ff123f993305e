//! File formats read and written by modal-rs
//!
//! All writers go through a temporary sibling file and a rename, so an
//! interrupted export never leaves a truncated CSV behind.

pub mod csv;
pub mod modes;
pub mod report;
pub mod samples;
pub mod spectra;

pub use modes::{
    export_mode_numbers, find_natural_frequency_files, natural_frequencies_path,
    read_natural_frequencies, write_combined_csv, write_modes_csv, write_natural_frequencies_csv,
    FREQUENCY_COLUMN,
};
pub use report::{export_report, spectrum_path, ReportExport};
pub use samples::{read_samples, read_samples_csv, write_samples_csv};
pub use spectra::{write_spectrum_csv, SpectrumColumn};
