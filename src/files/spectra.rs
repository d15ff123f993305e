//! Spectrum CSV export

use std::io::Write;
use std::path::Path;

use crate::analysis::Spectrum;
use crate::config::MagnitudeScale;
use crate::error::Result;

use super::csv::write_atomically;

/// Which magnitude column a spectrum file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpectrumColumn {
    /// Unscaled magnitude
    #[default]
    Raw,
    /// Min-max normalized magnitude
    Normalized,
    /// `20 log10` of the unscaled magnitude
    Decibels,
}

impl SpectrumColumn {
    /// Column header
    pub fn header(&self) -> &'static str {
        match self {
            SpectrumColumn::Raw | SpectrumColumn::Normalized => "Magnitude",
            SpectrumColumn::Decibels => "Magnitude (dB)",
        }
    }
}

/// Write `Frequency (Hz),<magnitude column>` rows
pub fn write_spectrum_csv(
    path: impl AsRef<Path>,
    spectrum: &Spectrum,
    column: SpectrumColumn,
) -> Result<()> {
    let values: Vec<f64> = match column {
        SpectrumColumn::Raw => spectrum.values(MagnitudeScale::Raw).to_vec(),
        SpectrumColumn::Normalized => spectrum.values(MagnitudeScale::Normalized).to_vec(),
        SpectrumColumn::Decibels => spectrum.db(),
    };

    write_atomically(path.as_ref(), |w| {
        writeln!(w, "Frequency (Hz),{}", column.header())?;
        for (f, m) in spectrum.frequencies.iter().zip(&values) {
            writeln!(w, "{},{}", f, m)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_csv_columns() {
        let dir = tempfile::tempdir().unwrap();
        let spectrum = Spectrum::from_bins(vec![4.0, 5.0], vec![10.0, 100.0], 0.0, 1000.0);

        let raw = dir.path().join("raw.csv");
        write_spectrum_csv(&raw, &spectrum, SpectrumColumn::Raw).unwrap();
        assert_eq!(
            std::fs::read_to_string(&raw).unwrap(),
            "Frequency (Hz),Magnitude\n4,10\n5,100\n"
        );

        let db = dir.path().join("db.csv");
        write_spectrum_csv(&db, &spectrum, SpectrumColumn::Decibels).unwrap();
        assert_eq!(
            std::fs::read_to_string(&db).unwrap(),
            "Frequency (Hz),Magnitude (dB)\n4,20\n5,40\n"
        );
    }
}
