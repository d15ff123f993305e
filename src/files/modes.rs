//! Natural-frequency and mode CSV files
//!
//! - Natural-frequency files: one detected peak per row, produced by analysis
//!   and consumed by comparison and combination
//! - Mode files: aggregated groups with membership and deviation
//! - Combined files: a single `Natural Frequency (Hz)` column

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::analysis::{AnalysisReport, FrequencyGroup, Observation};
use crate::error::{ModalError, Result, ResultExt};
use crate::types::Axis;

use super::csv::{quote, split_line, text_lines, write_atomically, Header};

/// Frequency column header shared by every file in this module
pub const FREQUENCY_COLUMN: &str = "Natural Frequency (Hz)";

/// Optional sensor column
pub const SENSOR_ID_COLUMN: &str = "Sensor ID";

/// Optional axis column
pub const AXIS_COLUMN: &str = "Axis";

/// Substring identifying natural-frequency files in a folder scan
pub const NATURAL_FREQUENCIES_TAG: &str = "natural_frequencies";

/// Separator inside multi-valued cells
const LIST_SEPARATOR: &str = ", ";

/// `<stem>_natural_frequencies.csv` next to the analysed file, or in `out_dir`
pub fn natural_frequencies_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "analysis".to_string());
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{}_{}.csv", stem, NATURAL_FREQUENCIES_TAG))
}

/// Write every detected peak of a report
///
/// Columns: `Natural Frequency (Hz),Sensor ID,Axis,Magnitude`.
pub fn write_natural_frequencies_csv(path: impl AsRef<Path>, report: &AnalysisReport) -> Result<()> {
    let path = path.as_ref();
    write_atomically(path, |w| {
        writeln!(w, "{},{},{},Magnitude", FREQUENCY_COLUMN, SENSOR_ID_COLUMN, AXIS_COLUMN)?;
        for result in &report.results {
            for peak in &result.peaks {
                writeln!(
                    w,
                    "{},{},{},{}",
                    peak.frequency, result.sensor_id, result.axis, peak.magnitude
                )?;
            }
        }
        Ok(())
    })?;
    tracing::info!("Wrote {} natural frequencies to {:?}", report.peak_count(), path);
    Ok(())
}

/// Read the frequency observations of one file
///
/// `Natural Frequency (Hz)` is required; `Sensor ID` and `Axis` are optional
/// and may hold `", "`-separated lists. Rows without a usable frequency are
/// skipped.
pub fn read_natural_frequencies(path: impl AsRef<Path>) -> Result<Vec<Observation>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Opening {:?}", path))?;
    let mut lines = text_lines(BufReader::new(file), path);

    let header = match lines.next() {
        Some(line) => Header::parse(&line?),
        None => {
            return Err(ModalError::MissingColumn {
                column: FREQUENCY_COLUMN.to_string(),
                path: path.to_path_buf(),
            })
        }
    };
    let freq_col = header.require(FREQUENCY_COLUMN, path)?;
    let sensor_col = header.find(SENSOR_ID_COLUMN);
    let axis_col = header.find(AXIS_COLUMN);

    // Full path: same-named files from different folders are distinct sources
    let source = path.display().to_string();

    let mut observations = Vec::new();
    let mut skipped = 0usize;
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_line(&line);
        let value = match fields.get(freq_col).and_then(|f| f.parse::<f64>().ok()) {
            Some(v) if v.is_finite() => v,
            _ => {
                skipped += 1;
                continue;
            }
        };

        let mut observation = Observation::new(value, source.clone());
        if let Some(cell) = sensor_col.and_then(|c| fields.get(c)) {
            for id in list_items(cell) {
                observation = observation.with_sensor(id);
            }
        }
        if let Some(cell) = axis_col.and_then(|c| fields.get(c)) {
            for item in list_items(cell) {
                match item.parse::<Axis>() {
                    Ok(axis) => observation = observation.with_axis(axis),
                    Err(e) => tracing::warn!("{:?}: {}", path, e),
                }
            }
        }
        observations.push(observation);
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} row(s) without a frequency in {:?}", skipped, path);
    }
    tracing::debug!("Read {} frequencies from {:?}", observations.len(), path);
    Ok(observations)
}

fn list_items(cell: &str) -> impl Iterator<Item = &str> {
    cell.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn join<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: ToString,
{
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Mode numbers a mode file assigns, aligned with `groups`
///
/// Mode files are always numbered by ascending mean frequency, whatever
/// order the groups are displayed in.
pub fn export_mode_numbers(groups: &[FrequencyGroup]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by(|&a, &b| groups[a].mean().total_cmp(&groups[b].mean()));

    let mut numbers = vec![0; groups.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        numbers[idx] = rank + 1;
    }
    numbers
}

/// Write aggregated modes, numbered by ascending frequency
///
/// Columns: `Mode Number,Natural Frequency (Hz),Sensor ID,Axis,Deviation (%)`.
/// The frequency is the group mean and the numbering follows
/// [`export_mode_numbers`].
pub fn write_modes_csv(path: impl AsRef<Path>, groups: &[FrequencyGroup]) -> Result<()> {
    let path = path.as_ref();
    let mut rows: Vec<(usize, &FrequencyGroup)> =
        export_mode_numbers(groups).into_iter().zip(groups).collect();
    rows.sort_by_key(|&(number, _)| number);

    write_atomically(path, |w| {
        writeln!(
            w,
            "Mode Number,{},{},{},Deviation (%)",
            FREQUENCY_COLUMN, SENSOR_ID_COLUMN, AXIS_COLUMN
        )?;
        for (number, group) in &rows {
            writeln!(
                w,
                "{},{},{},{},{}",
                number,
                group.mean(),
                quote(&join(&group.sensor_ids)),
                quote(&join(&group.axes)),
                group.deviation_percent()
            )?;
        }
        Ok(())
    })?;
    tracing::info!("Exported {} modes to {:?}", rows.len(), path);
    Ok(())
}

/// Write a single-column list of frequencies
pub fn write_combined_csv(path: impl AsRef<Path>, values: &[f64]) -> Result<()> {
    let path = path.as_ref();
    write_atomically(path, |w| {
        writeln!(w, "{}", FREQUENCY_COLUMN)?;
        for v in values {
            writeln!(w, "{}", v)?;
        }
        Ok(())
    })?;
    tracing::info!("Exported {} combined frequencies to {:?}", values.len(), path);
    Ok(())
}

/// CSV files in `dir` whose name contains `natural_frequencies`, sorted
pub fn find_natural_frequency_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Scanning {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .is_some_and(|n| n.ends_with(".csv") && n.contains(NATURAL_FREQUENCIES_TAG))
        })
        .collect();
    files.sort();
    Ok(files)
}
