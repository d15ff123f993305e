//! Raw sample CSV files
//!
//! Header: `Time [microseconds],Accelerometer ID,X Acceleration,Y Acceleration,Z Acceleration`.
//! Columns are located by name, so their order does not matter on read.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{ModalError, Result, ResultExt};
use crate::types::{Axis, Sample, SampleRecord};

use super::csv::{split_line, text_lines, write_atomically, Header};

/// Time column header
pub const TIME_COLUMN: &str = "Time [microseconds]";

/// Sensor column header
pub const SENSOR_COLUMN: &str = "Accelerometer ID";

/// Read a sample CSV file
///
/// Malformed rows are dropped with a warning. A missing column fails the file.
pub fn read_samples_csv(path: impl AsRef<Path>) -> Result<SampleRecord> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Opening {:?}", path))?;
    let record = read_samples(BufReader::new(file), path)?;
    tracing::info!(
        "Loaded {} samples from {:?} ({} sensor(s))",
        record.len(),
        path,
        record.sensor_ids().len()
    );
    Ok(record)
}

/// Read samples from any reader; `path` is used for error messages
pub fn read_samples(reader: impl BufRead, path: &Path) -> Result<SampleRecord> {
    let mut lines = text_lines(reader, path);

    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break Header::parse(&line);
                }
            }
            None => {
                return Err(ModalError::MissingColumn {
                    column: TIME_COLUMN.to_string(),
                    path: path.to_path_buf(),
                })
            }
        }
    };

    let time_col = header.require(TIME_COLUMN, path)?;
    let sensor_col = header.require(SENSOR_COLUMN, path)?;
    let mut axis_cols = [0usize; 3];
    for &axis in Axis::all() {
        axis_cols[axis.index()] = header.require(axis.column_name(), path)?;
    }

    let mut record = SampleRecord::new();
    let mut dropped = 0usize;
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(&line, time_col, sensor_col, &axis_cols) {
            Ok(sample) => record.push(sample),
            Err(e) => {
                dropped += 1;
                tracing::warn!("{:?}: {}", path, e);
            }
        }
    }

    if dropped > 0 {
        tracing::warn!("Dropped {} malformed row(s) from {:?}", dropped, path);
    }
    if !record.is_time_sorted() {
        tracing::warn!(
            "Time data in {:?} is not monotonic; series are sorted before analysis",
            path
        );
    }

    Ok(record)
}

fn parse_row(line: &str, time_col: usize, sensor_col: usize, axis_cols: &[usize; 3]) -> Result<Sample> {
    let fields = split_line(line);

    let sensor_id = parse_sensor_id(field(&fields, sensor_col, line)?)
        .ok_or_else(|| ModalError::malformed(line, "invalid sensor id"))?;

    Ok(Sample::new(
        sensor_id,
        number(&fields, time_col, line, "time")?,
        number(&fields, axis_cols[0], line, "x acceleration")?,
        number(&fields, axis_cols[1], line, "y acceleration")?,
        number(&fields, axis_cols[2], line, "z acceleration")?,
    ))
}

fn field<'a>(fields: &'a [String], idx: usize, line: &str) -> Result<&'a str> {
    fields
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| ModalError::malformed(line, "too few fields"))
}

fn number(fields: &[String], idx: usize, line: &str, what: &str) -> Result<f64> {
    match field(fields, idx, line)?.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ModalError::malformed(line, format!("invalid {}", what))),
    }
}

/// Sensor IDs may have been written as floats (`"2.0"`) by other tools
fn parse_sensor_id(s: &str) -> Option<u32> {
    if let Ok(id) = s.parse::<u32>() {
        return Some(id);
    }
    let v = s.parse::<f64>().ok()?;
    (v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64).then_some(v as u32)
}

/// Write samples in arrival order
///
/// Values use the shortest representation that reads back identically.
pub fn write_samples_csv(path: impl AsRef<Path>, record: &SampleRecord) -> Result<()> {
    let path = path.as_ref();
    write_atomically(path, |w| {
        writeln!(
            w,
            "{},{},{},{},{}",
            TIME_COLUMN,
            SENSOR_COLUMN,
            Axis::X.column_name(),
            Axis::Y.column_name(),
            Axis::Z.column_name()
        )?;
        for s in record {
            writeln!(
                w,
                "{},{},{},{},{}",
                s.timestamp_us, s.sensor_id, s.accel_x, s.accel_y, s.accel_z
            )?;
        }
        Ok(())
    })?;
    tracing::info!("Exported {} samples to {:?}", record.len(), path);
    Ok(())
}
