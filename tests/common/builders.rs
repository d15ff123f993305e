//! Test data builders for sample records and synthetic signals

use std::f64::consts::PI;

use modal_rs::types::{Sample, SampleRecord};

/// Builder for a single-sensor record of summed sinusoids on one or more axes
pub struct RecordBuilder {
    sensor_id: u32,
    samples: usize,
    rate_hz: f64,
    time_scale: f64,
    x: Vec<(f64, f64)>,
    y: Vec<(f64, f64)>,
    z: Vec<(f64, f64)>,
    z_offset: f64,
}

impl RecordBuilder {
    /// `samples` readings at `rate_hz`, timestamps in microseconds
    pub fn new(samples: usize, rate_hz: f64) -> Self {
        Self {
            sensor_id: 1,
            samples,
            rate_hz,
            time_scale: 1e6,
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            z_offset: 0.0,
        }
    }

    pub fn sensor(mut self, sensor_id: u32) -> Self {
        self.sensor_id = sensor_id;
        self
    }

    /// Write timestamps in seconds instead of microseconds
    pub fn seconds(mut self) -> Self {
        self.time_scale = 1.0;
        self
    }

    pub fn x_tone(mut self, frequency: f64, amplitude: f64) -> Self {
        self.x.push((frequency, amplitude));
        self
    }

    pub fn y_tone(mut self, frequency: f64, amplitude: f64) -> Self {
        self.y.push((frequency, amplitude));
        self
    }

    pub fn z_tone(mut self, frequency: f64, amplitude: f64) -> Self {
        self.z.push((frequency, amplitude));
        self
    }

    /// Constant offset on Z (gravity)
    pub fn gravity(mut self, g: f64) -> Self {
        self.z_offset = g;
        self
    }

    pub fn samples(&self) -> Vec<Sample> {
        (0..self.samples)
            .map(|i| {
                let t = i as f64 / self.rate_hz;
                Sample::new(
                    self.sensor_id,
                    t * self.time_scale,
                    tones(&self.x, t),
                    tones(&self.y, t),
                    self.z_offset + tones(&self.z, t),
                )
            })
            .collect()
    }

    pub fn build(self) -> SampleRecord {
        let mut record = SampleRecord::with_capacity(self.samples);
        for sample in self.samples() {
            record.push(sample);
        }
        record
    }
}

/// Sum of `a * sin(2π f t)`
pub fn tones(components: &[(f64, f64)], t: f64) -> f64 {
    components
        .iter()
        .map(|&(f, a)| a * (2.0 * PI * f * t).sin())
        .sum()
}

/// Expected peak of a Hann-windowed FFT magnitude for a tone of `amplitude`
/// over `samples` points (coherent gain 0.5)
pub fn hann_peak(amplitude: f64, samples: usize) -> f64 {
    amplitude * samples as f64 / 4.0
}

/// Merge several records in arrival order
pub fn merge(records: Vec<SampleRecord>) -> SampleRecord {
    let mut merged = SampleRecord::new();
    for record in records {
        for sample in &record {
            merged.push(*sample);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::new(10, 100.0)
            .sensor(3)
            .x_tone(5.0, 1.0)
            .gravity(1.0)
            .build();

        assert_eq!(record.len(), 10);
        assert_eq!(record.samples()[1].timestamp_us, 10_000.0);
        assert_eq!(record.samples()[0].accel_z, 1.0);
        assert_eq!(record.sensor_ids(), vec![3]);
    }
}
