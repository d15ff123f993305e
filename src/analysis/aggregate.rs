//! Frequency aggregation
//!
//! Groups natural-frequency observations from many files, sensors and axes
//! into representative modes.
//!
//! # Main Types
//!
//! - [`Observation`] - One detected frequency and where it came from
//! - [`FrequencyGroup`] - Observations judged to be the same physical mode
//! - [`FrequencyAggregator`] - Applies [`AggregationSettings`] for comparison or combination
//!
//! # Grouping
//!
//! Grouping is anchor-relative, not transitive: the smallest ungrouped value
//! becomes the anchor and every following value within `tolerance` of the
//! anchor (inclusive) joins it. `[10.0, 10.05, 10.2]` with tolerance 0.1 gives
//! `{10.0, 10.05}` and `{10.2}` even though 10.05 and 10.2 are 0.15 apart.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::AggregationSettings;
use crate::types::Axis;

/// One detected frequency with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Frequency (Hz)
    pub value: f64,
    /// File or trial the value came from
    pub source: String,
    /// Sensors that reported it
    pub sensor_ids: BTreeSet<String>,
    /// Axes that reported it
    pub axes: BTreeSet<Axis>,
}

impl Observation {
    /// Create an observation without sensor/axis metadata
    pub fn new(value: f64, source: impl Into<String>) -> Self {
        Self {
            value,
            source: source.into(),
            sensor_ids: BTreeSet::new(),
            axes: BTreeSet::new(),
        }
    }

    /// Add a sensor ID
    pub fn with_sensor(mut self, sensor_id: impl Into<String>) -> Self {
        self.sensor_ids.insert(sensor_id.into());
        self
    }

    /// Add an axis
    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axes.insert(axis);
        self
    }
}

/// Observations merged into one representative mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyGroup {
    /// 1-based position after ordering
    pub mode_number: usize,
    /// Value that opened the group (its smallest member)
    pub anchor: f64,
    /// Smallest member value
    pub representative_low: f64,
    /// Largest member value
    pub representative_high: f64,
    /// Member values, ascending
    pub members: Vec<f64>,
    /// Distinct contributing sources
    pub sources: BTreeSet<String>,
    /// Distinct contributing sensors
    pub sensor_ids: BTreeSet<String>,
    /// Distinct contributing axes
    pub axes: BTreeSet<Axis>,
}

impl FrequencyGroup {
    /// `(high − low) / low · 100`, or 0 when `low` is 0
    pub fn spread_percent(&self) -> f64 {
        if self.representative_low == 0.0 {
            0.0
        } else {
            (self.representative_high - self.representative_low) / self.representative_low * 100.0
        }
    }

    /// Mean of member values
    pub fn mean(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.members.iter().sum::<f64>() / self.members.len() as f64
    }

    /// `(high − low) / mean · 100`, or 0 when the mean is 0
    pub fn deviation_percent(&self) -> f64 {
        let mean = self.mean();
        if mean == 0.0 {
            0.0
        } else {
            (self.representative_high - self.representative_low) / mean * 100.0
        }
    }

    /// Number of member observations
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the group has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// What the grouping is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Keep only groups seen in at least `min_sources` distinct sources
    Compare { min_sources: usize },
    /// Keep every group
    Combine,
}

/// Ordering of the aggregated groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupOrder {
    /// Largest relative spread first
    #[default]
    SpreadDescending,
    /// Lowest frequency first
    FrequencyAscending,
}

impl GroupOrder {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            GroupOrder::SpreadDescending => "Spread (descending)",
            GroupOrder::FrequencyAscending => "Frequency (ascending)",
        }
    }

    /// Get all orderings
    pub fn all() -> &'static [GroupOrder] {
        &[GroupOrder::SpreadDescending, GroupOrder::FrequencyAscending]
    }
}

/// Group observations whose values lie within `tolerance` of an anchor
///
/// A negative or NaN tolerance is treated as 0 (exact matches only).
pub fn aggregate(
    observations: &[Observation],
    tolerance: f64,
    purpose: Purpose,
    order: GroupOrder,
) -> Vec<FrequencyGroup> {
    let tolerance = if tolerance >= 0.0 {
        tolerance
    } else {
        tracing::warn!("Invalid grouping tolerance {}, using 0", tolerance);
        0.0
    };

    let mut sorted: Vec<&Observation> = observations
        .iter()
        .filter(|o| o.value.is_finite())
        .collect();
    let dropped = observations.len() - sorted.len();
    if dropped > 0 {
        tracing::warn!("Ignoring {} non-finite observation(s)", dropped);
    }
    sorted.sort_by(|a, b| a.value.total_cmp(&b.value));

    let mut groups = Vec::new();
    let mut rest = sorted.as_slice();
    while let Some((first, _)) = rest.split_first() {
        let anchor = first.value;
        let size = rest
            .iter()
            .take_while(|o| o.value - anchor <= tolerance)
            .count()
            .max(1);
        let (members, tail) = rest.split_at(size);
        groups.push(build_group(anchor, members));
        rest = tail;
    }

    let total = groups.len();
    if let Purpose::Compare { min_sources } = purpose {
        groups.retain(|g| g.sources.len() >= min_sources);
    }

    match order {
        GroupOrder::SpreadDescending => {
            groups.sort_by(|a, b| b.spread_percent().total_cmp(&a.spread_percent()))
        }
        GroupOrder::FrequencyAscending => {
            groups.sort_by(|a, b| a.representative_low.total_cmp(&b.representative_low))
        }
    }
    for (i, group) in groups.iter_mut().enumerate() {
        group.mode_number = i + 1;
    }

    tracing::debug!(
        "Grouped {} observation(s) into {} group(s), {} kept",
        sorted.len(),
        total,
        groups.len()
    );

    groups
}

fn build_group(anchor: f64, members: &[&Observation]) -> FrequencyGroup {
    let values: Vec<f64> = members.iter().map(|o| o.value).collect();
    FrequencyGroup {
        mode_number: 0,
        anchor,
        representative_low: values.first().copied().unwrap_or(anchor),
        representative_high: values.last().copied().unwrap_or(anchor),
        sources: members.iter().map(|o| o.source.clone()).collect(),
        sensor_ids: members
            .iter()
            .flat_map(|o| o.sensor_ids.iter().cloned())
            .collect(),
        axes: members.iter().flat_map(|o| o.axes.iter().copied()).collect(),
        members: values,
    }
}

/// Exact deduplication by rounding
///
/// Values are bucketed by `round(value, decimals)`; each bucket is averaged,
/// the average rounded again, and the result sorted ascending.
pub fn combine_rounded(values: &[f64], decimals: u32) -> Vec<f64> {
    let scale = 10f64.powi(decimals as i32);
    let round = |v: f64| (v * scale).round() / scale;

    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for &v in values.iter().filter(|v| v.is_finite()) {
        let key = (v * scale).round() as i64;
        let entry = buckets.entry(key).or_insert((0.0, 0));
        entry.0 += round(v);
        entry.1 += 1;
    }

    buckets
        .into_values()
        .map(|(sum, count)| round(sum / count as f64))
        .collect()
}

/// Aggregator bound to a set of [`AggregationSettings`]
#[derive(Debug, Clone, Default)]
pub struct FrequencyAggregator {
    settings: AggregationSettings,
}

impl FrequencyAggregator {
    /// Create an aggregator
    pub fn new(settings: AggregationSettings) -> Self {
        Self { settings }
    }

    /// Get current settings
    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    /// Groups that recur across at least `min_sources` sources
    pub fn compare(&self, observations: &[Observation]) -> Vec<FrequencyGroup> {
        aggregate(
            observations,
            self.settings.tolerance_hz,
            Purpose::Compare {
                min_sources: self.settings.min_sources,
            },
            self.settings.order,
        )
    }

    /// Every group, lowest frequency first
    pub fn combine(&self, observations: &[Observation]) -> Vec<FrequencyGroup> {
        aggregate(
            observations,
            self.settings.tolerance_hz,
            Purpose::Combine,
            GroupOrder::FrequencyAscending,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(values: &[(f64, &str)]) -> Vec<Observation> {
        values.iter().map(|&(v, s)| Observation::new(v, s)).collect()
    }

    #[test]
    fn test_single_observation() {
        let groups = aggregate(
            &obs(&[(12.5, "a")]),
            0.1,
            Purpose::Combine,
            GroupOrder::FrequencyAscending,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![12.5]);
        assert_eq!(groups[0].spread_percent(), 0.0);
        assert_eq!(groups[0].mode_number, 1);
    }

    #[test]
    fn test_anchor_relative_grouping() {
        let groups = aggregate(
            &obs(&[(10.2, "a"), (10.0, "b"), (10.05, "c")]),
            0.1,
            Purpose::Combine,
            GroupOrder::FrequencyAscending,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![10.0, 10.05]);
        assert_eq!(groups[1].members, vec![10.2]);
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let groups = aggregate(
            &obs(&[(1.0, "a"), (1.5, "b"), (1.50001, "c")]),
            0.5,
            Purpose::Combine,
            GroupOrder::FrequencyAscending,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![1.0, 1.5]);
    }

    #[test]
    fn test_compare_drops_single_source_groups() {
        let observations = obs(&[(10.0, "a"), (10.001, "b"), (25.0, "a"), (25.002, "a")]);
        let compared = aggregate(
            &observations,
            0.01,
            Purpose::Compare { min_sources: 2 },
            GroupOrder::FrequencyAscending,
        );
        assert_eq!(compared.len(), 1);
        assert_eq!(compared[0].representative_low, 10.0);

        let combined = aggregate(
            &observations,
            0.01,
            Purpose::Combine,
            GroupOrder::FrequencyAscending,
        );
        assert_eq!(combined.len(), 2);
    }

    #[test]
    fn test_spread_ordering_and_mode_numbers() {
        let observations = obs(&[(10.0, "a"), (10.01, "b"), (50.0, "a"), (50.0, "b")]);
        let groups = aggregate(
            &observations,
            0.05,
            Purpose::Compare { min_sources: 2 },
            GroupOrder::SpreadDescending,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].representative_low, 10.0);
        assert_eq!(groups[0].mode_number, 1);
        assert_eq!(groups[1].representative_low, 50.0);
        assert_eq!(groups[1].mode_number, 2);
        assert!((groups[0].spread_percent() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_metadata_union() {
        let observations = vec![
            Observation::new(30.0, "run1").with_sensor("1").with_axis(Axis::X),
            Observation::new(30.005, "run2").with_sensor("2").with_axis(Axis::X),
            Observation::new(30.008, "run2").with_sensor("2").with_axis(Axis::Z),
        ];
        let groups = FrequencyAggregator::default().compare(&observations);
        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.sources.len(), 2);
        assert_eq!(g.sensor_ids.iter().cloned().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(g.axes.iter().copied().collect::<Vec<_>>(), vec![Axis::X, Axis::Z]);
        assert!((g.mean() - 30.004333333).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_ignored() {
        let groups = aggregate(
            &obs(&[(f64::NAN, "a"), (5.0, "b")]),
            0.1,
            Purpose::Combine,
            GroupOrder::FrequencyAscending,
        );
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_invalid_tolerance_groups_exact_matches() {
        let observations = obs(&[(10.0, "a"), (10.0, "b"), (10.25, "c")]);
        for tolerance in [-0.5, f64::NAN, f64::NEG_INFINITY] {
            let groups = aggregate(
                &observations,
                tolerance,
                Purpose::Combine,
                GroupOrder::FrequencyAscending,
            );
            assert_eq!(groups.len(), 2);
            assert_eq!(groups[0].members, vec![10.0, 10.0]);
            assert_eq!(groups[1].members, vec![10.25]);
        }
    }

    #[test]
    fn test_combine_rounded() {
        let combined = combine_rounded(&[20.0004, 10.1234, 10.1231, 20.0001, 5.5], 3);
        assert_eq!(combined, vec![5.5, 10.123, 20.0]);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_members_within_tolerance_of_anchor(
            values in prop::collection::vec(0.0f64..500.0, 0..100),
            tolerance in 0.0f64..5.0
        ) {
            let observations: Vec<Observation> = values
                .iter()
                .enumerate()
                .map(|(i, &v)| Observation::new(v, format!("s{}", i % 4)))
                .collect();
            let groups = aggregate(&observations, tolerance, Purpose::Combine, GroupOrder::FrequencyAscending);

            let total: usize = groups.iter().map(|g| g.len()).sum();
            prop_assert_eq!(total, values.len());

            for g in &groups {
                prop_assert_eq!(g.anchor, g.representative_low);
                for &m in &g.members {
                    prop_assert!(m - g.anchor <= tolerance);
                    prop_assert!(m >= g.anchor);
                }
            }
            for w in groups.windows(2) {
                prop_assert!(w[1].anchor - w[0].anchor > tolerance);
            }
        }
    }
}
