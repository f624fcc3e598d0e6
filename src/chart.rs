//! Ranked bar chart of one numeric property.
//!
//! Independent of projection and zoom: it is rebuilt only when the feature
//! set or its own viewport changes, and every build sorts from scratch.

use crate::{color::signed_sqrt, feature::Feature, scene::Viewport};

/// Space kept free around the plot area (top, right, bottom, left).
pub const MARGIN: [f64; 4] = [10.0, 10.0, 30.0, 60.0];
const BAND_PADDING: f64 = 0.1;

#[derive(Clone, Debug, PartialEq)]
pub struct Bar {
    /// Index into the feature set.
    pub feature: usize,
    pub label: String,
    /// `None` when the feature lacks the property; drawn with zero height.
    pub value: Option<f64>,
    pub x: f64,
    pub width: f64,
    pub y: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub y: f64,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BarChart {
    pub property: String,
    pub bars: Vec<Bar>,
    pub ticks: Vec<Tick>,
    /// Screen y of the shared baseline.
    pub baseline: f64,
    pub max: f64,
}

impl BarChart {
    /// Builds the chart; `None` when there is nothing to scale.
    pub fn build(
        features: &[Feature],
        property: &str,
        name_property: &str,
        viewport: Viewport,
        tick_count: usize,
    ) -> Option<Self> {
        if features.is_empty() {
            return None;
        }
        let max = features.iter().filter_map(|f| f.number(property)).reduce(f64::max)?;

        let mut ranked: Vec<(usize, Option<f64>)> =
            features.iter().enumerate().map(|(i, f)| (i, f.number(property))).collect();
        ranked.sort_by(|a, b| b.1.unwrap_or(0.0).total_cmp(&a.1.unwrap_or(0.0)));

        let [top, right, bottom, left] = MARGIN;
        let baseline = (viewport.height - bottom).max(top);
        let plot_height = baseline - top;
        let y_of = |v: f64| {
            if max <= 0.0 {
                return baseline;
            }
            let t = (signed_sqrt(v) / max.sqrt()).clamp(0.0, 1.0);
            baseline - t * plot_height
        };

        let band = Band::new(ranked.len(), left, (viewport.width - right).max(left));
        let bars = ranked
            .into_iter()
            .enumerate()
            .map(|(slot, (feature, value))| {
                let y = y_of(value.unwrap_or(0.0));
                Bar {
                    feature,
                    label: features[feature].name(name_property),
                    value,
                    x: band.position(slot),
                    width: band.bandwidth,
                    y,
                    height: baseline - y,
                }
            })
            .collect();

        let ticks = ticks(0.0, max, tick_count)
            .into_iter()
            .map(|value| Tick { value, y: y_of(value), label: format_value(value) })
            .collect();

        Some(Self { property: property.to_string(), bars, ticks, baseline, max })
    }

    /// Feature indices in drawn order.
    pub fn order(&self) -> Vec<usize> {
        self.bars.iter().map(|b| b.feature).collect()
    }
}

/// Categorical band layout with equal inner and outer padding, centered.
struct Band {
    start: f64,
    step: f64,
    bandwidth: f64,
}

impl Band {
    fn new(n: usize, r0: f64, r1: f64) -> Self {
        let n = n as f64;
        let step = (r1 - r0) / (n - BAND_PADDING + BAND_PADDING * 2.0).max(1.0);
        let start = r0 + (r1 - r0 - step * (n - BAND_PADDING)) * 0.5;
        Self { start, step, bandwidth: step * (1.0 - BAND_PADDING) }
    }

    fn position(&self, i: usize) -> f64 {
        self.start + self.step * i as f64
    }
}

/// Round tick values covering [start, stop], about `count` of them.
pub fn ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 || !start.is_finite() || !stop.is_finite() {
        return Vec::new();
    }
    if start == stop {
        return vec![start];
    }
    if stop < start {
        let mut reversed = ticks(stop, start, count);
        reversed.reverse();
        return reversed;
    }
    let step = (stop - start) / count as f64;
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };

    if power >= 0.0 {
        let inc = factor * 10f64.powf(power);
        let (i0, i1) = ((start / inc).ceil() as i64, (stop / inc).floor() as i64);
        (i0..=i1).map(|i| i as f64 * inc).collect()
    } else {
        // Divide by the inverse step to keep decimal ticks exact.
        let inv = 10f64.powf(-power) / factor;
        let (i0, i1) = ((start * inv).ceil() as i64, (stop * inv).floor() as i64);
        (i0..=i1).map(|i| i as f64 / inv).collect()
    }
}

/// Compact human-readable number: `1.20 T`, `3.40 B`, `5.00 M`, `12.5 k`.
pub fn format_value(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000_000_000.0 {
        format!("{:.2} T", value / 1_000_000_000_000.0)
    } else if abs >= 1_000_000_000.0 {
        format!("{:.2} B", value / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{:.2} M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1} k", value / 1_000.0)
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
