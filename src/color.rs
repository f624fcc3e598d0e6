//! Choropleth fill colors.

use crate::feature::Feature;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl From<Rgb> for ratatui::style::Color {
    fn from(c: Rgb) -> Self {
        ratatui::style::Color::Rgb(c.0, c.1, c.2)
    }
}

/// Fill for features without a usable value.
pub const FALLBACK: Rgb = Rgb(0x9e, 0x9e, 0x9e);

/// Sequential yellow → red ramp (9 classes).
const RAMP: [Rgb; 9] = [
    Rgb(0xff, 0xff, 0xcc),
    Rgb(0xff, 0xed, 0xa0),
    Rgb(0xfe, 0xd9, 0x76),
    Rgb(0xfe, 0xb2, 0x4c),
    Rgb(0xfd, 0x8d, 0x3c),
    Rgb(0xfc, 0x4e, 0x2a),
    Rgb(0xe3, 0x1a, 0x1c),
    Rgb(0xbd, 0x00, 0x26),
    Rgb(0x80, 0x00, 0x26),
];

/// Color at `t` ∈ [0, 1] along the ramp, linearly interpolated between stops.
pub fn ramp(t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let scaled = t * (RAMP.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(RAMP.len() - 2);
    let f = scaled - i as f64;
    let (a, b) = (RAMP[i], RAMP[i + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * f).round() as u8;
    Rgb(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Sign-preserving square root, as a sqrt scale applies it.
pub fn signed_sqrt(v: f64) -> f64 {
    if v < 0.0 { -(-v).sqrt() } else { v.sqrt() }
}

/// Min/max of one property over the current feature set.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorScale {
    pub property: String,
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    /// `None` when no feature carries a numeric `property`.
    pub fn build(features: &[Feature], property: &str) -> Option<Self> {
        let (min, max) = features
            .iter()
            .filter_map(|f| f.number(property))
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        Some(Self { property: property.to_string(), min, max })
    }

    /// Position of `v` in [0, 1] through a square-root curve over [min, max].
    pub fn normalize(&self, v: f64) -> f64 {
        let lo = signed_sqrt(self.min);
        let span = signed_sqrt(self.max) - lo;
        if span == 0.0 {
            return 0.5;
        }
        ((signed_sqrt(v) - lo) / span).clamp(0.0, 1.0)
    }

    pub fn color(&self, v: f64) -> Rgb {
        ramp(self.normalize(v))
    }
}

/// Fill for one feature; the fallback when the scale or the value is missing.
pub fn color_of(feature: &Feature, scale: Option<&ColorScale>) -> Rgb {
    scale
        .and_then(|s| feature.number(&s.property).map(|v| s.color(v)))
        .unwrap_or(FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::JsonObject;
    use serde_json::json;

    fn feature(pop: Option<f64>) -> Feature {
        let mut props = JsonObject::new();
        if let Some(p) = pop {
            props.insert("POP_EST".into(), json!(p));
        }
        Feature::new(None, props)
    }

    #[test]
    fn scale_spans_defined_values() {
        let features = vec![feature(Some(400.0)), feature(None), feature(Some(100.0)), feature(Some(900.0))];
        let scale = ColorScale::build(&features, "POP_EST").unwrap();
        assert_eq!((scale.min, scale.max), (100.0, 900.0));
        // sqrt(400) sits halfway between sqrt(100) and sqrt(900)
        assert_eq!(scale.normalize(400.0), 0.5);
        assert_eq!(scale.normalize(100.0), 0.0);
        assert_eq!(scale.normalize(900.0), 1.0);
    }

    #[test]
    fn no_domain_means_no_scale() {
        assert_eq!(ColorScale::build(&[], "POP_EST"), None);
        assert_eq!(ColorScale::build(&[feature(None)], "POP_EST"), None);
    }

    #[test]
    fn missing_value_or_scale_uses_fallback() {
        let features = vec![feature(Some(10.0)), feature(Some(20.0))];
        let scale = ColorScale::build(&features, "POP_EST");
        assert_eq!(color_of(&feature(None), scale.as_ref()), FALLBACK);
        assert_eq!(color_of(&features[0], None), FALLBACK);
        assert_eq!(color_of(&features[0], scale.as_ref()), RAMP[0]);
        assert_eq!(color_of(&features[1], scale.as_ref()), RAMP[8]);
    }

    #[test]
    fn outlier_does_not_flatten_the_rest() {
        let features = vec![feature(Some(1.0e6)), feature(Some(4.0e6)), feature(Some(1.0e8))];
        let scale = ColorScale::build(&features, "POP_EST").unwrap();
        let linear = (4.0e6 - 1.0e6) / (1.0e8 - 1.0e6);
        assert!(scale.normalize(4.0e6) > 3.0 * linear);
    }

    #[test]
    fn colors_are_monotonic_along_the_ramp() {
        let scale = ColorScale { property: "POP_EST".into(), min: 0.0, max: 1000.0 };
        let mut previous = scale.normalize(0.0);
        for v in (1..=100).map(|i| i as f64 * 10.0) {
            let t = scale.normalize(v);
            assert!(t >= previous);
            previous = t;
        }
        // green channel only ever decreases along the ramp
        assert!(scale.color(100.0).1 >= scale.color(800.0).1);
    }

    #[test]
    fn single_value_domain_is_midpoint() {
        let scale = ColorScale::build(&[feature(Some(7.0))], "POP_EST").unwrap();
        assert_eq!(scale.normalize(7.0), 0.5);
        assert_eq!(scale.color(7.0), ramp(0.5));
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(Rgb(0xff, 0x00, 0x26).to_hex(), "#ff0026");
        assert_eq!(ramp(-3.0), RAMP[0]);
        assert_eq!(ramp(f64::NAN), RAMP[0]);
    }
}
