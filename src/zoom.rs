//! Zoom as a screen-space transform.
//!
//! Zooming never touches the projection. It only rewrites the affine
//! transform applied to the group of already projected globe layers.

use geo::Coord;

use crate::scene::Dirty;

pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 24.0;

/// `screen = translate + k * point`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomTransform {
    pub k: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ZoomTransform {
    pub const IDENTITY: Self = Self { k: 1.0, x: 0.0, y: 0.0 };

    pub fn apply(&self, p: Coord<f64>) -> Coord<f64> {
        Coord { x: self.x + self.k * p.x, y: self.y + self.k * p.y }
    }

    pub fn invert(&self, p: Coord<f64>) -> Coord<f64> {
        Coord { x: (p.x - self.x) / self.k, y: (p.y - self.y) / self.k }
    }

    /// SVG `transform` attribute value.
    pub fn to_svg(&self) -> String {
        format!("translate({},{}) scale({})", self.x, self.y, self.k)
    }
}

/// Gesture payloads handed over by the input dispatcher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ZoomGesture {
    /// Wheel notches; negative zooms in. Anchored at the pointer.
    Wheel { delta: f64, anchor: Coord<f64> },
    /// Ratio of finger distances relative to the previous pinch event.
    Pinch { ratio: f64, anchor: Coord<f64> },
    /// Screen-space pan.
    Pan { dx: f64, dy: f64 },
}

#[derive(Debug)]
pub struct ZoomController {
    transform: ZoomTransform,
    wheel_step: f64,
}

impl ZoomController {
    pub fn new(wheel_step: f64) -> Self {
        Self { transform: ZoomTransform::IDENTITY, wheel_step }
    }

    pub fn transform(&self) -> ZoomTransform {
        self.transform
    }

    pub fn handle(&mut self, gesture: ZoomGesture, dirty: &mut Dirty) -> ZoomTransform {
        let next = match gesture {
            ZoomGesture::Wheel { delta, anchor } => {
                let k = self.transform.k * 2f64.powf(-delta * self.wheel_step);
                self.scaled_about(k, anchor)
            }
            ZoomGesture::Pinch { ratio, anchor } if ratio.is_finite() && ratio > 0.0 => {
                self.scaled_about(self.transform.k * ratio, anchor)
            }
            ZoomGesture::Pinch { .. } => self.transform,
            ZoomGesture::Pan { dx, dy } => ZoomTransform {
                x: self.transform.x + dx,
                y: self.transform.y + dy,
                ..self.transform
            },
        };
        self.set(next, dirty)
    }

    pub fn reset(&mut self, dirty: &mut Dirty) -> ZoomTransform {
        self.set(ZoomTransform::IDENTITY, dirty)
    }

    fn set(&mut self, next: ZoomTransform, dirty: &mut Dirty) -> ZoomTransform {
        if next != self.transform {
            self.transform = next;
            dirty.mark_transform();
        }
        self.transform
    }

    /// Rescales keeping the point under `anchor` fixed on screen.
    fn scaled_about(&self, k: f64, anchor: Coord<f64>) -> ZoomTransform {
        let k = clamp_scale(k);
        let p = self.transform.invert(anchor);
        ZoomTransform { k, x: anchor.x - p.x * k, y: anchor.y - p.y * k }
    }
}

fn clamp_scale(k: f64) -> f64 {
    if k.is_nan() { MIN_SCALE } else { k.clamp(MIN_SCALE, MAX_SCALE) }
}
