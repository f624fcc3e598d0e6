//! Drag-to-rotate.
//!
//! At drag start the current rotation is captured as the drag subject
//! `(λ, −φ)`. Every move offsets the subject by the pointer travel since the
//! start and writes the result back as `(x, −y)`, so each drag continues from
//! wherever the globe was left.

use crate::{projection::Projection, scene::Dirty};

/// Pointer position in drag space (degrees).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragEvent {
    pub x: f64,
    pub y: f64,
}

impl DragEvent {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RotationState {
    Idle,
    Dragging {
        /// `(λ, −φ)` captured at drag start.
        subject: [f64; 2],
        /// Pointer position at drag start.
        origin: [f64; 2],
    },
}

#[derive(Debug)]
pub struct RotationController {
    state: RotationState,
}

impl Default for RotationController {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationController {
    pub fn new() -> Self {
        Self { state: RotationState::Idle }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, RotationState::Dragging { .. })
    }

    pub fn drag_start(&mut self, event: DragEvent, projection: &Projection) {
        let [lambda, phi, _] = projection.rotation();
        self.state = RotationState::Dragging {
            subject: [lambda, -phi],
            origin: [event.x, event.y],
        };
        tracing::debug!(lambda, phi, "drag started");
    }

    /// Applies a move while dragging. Returns whether the rotation changed.
    pub fn drag_move(&mut self, event: DragEvent, projection: &mut Projection, dirty: &mut Dirty) -> bool {
        let RotationState::Dragging { subject, origin } = self.state else {
            return false;
        };
        let x = subject[0] + (event.x - origin[0]);
        let y = subject[1] + (event.y - origin[1]);
        self.apply(x, -y, projection, dirty)
    }

    pub fn drag_end(&mut self, _event: DragEvent) {
        if self.is_dragging() {
            tracing::debug!("drag ended");
        }
        self.state = RotationState::Idle;
    }

    /// Drops an unfinished drag without touching the rotation.
    pub fn reset(&mut self) {
        self.state = RotationState::Idle;
    }

    /// Rotates by a fixed step, the way a keyboard arrow does.
    pub fn nudge(&mut self, d_lambda: f64, d_phi: f64, projection: &mut Projection, dirty: &mut Dirty) -> bool {
        let [lambda, phi, _] = projection.rotation();
        self.apply(lambda + d_lambda, phi + d_phi, projection, dirty)
    }

    /// Turns the globe so that (lon, lat) faces the viewer.
    pub fn center_on(&mut self, lon: f64, lat: f64, projection: &mut Projection, dirty: &mut Dirty) -> bool {
        self.apply(-lon, -lat, projection, dirty)
    }

    fn apply(&mut self, lambda: f64, phi: f64, projection: &mut Projection, dirty: &mut Dirty) -> bool {
        let [old_lambda, old_phi, _] = projection.rotation();
        if old_lambda == lambda && old_phi == phi {
            return false;
        }
        projection.set_rotation(lambda, phi);
        dirty.mark_projection();
        true
    }
}
