//! Orthographic globe projection.
//!
//! Geographic coordinates are rotated as unit vectors, clipped against the
//! visible hemisphere, resampled along great circles and only then flattened
//! onto the screen plane.

use geo::{Coord, Geometry, LineString, Polygon};

/// Longest great-circle step emitted between two projected points.
const MAX_STEP: f64 = 4.0 * std::f64::consts::PI / 180.0;
/// Horizon sampling interval for the sphere outline and rim closures.
const SPHERE_STEP_DEG: usize = 2;
const RIM_STEP: f64 = SPHERE_STEP_DEG as f64 * std::f64::consts::PI / 180.0;
/// Radius used for Point geometries, in screen units.
pub const POINT_RADIUS: f64 = 4.5;
const EPSILON: f64 = 1e-9;

/// Scale, translation and rotation of the orthographic projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionState {
    pub scale: f64,
    pub translate: [f64; 2],
    /// (λ, φ, γ) in degrees.
    pub rotation: [f64; 3],
}

/// One run of screen points. Closed runs end back at their first point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubPath {
    pub points: Vec<Coord<f64>>,
    pub closed: bool,
    /// Per point, whether it lies on the horizon of a clipped ring. Empty
    /// when no point does. Edges between two rim points follow the horizon.
    pub rim: Vec<bool>,
}

impl SubPath {
    pub fn new(points: Vec<Coord<f64>>, closed: bool) -> Self {
        Self { points, closed, rim: Vec::new() }
    }

    fn on_rim(&self, i: usize) -> bool {
        self.rim.get(i).copied().unwrap_or(false)
    }
}

/// Screen-space outline of a projected geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathDescriptor {
    pub subpaths: Vec<SubPath>,
}

impl PathDescriptor {
    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.points.is_empty())
    }

    /// SVG path data (`M`, `L`, `Z` commands).
    pub fn to_svg_data(&self) -> String {
        let mut out = String::new();
        for sub in &self.subpaths {
            for (i, p) in sub.points.iter().enumerate() {
                let cmd = if i == 0 { 'M' } else { 'L' };
                out.push_str(&format!("{cmd}{},{}", fmt_num(p.x), fmt_num(p.y)));
            }
            if sub.closed && !sub.points.is_empty() {
                out.push('Z');
            }
        }
        out
    }

    /// Consecutive point pairs, including the closing edge of closed runs.
    /// Edges running along the horizon are left out: they close fills but
    /// are not part of the outline.
    pub fn segments(&self) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
        self.subpaths.iter().flat_map(|sub| {
            let n = sub.points.len();
            let edges = if sub.closed && n > 2 { n } else { n.saturating_sub(1) };
            (0..edges)
                .map(move |i| (i, (i + 1) % n))
                .filter(move |&(a, b)| !(sub.on_rim(a) && sub.on_rim(b)))
                .map(move |(a, b)| (sub.points[a], sub.points[b]))
        })
    }
}

fn fmt_num(v: f64) -> String {
    let rounded = (v * 1000.0).round() / 1000.0;
    if rounded == 0.0 { "0".to_string() } else { rounded.to_string() }
}

/// Owns the projection state for one mounted view.
#[derive(Clone, Debug)]
pub struct Projection {
    state: ProjectionState,
}

impl Projection {
    /// A projection with the session scale constant, no rotation and a zero viewport.
    pub fn new(scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        Self {
            state: ProjectionState { scale, translate: [0.0, 0.0], rotation: [0.0, 0.0, 0.0] },
        }
    }

    pub fn state(&self) -> ProjectionState {
        self.state
    }

    pub fn rotation(&self) -> [f64; 3] {
        self.state.rotation
    }

    /// Sets λ and φ; γ is carried over.
    pub fn set_rotation(&mut self, lambda: f64, phi: f64) {
        self.state.rotation[0] = lambda;
        self.state.rotation[1] = phi;
    }

    /// Centers the globe in a `width` × `height` viewport. Scale is untouched.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        self.state.translate = if usable(width) && usable(height) {
            [width / 2.0, height / 2.0]
        } else {
            [0.0, 0.0]
        };
    }

    pub fn project(&self, geometry: &Geometry<f64>) -> PathDescriptor {
        Projector::new(&self.state).geometry(geometry)
    }

    pub fn project_point(&self, lon: f64, lat: f64) -> Option<Coord<f64>> {
        Projector::new(&self.state).point(lon, lat)
    }

    /// Great-circle line between two geographic points, clipped to the visible side.
    pub fn project_geodesic(&self, from: [f64; 2], to: [f64; 2]) -> PathDescriptor {
        let line = LineString::from(vec![(from[0], from[1]), (to[0], to[1])]);
        Projector::new(&self.state).geometry(&Geometry::LineString(line))
    }

    /// Outline of the whole visible sphere.
    pub fn sphere(&self) -> PathDescriptor {
        let [tx, ty] = self.state.translate;
        let r = self.state.scale;
        let points = (0..360)
            .step_by(SPHERE_STEP_DEG)
            .map(|deg| {
                let t = (deg as f64).to_radians();
                Coord { x: tx + r * t.cos(), y: ty - r * t.sin() }
            })
            .collect();
        PathDescriptor { subpaths: vec![SubPath::new(points, true)] }
    }
}

type Vec3 = [f64; 3];

/// Per-call snapshot of the rotation and screen mapping.
struct Projector {
    lambda: f64,
    cos_phi: f64,
    sin_phi: f64,
    cos_gamma: f64,
    sin_gamma: f64,
    scale: f64,
    translate: [f64; 2],
}

impl Projector {
    fn new(state: &ProjectionState) -> Self {
        let [l, p, g] = state.rotation.map(f64::to_radians);
        Self {
            lambda: l,
            cos_phi: p.cos(),
            sin_phi: p.sin(),
            cos_gamma: g.cos(),
            sin_gamma: g.sin(),
            scale: state.scale,
            translate: state.translate,
        }
    }

    /// Rotated unit vector; `x > 0` is the visible hemisphere.
    fn rotate(&self, lon: f64, lat: f64) -> Vec3 {
        let lambda = lon.to_radians() + self.lambda;
        let phi = lat.to_radians();
        let (x, y, z) = (lambda.cos() * phi.cos(), lambda.sin() * phi.cos(), phi.sin());
        let k = z * self.cos_phi + x * self.sin_phi;
        [
            x * self.cos_phi - z * self.sin_phi,
            y * self.cos_gamma - k * self.sin_gamma,
            k * self.cos_gamma + y * self.sin_gamma,
        ]
    }

    fn screen(&self, v: Vec3) -> Coord<f64> {
        Coord {
            x: self.translate[0] + self.scale * v[1],
            y: self.translate[1] - self.scale * v[2],
        }
    }

    fn point(&self, lon: f64, lat: f64) -> Option<Coord<f64>> {
        let v = self.rotate(lon, lat);
        (v[0] > EPSILON).then(|| self.screen(v))
    }

    fn geometry(&self, geometry: &Geometry<f64>) -> PathDescriptor {
        let mut out = PathDescriptor::default();
        self.append(geometry, &mut out);
        out
    }

    fn append(&self, geometry: &Geometry<f64>, out: &mut PathDescriptor) {
        match geometry {
            Geometry::Point(p) => self.append_point(p.x(), p.y(), out),
            Geometry::MultiPoint(mp) => mp.iter().for_each(|p| self.append_point(p.x(), p.y(), out)),
            Geometry::Line(l) => self.append_line(&[l.start, l.end], false, out),
            Geometry::LineString(ls) => self.append_line(&ls.0, false, out),
            Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| self.append_line(&ls.0, false, out)),
            Geometry::Polygon(p) => self.append_polygon(p, out),
            Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| self.append_polygon(p, out)),
            Geometry::Rect(r) => self.append_polygon(&r.to_polygon(), out),
            Geometry::Triangle(t) => self.append_polygon(&t.to_polygon(), out),
            Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| self.append(g, out)),
        }
    }

    fn append_point(&self, lon: f64, lat: f64, out: &mut PathDescriptor) {
        if let Some(c) = self.point(lon, lat) {
            let points = (0..12)
                .map(|i| {
                    let t = (i as f64) * std::f64::consts::TAU / 12.0;
                    Coord { x: c.x + POINT_RADIUS * t.cos(), y: c.y + POINT_RADIUS * t.sin() }
                })
                .collect();
            out.subpaths.push(SubPath::new(points, true));
        }
    }

    fn append_polygon(&self, polygon: &Polygon<f64>, out: &mut PathDescriptor) {
        self.append_line(&polygon.exterior().0, true, out);
        for ring in polygon.interiors() {
            self.append_line(&ring.0, true, out);
        }
    }

    fn append_line(&self, coords: &[Coord<f64>], ring: bool, out: &mut PathDescriptor) {
        let mut coords = coords;
        if ring && coords.len() > 1 && coords.first() == coords.last() {
            coords = &coords[..coords.len() - 1];
        }
        if coords.is_empty() {
            return;
        }

        let rotated: Vec<Vec3> = coords.iter().map(|c| self.rotate(c.x, c.y)).collect();
        let mut dense = densify(&rotated, ring);
        // Rings are walked counterclockwise around their interior, taken to
        // be the side smaller than a hemisphere.
        if ring && winding(&dense) < 0.0 {
            dense.reverse();
        }
        let visible = |v: &Vec3| v[0] > EPSILON;

        if dense.iter().all(visible) {
            let points = dense.iter().map(|&v| self.screen(v)).collect();
            out.subpaths.push(SubPath::new(points, ring));
            return;
        }
        if !dense.iter().any(visible) {
            return;
        }

        // Rings are walked from a hidden vertex so no run wraps around the seam.
        let sequence: Vec<Vec3> = if ring {
            let start = dense.iter().position(|v| !visible(v)).unwrap_or(0);
            let mut s: Vec<Vec3> = dense[start..].iter().chain(&dense[..start]).copied().collect();
            s.push(dense[start]);
            s
        } else {
            dense
        };

        let mut runs: Vec<Vec<Vec3>> = Vec::new();
        let mut run: Vec<Vec3> = Vec::new();
        if visible(&sequence[0]) {
            run.push(sequence[0]);
        }
        for pair in sequence.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            match (visible(&a), visible(&b)) {
                (true, true) => run.push(b),
                (true, false) => {
                    run.push(horizon(a, b));
                    runs.push(std::mem::take(&mut run));
                }
                (false, true) => {
                    run.push(horizon(a, b));
                    run.push(b);
                }
                (false, false) => {}
            }
        }
        if !run.is_empty() {
            runs.push(run);
        }

        if ring {
            self.close_along_rim(&runs, out);
        } else {
            for run in runs {
                let points = run.into_iter().map(|v| self.screen(v)).collect();
                out.subpaths.push(SubPath::new(points, false));
            }
        }
    }

    /// Joins the visible runs of a clipped ring into closed shapes. Every run
    /// enters and leaves through the horizon; from each exit the horizon is
    /// followed counterclockwise up to the next entry.
    fn close_along_rim(&self, runs: &[Vec<Vec3>], out: &mut PathDescriptor) {
        let mut used = vec![false; runs.len()];
        for start in 0..runs.len() {
            if used[start] || runs[start].len() < 2 {
                continue;
            }
            let mut sub = SubPath { closed: true, ..SubPath::default() };
            let mut current = start;
            loop {
                used[current] = true;
                let run = &runs[current];
                let last = run.len() - 1;
                for (i, &v) in run.iter().enumerate() {
                    sub.points.push(self.screen(v));
                    sub.rim.push(i == 0 || i == last);
                }

                let exit = rim_angle(run[last]);
                let next = (0..runs.len())
                    .filter(|&j| j == start || (!used[j] && runs[j].len() >= 2))
                    .min_by(|&a, &b| {
                        rim_gap(exit, rim_angle(runs[a][0])).total_cmp(&rim_gap(exit, rim_angle(runs[b][0])))
                    })
                    .unwrap_or(start);

                let gap = rim_gap(exit, rim_angle(runs[next][0]));
                let steps = (gap / RIM_STEP).ceil() as usize;
                for k in 1..steps {
                    let t = exit + gap * k as f64 / steps as f64;
                    sub.points.push(self.screen([0.0, t.cos(), t.sin()]));
                    sub.rim.push(true);
                }

                if next == start {
                    break;
                }
                current = next;
            }
            out.subpaths.push(sub);
        }
    }
}

/// Angle of a horizon point on the screen disk, counterclockwise from east.
fn rim_angle(v: Vec3) -> f64 {
    v[2].atan2(v[1])
}

/// Counterclockwise angular distance from `from` to `to`, in [0, 2π).
fn rim_gap(from: f64, to: f64) -> f64 {
    (to - from).rem_euclid(std::f64::consts::TAU)
}

/// Signed turning of a closed ring around its mean direction; positive when
/// counterclockwise as seen from outside the sphere.
fn winding(ring: &[Vec3]) -> f64 {
    let sum = ring.iter().fold([0.0; 3], |acc, v| [acc[0] + v[0], acc[1] + v[1], acc[2] + v[2]]);
    let center = normalize(sum);
    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(&a, &b)| dot(center, cross(a, b)))
        .sum()
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Point where the great circle a→b crosses the horizon plane `x = 0`.
fn horizon(a: Vec3, b: Vec3) -> Vec3 {
    let t = a[0] / (a[0] - b[0]);
    normalize([
        0.0,
        a[1] + t * (b[1] - a[1]),
        a[2] + t * (b[2] - a[2]),
    ])
}

fn normalize(v: Vec3) -> Vec3 {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len < EPSILON { v } else { v.map(|c| c / len) }
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Inserts spherical interpolations so no step exceeds `MAX_STEP`.
fn densify(points: &[Vec3], ring: bool) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(points.len());
    let edges = if ring { points.len() } else { points.len().saturating_sub(1) };
    if let Some(&first) = points.first() {
        out.push(first);
    }
    for i in 0..edges {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let theta = dot(a, b).clamp(-1.0, 1.0).acos();
        let sin_theta = theta.sin();
        let steps = (theta / MAX_STEP).ceil() as usize;
        if steps > 1 && sin_theta > EPSILON {
            for s in 1..steps {
                let t = s as f64 / steps as f64;
                let wa = ((1.0 - t) * theta).sin() / sin_theta;
                let wb = (t * theta).sin() / sin_theta;
                out.push([wa * a[0] + wb * b[0], wa * a[1] + wb * b[1], wa * a[2] + wb * b[2]]);
            }
        }
        // The ring's closing vertex is the first point, already present.
        if !(ring && i + 1 == points.len()) {
            out.push(b);
        }
    }
    out
}
