//! Layer compositing.
//!
//! The globe group (sea, regions, connector, markers) is projected in one
//! pass from a single projection snapshot and carries the zoom transform as
//! an attribute. Rotation dirties the projection and forces a full pass;
//! zoom dirties only the transform, which is copied without re-projecting.

use geo::Coord;

use crate::{
    chart::BarChart,
    color::{ColorScale, Rgb, color_of},
    feature::FeatureSet,
    projection::{PathDescriptor, Projection},
    zoom::ZoomTransform,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Pending work for the next frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dirty {
    projection: bool,
    transform: bool,
}

impl Dirty {
    /// Projection parameters changed: every projected layer must be redrawn.
    pub fn mark_projection(&mut self) {
        self.projection = true;
    }

    /// Only the zoom transform changed.
    pub fn mark_transform(&mut self) {
        self.transform = true;
    }

    pub fn projection(&self) -> bool {
        self.projection
    }

    pub fn transform(&self) -> bool {
        self.transform
    }

    pub fn is_clean(&self) -> bool {
        !self.projection && !self.transform
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What a call to [`Compositor::render`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPass {
    Skipped,
    TransformOnly,
    Full,
}

/// Which properties feed which layer, plus the fixed overlay geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerOptions {
    pub color_property: String,
    pub chart_property: String,
    pub name_property: String,
    /// `[lon, lat]` endpoints of the connector line and its markers.
    pub connector: [[f64; 2]; 2],
    /// Marker radius in screen units, unaffected by zoom.
    pub marker_radius: f64,
    pub chart_ticks: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegionShape {
    /// Index into the feature set.
    pub feature: usize,
    pub name: String,
    pub fill: Rgb,
    pub path: PathDescriptor,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    pub center: Coord<f64>,
    pub radius: f64,
}

/// Layers 1-4, all projected from the same rotation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobeLayers {
    pub sea: PathDescriptor,
    pub regions: Vec<RegionShape>,
    pub connector: PathDescriptor,
    /// Only markers on the visible hemisphere.
    pub markers: Vec<Marker>,
    /// Rotation the layers were projected with.
    pub rotation: [f64; 3],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub globe: GlobeLayers,
    pub transform: ZoomTransform,
    pub chart: Option<BarChart>,
}

pub struct Compositor {
    options: LayerOptions,
    features: FeatureSet,
    color_scale: Option<ColorScale>,
    chart_viewport: Viewport,
    scene: Scene,
    full_passes: u64,
}

impl Compositor {
    pub fn new(options: LayerOptions) -> Self {
        Self {
            options,
            features: Vec::new(),
            color_scale: None,
            chart_viewport: Viewport::default(),
            scene: Scene::default(),
            full_passes: 0,
        }
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn color_scale(&self) -> Option<&ColorScale> {
        self.color_scale.as_ref()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Replaces the feature set: rebuilds the color scale and the chart and
    /// marks the projection dirty.
    pub fn set_features(&mut self, features: FeatureSet, dirty: &mut Dirty) {
        self.features = features;
        self.color_scale = ColorScale::build(&self.features, &self.options.color_property);
        if self.color_scale.is_none() {
            tracing::info!(
                property = %self.options.color_property,
                "no feature carries the color property, regions use the fallback fill"
            );
        }
        self.rebuild_chart();
        dirty.mark_projection();
    }

    /// Drops the feature set and every layer drawn from it.
    pub fn clear(&mut self) {
        self.features.clear();
        self.color_scale = None;
        self.scene = Scene { transform: self.scene.transform, ..Scene::default() };
    }

    pub fn set_chart_viewport(&mut self, viewport: Viewport) {
        if viewport != self.chart_viewport {
            self.chart_viewport = viewport;
            self.rebuild_chart();
        }
    }

    /// Brings the scene up to date with `dirty` and clears it.
    pub fn render(&mut self, projection: &Projection, zoom: ZoomTransform, dirty: &mut Dirty) -> RenderPass {
        if dirty.is_clean() {
            return RenderPass::Skipped;
        }
        let pass = if dirty.projection() {
            self.draw_globe(projection);
            RenderPass::Full
        } else {
            RenderPass::TransformOnly
        };
        self.scene.transform = zoom;
        dirty.clear();
        pass
    }

    fn draw_globe(&mut self, projection: &Projection) {
        let state = projection.state();
        let [from, to] = self.options.connector;

        let regions = self
            .features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                let geometry = f.geometry.as_ref()?;
                Some(RegionShape {
                    feature: i,
                    name: f.name(&self.options.name_property),
                    fill: color_of(f, self.color_scale.as_ref()),
                    path: projection.project(geometry),
                })
            })
            .collect();

        let markers = [from, to]
            .iter()
            .filter_map(|&[lon, lat]| projection.project_point(lon, lat))
            .map(|center| Marker { center, radius: self.options.marker_radius })
            .collect();

        self.scene.globe = GlobeLayers {
            sea: projection.sphere(),
            regions,
            connector: projection.project_geodesic(from, to),
            markers,
            rotation: state.rotation,
        };
        self.full_passes += 1;
        tracing::debug!(pass = self.full_passes, rotation = ?state.rotation, regions = self.features.len(), "projected globe layers");
    }

    fn rebuild_chart(&mut self) {
        self.scene.chart = BarChart::build(
            &self.features,
            &self.options.chart_property,
            &self.options.name_property,
            self.chart_viewport,
            self.options.chart_ticks,
        );
        if self.scene.chart.is_none() && !self.features.is_empty() {
            tracing::info!(property = %self.options.chart_property, "bar chart skipped, no values");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{color::FALLBACK, feature::Feature};
    use geo::{Geometry, LineString, Polygon};
    use geojson::JsonObject;
    use serde_json::json;

    fn options() -> LayerOptions {
        LayerOptions {
            color_property: "POP_EST".into(),
            chart_property: "GDP_MD_EST".into(),
            name_property: "NAME".into(),
            connector: [[-10.0, 0.0], [10.0, 0.0]],
            marker_radius: 3.0,
            chart_ticks: 10,
        }
    }

    fn region(name: &str, lon: f64, props: serde_json::Value) -> Feature {
        let ring = LineString::from(vec![(lon, 0.0), (lon + 5.0, 0.0), (lon + 5.0, 5.0), (lon, 0.0)]);
        let mut properties: JsonObject = match props {
            serde_json::Value::Object(m) => m,
            _ => JsonObject::new(),
        };
        properties.insert("NAME".into(), json!(name));
        Feature::new(Some(Geometry::Polygon(Polygon::new(ring, vec![]))), properties)
    }

    fn setup() -> (Compositor, Projection, Dirty) {
        let mut projection = Projection::new(100.0);
        projection.set_viewport(300.0, 300.0);
        let mut compositor = Compositor::new(options());
        compositor.set_chart_viewport(Viewport::new(300.0, 200.0));
        let mut dirty = Dirty::default();
        compositor.set_features(
            vec![
                region("a", 0.0, json!({"POP_EST": 10, "GDP_MD_EST": 5})),
                region("b", 20.0, json!({"POP_EST": 1000, "GDP_MD_EST": 50})),
            ],
            &mut dirty,
        );
        (compositor, projection, dirty)
    }

    #[test]
    fn first_render_draws_every_layer() {
        let (mut c, p, mut dirty) = setup();
        assert_eq!(c.render(&p, ZoomTransform::IDENTITY, &mut dirty), RenderPass::Full);
        let scene = c.scene();
        assert!(!scene.globe.sea.is_empty());
        assert_eq!(scene.globe.regions.len(), 2);
        assert!(!scene.globe.connector.is_empty());
        assert_eq!(scene.globe.markers.len(), 2);
        assert_eq!(scene.chart.as_ref().map(|c| c.bars.len()), Some(2));
        assert!(dirty.is_clean());
    }

    #[test]
    fn clean_frames_are_identical() {
        let (mut c, p, mut dirty) = setup();
        c.render(&p, ZoomTransform::IDENTITY, &mut dirty);
        let first = c.scene().clone();
        assert_eq!(c.render(&p, ZoomTransform::IDENTITY, &mut dirty), RenderPass::Skipped);
        dirty.mark_projection();
        c.render(&p, ZoomTransform::IDENTITY, &mut dirty);
        assert_eq!(c.scene(), &first);
    }

    #[test]
    fn zoom_only_retransforms() {
        let (mut c, p, mut dirty) = setup();
        c.render(&p, ZoomTransform::IDENTITY, &mut dirty);
        let globe = c.scene().globe.clone();
        let passes = c.full_passes;

        dirty.mark_transform();
        let zoom = ZoomTransform { k: 3.0, x: -20.0, y: 5.0 };
        assert_eq!(c.render(&p, zoom, &mut dirty), RenderPass::TransformOnly);
        assert_eq!(c.full_passes, passes);
        assert_eq!(c.scene().globe, globe);
        assert_eq!(c.scene().transform, zoom);
    }

    #[test]
    fn rotation_redraws_all_layers_and_keeps_zoom() {
        let (mut c, mut p, mut dirty) = setup();
        let zoom = ZoomTransform { k: 2.0, x: 1.0, y: 1.0 };
        c.render(&p, zoom, &mut dirty);
        let before = c.scene().globe.clone();
        let chart = c.scene().chart.clone();

        p.set_rotation(40.0, -10.0);
        dirty.mark_projection();
        assert_eq!(c.render(&p, zoom, &mut dirty), RenderPass::Full);
        let after = &c.scene().globe;
        assert_eq!(after.rotation, [40.0, -10.0, 0.0]);
        assert_ne!(after.regions, before.regions);
        assert_ne!(after.connector, before.connector);
        assert_ne!(after.markers, before.markers);
        assert_eq!(c.scene().transform, zoom);
        assert_eq!(c.scene().chart, chart);
    }

    #[test]
    fn fills_follow_color_property() {
        let (mut c, p, mut dirty) = setup();
        c.render(&p, ZoomTransform::IDENTITY, &mut dirty);
        let regions = &c.scene().globe.regions;
        assert_ne!(regions[0].fill, regions[1].fill);
        assert_ne!(regions[0].fill, FALLBACK);
    }

    #[test]
    fn region_without_population_uses_fallback() {
        let mut c = Compositor::new(options());
        let p = Projection::new(100.0);
        let mut dirty = Dirty::default();
        c.set_features(vec![region("lonely", 0.0, json!({}))], &mut dirty);
        c.render(&p, ZoomTransform::IDENTITY, &mut dirty);
        assert_eq!(c.scene().globe.regions[0].fill, FALLBACK);
        assert!(c.color_scale().is_none());
        assert!(c.scene().chart.is_none());
    }

    #[test]
    fn hidden_markers_are_dropped() {
        let (mut c, mut p, mut dirty) = setup();
        p.set_rotation(180.0, 0.0);
        c.render(&p, ZoomTransform::IDENTITY, &mut dirty);
        assert!(c.scene().globe.markers.is_empty());
        assert!(c.scene().globe.connector.is_empty());
    }

    #[test]
    fn clear_keeps_transform_only() {
        let (mut c, p, mut dirty) = setup();
        let zoom = ZoomTransform { k: 4.0, x: 0.0, y: 0.0 };
        c.render(&p, zoom, &mut dirty);
        c.clear();
        assert!(c.features().is_empty());
        assert!(c.scene().globe.regions.is_empty());
        assert!(c.scene().chart.is_none());
        assert_eq!(c.scene().transform, zoom);
    }
}
