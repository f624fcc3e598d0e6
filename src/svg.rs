//! Standalone SVG rendering of a scene.
//!
//! The globe group sits in the top `width` × `height` box with the zoom
//! transform on the group; the chart group follows underneath, untransformed.

use std::fmt::Write;

use crate::{chart::BarChart, scene::Scene};

const SEA_FILL: &str = "#a8d5f2";
const CONNECTOR_STROKE: &str = "#1f3b73";
const MARKER_FILL: &str = "#d62728";
const BAR_FILL: &str = "steelblue";

pub fn render(scene: &Scene, width: f64, globe_height: f64, chart_height: f64) -> String {
    let mut out = String::new();
    let total = globe_height + chart_height;
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{total}" viewBox="0 0 {width} {total}">"#
    );

    let globe = &scene.globe;
    let k = scene.transform.k;
    let [lambda, phi, gamma] = globe.rotation;
    let _ = writeln!(
        out,
        r#"<g class="globe" transform="{}" data-rotate="{lambda},{phi},{gamma}">"#,
        scene.transform.to_svg()
    );
    let _ = writeln!(out, r#"<path class="sea" d="{}" fill="{SEA_FILL}"/>"#, globe.sea.to_svg_data());
    out.push_str("<g class=\"regions\">\n");
    for region in &globe.regions {
        let _ = writeln!(
            out,
            r#"<path class="shape item" d="{}" fill="{}" fill-rule="evenodd" stroke="white" stroke-width="0.1"><title>{}</title></path>"#,
            region.path.to_svg_data(),
            region.fill.to_hex(),
            escape(&region.name)
        );
    }
    out.push_str("</g>\n");
    let _ = writeln!(
        out,
        r#"<path class="connector" d="{}" fill="none" stroke="{CONNECTOR_STROKE}" stroke-width="{}"/>"#,
        globe.connector.to_svg_data(),
        2.0 / k
    );
    for marker in &globe.markers {
        // Radius is divided by k so the marker keeps its pixel size under zoom.
        let _ = writeln!(
            out,
            r#"<circle class="marker" cx="{}" cy="{}" r="{}" fill="{MARKER_FILL}"/>"#,
            marker.center.x,
            marker.center.y,
            marker.radius / k
        );
    }
    out.push_str("</g>\n");

    if let Some(chart) = &scene.chart {
        render_chart(&mut out, chart, globe_height);
    }
    out.push_str("</svg>\n");
    out
}

fn render_chart(out: &mut String, chart: &BarChart, offset: f64) {
    let _ = writeln!(out, r#"<g class="chart" transform="translate(0,{offset})">"#);
    for bar in &chart.bars {
        let _ = writeln!(
            out,
            r#"<rect class="bar" x="{}" y="{}" width="{}" height="{}" fill="{BAR_FILL}"><title>{}</title></rect>"#,
            bar.x,
            bar.y,
            bar.width,
            bar.height,
            escape(&bar.label)
        );
    }
    let axis_x = chart.bars.first().map(|b| b.x).unwrap_or(0.0) - 4.0;
    let _ = writeln!(out, r#"<g class="axis" font-size="10" text-anchor="end">"#);
    for tick in &chart.ticks {
        let _ = writeln!(
            out,
            r#"<g class="tick" data-value="{}" transform="translate({axis_x},{})"><line x2="-6" stroke="currentColor"/><text x="-9" dy="0.32em">{}</text></g>"#,
            tick.value,
            tick.y,
            escape(&tick.label)
        );
    }
    out.push_str("</g>\n</g>\n");
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        feature::Feature,
        projection::Projection,
        scene::{Compositor, Dirty, LayerOptions, Viewport},
        zoom::ZoomTransform,
    };
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
            chart_ticks: 5,
        }
    }

    fn scene(zoom: ZoomTransform) -> Scene {
        let mut props = JsonObject::new();
        props.insert("NAME".into(), json!("Côte <d'Ivoire>"));
        props.insert("POP_EST".into(), json!(10));
        props.insert("GDP_MD_EST".into(), json!(20));
        let ring = LineString::from(vec![(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 0.0)]);
        let feature = Feature::new(Some(Geometry::Polygon(Polygon::new(ring, vec![]))), props);

        let mut projection = Projection::new(100.0);
        projection.set_viewport(300.0, 300.0);
        let mut compositor = Compositor::new(options());
        compositor.set_chart_viewport(Viewport::new(300.0, 120.0));
        let mut dirty = Dirty::default();
        compositor.set_features(vec![feature], &mut dirty);
        compositor.render(&projection, zoom, &mut dirty);
        compositor.scene().clone()
    }

    #[test]
    fn layers_appear_in_z_order() {
        let svg = render(&scene(ZoomTransform::IDENTITY), 300.0, 300.0, 120.0);
        let position = |needle: &str| svg.find(needle).unwrap_or_else(|| panic!("missing {needle}"));
        let order = [
            position(r#"class="globe""#),
            position(r#"class="sea""#),
            position(r#"class="shape item""#),
            position(r#"class="connector""#),
            position(r#"class="marker""#),
            position(r#"class="chart""#),
            position(r#"class="bar""#),
            position(r#"class="tick""#),
        ];
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{order:?}");
        assert_eq!(svg.matches(r#"class="marker""#).count(), 2);
    }

    #[test]
    fn zoom_lives_on_globe_group_only() {
        let zoom = ZoomTransform { k: 2.0, x: -150.0, y: -150.0 };
        let svg = render(&scene(zoom), 300.0, 300.0, 120.0);
        assert!(svg.contains(r#"<g class="globe" transform="translate(-150,-150) scale(2)" data-rotate="0,0,0">"#));
        assert!(svg.contains(r#"<g class="chart" transform="translate(0,300)">"#));
        assert!(svg.contains(r#"r="1.5""#));
    }

    #[test]
    fn limb_regions_fill_up_to_the_rim() {
        let mut props = JsonObject::new();
        props.insert("NAME".into(), json!("Limb"));
        let ring = LineString::from(vec![(60.0, -40.0), (120.0, -40.0), (120.0, 40.0), (60.0, 40.0), (60.0, -40.0)]);
        let feature = Feature::new(Some(Geometry::Polygon(Polygon::new(ring, vec![]))), props);
        let mut projection = Projection::new(100.0);
        projection.set_viewport(300.0, 300.0);
        let mut compositor = Compositor::new(options());
        let mut dirty = Dirty::default();
        compositor.set_features(vec![feature], &mut dirty);
        compositor.render(&projection, ZoomTransform::IDENTITY, &mut dirty);

        let svg = render(compositor.scene(), 300.0, 300.0, 0.0);
        let region = svg.lines().find(|l| l.contains(r#"class="shape item""#)).unwrap();
        assert!(region.contains(r#"fill-rule="evenodd""#));
        assert_eq!(region.matches('M').count(), 1);
        assert!(region.contains("Z\""));
        let east = region
            .split('L')
            .skip(1)
            .filter_map(|p| p.split(',').next()?.parse::<f64>().ok())
            .fold(f64::MIN, f64::max);
        assert!(east > 249.9, "region stops at x = {east}");
    }

    #[test]
    fn names_are_escaped() {
        let svg = render(&scene(ZoomTransform::IDENTITY), 300.0, 300.0, 120.0);
        assert!(svg.contains("Côte &lt;d&apos;Ivoire&gt;"));
        assert!(!svg.contains("<d'Ivoire>"));
    }
}
