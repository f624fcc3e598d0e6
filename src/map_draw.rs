//! Globe group drawing on a braille canvas.
//!
//! One canvas unit is one braille dot, so the globe viewport is twice the
//! inner width and four times the inner height of the map panel.

use geo::Coord;
use ratatui::{
    Frame,
    layout::Rect,
    style::Color,
    symbols::Marker,
    widgets::{
        Block, Borders,
        canvas::{Canvas, Circle, Context, Line},
    },
};

use crate::{
    projection::PathDescriptor,
    scene::{Scene, Viewport},
    zoom::ZoomTransform,
};

const DOTS_X: u16 = 2;
const DOTS_Y: u16 = 4;

const SEA: Color = Color::Rgb(0x2b, 0x5d, 0x8a);
const CONNECTOR: Color = Color::Yellow;
const MARKER: Color = Color::LightRed;
const HIGHLIGHT: Color = Color::Red;

/// Globe viewport for a panel's inner area.
pub fn viewport(inner: Rect) -> Viewport {
    Viewport::new(f64::from(inner.width * DOTS_X), f64::from(inner.height * DOTS_Y))
}

/// Terminal cell to globe screen coordinates; `None` outside the panel.
pub fn to_screen(inner: Rect, column: u16, row: u16) -> Option<Coord<f64>> {
    let inside = column >= inner.x
        && column < inner.x + inner.width
        && row >= inner.y
        && row < inner.y + inner.height;
    inside.then(|| Coord {
        x: f64::from((column - inner.x) * DOTS_X) + 1.0,
        y: f64::from((row - inner.y) * DOTS_Y) + 2.0,
    })
}

/// Draws sea, regions, connector and markers, then the highlighted region on top.
pub fn render(f: &mut Frame, area: Rect, title: &str, scene: &Scene, highlight: Option<usize>) {
    let block = Block::default().title(title.to_string()).borders(Borders::ALL);
    let view = viewport(block.inner(area));
    let globe = &scene.globe;
    let zoom = scene.transform;

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, view.width])
        .y_bounds([0.0, view.height])
        .paint(move |ctx| {
            // 1) sea
            draw_path(ctx, &globe.sea, zoom, view, SEA);
            // 2) regions in their choropleth color
            for region in &globe.regions {
                draw_path(ctx, &region.path, zoom, view, region.fill.into());
            }
            // 3) connector
            draw_path(ctx, &globe.connector, zoom, view, CONNECTOR);
            // 4) markers, radius in dots whatever the zoom
            for marker in &globe.markers {
                let c = to_canvas(zoom.apply(marker.center), view);
                ctx.draw(&Circle { x: c.x, y: c.y, radius: marker.radius, color: MARKER });
            }

            if let Some(selected) = highlight {
                ctx.layer();
                for region in globe.regions.iter().filter(|r| r.feature == selected) {
                    draw_path(ctx, &region.path, zoom, view, HIGHLIGHT);
                }
            }
        });
    f.render_widget(canvas, area);
}

fn draw_path(ctx: &mut Context, path: &PathDescriptor, zoom: ZoomTransform, view: Viewport, color: Color) {
    for (a, b) in path.segments() {
        let a = to_canvas(zoom.apply(a), view);
        let b = to_canvas(zoom.apply(b), view);
        ctx.draw(&Line { x1: a.x, y1: a.y, x2: b.x, y2: b.y, color });
    }
}

/// Canvas y grows upwards, screen y downwards.
fn to_canvas(p: Coord<f64>, view: Viewport) -> Coord<f64> {
    Coord { x: p.x, y: view.height - p.y }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_counts_braille_dots() {
        let inner = Rect::new(1, 1, 40, 20);
        assert_eq!(viewport(inner), Viewport::new(80.0, 80.0));
    }

    #[test]
    fn cells_map_to_dot_centers() {
        let inner = Rect::new(1, 1, 40, 20);
        assert_eq!(to_screen(inner, 1, 1), Some(Coord { x: 1.0, y: 2.0 }));
        assert_eq!(to_screen(inner, 11, 6), Some(Coord { x: 21.0, y: 22.0 }));
        assert_eq!(to_screen(inner, 0, 5), None);
        assert_eq!(to_screen(inner, 41, 5), None);
    }

    #[test]
    fn canvas_flips_y() {
        let view = Viewport::new(80.0, 80.0);
        assert_eq!(to_canvas(Coord { x: 5.0, y: 10.0 }, view), Coord { x: 5.0, y: 70.0 });
    }
}
