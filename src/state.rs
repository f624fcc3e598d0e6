use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use geo::{Centroid, Coord};

use crate::{
    config::Config,
    feature::Feature,
    loader::{LoadOutcome, LoadTicket, Loader},
    projection::Projection,
    rotation::{DragEvent, RotationController},
    scene::{Compositor, Dirty, RenderPass, Scene, Viewport},
    zoom::{ZoomController, ZoomGesture, ZoomTransform},
};

/// Degrees per arrow key press.
const KEY_ROTATE_STEP: f64 = 10.0;
/// Screen units per shifted arrow key press.
const KEY_PAN_STEP: f64 = 10.0;

#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Loading,
    Success,
    Failure(String),
}

/// Pointer input in screen coordinates of the globe viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down(Coord<f64>),
    Drag(Coord<f64>),
    Up(Coord<f64>),
    /// Wheel notches at a position; negative zooms in.
    Wheel { at: Coord<f64>, delta: f64 },
    Pinch { at: Coord<f64>, ratio: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Handler {
    Rotate,
    Zoom,
}

/// Handlers in the order they get to claim a pointer event. Rotation comes
/// first so drags are never taken as zoom pans.
const INPUT_HANDLERS: [Handler; 2] = [Handler::Rotate, Handler::Zoom];

pub struct AppState {
    pub config: Config,
    status: Status,
    loader: Loader,
    ticket: Option<LoadTicket>,
    projection: Projection,
    rotation: RotationController,
    zoom: ZoomController,
    compositor: Compositor,
    dirty: Dirty,
    viewport: Viewport,
    /// Selected feature index.
    selected: Option<usize>,
}

impl AppState {
    pub const HELP_TEXT: &'static str = "\
drag: rotate   wheel / + -: zoom   0: reset zoom
arrows: rotate   shift+arrows: pan
Tab / Shift+Tab: select   c: center on selection
r: reload   q: quit";

    pub fn new(config: Config) -> Self {
        Self {
            projection: Projection::new(config.scale),
            rotation: RotationController::new(),
            zoom: ZoomController::new(config.wheel_step),
            compositor: Compositor::new(config.layer_options()),
            config,
            status: Status::Loading,
            loader: Loader::new(),
            ticket: None,
            dirty: Dirty::default(),
            viewport: Viewport::default(),
            selected: None,
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn scene(&self) -> &Scene {
        self.compositor.scene()
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn zoom(&self) -> ZoomTransform {
        self.zoom.transform()
    }

    pub fn ticket(&self) -> Option<&LoadTicket> {
        self.ticket.as_ref()
    }

    /// Starts a tagged background load of the configured document.
    pub fn request_load(&mut self) -> LoadTicket {
        let ticket = self.loader.request(&self.config.source, &self.config.object);
        self.begin(ticket.clone());
        ticket
    }

    /// Loads on the calling thread through the same ticket bookkeeping.
    pub fn load_now(&mut self) -> &Status {
        let ticket = self.loader.tracker_mut().issue(&self.config.source, &self.config.object);
        self.begin(ticket.clone());
        let result = crate::loader::load(&ticket.source, &ticket.object);
        self.finish(LoadOutcome { ticket, result });
        &self.status
    }

    fn begin(&mut self, ticket: LoadTicket) {
        self.status = Status::Loading;
        self.ticket = Some(ticket);
        self.selected = None;
        self.rotation.reset();
        self.compositor.clear();
    }

    /// Applies whatever finished loading since the last call.
    pub fn poll_loads(&mut self) -> bool {
        match self.loader.poll() {
            Some(outcome) => {
                self.apply(outcome);
                true
            }
            None => false,
        }
    }

    fn finish(&mut self, outcome: LoadOutcome) {
        if self.loader.tracker_mut().accept(&outcome.ticket) {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: LoadOutcome) {
        match outcome.result {
            Ok(features) => {
                tracing::info!(id = outcome.ticket.id, features = features.len(), "view ready");
                self.compositor.set_features(features, &mut self.dirty);
                self.status = Status::Success;
            }
            Err(err) => {
                tracing::warn!(id = outcome.ticket.id, error = %err, "load json failed");
                self.compositor.clear();
                self.status = Status::Failure(err.to_string());
            }
        }
    }

    /// Globe and chart viewports, in their own screen units.
    pub fn resize(&mut self, globe: Viewport, chart: Viewport) {
        if globe != self.viewport {
            tracing::info!(width = globe.width, height = globe.height, "viewport changed");
            self.viewport = globe;
            self.projection.set_viewport(globe.width, globe.height);
            self.dirty.mark_projection();
        }
        self.compositor.set_chart_viewport(chart);
    }

    /// Brings the scene up to date. Nothing is drawn outside the Success state.
    pub fn frame(&mut self) -> RenderPass {
        if self.status != Status::Success {
            return RenderPass::Skipped;
        }
        self.compositor.render(&self.projection, self.zoom.transform(), &mut self.dirty)
    }

    /// Offers the event to each handler in registration order.
    pub fn dispatch(&mut self, event: PointerEvent) -> bool {
        if self.status != Status::Success {
            return false;
        }
        INPUT_HANDLERS.iter().any(|&handler| match handler {
            Handler::Rotate => self.rotate(event),
            Handler::Zoom => self.zoom_with(event),
        })
    }

    fn drag_event(&self, at: Coord<f64>) -> DragEvent {
        let [sx, sy] = self.config.drag_sensitivity;
        DragEvent::new(at.x * sx, at.y * sy)
    }

    fn rotate(&mut self, event: PointerEvent) -> bool {
        match event {
            PointerEvent::Down(at) => {
                let drag = self.drag_event(at);
                self.rotation.drag_start(drag, &self.projection);
            }
            PointerEvent::Drag(at) => {
                let drag = self.drag_event(at);
                self.rotation.drag_move(drag, &mut self.projection, &mut self.dirty);
            }
            PointerEvent::Up(at) => {
                let drag = self.drag_event(at);
                self.rotation.drag_end(drag);
            }
            PointerEvent::Wheel { .. } | PointerEvent::Pinch { .. } => return false,
        }
        true
    }

    fn zoom_with(&mut self, event: PointerEvent) -> bool {
        let gesture = match event {
            PointerEvent::Wheel { at, delta } => ZoomGesture::Wheel { delta, anchor: at },
            PointerEvent::Pinch { at, ratio } => ZoomGesture::Pinch { ratio, anchor: at },
            _ => return false,
        };
        self.zoom.handle(gesture, &mut self.dirty);
        true
    }

    fn center(&self) -> Coord<f64> {
        Coord { x: self.viewport.width / 2.0, y: self.viewport.height / 2.0 }
    }

    /// Returns true when the app should exit.
    pub fn handle_input(&mut self, key: KeyEvent) -> bool {
        use KeyCode::*;
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            Char('q') => return true,
            Char('r') => {
                self.request_load();
            }
            _ if self.status != Status::Success => {}
            Char('+') | Char('=') => {
                let anchor = self.center();
                self.zoom.handle(ZoomGesture::Wheel { delta: -1.0, anchor }, &mut self.dirty);
            }
            Char('-') => {
                let anchor = self.center();
                self.zoom.handle(ZoomGesture::Wheel { delta: 1.0, anchor }, &mut self.dirty);
            }
            Char('0') => {
                self.zoom.reset(&mut self.dirty);
            }
            Left | Right | Up | Down if shift => {
                let (dx, dy) = match key.code {
                    Left => (-KEY_PAN_STEP, 0.0),
                    Right => (KEY_PAN_STEP, 0.0),
                    Up => (0.0, -KEY_PAN_STEP),
                    _ => (0.0, KEY_PAN_STEP),
                };
                self.zoom.handle(ZoomGesture::Pan { dx, dy }, &mut self.dirty);
            }
            Left | Char('h') => self.nudge(KEY_ROTATE_STEP, 0.0),
            Right | Char('l') => self.nudge(-KEY_ROTATE_STEP, 0.0),
            Up | Char('k') => self.nudge(0.0, -KEY_ROTATE_STEP),
            Down | Char('j') => self.nudge(0.0, KEY_ROTATE_STEP),
            Tab => self.select_step(1),
            BackTab => self.select_step(-1),
            Char('c') => self.focus_selected(),
            _ => {}
        }
        false
    }

    fn nudge(&mut self, d_lambda: f64, d_phi: f64) {
        self.rotation.nudge(d_lambda, d_phi, &mut self.projection, &mut self.dirty);
    }

    /// Feature indices in ranking order, or decode order without a chart.
    fn ranking(&self) -> Vec<usize> {
        match &self.scene().chart {
            Some(chart) => chart.order(),
            None => (0..self.compositor.features().len()).collect(),
        }
    }

    fn select_step(&mut self, step: isize) {
        let ranking = self.ranking();
        if ranking.is_empty() {
            self.selected = None;
            return;
        }
        let len = ranking.len() as isize;
        let next = match self.selected.and_then(|s| ranking.iter().position(|&i| i == s)) {
            Some(pos) => (pos as isize + step).rem_euclid(len),
            None if step >= 0 => 0,
            None => len - 1,
        };
        self.selected = Some(ranking[next as usize]);
    }

    pub fn selected(&self) -> Option<(usize, &Feature)> {
        let index = self.selected?;
        self.compositor.features().get(index).map(|f| (index, f))
    }

    /// Rotates the globe so the selected region's centroid faces the viewer.
    pub fn focus_selected(&mut self) {
        let Some(centroid) = self
            .selected()
            .and_then(|(_, f)| f.geometry.as_ref())
            .and_then(|g| g.centroid())
        else {
            return;
        };
        self.rotation.center_on(centroid.x(), centroid.y(), &mut self.projection, &mut self.dirty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::LoadError, topology::decode_document};
    use crossterm::event::KeyEventState;
    use serde_json::json;

    fn document() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": "Topology",
            "arcs": [
                [[0.0, 0.0], [20.0, 0.0], [20.0, 20.0], [0.0, 0.0]],
                [[30.0, 0.0], [40.0, 0.0], [40.0, 10.0], [30.0, 0.0]]
            ],
            "objects": {
                "countries": {"type": "GeometryCollection", "geometries": [
                    {"type": "Polygon", "arcs": [[0]], "properties": {"NAME": "Big", "POP_EST": 900, "GDP_MD_EST": 3}},
                    {"type": "Polygon", "arcs": [[1]], "properties": {"NAME": "Small", "POP_EST": 100, "GDP_MD_EST": 7}}
                ]},
                "rivers": {"type": "LineString", "arcs": [0]},
                "cities": {"type": "MultiPoint", "coordinates": [[1.0, 1.0]]}
            }
        }))
        .unwrap()
    }

    fn config() -> Config {
        Config { drag_sensitivity: [1.0, 1.0], ..Config::default() }
    }

    fn ready() -> AppState {
        let mut state = AppState::new(config());
        state.resize(Viewport::new(400.0, 300.0), Viewport::new(200.0, 100.0));
        let ticket = state.loader.tracker_mut().issue("mem", "countries");
        state.begin(ticket.clone());
        state.finish(LoadOutcome { ticket, result: decode_document(&document(), "countries") });
        state
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent { code, modifiers: KeyModifiers::NONE, kind: crossterm::event::KeyEventKind::Press, state: KeyEventState::NONE }
    }

    #[test]
    fn success_renders_full_pipeline() {
        let mut state = ready();
        assert_eq!(state.status(), &Status::Success);
        assert_eq!(state.frame(), RenderPass::Full);
        assert_eq!(state.scene().globe.regions.len(), 2);
        assert!(state.scene().chart.is_some());
    }

    #[test]
    fn missing_object_is_failure_with_no_layers() {
        let mut state = AppState::new(config());
        state.resize(Viewport::new(400.0, 300.0), Viewport::new(200.0, 100.0));
        let ticket = state.loader.tracker_mut().issue("mem", "lakes");
        state.begin(ticket.clone());
        state.finish(LoadOutcome { ticket, result: decode_document(&document(), "lakes") });

        assert!(matches!(state.status(), Status::Failure(msg) if msg.contains("lakes")));
        assert_eq!(state.frame(), RenderPass::Skipped);
        assert!(state.scene().globe.regions.is_empty());
        assert!(state.scene().globe.sea.is_empty());
        assert!(state.scene().chart.is_none());
        assert!(!state.dispatch(PointerEvent::Down(Coord { x: 0.0, y: 0.0 })));
    }

    #[test]
    fn stale_outcome_does_not_replace_newer_load() {
        let mut state = ready();
        let stale = state.ticket().cloned().unwrap();
        let newer = state.loader.tracker_mut().issue("mem", "countries");
        state.begin(newer.clone());
        state.finish(LoadOutcome { ticket: newer, result: decode_document(&document(), "countries") });
        state.finish(LoadOutcome {
            ticket: stale,
            result: Err(LoadError::Parse(serde_json::from_str::<u8>("x").unwrap_err())),
        });
        assert_eq!(state.status(), &Status::Success);
        assert_eq!(state.compositor().features().len(), 2);
    }

    #[test]
    fn drag_rotates_and_preserves_zoom() {
        let mut state = ready();
        state.dispatch(PointerEvent::Wheel { at: Coord { x: 200.0, y: 150.0 }, delta: -2.0 });
        state.frame();
        let zoom = state.zoom();
        assert!(zoom.k > 1.0);

        assert!(state.dispatch(PointerEvent::Down(Coord { x: 0.0, y: 0.0 })));
        assert!(state.dispatch(PointerEvent::Drag(Coord { x: 40.0, y: 10.0 })));
        assert!(state.dirty.projection());
        assert_eq!(state.frame(), RenderPass::Full);
        assert_eq!(state.projection().rotation(), [40.0, -10.0, 0.0]);
        assert_eq!(state.scene().globe.rotation, [40.0, -10.0, 0.0]);
        assert_eq!(state.scene().transform, zoom);
        assert!(state.dispatch(PointerEvent::Up(Coord { x: 40.0, y: 10.0 })));
    }

    #[test]
    fn wheel_is_transform_only() {
        let mut state = ready();
        state.frame();
        let globe = state.scene().globe.clone();
        state.dispatch(PointerEvent::Wheel { at: Coord { x: 10.0, y: 10.0 }, delta: -1.0 });
        assert!(!state.dirty.projection());
        assert_eq!(state.frame(), RenderPass::TransformOnly);
        assert_eq!(state.scene().globe, globe);
    }

    #[test]
    fn reload_mid_drag_starts_idle() {
        let mut state = ready();
        state.dispatch(PointerEvent::Down(Coord { x: 0.0, y: 0.0 }));
        state.dispatch(PointerEvent::Drag(Coord { x: 10.0, y: 0.0 }));
        assert_eq!(state.projection().rotation(), [10.0, 0.0, 0.0]);

        let ticket = state.loader.tracker_mut().issue("mem", "countries");
        state.begin(ticket.clone());
        assert!(!state.rotation.is_dragging());
        state.finish(LoadOutcome { ticket, result: decode_document(&document(), "countries") });

        state.dispatch(PointerEvent::Drag(Coord { x: 60.0, y: 30.0 }));
        assert_eq!(state.projection().rotation(), [10.0, 0.0, 0.0]);
    }

    #[test]
    fn drags_never_reach_zoom() {
        let mut state = ready();
        state.frame();
        state.dispatch(PointerEvent::Down(Coord { x: 0.0, y: 0.0 }));
        state.dispatch(PointerEvent::Drag(Coord { x: 50.0, y: 0.0 }));
        assert_eq!(state.zoom(), ZoomTransform::IDENTITY);
    }

    #[test]
    fn tab_cycles_in_chart_order_and_focus_centers() {
        let mut state = ready();
        state.frame();
        state.handle_input(key(KeyCode::Tab));
        assert_eq!(state.selected().map(|(i, _)| i), Some(1));
        state.handle_input(key(KeyCode::Tab));
        assert_eq!(state.selected().map(|(i, _)| i), Some(0));
        state.handle_input(key(KeyCode::BackTab));
        assert_eq!(state.selected().map(|(i, _)| i), Some(1));

        state.handle_input(key(KeyCode::Char('c')));
        let [lambda, phi, gamma] = state.projection().rotation();
        assert!(lambda < -30.0 && lambda > -40.0);
        assert!(phi < 0.0);
        assert_eq!(gamma, 0.0);
        assert!(state.dirty.projection());
    }

    #[test]
    fn keyboard_zoom_and_quit() {
        let mut state = ready();
        assert!(!state.handle_input(key(KeyCode::Char('+'))));
        assert!(state.zoom().k > 1.0);
        state.handle_input(key(KeyCode::Char('0')));
        assert_eq!(state.zoom(), ZoomTransform::IDENTITY);
        assert!(state.handle_input(key(KeyCode::Char('q'))));
    }

    #[test]
    fn resize_dirties_projection() {
        let mut state = ready();
        state.frame();
        state.resize(Viewport::new(500.0, 300.0), Viewport::new(200.0, 100.0));
        assert!(state.dirty.projection());
        assert_eq!(state.projection().state().translate, [250.0, 150.0]);
    }

    #[test]
    fn single_geometries_load_too() {
        for key in ["rivers", "cities"] {
            let features = decode_document(&document(), key).unwrap();
            assert_eq!(features.len(), 1, "{key}");
        }
    }
}
