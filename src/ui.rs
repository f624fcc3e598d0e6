use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Bar, BarChart as BarChartWidget, BarGroup, Block, Borders, Paragraph, Wrap},
};

use crate::{
    chart::{BarChart, MARGIN, format_value},
    map_draw,
    scene::Viewport,
    state::{AppState, Status},
};

/// Chart layout units per terminal cell.
const CHART_UNITS_PER_CELL: f64 = 10.0;
/// Resolution handed to the bar widget for the scaled heights.
const BAR_RESOLUTION: f64 = 1000.0;

/// Screen regions for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Areas {
    pub map: Rect,
    pub map_inner: Rect,
    pub chart: Rect,
    pub info: Rect,
}

pub fn areas(size: Rect) -> Areas {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(size);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(chunks[1]);
    Areas {
        map: chunks[0],
        map_inner: Block::default().borders(Borders::ALL).inner(chunks[0]),
        chart: right[0],
        info: right[1],
    }
}

/// Globe and chart viewports for the given layout.
pub fn viewports(areas: &Areas) -> (Viewport, Viewport) {
    let chart_inner = Block::default().borders(Borders::ALL).inner(areas.chart);
    let chart = Viewport::new(
        f64::from(chart_inner.width) * CHART_UNITS_PER_CELL,
        f64::from(chart_inner.height) * CHART_UNITS_PER_CELL,
    );
    (map_draw::viewport(areas.map_inner), chart)
}

pub fn draw(f: &mut Frame, state: &AppState) {
    let areas = areas(f.area());
    match state.status() {
        Status::Loading => {
            let request = state.ticket().map(|t| format!(" #{}", t.id)).unwrap_or_default();
            let txt = Paragraph::new(format!(
                "Loading{request} ...\n\n{}\n{}",
                state.config.source, state.config.object
            ))
                .block(Block::default().borders(Borders::ALL).title("Globe"))
                .wrap(Wrap { trim: true });
            f.render_widget(txt, f.area());
        }
        Status::Failure(reason) => {
            let txt = Paragraph::new(format!("load json failed\n\n{reason}"))
                .block(Block::default().borders(Borders::ALL).title("Globe"))
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true });
            f.render_widget(txt, f.area());
        }
        Status::Success => {
            let scene = state.scene();
            let selected = state.selected().map(|(i, _)| i);
            let title = format!("{} / {}", state.config.source, state.config.object);
            map_draw::render(f, areas.map, &title, scene, selected);
            draw_chart(f, areas.chart, scene.chart.as_ref(), selected);
            draw_info(f, areas.info, state);
        }
    }
}

fn draw_chart(f: &mut Frame, area: Rect, chart: Option<&BarChart>, selected: Option<usize>) {
    let Some(chart) = chart else {
        let txt = Paragraph::new("No values to rank")
            .block(Block::default().borders(Borders::ALL).title("Ranking"));
        f.render_widget(txt, area);
        return;
    };

    let plot_height = (chart.baseline - MARGIN[0]).max(f64::EPSILON);
    let rows = usize::from(area.height.saturating_sub(2)).max(1);
    let position = selected.and_then(|s| chart.bars.iter().position(|b| b.feature == s)).unwrap_or(0);
    let skip = (position + 1).saturating_sub(rows);

    let bars: Vec<Bar> = chart
        .bars
        .iter()
        .skip(skip)
        .take(rows)
        .map(|bar| {
            let style = if Some(bar.feature) == selected {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::LightBlue)
            };
            Bar::default()
                .value((bar.height / plot_height * BAR_RESOLUTION).round() as u64)
                .label(Line::from(bar.label.clone()))
                .text_value(bar.value.map(format_value).unwrap_or_else(|| "n/a".to_string()))
                .style(style)
        })
        .collect();

    let axis = chart.ticks.iter().map(|t| t.label.clone()).collect::<Vec<_>>().join(" · ");
    let widget = BarChartWidget::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Ranking: {} (max {})", chart.property, format_value(chart.max)))
                .title_bottom(Line::from(axis)),
        )
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .max(BAR_RESOLUTION as u64)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(widget, area);
}

fn draw_info(f: &mut Frame, area: Rect, state: &AppState) {
    let config = &state.config;
    let [lambda, phi, _] = state.projection().rotation();
    let value = |v: Option<f64>| v.map(format_value).unwrap_or_else(|| "n/a".to_string());

    let selection = match state.selected() {
        Some((_, feature)) => format!(
            "{}\n{}: {}\n{}: {}",
            feature.name(&config.name_property),
            config.color_property,
            value(feature.number(&config.color_property)),
            config.chart_property,
            value(feature.number(&config.chart_property)),
        ),
        None => "Tab: select a region".to_string(),
    };
    let scale = match state.compositor().color_scale() {
        Some(s) => format!("{} {} .. {}", s.property, format_value(s.min), format_value(s.max)),
        None => format!("{} (no values)", config.color_property),
    };

    let text = format!(
        "{} regions\n{}\nrotation {:.0}°, {:.0}°   zoom {:.2}x\n\n{}\n\n{}",
        state.compositor().features().len(),
        scale,
        lambda,
        phi,
        state.zoom().k,
        selection,
        AppState::HELP_TEXT
    );
    let info = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Info"))
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: true });
    f.render_widget(info, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_splits_map_and_side_panels() {
        let a = areas(Rect::new(0, 0, 100, 40));
        assert_eq!(a.map, Rect::new(0, 0, 60, 40));
        assert_eq!(a.map_inner, Rect::new(1, 1, 58, 38));
        assert_eq!(a.chart.x, 60);
        assert_eq!(a.chart.height + a.info.height, 40);
    }

    #[test]
    fn viewports_follow_panels() {
        let a = areas(Rect::new(0, 0, 100, 40));
        let (globe, chart) = viewports(&a);
        assert_eq!(globe, Viewport::new(116.0, 152.0));
        assert_eq!(chart.width, 380.0);
    }
}
