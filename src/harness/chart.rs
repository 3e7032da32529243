//! Two-panel SVG summary: accuracy per model and test coverage, both against tool count.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use super::{DegradationRecord, SweepResults};

const WIDTH: f64 = 1400.0;
const HEIGHT: f64 = 600.0;
const PANEL_WIDTH: f64 = WIDTH / 2.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 70.0;

const COLORS: [&str; 3] = ["#1f77b4", "#ff7f0e", "#2ca02c"];

#[derive(Clone, Copy)]
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl Frame {
    fn panel(index: usize, x_range: (f64, f64), y_range: (f64, f64)) -> Self {
        Self {
            left: index as f64 * PANEL_WIDTH + MARGIN_LEFT,
            top: MARGIN_TOP,
            width: PANEL_WIDTH - MARGIN_LEFT - MARGIN_RIGHT,
            height: HEIGHT - MARGIN_TOP - MARGIN_BOTTOM,
            x_range,
            y_range,
        }
    }

    fn x(&self, v: f64) -> f64 {
        let (lo, hi) = self.x_range;
        self.left + (v - lo) / (hi - lo) * self.width
    }

    fn y(&self, v: f64) -> f64 {
        let (lo, hi) = self.y_range;
        self.top + self.height - (v - lo) / (hi - lo) * self.height
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Widen a degenerate range so scaling never divides by zero.
fn spread((lo, hi): (f64, f64), pad: f64) -> (f64, f64) {
    if hi - lo < f64::EPSILON {
        (lo - pad, hi + pad)
    } else {
        (lo, hi)
    }
}

/// Accuracy axis: observed range padded by 5 points, clamped to [0, 100].
fn accuracy_range(models: &[(&str, &[DegradationRecord])]) -> (f64, f64) {
    let values = models
        .iter()
        .flat_map(|(_, rows)| rows.iter())
        .map(|r| r.tool_accuracy * 100.0);
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    let lo = (min - 5.0).max(0.0);
    let hi = (max + 5.0).min(100.0);
    if hi - lo < 1.0 {
        (lo.min(99.0), lo.min(99.0) + 1.0)
    } else {
        (lo, hi)
    }
}

fn axes(svg: &mut String, frame: &Frame, title: &str, x_label: &str, y_label: &str) {
    let _ = write!(
        svg,
        r#"<text x="{cx:.1}" y="{ty:.1}" text-anchor="middle" font-size="18" font-weight="bold">{title}</text>
<line x1="{l:.1}" y1="{b:.1}" x2="{r:.1}" y2="{b:.1}" stroke="black"/>
<line x1="{l:.1}" y1="{t:.1}" x2="{l:.1}" y2="{b:.1}" stroke="black"/>
<text x="{cx:.1}" y="{xl:.1}" text-anchor="middle" font-size="14">{x_label}</text>
<text x="{yx:.1}" y="{cy:.1}" text-anchor="middle" font-size="14" transform="rotate(-90 {yx:.1} {cy:.1})">{y_label}</text>
"#,
        cx = frame.center_x(),
        ty = frame.top - 25.0,
        l = frame.left,
        r = frame.left + frame.width,
        t = frame.top,
        b = frame.bottom(),
        xl = frame.bottom() + 50.0,
        yx = frame.left - 55.0,
        cy = frame.top + frame.height / 2.0,
    );
}

fn y_grid(svg: &mut String, frame: &Frame, suffix: &str) {
    let (lo, hi) = frame.y_range;
    for i in 0..=5 {
        let v = lo + (hi - lo) * f64::from(i) / 5.0;
        let y = frame.y(v);
        let _ = write!(
            svg,
            r##"<line x1="{l:.1}" y1="{y:.1}" x2="{r:.1}" y2="{y:.1}" stroke="#cccccc" stroke-width="0.5"/>
<text x="{tx:.1}" y="{ty:.1}" text-anchor="end" font-size="12">{v:.0}{suffix}</text>
"##,
            l = frame.left,
            r = frame.left + frame.width,
            tx = frame.left - 8.0,
            ty = y + 4.0,
        );
    }
}

fn x_ticks(svg: &mut String, frame: &Frame, counts: &[usize]) {
    for &n in counts {
        let x = frame.x(n as f64);
        let _ = write!(
            svg,
            r#"<text x="{x:.1}" y="{y:.1}" text-anchor="middle" font-size="12">{n}</text>
"#,
            y = frame.bottom() + 20.0,
        );
    }
}

fn marker(svg: &mut String, shape: usize, x: f64, y: f64, color: &str) {
    let _ = match shape % 3 {
        0 => write!(svg, r#"<circle cx="{x:.1}" cy="{y:.1}" r="5" fill="{color}"/>"#),
        1 => write!(
            svg,
            r#"<rect x="{:.1}" y="{:.1}" width="10" height="10" fill="{color}"/>"#,
            x - 5.0,
            y - 5.0
        ),
        _ => write!(
            svg,
            r#"<polygon points="{x:.1},{:.1} {:.1},{:.1} {:.1},{:.1}" fill="{color}"/>"#,
            y - 6.0,
            x - 6.0,
            y + 5.0,
            x + 6.0,
            y + 5.0
        ),
    };
    svg.push('\n');
}

fn placeholder() -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">
<rect width="100%" height="100%" fill="white"/>
<text x="{x}" y="{y}" text-anchor="middle" font-size="20">Performance degradation: no results</text>
</svg>
"#,
        x = WIDTH / 2.0,
        y = HEIGHT / 2.0,
    )
}

/// Render the chart. Models without rows are left out; no rows at all gives a placeholder.
pub fn render_chart(results: &SweepResults) -> String {
    let models: Vec<(&str, &[DegradationRecord])> = results
        .models()
        .iter()
        .filter(|m| !m.records.is_empty())
        .map(|m| (m.model.as_str(), m.records.as_slice()))
        .collect();

    let Some(&(_, coverage)) = models.first() else {
        return placeholder();
    };

    let mut counts: Vec<usize> = models
        .iter()
        .flat_map(|(_, rows)| rows.iter().map(|r| r.num_tools))
        .collect();
    counts.sort_unstable();
    counts.dedup();
    let x_range = spread(
        (
            counts.first().copied().unwrap_or(0) as f64,
            counts.last().copied().unwrap_or(0) as f64,
        ),
        1.0,
    );

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">
<rect width="100%" height="100%" fill="white"/>
"#
    );

    // Left panel: accuracy lines.
    let left = Frame::panel(0, x_range, accuracy_range(&models));
    y_grid(&mut svg, &left, "%");
    x_ticks(&mut svg, &left, &counts);
    axes(
        &mut svg,
        &left,
        "Performance Degradation vs Tool Count",
        "Number of Available Tools",
        "Tool Selection Accuracy (%)",
    );

    for (idx, (model, rows)) in models.iter().enumerate() {
        let color = COLORS[idx % COLORS.len()];
        let points: Vec<(f64, f64)> = rows
            .iter()
            .map(|r| (left.x(r.num_tools as f64), left.y(r.tool_accuracy * 100.0)))
            .collect();

        let path = points
            .iter()
            .map(|(x, y)| format!("{x:.1},{y:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            svg,
            r#"<polyline points="{path}" fill="none" stroke="{color}" stroke-width="2"/>"#
        );
        for &(x, y) in &points {
            marker(&mut svg, idx, x, y, color);
        }

        let legend_y = left.top + 20.0 + idx as f64 * 20.0;
        let legend_x = left.left + left.width - 180.0;
        marker(&mut svg, idx, legend_x, legend_y - 4.0, color);
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{legend_y:.1}" font-size="12">{}</text>"#,
            legend_x + 12.0,
            escape(model)
        );
    }

    // Right panel: testable cases from the first model with data.
    let max_testable = coverage.iter().map(|r| r.num_testable).max().unwrap_or(0).max(1);
    let right = Frame::panel(1, x_range, (0.0, max_testable as f64));
    y_grid(&mut svg, &right, "");
    x_ticks(&mut svg, &right, &counts);
    axes(
        &mut svg,
        &right,
        "Test Coverage by Tool Count",
        "Number of Available Tools",
        "Number of Testable Cases",
    );

    let slot = right.width / (counts.len() as f64 + 1.0);
    let bar_width = (slot * 0.6).max(4.0);
    for r in coverage {
        let x = right.x(r.num_tools as f64) - bar_width / 2.0;
        let y = right.y(r.num_testable as f64);
        let _ = writeln!(
            svg,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{bar_width:.1}" height="{:.1}" fill="steelblue" fill-opacity="0.7"/>"#,
            right.bottom() - y
        );
    }

    svg.push_str("</svg>\n");
    svg
}

/// Write the chart to `path`. Never fails on empty or partial results.
pub fn write_chart(path: &Path, results: &SweepResults) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_chart(results))?;
    tracing::info!(path = %path.display(), "Chart written");
    Ok(())
}
