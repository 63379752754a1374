//! Standalone SVG chart of the equity curve against its overlays.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::ReversionError;
use crate::domain::portfolio::EquityPoint;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const WIDTH: f64 = 900.0;
const HEIGHT: f64 = 420.0;
const PADDING: f64 = 60.0;

pub struct SvgChartAdapter;

struct Series<'a> {
    label: String,
    stroke: &'static str,
    width: f64,
    opacity: f64,
    points: &'a [EquityPoint],
}

/// Maps dates and values onto the plot area. The x axis is calendar time so
/// series with different trading days still line up.
struct Scale {
    first: NaiveDate,
    last: NaiveDate,
    days: f64,
    min: f64,
    range: f64,
}

impl Scale {
    fn fit(series: &[Series<'_>]) -> Option<Self> {
        let all = || series.iter().flat_map(|s| s.points.iter());
        let first = all().map(|p| p.date).min()?;
        let last = all().map(|p| p.date).max()?;
        let min = all().map(|p| p.equity).fold(f64::INFINITY, f64::min);
        let max = all().map(|p| p.equity).fold(f64::NEG_INFINITY, f64::max);
        Some(Scale {
            first,
            last,
            days: (last - first).num_days() as f64,
            min,
            range: max - min,
        })
    }

    fn x(&self, date: NaiveDate) -> f64 {
        let plot_width = WIDTH - 2.0 * PADDING;
        if self.days > 0.0 {
            PADDING + (date - self.first).num_days() as f64 / self.days * plot_width
        } else {
            PADDING
        }
    }

    fn y(&self, equity: f64) -> f64 {
        let plot_height = HEIGHT - 2.0 * PADDING;
        let scale_y = if self.range > 0.0 {
            plot_height / self.range
        } else {
            1.0
        };
        HEIGHT - PADDING - (equity - self.min) * scale_y
    }
}

pub fn render_chart(report: &BacktestReport) -> String {
    let bench_points = report.benchmark.as_ref().map(|b| (b.ticker.clone(), b.points()));
    let mut series: Vec<Series<'_>> = report
        .baselines
        .iter()
        .enumerate()
        .map(|(i, b)| Series {
            label: format!("random {}", i + 1),
            stroke: "#999999",
            width: 0.8,
            opacity: 0.5,
            points: b.equity_curve(),
        })
        .collect();

    if let Some((ticker, points)) = &bench_points {
        series.push(Series {
            label: ticker.clone(),
            stroke: "#e07b00",
            width: 1.2,
            opacity: 1.0,
            points,
        });
    }
    series.push(Series {
        label: "portfolio".to_string(),
        stroke: "#1f4fbf",
        width: 1.6,
        opacity: 1.0,
        points: report.result.equity_curve(),
    });

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}">"#,
        w = WIDTH,
        h = HEIGHT
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);

    let Some(scale) = Scale::fit(&series) else {
        let _ = writeln!(
            svg,
            r#"<text x="{:.0}" y="{:.0}" text-anchor="middle">No equity data available.</text>"#,
            WIDTH / 2.0,
            HEIGHT / 2.0
        );
        svg.push_str("</svg>\n");
        return svg;
    };

    // axes
    let _ = writeln!(
        svg,
        r#"<line x1="{p}" y1="{p}" x2="{p}" y2="{b}" stroke="black"/>"#,
        p = PADDING,
        b = HEIGHT - PADDING
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{p}" y1="{b}" x2="{r}" y2="{b}" stroke="black"/>"#,
        p = PADDING,
        b = HEIGHT - PADDING,
        r = WIDTH - PADDING
    );
    let max = scale.min + scale.range;
    for (value, y) in [(max, scale.y(max)), (scale.min, scale.y(scale.min))] {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{y:.1}" font-size="10" text-anchor="end">{value:.0}</text>"#,
            PADDING - 4.0
        );
    }
    for (date, anchor) in [(scale.first, "start"), (scale.last, "end")] {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="10" text-anchor="{anchor}">{date}</text>"#,
            scale.x(date),
            HEIGHT - PADDING + 14.0
        );
    }

    for s in &series {
        if s.points.is_empty() {
            continue;
        }
        let points: Vec<String> = s
            .points
            .iter()
            .map(|p| format!("{:.1},{:.1}", scale.x(p.date), scale.y(p.equity)))
            .collect();
        let _ = writeln!(
            svg,
            r#"<polyline fill="none" stroke="{}" stroke-width="{}" stroke-opacity="{}" points="{}"><title>{}</title></polyline>"#,
            s.stroke,
            s.width,
            s.opacity,
            points.join(" "),
            s.label
        );
    }

    // legend, skipping the individual random runs
    let legend: Vec<&Series<'_>> = series
        .iter()
        .rev()
        .filter(|s| !s.label.starts_with("random"))
        .collect();
    for (i, s) in legend.iter().enumerate() {
        let y = PADDING / 2.0 + i as f64 * 14.0;
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{y:.1}" font-size="11" fill="{}">{}</text>"#,
            PADDING + 8.0,
            s.stroke,
            s.label
        );
    }

    svg.push_str("</svg>\n");
    svg
}

impl ReportPort for SvgChartAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), ReversionError> {
        fs::write(output_path, render_chart(report))?;
        Ok(())
    }
}
