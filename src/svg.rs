//! Inline SVG for the map, the per-indicator time series and the scatter plot.

use crate::choropleth::{Choropleth, ContinuousScale, Legend};
use crate::config::IndicatorSpec;
use crate::dashboard::Scatter;
use crate::detail::{format_value, Series};
use geo::{LineString, Polygon};
use std::fmt::Write;

const CATEGORY_COLORS: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Equirectangular projection onto a `width` x `height` canvas.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub width: f64,
    pub height: f64,
}

impl Projection {
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        ((lon + 180.0) / 360.0 * self.width, (90.0 - lat) / 180.0 * self.height)
    }
}

fn ring_path(out: &mut String, ring: &LineString<f64>, projection: &Projection) {
    for (i, coord) in ring.coords().enumerate() {
        let (x, y) = projection.project(coord.x, coord.y);
        let cmd = if i == 0 { 'M' } else { 'L' };
        let _ = write!(out, "{}{:.1} {:.1}", cmd, x, y);
    }
    out.push('Z');
}

fn polygon_path(out: &mut String, polygon: &Polygon<f64>, projection: &Projection) {
    ring_path(out, polygon.exterior(), projection);
    for interior in polygon.interiors() {
        ring_path(out, interior, projection);
    }
}

/// Choropleth as SVG. Each region and the background link to `link(id)`;
/// the background passes `None`.
pub fn map(
    choropleth: &Choropleth<'_>,
    projection: Projection,
    selected: Option<&str>,
    link: impl Fn(Option<&str>) -> String,
) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg class="map" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">"#,
        w = projection.width,
        h = projection.height,
    );
    let _ = write!(
        out,
        r#"<a href="{}"><rect class="ocean" width="{}" height="{}"><title>No country</title></rect></a>"#,
        escape(&link(None)),
        projection.width,
        projection.height,
    );

    for region in &choropleth.regions {
        let mut d = String::new();
        for polygon in &region.shape.geometry.0 {
            polygon_path(&mut d, polygon, &projection);
        }
        let class = if selected == Some(region.id()) { "region selected" } else { "region" };
        let _ = write!(
            out,
            r#"<a href="{href}"><path class="{class}" d="{d}" fill="{fill}" fill-rule="evenodd"><title>{name}</title></path></a>"#,
            href = escape(&link(Some(region.id()))),
            class = class,
            d = d,
            fill = escape(&region.fill),
            name = escape(region.name()),
        );
    }

    out.push_str("</svg>");
    out
}

pub fn legend(legend: &Legend, spec: Option<&IndicatorSpec>) -> String {
    match legend {
        Legend::Scale { label, scale } => {
            let stops = ContinuousScale::stops();
            let gradient: String = stops
                .iter()
                .enumerate()
                .map(|(i, color)| {
                    format!(
                        r#"<stop offset="{:.0}%" stop-color="{}"/>"#,
                        i as f64 * 100.0 / (stops.len() - 1) as f64,
                        color
                    )
                })
                .collect();
            let fmt = |v: f64| spec.map_or_else(|| format!("{:.2}", v), |s| format_value(s, v));
            format!(
                r#"<svg class="legend" viewBox="0 0 300 40" xmlns="http://www.w3.org/2000/svg"><defs><linearGradient id="scale">{gradient}</linearGradient></defs><text x="0" y="10">{label}</text><rect x="0" y="14" width="300" height="10" fill="url(#scale)"/><text x="0" y="38">{min}</text><text x="300" y="38" text-anchor="end">{max}</text></svg>"#,
                gradient = gradient,
                label = escape(label),
                min = escape(&fmt(scale.min)),
                max = escape(&fmt(scale.max)),
            )
        }
        Legend::Categorical => r#"<p class="legend">Fixed country colors</p>"#.to_string(),
        Legend::Empty => String::new(),
    }
}

const CHART_W: f64 = 320.0;
const CHART_H: f64 = 160.0;
const MARGIN: f64 = 28.0;

fn scale_axis(value: f64, lo: f64, hi: f64, out_lo: f64, out_hi: f64) -> f64 {
    if (hi - lo).abs() <= f64::EPSILON {
        (out_lo + out_hi) / 2.0
    } else {
        out_lo + (value - lo) / (hi - lo) * (out_hi - out_lo)
    }
}

/// Line chart with a marker at every observed year.
pub fn line_chart(series: &Series, spec: &IndicatorSpec) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg class="chart" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg"><text x="4" y="14" class="chart-title">{}</text>"#,
        CHART_W,
        CHART_H,
        escape(&series.label),
    );

    let (lo, hi) = match series.value_range() {
        Some(range) => range,
        None => {
            let _ = write!(out, r#"<text x="{}" y="{}" text-anchor="middle">no data</text></svg>"#, CHART_W / 2.0, CHART_H / 2.0);
            return out;
        }
    };
    let (first_year, last_year) = series.years;

    let point = |year: i32, value: f64| {
        (
            scale_axis(year as f64, first_year as f64, last_year as f64, MARGIN, CHART_W - MARGIN),
            scale_axis(value, lo, hi, CHART_H - MARGIN, MARGIN),
        )
    };

    let coords: Vec<String> = series
        .points
        .iter()
        .map(|&(year, value)| {
            let (x, y) = point(year, value);
            format!("{:.1},{:.1}", x, y)
        })
        .collect();
    let _ = write!(out, r#"<polyline class="line" fill="none" points="{}"/>"#, coords.join(" "));

    for &(year, value) in &series.points {
        let (x, y) = point(year, value);
        let _ = write!(
            out,
            r#"<circle class="marker" cx="{:.1}" cy="{:.1}" r="3"><title>{}: {}</title></circle>"#,
            x,
            y,
            year,
            escape(&format_value(spec, value)),
        );
    }

    let _ = write!(
        out,
        r#"<text x="{m}" y="{yb}" class="axis">{fy}</text><text x="{xr}" y="{yb}" class="axis" text-anchor="end">{ly}</text><text x="2" y="{ytop}" class="axis">{hi}</text><text x="2" y="{ylo}" class="axis">{lo}</text></svg>"#,
        m = MARGIN,
        yb = CHART_H - 6.0,
        xr = CHART_W - MARGIN,
        fy = first_year,
        ly = last_year,
        ytop = MARGIN - 4.0,
        ylo = CHART_H - MARGIN + 12.0,
        hi = escape(&format_value(spec, hi)),
        lo = escape(&format_value(spec, lo)),
    );
    out
}

fn category_color(id: &str) -> &'static str {
    let hash = id.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    CATEGORY_COLORS[hash % CATEGORY_COLORS.len()]
}

pub fn scatter(scatter: &Scatter<'_>) -> String {
    let (w, h) = (480.0, 320.0);
    let mut out = String::new();
    let _ = write!(out, r#"<svg class="scatter" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"#, w, h);

    let range = |values: Vec<f64>| {
        values.iter().fold(None, |acc: Option<(f64, f64)>, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    };
    let xs = range(scatter.points.iter().map(|p| p.x).collect());
    let ys = range(scatter.points.iter().map(|p| p.y).collect());

    if let (Some((x_lo, x_hi)), Some((y_lo, y_hi))) = (xs, ys) {
        for p in &scatter.points {
            let cx = scale_axis(p.x, x_lo, x_hi, 40.0, w - 16.0);
            let cy = scale_axis(p.y, y_lo, y_hi, h - 36.0, 16.0);
            let _ = write!(
                out,
                r#"<circle cx="{:.1}" cy="{:.1}" r="4" fill="{}"><title>{} {}</title></circle>"#,
                cx,
                cy,
                category_color(p.id),
                escape(p.id),
                p.year,
            );
        }
        let _ = write!(
            out,
            r#"<text x="40" y="{}" class="axis">{:.3}</text><text x="{}" y="{}" class="axis" text-anchor="end">{:.3}</text><text x="2" y="16" class="axis">{:.1}</text><text x="2" y="{}" class="axis">{:.1}</text>"#,
            h - 20.0,
            x_lo,
            w - 16.0,
            h - 20.0,
            x_hi,
            y_hi,
            h - 36.0,
            y_lo,
        );
    }

    let _ = write!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle" class="axis-label">{}</text><text x="12" y="{}" transform="rotate(-90 12 {})" text-anchor="middle" class="axis-label">{}</text></svg>"#,
        w / 2.0,
        h - 4.0,
        escape(&scatter.x_label),
        h / 2.0,
        h / 2.0,
        escape(&scatter.y_label),
    );
    out
}
