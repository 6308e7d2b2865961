use crate::config::IndicatorSpec;
use crate::dashboard::{DashboardView, MapView};
use crate::data::Dataset;
use crate::detail::{format_value, CountryDetail};
use crate::selection::ALL_COUNTRIES;
use crate::svg::{self, escape, Projection};
use std::fmt::Write;

/// Current control values, used to build every link on the page.
#[derive(Debug, Clone)]
pub struct Controls<'a> {
    pub year: i32,
    pub indicator: &'a str,
    pub view: MapView,
}

impl Controls<'_> {
    pub fn href(&self, event: Option<&str>, country: Option<&str>) -> String {
        let mut href = format!(
            "/?year={}&indicator={}&view={}",
            self.year,
            urlencoding::encode(self.indicator),
            self.view.as_str()
        );
        if let Some(event) = event {
            let _ = write!(href, "&event={}", urlencoding::encode(event));
        }
        if let Some(country) = country {
            let _ = write!(href, "&country={}", urlencoding::encode(country));
        }
        href
    }
}

pub fn render(view: &DashboardView<'_>, dataset: &Dataset, projection: Projection) -> String {
    let spec = dataset.indicators.get(view.indicator);
    let controls = Controls {
        year: view.year,
        indicator: spec.map_or("", |s| s.key.as_str()),
        view: view.view,
    };
    let selected = view.selection.country();

    let map_svg = svg::map(&view.map, projection, selected, |country| {
        controls.href(Some("click"), country)
    });

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Global Health Dashboard</title>
    <style>{css}</style>
</head>
<body>
    <h1>Global Health &amp; Socio-Economic Dashboard</h1>
    {controls}
    {notices}
    <div class="layout">
        <section class="map-panel">
            {map}
            {legend}
            <p class="caption">{caption}</p>
        </section>
        <section class="detail-panel">{detail}</section>
    </div>
    <section>
        <h2>Data Preview</h2>
        {preview}
    </section>
    {scatter}
</body>
</html>"#,
        css = CSS,
        controls = render_controls(view, dataset, &controls),
        notices = render_notices(view),
        map = map_svg,
        legend = svg::legend(&view.map.legend, spec),
        caption = render_caption(view),
        detail = render_detail(view.detail.as_ref(), &dataset.indicators, &controls),
        preview = render_preview(view, &dataset.indicators),
        scatter = view
            .scatter
            .as_ref()
            .map(|s| format!("<section><h2>{} vs {}</h2>{}</section>", escape(&s.y_label), escape(&s.x_label), svg::scatter(s)))
            .unwrap_or_default(),
    )
}

fn render_controls(view: &DashboardView<'_>, dataset: &Dataset, controls: &Controls<'_>) -> String {
    let mut out = String::from(r#"<form class="controls" method="get" action="/">"#);

    if let Some((min, max)) = view.year_range {
        let _ = write!(
            out,
            r#"<label>Year <input type="range" name="year" min="{min}" max="{max}" value="{year}" onchange="this.form.submit()"> <output>{year}</output></label>"#,
            min = min,
            max = max,
            year = view.year,
        );
    }

    out.push_str(r#"<label>Indicator <select name="indicator" onchange="this.form.submit()">"#);
    for spec in &dataset.indicators {
        let selected = if spec.key == controls.indicator { " selected" } else { "" };
        let _ = write!(out, r#"<option value="{}"{}>{}</option>"#, escape(&spec.key), selected, escape(&spec.label));
    }
    out.push_str("</select></label>");

    if dataset.colors.is_some() {
        out.push_str(r#"<label>Colors <select name="view" onchange="this.form.submit()">"#);
        for (value, label) in [(MapView::Indicator, "Indicator scale"), (MapView::Color, "Country colors")] {
            let selected = if value == view.view { " selected" } else { "" };
            let _ = write!(out, r#"<option value="{}"{}>{}</option>"#, value.as_str(), selected, label);
        }
        out.push_str("</select></label>");
    } else {
        let _ = write!(out, r#"<input type="hidden" name="view" value="{}">"#, view.view.as_str());
    }
    out.push_str(r#"<noscript><button type="submit">Update</button></noscript></form>"#);

    // Separate form so that year changes never carry a selection event.
    let _ = write!(
        out,
        r#"<form class="controls" method="get" action="/"><input type="hidden" name="year" value="{}"><input type="hidden" name="indicator" value="{}"><input type="hidden" name="view" value="{}"><input type="hidden" name="event" value="pick"><label>Select a Country <select name="country" onchange="this.form.submit()"><option value="{all}">{all}</option>"#,
        view.year,
        escape(controls.indicator),
        view.view.as_str(),
        all = ALL_COUNTRIES,
    );
    let selected = view.selection.country();
    for (id, name) in &view.countries {
        let mark = if Some(*id) == selected { " selected" } else { "" };
        let _ = write!(out, r#"<option value="{}"{}>{} ({})</option>"#, escape(id), mark, escape(name), escape(id));
    }
    out.push_str(r#"</select></label><noscript><button type="submit">Show</button></noscript></form>"#);
    out
}

fn render_notices(view: &DashboardView<'_>) -> String {
    if view.notices.is_empty() {
        return String::new();
    }
    let items: String = view
        .notices
        .iter()
        .map(|n| format!("<li>{}</li>", escape(&n.to_string())))
        .collect();
    format!(r#"<ul class="notices">{}</ul>"#, items)
}

fn render_caption(view: &DashboardView<'_>) -> String {
    let mut caption = format!("{} countries shown for {}", view.map.regions.len(), view.year);
    if view.map.undrawn > 0 {
        let _ = write!(caption, " ({} without map outlines)", view.map.undrawn);
    }
    caption
}

fn render_detail(detail: Option<&CountryDetail>, indicators: &[IndicatorSpec], controls: &Controls<'_>) -> String {
    let detail = match detail {
        Some(detail) => detail,
        None => {
            return r#"<p class="prompt">No country selected. Click a country on the map or pick one above.</p>"#
                .to_string()
        }
    };

    let mut out = String::new();
    let _ = write!(
        out,
        r#"<header><h2>{name} ({id})</h2><a class="dismiss" href="{close}" title="Close">&times;</a></header><p>Snapshot for {year}</p><div class="kpis">"#,
        name = escape(&detail.name),
        id = escape(&detail.id),
        close = escape(&controls.href(Some("dismiss"), None)),
        year = detail.year,
    );
    for kpi in &detail.kpis {
        let class = if kpi.value.is_some() { "kpi" } else { "kpi missing" };
        let _ = write!(
            out,
            r#"<div class="{}"><span class="kpi-label">{}</span><span class="kpi-value">{}</span></div>"#,
            class,
            escape(&kpi.label),
            escape(&kpi.display),
        );
    }
    out.push_str(r#"</div><div class="charts">"#);
    for (series, spec) in detail.series.iter().zip(indicators) {
        out.push_str(&svg::line_chart(series, spec));
    }
    out.push_str("</div>");
    out
}

fn render_preview(view: &DashboardView<'_>, indicators: &[IndicatorSpec]) -> String {
    let mut out = String::from("<table><thead><tr><th>Code</th><th>Country</th><th>Year</th>");
    for spec in indicators {
        let _ = write!(out, "<th>{}</th>", escape(&spec.label));
    }
    out.push_str("</tr></thead><tbody>");

    for record in &view.preview {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td>",
            escape(&record.id),
            escape(&record.name),
            record.year
        );
        for (spec, value) in indicators.iter().zip(&record.values) {
            let cell = value.map(|v| format_value(spec, v)).unwrap_or_default();
            let _ = write!(out, "<td>{}</td>", escape(&cell));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

const CSS: &str = r#"
body { font-family: system-ui, sans-serif; margin: 1.5rem; color: #222; }
.controls { display: flex; gap: 1.5rem; align-items: center; margin-bottom: 0.75rem; }
.notices { background: #fff8e1; border: 1px solid #f0d68a; padding: 0.5rem 1.5rem; }
.layout { display: grid; grid-template-columns: 3fr 2fr; gap: 1.5rem; }
.map { width: 100%; background: #eef3f7; }
.ocean { fill: #eef3f7; }
.region { stroke: #fff; stroke-width: 0.4; }
.region:hover, .region.selected { stroke: #111; stroke-width: 1.2; }
.detail-panel header { display: flex; justify-content: space-between; align-items: center; }
.dismiss { font-size: 1.5rem; text-decoration: none; color: #555; }
.kpis { display: grid; grid-template-columns: repeat(auto-fill, minmax(9rem, 1fr)); gap: 0.5rem; }
.kpi { border: 1px solid #ddd; border-radius: 4px; padding: 0.4rem; display: flex; flex-direction: column; }
.kpi-value { font-size: 1.2rem; font-weight: 600; }
.kpi.missing .kpi-value { color: #999; font-weight: normal; }
.charts svg { width: 100%; max-width: 320px; }
.line { stroke: #1f77b4; stroke-width: 2; }
.marker { fill: #1f77b4; }
.axis, .axis-label { font-size: 10px; fill: #555; }
.legend { max-width: 300px; font-size: 11px; }
table { border-collapse: collapse; font-size: 0.85rem; }
th, td { border-bottom: 1px solid #eee; padding: 0.2rem 0.6rem; text-align: left; }
.scatter { max-width: 480px; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{run, ViewRequest};
    use crate::fixtures::dataset;
    use crate::selection::Selection;

    fn projection() -> Projection {
        Projection { width: 960.0, height: 480.0 }
    }

    #[test]
    fn unselected_page_shows_prompt() {
        let dataset = dataset();
        let view = run(&dataset, &ViewRequest::default(), &Selection::Unselected, "HDI");
        let html = render(&view, &dataset, projection());

        assert!(html.contains("No country selected"));
        assert!(html.contains("Data Preview"));
        assert!(html.contains(r#"<option value="All">All</option>"#));
        assert!(!html.contains(r#"class="dismiss""#));
    }

    #[test]
    fn selected_page_shows_kpis_and_dismiss() {
        let dataset = dataset();
        let request = ViewRequest { year: Some(2020), ..Default::default() };
        let view = run(&dataset, &request, &Selection::Selected("USA".into()), "HDI");
        let html = render(&view, &dataset, projection());

        assert!(html.contains("United States (USA)"));
        assert!(html.contains(r#"<span class="kpi-value">0.920</span>"#));
        assert!(html.contains("event=dismiss"));
        assert!(html.contains(r#"<option value="USA" selected>"#));
    }

    #[test]
    fn links_keep_current_controls() {
        let controls = Controls { year: 2020, indicator: "LEX", view: MapView::Indicator };
        assert_eq!(controls.href(None, None), "/?year=2020&indicator=LEX&view=indicator");
        assert_eq!(
            controls.href(Some("click"), Some("FRA")),
            "/?year=2020&indicator=LEX&view=indicator&event=click&country=FRA"
        );
    }

    #[test]
    fn link_values_are_percent_encoded() {
        let controls = Controls { year: 2020, indicator: "R&D", view: MapView::Color };
        let href = controls.href(Some("click"), Some("A&B #1+"));
        assert_eq!(href, "/?year=2020&indicator=R%26D&view=color&event=click&country=A%26B%20%231%2B");

        let query = href.trim_start_matches("/?");
        let params: Vec<(&str, String)> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k, urlencoding::decode(v).unwrap().into_owned()))
            .collect();
        assert_eq!(params.len(), 5);
        assert!(params.contains(&("indicator", "R&D".to_string())));
        assert!(params.contains(&("country", "A&B #1+".to_string())));
    }
}
