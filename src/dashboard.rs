//! One synchronous pass over the loaded data for a single request.

use crate::choropleth::{self, Choropleth, ColorPolicy};
use crate::data::Dataset;
use crate::detail::{self, CountryDetail};
use crate::error::Notice;
use crate::selection::Selection;
use crate::types::IndicatorRecord;

pub const PREVIEW_ROWS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapView {
    #[default]
    Indicator,
    /// Fixed per-country colors from the color file.
    Color,
}

impl MapView {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(v) if v.eq_ignore_ascii_case("color") => MapView::Color,
            _ => MapView::Indicator,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MapView::Indicator => "indicator",
            MapView::Color => "color",
        }
    }
}

/// The controls of one request. The selection is passed separately.
#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
    pub year: Option<i32>,
    pub indicator: Option<String>,
    pub view: MapView,
}

#[derive(Debug, Clone)]
pub struct ScatterPoint<'a> {
    pub id: &'a str,
    pub year: i32,
    pub x: f64,
    pub y: f64,
}

/// Life expectancy against development index, one point per row.
#[derive(Debug, Clone)]
pub struct Scatter<'a> {
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ScatterPoint<'a>>,
}

pub struct DashboardView<'a> {
    pub year: i32,
    pub year_range: Option<(i32, i32)>,
    pub indicator: usize,
    pub view: MapView,
    pub map: Choropleth<'a>,
    pub selection: Selection,
    pub detail: Option<CountryDetail>,
    pub notices: Vec<Notice>,
    pub countries: Vec<(&'a str, &'a str)>,
    pub preview: Vec<&'a IndicatorRecord>,
    pub scatter: Option<Scatter<'a>>,
}

pub fn run<'a>(
    dataset: &'a Dataset,
    request: &ViewRequest,
    selection: &Selection,
    default_indicator: &str,
) -> DashboardView<'a> {
    let mut notices = Vec::new();

    let year_range = dataset.year_range();
    let year = request
        .year
        .or(year_range.map(|(_, max)| max))
        .unwrap_or_default();

    let default_idx = dataset.indicator_index(default_indicator).unwrap_or(0);
    let indicator = match &request.indicator {
        Some(key) => dataset.indicator_index(key).unwrap_or_else(|| {
            notices.push(Notice::UnknownIndicator { requested: key.clone() });
            default_idx
        }),
        None => default_idx,
    };

    let policy = match (request.view, &dataset.colors) {
        (MapView::Color, Some(mapping)) => ColorPolicy::Discrete(mapping),
        (MapView::Color, None) => {
            notices.push(Notice::ColorMappingUnavailable);
            ColorPolicy::Continuous { indicator }
        }
        (MapView::Indicator, _) => ColorPolicy::Continuous { indicator },
    };
    let view = match policy {
        ColorPolicy::Discrete(_) => MapView::Color,
        ColorPolicy::Continuous { .. } => MapView::Indicator,
    };

    let year_rows = dataset.rows_for_year(year);
    if year_rows.is_empty() {
        notices.push(Notice::EmptyYear { year });
    }
    let map = choropleth::build(dataset, &year_rows, policy);

    let detail = match selection.country() {
        Some(country) => {
            let rows = dataset.rows_for_country(country);
            if rows.is_empty() {
                notices.push(Notice::NoDataForSelection { country: country.to_string(), year: None });
            } else if !rows.iter().any(|r| r.year == year) {
                notices.push(Notice::NoDataForSelection { country: country.to_string(), year: Some(year) });
            }
            detail::build(&rows, &dataset.indicators, year)
        }
        None => None,
    };

    DashboardView {
        year,
        year_range,
        indicator,
        view,
        map,
        selection: selection.clone(),
        detail,
        notices,
        countries: dataset.countries(),
        preview: dataset.preview(selection.country(), PREVIEW_ROWS),
        scatter: scatter(dataset, selection.country()),
    }
}

fn scatter<'a>(dataset: &'a Dataset, country: Option<&str>) -> Option<Scatter<'a>> {
    let x = dataset.indicator_index("HDI")?;
    let y = dataset.indicator_index("LEX")?;

    let points = dataset
        .records
        .iter()
        .filter(|r| country.map_or(true, |c| r.id == c))
        .filter_map(|r| {
            let px = r.values.get(x).copied().flatten()?;
            let py = r.values.get(y).copied().flatten()?;
            Some(ScatterPoint { id: &r.id, year: r.year, x: px, y: py })
        })
        .collect();

    Some(Scatter {
        x_label: dataset.indicators[x].label.clone(),
        y_label: dataset.indicators[y].label.clone(),
        points,
    })
}
