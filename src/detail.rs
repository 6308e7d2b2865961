use crate::config::{FormatKind, IndicatorSpec};
use crate::types::IndicatorRecord;
use serde::Serialize;

pub const NO_DATA: &str = "no data";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub key: String,
    pub label: String,
    pub value: Option<f64>,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: String,
    pub label: String,
    /// Observed `(year, value)` points, ascending by year.
    pub points: Vec<(i32, f64)>,
    /// Year span of the country's rows, including years where this indicator is missing.
    pub years: (i32, i32),
}

impl Series {
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, &(_, v)| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryDetail {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub kpis: Vec<Kpi>,
    pub series: Vec<Series>,
}

/// Builds the detail view from a country's rows (ascending by year).
///
/// Returns `None` when there are no rows at all.
pub fn build(rows: &[&IndicatorRecord], indicators: &[IndicatorSpec], year: i32) -> Option<CountryDetail> {
    let first = rows.first()?;
    let last = rows.last()?;
    let at_year = rows.iter().find(|r| r.year == year);

    let kpis = indicators
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let value = at_year.and_then(|r| r.values.get(i).copied().flatten());
            Kpi {
                key: spec.key.clone(),
                label: spec.label.clone(),
                value,
                display: value.map_or_else(|| NO_DATA.to_string(), |v| format_value(spec, v)),
            }
        })
        .collect();

    let series = indicators
        .iter()
        .enumerate()
        .map(|(i, spec)| Series {
            key: spec.key.clone(),
            label: spec.label.clone(),
            points: rows
                .iter()
                .filter_map(|r| r.values.get(i).copied().flatten().map(|v| (r.year, v)))
                .collect(),
            years: (first.year, last.year),
        })
        .collect();

    Some(CountryDetail {
        id: first.id.clone(),
        name: first.name.clone(),
        year,
        kpis,
        series,
    })
}

pub fn format_value(spec: &IndicatorSpec, value: f64) -> String {
    let body = match spec.format {
        FormatKind::Decimal => format!("{:.*}", spec.decimals, value),
        FormatKind::Percent => format!("{:.*}%", spec.decimals, value),
        FormatKind::Currency => {
            let sign = if value < 0.0 { "-" } else { "" };
            format!("{}${}", sign, group_thousands(value.abs(), spec.decimals))
        }
        FormatKind::Integer => {
            let sign = if value.round() < 0.0 { "-" } else { "" };
            format!("{}{}", sign, group_thousands(value.abs(), 0))
        }
    };
    match &spec.suffix {
        Some(suffix) => format!("{}{}", body, suffix),
        None => body,
    }
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value);
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}
