use crate::data::Dataset;
use crate::types::{ColorMapping, CountryShape, IndicatorRecord};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde_json::json;

pub const NO_DATA_FILL: &str = "#d9d9d9";

// Sequential palette, low to high.
const PALETTE: [Rgb; 5] = [
    Rgb(0x44, 0x01, 0x54),
    Rgb(0x3b, 0x52, 0x8b),
    Rgb(0x21, 0x91, 0x8c),
    Rgb(0x5e, 0xc9, 0x62),
    Rgb(0xfd, 0xe7, 0x25),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parses `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Rgb(r, g, b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

/// Linear scale over the observed range of one indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousScale {
    pub min: f64,
    pub max: f64,
}

impl ContinuousScale {
    pub fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        values.fold(None, |acc, v| match acc {
            None => Some(ContinuousScale { min: v, max: v }),
            Some(s) => Some(ContinuousScale { min: s.min.min(v), max: s.max.max(v) }),
        })
    }

    pub fn color(&self, value: f64) -> Rgb {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            return PALETTE[PALETTE.len() / 2];
        }
        let t = ((value - self.min) / span).clamp(0.0, 1.0);
        let scaled = t * (PALETTE.len() - 1) as f64;
        let lower = (scaled.floor() as usize).min(PALETTE.len() - 2);
        PALETTE[lower].lerp(PALETTE[lower + 1], scaled - lower as f64)
    }

    pub fn stops() -> Vec<String> {
        PALETTE.iter().map(|c| c.to_hex()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ColorPolicy<'a> {
    /// Color by an indicator column (index into `Dataset::indicators`).
    Continuous { indicator: usize },
    Discrete(&'a ColorMapping),
}

#[derive(Debug, Clone)]
pub struct Region<'a> {
    pub shape: &'a CountryShape,
    pub record: &'a IndicatorRecord,
    pub fill: String,
    pub value: Option<f64>,
}

impl Region<'_> {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// Hover label.
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Legend {
    Scale { label: String, scale: ContinuousScale },
    Categorical,
    Empty,
}

#[derive(Debug, Clone)]
pub struct Choropleth<'a> {
    pub regions: Vec<Region<'a>>,
    pub legend: Legend,
    /// Rows in the subset with no outline to draw.
    pub undrawn: usize,
}

/// Colors each row of a year subset that has geometry.
///
/// Countries known to the color mapping or geometry but absent from `rows`
/// are simply not part of the result.
pub fn build<'a>(dataset: &'a Dataset, rows: &[&'a IndicatorRecord], policy: ColorPolicy<'_>) -> Choropleth<'a> {
    let mut regions = Vec::with_capacity(rows.len());
    let mut undrawn = 0;

    let (legend, scale, indicator) = match policy {
        ColorPolicy::Continuous { indicator } => {
            let scale = ContinuousScale::from_values(rows.iter().filter_map(|r| value_at(r, indicator)));
            let label = dataset
                .indicators
                .get(indicator)
                .map(|spec| spec.label.clone())
                .unwrap_or_default();
            let legend = match scale {
                Some(scale) => Legend::Scale { label, scale },
                None => Legend::Empty,
            };
            (legend, scale, Some(indicator))
        }
        ColorPolicy::Discrete(_) => (Legend::Categorical, None, None),
    };

    for &record in rows {
        let shape = match dataset.shape(&record.id) {
            Some(shape) => shape,
            None => {
                undrawn += 1;
                continue;
            }
        };

        let value = indicator.and_then(|i| value_at(record, i));
        let fill = match policy {
            ColorPolicy::Continuous { .. } => match (value, scale) {
                (Some(v), Some(scale)) => scale.color(v).to_hex(),
                _ => NO_DATA_FILL.to_string(),
            },
            ColorPolicy::Discrete(mapping) => mapping
                .get(&record.id)
                .cloned()
                .unwrap_or_else(|| NO_DATA_FILL.to_string()),
        };

        regions.push(Region { shape, record, fill, value });
    }

    Choropleth { regions, legend, undrawn }
}

fn value_at(record: &IndicatorRecord, indicator: usize) -> Option<f64> {
    record.values.get(indicator).copied().flatten()
}

/// GeoJSON view of the choropleth for client-side map libraries.
pub fn to_feature_collection(map: &Choropleth<'_>) -> FeatureCollection {
    let features = map
        .regions
        .iter()
        .map(|region| {
            let mut properties = JsonObject::new();
            properties.insert("id".into(), json!(region.id()));
            properties.insert("name".into(), json!(region.name()));
            properties.insert("fill".into(), json!(region.fill));
            properties.insert("value".into(), json!(region.value));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&region.shape.geometry))),
                id: Some(geojson::feature::Id::String(region.id().to_string())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
