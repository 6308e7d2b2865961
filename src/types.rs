use geo::MultiPolygon;
use std::collections::HashMap;

/// One dataset row: a country in a given year.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRecord {
    pub id: String,
    pub name: String,
    pub year: i32,
    // Aligned with `Dataset::indicators`; `None` when the cell was empty or unparsable.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct CountryShape {
    pub id: String,
    pub name: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

/// Country code -> display color, as given in the color file.
pub type ColorMapping = HashMap<String, String>;
