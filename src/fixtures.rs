//! Shared test data: a small in-memory dataset and on-disk input files.

use crate::config::{AppConfig, FormatKind, IndicatorSpec};
use crate::data::Dataset;
use crate::types::{CountryShape, IndicatorRecord};
use geo::{LineString, MultiPolygon, Polygon};
use std::fs;
use std::path::Path;

pub fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
    let ring = LineString::from(vec![
        (x, y),
        (x + size, y),
        (x + size, y + size),
        (x, y + size),
        (x, y),
    ]);
    MultiPolygon::new(vec![Polygon::new(ring, vec![])])
}

pub fn indicators() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec {
            key: "HDI".into(),
            label: "Human Development Index".into(),
            aliases: vec![],
            format: FormatKind::Decimal,
            decimals: 3,
            suffix: None,
        },
        IndicatorSpec {
            key: "LEX".into(),
            label: "Life Expectancy".into(),
            aliases: vec!["LIFE_EXPECTANCY".into()],
            format: FormatKind::Decimal,
            decimals: 1,
            suffix: Some(" yrs".into()),
        },
        IndicatorSpec {
            key: "GNIPC".into(),
            label: "Income per Capita".into(),
            aliases: vec![],
            format: FormatKind::Currency,
            decimals: 0,
            suffix: None,
        },
    ]
}

fn record(id: &str, name: &str, year: i32, values: [Option<f64>; 3]) -> IndicatorRecord {
    IndicatorRecord {
        id: id.into(),
        name: name.into(),
        year,
        values: values.to_vec(),
    }
}

/// USA, FRA and NOR over 2019..=2021. FRA skips 2020, NOR lacks geometry.
pub fn dataset() -> Dataset {
    let records = vec![
        record("USA", "United States", 2019, [Some(0.918), Some(78.8), Some(63_826.0)]),
        record("USA", "United States", 2020, [Some(0.92), Some(77.4), Some(64_140.0)]),
        record("USA", "United States", 2021, [Some(0.921), None, Some(64_765.0)]),
        record("FRA", "France", 2019, [Some(0.901), Some(82.7), Some(46_400.0)]),
        record("FRA", "France", 2021, [Some(0.903), Some(82.5), Some(45_937.0)]),
        record("NOR", "Norway", 2020, [Some(0.959), Some(83.2), None]),
        // Duplicate key: lookups must keep the first row above.
        record("USA", "United States", 2020, [Some(0.5), Some(1.0), Some(1.0)]),
    ];
    let shapes = vec![
        CountryShape { id: "USA".into(), name: Some("United States of America".into()), geometry: square(-120.0, 30.0, 40.0) },
        CountryShape { id: "FRA".into(), name: Some("France".into()), geometry: square(0.0, 43.0, 6.0) },
        CountryShape { id: "GRL".into(), name: Some("Greenland".into()), geometry: square(-50.0, 65.0, 20.0) },
    ];
    Dataset::new(records, indicators(), None, shapes)
}

pub const DATA_CSV: &str = "\
 iso_alpha ,Country Name,Year,hdi,Life-Expectancy,GNIPC
 usa ,  United States ,2020.0,0.92,77.4,64140
FRA,France,2020,0.901,NA,46400
FRA,France,2019,0.899,82.7,
,Nowhere,2020,0.1,1,1
USA,United States,n/a,0.9,1,1
";

pub const GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "id": "USA", "properties": {"name": "United States of America"},
     "geometry": {"type": "Polygon", "coordinates": [[[-120,30],[-80,30],[-80,50],[-120,50],[-120,30]]]}},
    {"type": "Feature", "id": "FRA", "properties": {"name": "France"},
     "geometry": {"type": "MultiPolygon", "coordinates": [[[[0,43],[6,43],[6,49],[0,49],[0,43]]]]}},
    {"type": "Feature", "id": "PIN", "properties": {"name": "Pin"},
     "geometry": {"type": "Point", "coordinates": [1, 1]}}
  ]
}"#;

pub const COLOR_CSV: &str = "iso_alpha,hex\nUSA,#1f77b4\nFRA,#ff7f0e\nDEU,#2ca02c\n";

/// Writes the fixture inputs into `dir` and returns a config pointing at them.
pub fn write_inputs(dir: &Path, with_colors: bool) -> AppConfig {
    fs::write(dir.join("data.csv"), DATA_CSV).unwrap();
    fs::write(dir.join("countries.geo.json"), GEOJSON).unwrap();
    if with_colors {
        fs::write(dir.join("Hex.csv"), COLOR_CSV).unwrap();
    }

    let toml = format!(
        r#"
        [input]
        data_csv = {:?}
        geometry = {:?}
        color_csv = {:?}
        "#,
        dir.join("data.csv"),
        dir.join("countries.geo.json"),
        dir.join("Hex.csv"),
    );
    let mut config = AppConfig::from_toml(&toml).unwrap();
    config.indicators = indicators();
    config
}
