use crate::config::{AppConfig, IndicatorSpec, InputConfig};
use crate::error::LoadError;
use crate::spatial::CountryIndex;
use crate::types::{ColorMapping, CountryShape, IndicatorRecord};
use csv::{ReaderBuilder, StringRecord, Trim};
use geo::MultiPolygon;
use shapefile::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const ID_COLUMNS: &[&str] = &["ISO_ALPHA", "ISO3", "ISO_CODE", "COUNTRY_CODE", "CODE"];
const NAME_COLUMNS: &[&str] = &["COUNTRY", "COUNTRY_NAME", "NAME", "ENTITY"];
const YEAR_COLUMNS: &[&str] = &["YEAR"];
const COLOR_COLUMNS: &[&str] = &["HEX", "COLOR", "COLOUR"];

/// Everything the dashboard reads, loaded once and shared read-only.
pub struct Dataset {
    /// Rows in file order. Duplicate (id, year) pairs are kept; lookups take the first.
    pub records: Vec<IndicatorRecord>,
    pub indicators: Vec<IndicatorSpec>,
    pub colors: Option<ColorMapping>,
    pub shapes: Vec<CountryShape>,
    pub index: CountryIndex,
    shape_lookup: HashMap<String, usize>,
}

impl Dataset {
    pub fn new(
        records: Vec<IndicatorRecord>,
        indicators: Vec<IndicatorSpec>,
        colors: Option<ColorMapping>,
        shapes: Vec<CountryShape>,
    ) -> Self {
        let shapes = merge_shapes(shapes);
        let index = CountryIndex::build(&shapes);
        let shape_lookup = shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| (shape.id.clone(), i))
            .collect();
        Self {
            records,
            indicators,
            colors,
            shapes,
            index,
            shape_lookup,
        }
    }

    pub fn shape(&self, id: &str) -> Option<&CountryShape> {
        self.shape_lookup.get(id).and_then(|&i| self.shapes.get(i))
    }

    pub fn indicator_index(&self, key: &str) -> Option<usize> {
        self.indicators.iter().position(|spec| spec.key.eq_ignore_ascii_case(key))
    }

    /// Country code at a map coordinate, whether or not the dataset has rows for it.
    pub fn country_at(&self, lon: f64, lat: f64) -> Option<&str> {
        self.index
            .locate(&self.shapes, lon, lat)
            .and_then(|i| self.shapes.get(i))
            .map(|shape| shape.id.as_str())
    }
}

/// Folds features that share a country code into one multipolygon, in first-seen order.
fn merge_shapes(shapes: Vec<CountryShape>) -> Vec<CountryShape> {
    let total = shapes.len();
    let mut merged: Vec<CountryShape> = Vec::with_capacity(total);
    let mut position: HashMap<String, usize> = HashMap::new();

    for shape in shapes {
        match position.get(&shape.id).and_then(|&i| merged.get_mut(i)) {
            Some(target) => {
                target.geometry.0.extend(shape.geometry.0);
                if target.name.is_none() {
                    target.name = shape.name;
                }
            }
            None => {
                position.insert(shape.id.clone(), merged.len());
                merged.push(shape);
            }
        }
    }

    if merged.len() < total {
        debug!("Merged {} geometry features into {} countries", total, merged.len());
    }
    merged
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    input: InputConfig,
    indicators: Vec<IndicatorSpec>,
}

/// Memoizes loaded datasets by their inputs so files are read at most once.
#[derive(Default)]
pub struct LoadCache {
    entries: Mutex<HashMap<CacheKey, Arc<Dataset>>>,
}

impl LoadCache {
    pub fn get_or_load(&self, config: &AppConfig) -> Result<Arc<Dataset>, LoadError> {
        let key = CacheKey {
            input: config.input.clone(),
            indicators: config.indicators.clone(),
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(dataset) = entries.get(&key) {
            debug!("Dataset cache hit for {:?}", key.input.data_csv);
            return Ok(Arc::clone(dataset));
        }

        let dataset = Arc::new(load_dataset(config)?);
        entries.insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }
}

pub fn load_dataset(config: &AppConfig) -> Result<Dataset, LoadError> {
    info!("Loading data...");

    // 1. Load CSV Data
    let table = load_records(&config.input.data_csv, &config.indicators)?;
    info!("Loaded {} rows from {:?}", table.records.len(), config.input.data_csv);

    // 2. Load Geometry (Shapefile or GeoJSON)
    let shapes = load_geometry(&config.input)?;
    info!("Loaded geometry for {} countries", shapes.len());

    // 3. Optional colors; any failure degrades to the continuous scale.
    let colors = match &config.input.color_csv {
        Some(path) => match load_color_mapping(path) {
            Ok(mapping) => {
                info!("Loaded {} country colors", mapping.len());
                Some(mapping)
            }
            Err(e) => {
                warn!("Color mapping omitted: {}", e);
                None
            }
        },
        None => None,
    };

    let mut records = table.records;
    if !table.has_names {
        warn!("No country name column in {:?}; using geometry names", config.input.data_csv);
    }
    fill_missing_names(&mut records, &shapes);

    Ok(Dataset::new(records, config.indicators.clone(), colors, shapes))
}

/// Uppercases a header and folds spaces and hyphens so that variants compare equal.
pub fn canonical_column(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        let wanted = canonical_column(candidate);
        headers.iter().position(|h| *h == wanted)
    })
}

fn require_column(path: &Path, headers: &[String], candidates: &[&str]) -> Result<usize, LoadError> {
    find_column(headers, candidates).ok_or_else(|| LoadError::MissingColumn {
        file: path.to_path_buf(),
        column: candidates.first().map(|c| c.to_string()).unwrap_or_default(),
    })
}

fn open_csv(path: &Path) -> Result<(csv::Reader<File>, Vec<String>), LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingFile(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(file);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|source| LoadError::Csv { file: path.to_path_buf(), source })?
        .iter()
        .map(canonical_column)
        .collect();
    Ok((rdr, headers))
}

struct Table {
    records: Vec<IndicatorRecord>,
    has_names: bool,
}

fn load_records(path: &Path, indicators: &[IndicatorSpec]) -> Result<Table, LoadError> {
    let (mut rdr, headers) = open_csv(path)?;

    let id_idx = require_column(path, &headers, ID_COLUMNS)?;
    let year_idx = require_column(path, &headers, YEAR_COLUMNS)?;
    let name_idx = find_column(&headers, NAME_COLUMNS);

    let indicator_idx = indicators
        .iter()
        .map(|spec| {
            let mut candidates: Vec<&str> = vec![spec.key.as_str()];
            candidates.extend(spec.aliases.iter().map(String::as_str));
            require_column(path, &headers, &candidates)
        })
        .collect::<Result<Vec<usize>, LoadError>>()?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let row = result.map_err(|source| LoadError::Csv { file: path.to_path_buf(), source })?;

        let id = normalize_id(field(&row, id_idx));
        let year = parse_year(field(&row, year_idx));
        let (id, year) = match (id, year) {
            (Some(id), Some(year)) => (id, year),
            _ => {
                skipped += 1;
                continue;
            }
        };

        let name = name_idx
            .map(|i| field(&row, i).trim().to_string())
            .unwrap_or_default();
        let values = indicator_idx.iter().map(|&i| parse_value(field(&row, i))).collect();

        records.push(IndicatorRecord { id, name, year, values });
    }

    if skipped > 0 {
        warn!("Skipped {} rows without a usable country code or year in {:?}", skipped, path);
    }

    Ok(Table {
        records,
        has_names: name_idx.is_some(),
    })
}

fn field(row: &StringRecord, idx: usize) -> &str {
    row.get(idx).unwrap_or("")
}

pub fn normalize_id(raw: &str) -> Option<String> {
    let id = raw.trim().to_ascii_uppercase();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Accepts integral years written as `2020` or `2020.0`.
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    let value: f64 = raw.parse().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

pub fn parse_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("n/a") {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn fill_missing_names(records: &mut [IndicatorRecord], shapes: &[CountryShape]) {
    let shape_names: HashMap<&str, &str> = shapes
        .iter()
        .filter_map(|s| s.name.as_deref().map(|n| (s.id.as_str(), n)))
        .collect();

    for record in records.iter_mut().filter(|r| r.name.is_empty()) {
        record.name = shape_names
            .get(record.id.as_str())
            .map(|n| n.to_string())
            .unwrap_or_else(|| record.id.clone());
    }
}

pub fn load_color_mapping(path: &Path) -> Result<ColorMapping, LoadError> {
    let (mut rdr, headers) = open_csv(path)?;
    let id_idx = require_column(path, &headers, ID_COLUMNS)?;
    let color_idx = require_column(path, &headers, COLOR_COLUMNS)?;

    let mut mapping = ColorMapping::new();
    for result in rdr.records() {
        let row = result.map_err(|source| LoadError::Csv { file: path.to_path_buf(), source })?;
        let color = field(&row, color_idx).trim();
        if let Some(id) = normalize_id(field(&row, id_idx)) {
            if !color.is_empty() {
                mapping.entry(id).or_insert_with(|| color.to_string());
            }
        }
    }
    Ok(mapping)
}

pub fn load_geometry(input: &InputConfig) -> Result<Vec<CountryShape>, LoadError> {
    let path = &input.geometry;
    if !path.exists() {
        return Err(LoadError::MissingFile(path.clone()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| LoadError::UnsupportedGeometry(format!("{:?} has no extension", path)))?;

    match extension.as_str() {
        "shp" => load_shapefile(input),
        "json" | "geojson" => load_geojson(input),
        _ => Err(LoadError::UnsupportedGeometry(extension)),
    }
}

fn load_shapefile(input: &InputConfig) -> Result<Vec<CountryShape>, LoadError> {
    use shapefile::dbase::FieldValue;

    let path = &input.geometry;
    let shp_err = |source: shapefile::Error| LoadError::Shapefile { file: path.clone(), source };
    let mut reader = Reader::from_path(path).map_err(shp_err)?;
    let id_field = input.geometry_id_property.as_deref().unwrap_or("ISO_A3");

    let mut shapes = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.map_err(shp_err)?;

        let id = match record.get(id_field) {
            Some(FieldValue::Character(Some(s))) => normalize_id(s),
            _ => None,
        };
        let id = match id {
            Some(id) => id,
            None => continue,
        };
        let name = match record.get(&input.geometry_name_property) {
            Some(FieldValue::Character(Some(s))) => Some(s.trim().to_string()),
            _ => None,
        };

        let converted: Result<MultiPolygon<f64>, String> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon.try_into().map_err(|e| format!("{:?}", e)),
            shapefile::Shape::PolygonM(polygon) => polygon.try_into().map_err(|e| format!("{:?}", e)),
            shapefile::Shape::PolygonZ(polygon) => polygon.try_into().map_err(|e| format!("{:?}", e)),
            _ => continue, // Skip non-polygon shapes
        };
        match converted {
            Ok(geometry) => shapes.push(CountryShape { id, name, geometry }),
            Err(e) => warn!("Skipping {}: failed to convert polygon: {}", id, e),
        }
    }

    Ok(shapes)
}

fn load_geojson(input: &InputConfig) -> Result<Vec<CountryShape>, LoadError> {
    use geojson::{feature::Id, GeoJson};

    let path = &input.geometry;
    let reader = BufReader::new(File::open(path)?);
    let geojson = GeoJson::from_reader(reader)
        .map_err(|source| LoadError::GeoJson { file: path.clone(), source: source.into() })?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(LoadError::UnsupportedGeometry("GeoJSON must be a FeatureCollection".into())),
    };

    let mut shapes = Vec::new();

    for feature in collection.features {
        let property = |key: &str| feature.properties.as_ref().and_then(|props| props.get(key));

        let raw_id = match &input.geometry_id_property {
            Some(key) => match property(key) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            },
            None => match &feature.id {
                Some(Id::String(s)) => Some(s.clone()),
                Some(Id::Number(n)) => Some(n.to_string()),
                None => None,
            },
        };
        let id = match raw_id.as_deref().and_then(normalize_id) {
            Some(id) => id,
            None => continue,
        };
        let name = match property(&input.geometry_name_property) {
            Some(serde_json::Value::String(s)) => Some(s.trim().to_string()),
            _ => None,
        };

        let geometry = match feature.geometry {
            Some(geom) => match geo::Geometry::<f64>::try_from(geom.value) {
                Ok(geo::Geometry::MultiPolygon(mp)) => mp,
                Ok(geo::Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
                Ok(_) => continue, // Skip points/lines
                Err(e) => {
                    warn!("Skipping {}: failed to convert geometry: {:?}", id, e);
                    continue;
                }
            },
            None => continue,
        };

        shapes.push(CountryShape { id, name, geometry });
    }

    Ok(shapes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_inputs;
    use tempfile::TempDir;

    #[test]
    fn canonical_column_folds_case_and_separators() {
        assert_eq!(canonical_column(" iso_alpha "), "ISO_ALPHA");
        assert_eq!(canonical_column("Life-Expectancy"), "LIFE_EXPECTANCY");
        assert_eq!(canonical_column("\u{feff}Country Name"), "COUNTRY_NAME");
        assert_eq!(canonical_column("LEx"), "LEX");
    }

    #[test]
    fn year_and_value_coercion() {
        assert_eq!(parse_year("2020"), Some(2020));
        assert_eq!(parse_year(" 2020.0 "), Some(2020));
        assert_eq!(parse_year("2020.5"), None);
        assert_eq!(parse_year("n/a"), None);
        assert_eq!(parse_value("0.92"), Some(0.92));
        assert_eq!(parse_value("NA"), None);
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("NaN"), None);
    }

    #[test]
    fn loads_and_normalizes_inputs() {
        let dir = TempDir::new().unwrap();
        let config = write_inputs(dir.path(), true);
        let dataset = load_dataset(&config).unwrap();

        // Blank id and unparsable year rows are dropped.
        assert_eq!(dataset.records.len(), 3);
        let usa = &dataset.records[0];
        assert_eq!(usa.id, "USA");
        assert_eq!(usa.name, "United States");
        assert_eq!(usa.year, 2020);
        assert_eq!(usa.values, vec![Some(0.92), Some(77.4), Some(64140.0)]);

        let fra_2020 = &dataset.records[1];
        assert_eq!(fra_2020.values[1], None);

        // The point feature is not a country outline.
        assert_eq!(dataset.shapes.len(), 2);
        assert_eq!(dataset.country_at(-100.0, 40.0), Some("USA"));
        assert_eq!(dataset.country_at(-30.0, 0.0), None);

        let colors = dataset.colors.as_ref().unwrap();
        assert_eq!(colors.get("FRA").map(String::as_str), Some("#ff7f0e"));
    }

    #[test]
    fn missing_dataset_is_fatal_and_names_the_file() {
        let dir = TempDir::new().unwrap();
        let mut config = write_inputs(dir.path(), false);
        config.input.data_csv = dir.path().join("final_with_socio_cleaned.csv");

        match load_dataset(&config) {
            Err(LoadError::MissingFile(path)) => assert!(path.ends_with("final_with_socio_cleaned.csv")),
            other => panic!("expected MissingFile, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_indicator_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = write_inputs(dir.path(), false);
        config.indicators[0].key = "MORTALITY".into();

        let err = load_dataset(&config).err().unwrap();
        assert!(matches!(err, LoadError::MissingColumn { ref column, .. } if column == "MORTALITY"));
    }

    #[test]
    fn missing_color_file_degrades_to_no_mapping() {
        let dir = TempDir::new().unwrap();
        let config = write_inputs(dir.path(), false);
        let dataset = load_dataset(&config).unwrap();
        assert!(dataset.colors.is_none());
        assert_eq!(dataset.records.len(), 3);
    }

    #[test]
    fn color_file_without_color_column_is_omitted() {
        let dir = TempDir::new().unwrap();
        let config = write_inputs(dir.path(), false);
        std::fs::write(dir.path().join("Hex.csv"), "iso_alpha,shade\nUSA,blue\n").unwrap();

        assert!(matches!(
            load_color_mapping(&dir.path().join("Hex.csv")),
            Err(LoadError::MissingColumn { .. })
        ));
        assert!(load_dataset(&config).unwrap().colors.is_none());
    }

    #[test]
    fn names_fall_back_to_geometry_then_code() {
        let dir = TempDir::new().unwrap();
        let config = write_inputs(dir.path(), false);
        std::fs::write(&config.input.data_csv, "ISO3,year,HDI,LEX,GNIPC\nfra,2020,0.9,82,40000\nxyz,2020,0.1,50,100\n").unwrap();

        let dataset = load_dataset(&config).unwrap();
        assert_eq!(dataset.records[0].name, "France");
        assert_eq!(dataset.records[1].name, "XYZ");
    }

    #[test]
    fn geojson_ids_come_from_configured_property() {
        let dir = TempDir::new().unwrap();
        let mut config = write_inputs(dir.path(), false);
        let path = dir.path().join("admin0.geojson");
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "id": 250, "properties": {"ISO_A3": " fra ", "name": "France"},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,43],[6,43],[6,49],[0,49],[0,43]]]}},
                {"type": "Feature", "id": 840, "properties": {"name": "Unnamed"},
                 "geometry": {"type": "Polygon", "coordinates": [[[-120,30],[-80,30],[-80,50],[-120,50],[-120,30]]]}}
            ]}"#,
        )
        .unwrap();
        config.input.geometry = path;
        config.input.geometry_id_property = Some("ISO_A3".into());

        let shapes = load_geometry(&config.input).unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].id, "FRA");
        assert_eq!(shapes[0].name.as_deref(), Some("France"));
    }

    #[test]
    fn loads_shapefile_keyed_by_attribute() {
        use shapefile::dbase::{FieldValue, Record, TableWriterBuilder};
        use shapefile::{Point, Polygon, PolygonRing, Writer};

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admin0.shp");
        {
            let table = TableWriterBuilder::new()
                .add_character_field("ADM0_A3".try_into().unwrap(), 3)
                .add_character_field("NAME".try_into().unwrap(), 32);
            let mut writer = Writer::from_path(&path, table).unwrap();
            for (code, name, x) in [("fra", "France", 0.0), ("DEU", "Germany", 10.0)] {
                let polygon = Polygon::new(PolygonRing::Outer(vec![
                    Point::new(x, 40.0),
                    Point::new(x, 50.0),
                    Point::new(x + 5.0, 50.0),
                    Point::new(x + 5.0, 40.0),
                    Point::new(x, 40.0),
                ]));
                let mut record = Record::default();
                record.insert("ADM0_A3".to_string(), FieldValue::Character(Some(code.to_string())));
                record.insert("NAME".to_string(), FieldValue::Character(Some(name.to_string())));
                writer.write_shape_and_record(&polygon, &record).unwrap();
            }
        }

        let mut config = write_inputs(dir.path(), false);
        config.input.geometry = path;
        config.input.geometry_id_property = Some("ADM0_A3".into());
        config.input.geometry_name_property = "NAME".into();

        let dataset = load_dataset(&config).unwrap();
        let ids: Vec<&str> = dataset.shapes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["FRA", "DEU"]);
        assert_eq!(dataset.shape("DEU").and_then(|s| s.name.as_deref()), Some("Germany"));
        assert_eq!(dataset.country_at(2.5, 45.0), Some("FRA"));
        assert_eq!(dataset.country_at(12.5, 45.0), Some("DEU"));
    }

    #[test]
    fn corrupt_shapefile_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let mut config = write_inputs(dir.path(), false);
        let path = dir.path().join("broken.shp");
        std::fs::write(&path, b"not a shapefile").unwrap();
        std::fs::write(dir.path().join("broken.dbf"), b"").unwrap();
        config.input.geometry = path;

        assert!(matches!(load_dataset(&config), Err(LoadError::Shapefile { .. })));
    }

    #[test]
    fn features_sharing_a_code_become_one_country() {
        use crate::fixtures::square;

        let shapes = vec![
            CountryShape { id: "USA".into(), name: None, geometry: square(-120.0, 30.0, 40.0) },
            CountryShape { id: "FRA".into(), name: Some("France".into()), geometry: square(0.0, 43.0, 6.0) },
            CountryShape { id: "USA".into(), name: Some("Alaska".into()), geometry: square(-160.0, 55.0, 15.0) },
        ];
        let dataset = Dataset::new(vec![], vec![], None, shapes);

        assert_eq!(dataset.shapes.len(), 2);
        let usa = dataset.shape("USA").unwrap();
        assert_eq!(usa.geometry.0.len(), 2);
        assert_eq!(usa.name.as_deref(), Some("Alaska"));
        assert_eq!(dataset.country_at(-150.0, 60.0), Some("USA"));
        assert_eq!(dataset.country_at(-100.0, 40.0), Some("USA"));
        assert_eq!(dataset.country_at(3.0, 45.0), Some("FRA"));
    }

    #[test]
    fn cache_loads_once_and_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let config = write_inputs(dir.path(), true);
        let cache = LoadCache::default();

        let first = cache.get_or_load(&config).unwrap();
        let second = cache.get_or_load(&config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let fresh = load_dataset(&config).unwrap();
        assert_eq!(fresh.records, first.records);
    }
}
