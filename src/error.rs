use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading the dataset, color mapping or geometry.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Missing input file: {0:?}")]
    MissingFile(PathBuf),

    #[error("Missing column '{column}' in {file:?}")]
    MissingColumn { file: PathBuf, column: String },

    #[error("CSV error in {file:?}: {source}")]
    Csv {
        file: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("GeoJSON error in {file:?}: {source}")]
    GeoJson {
        file: PathBuf,
        #[source]
        source: geojson::Error,
    },

    #[error("Shapefile error in {file:?}: {source}")]
    Shapefile {
        file: PathBuf,
        #[source]
        source: shapefile::Error,
    },

    #[error("Unsupported geometry format: {0}")]
    UnsupportedGeometry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal conditions shown to the user next to whatever could still be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    NoDataForSelection { country: String, year: Option<i32> },
    UnresolvedClickTarget { target: Option<String> },
    EmptyYear { year: i32 },
    ColorMappingUnavailable,
    UnknownIndicator { requested: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoDataForSelection { country, year: Some(year) } => {
                write!(f, "No data for {} in {}.", country, year)
            }
            Notice::NoDataForSelection { country, year: None } => {
                write!(f, "No data available for {}.", country)
            }
            Notice::UnresolvedClickTarget { target: Some(target) } => {
                write!(f, "'{}' is not a country in this dataset.", target)
            }
            Notice::UnresolvedClickTarget { target: None } => {
                write!(f, "No country at that location.")
            }
            Notice::EmptyYear { year } => write!(f, "No countries reported data for {}.", year),
            Notice::ColorMappingUnavailable => {
                write!(f, "Country colors are unavailable; showing the indicator scale instead.")
            }
            Notice::UnknownIndicator { requested } => {
                write!(f, "Unknown indicator '{}'; showing the default instead.", requested)
            }
        }
    }
}
