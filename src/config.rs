use crate::render::MAX_ZOOM;
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default = "default_indicators")]
    pub indicators: Vec<IndicatorSpec>,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct InputConfig {
    pub data_csv: PathBuf,
    pub geometry: PathBuf,
    pub color_csv: Option<PathBuf>,
    /// Feature property holding the country code. The feature `id` is used when unset.
    pub geometry_id_property: Option<String>,
    #[serde(default = "default_name_property")]
    pub geometry_name_property: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Decimal,
    Percent,
    Currency,
    Integer,
}

/// One tracked indicator column and how its values are displayed.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct IndicatorSpec {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub format: FormatKind,
    #[serde(default = "default_decimals")]
    pub decimals: usize,
    pub suffix: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    pub default_indicator: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub tile_dir: PathBuf,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Seconds a selection survives without requests.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_indicator: "HDI".to_string(),
            width: 960,
            height: 480,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tile_dir: PathBuf::from("output/tiles"),
            min_zoom: 0,
            max_zoom: 3,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            session_ttl_secs: default_session_ttl(),
        }
    }
}

impl IndicatorSpec {
    fn new(key: &str, label: &str, aliases: &[&str], format: FormatKind, decimals: usize) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            format,
            decimals,
            suffix: None,
        }
    }

    fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = Some(suffix.to_string());
        self
    }
}

fn default_name_property() -> String {
    "name".to_string()
}

fn default_session_ttl() -> u64 {
    crate::session::SESSION_TTL.as_secs()
}

fn default_decimals() -> usize {
    2
}

pub fn default_indicators() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec::new("HDI", "Human Development Index", &["HUMAN_DEVELOPMENT_INDEX"], FormatKind::Decimal, 3),
        IndicatorSpec::new("LEX", "Life Expectancy", &["LIFE_EXPECTANCY", "LE"], FormatKind::Decimal, 1)
            .with_suffix(" yrs"),
        IndicatorSpec::new("GNIPC", "Income per Capita", &["GNI_PC", "GNI_PER_CAPITA", "INCOME"], FormatKind::Currency, 0),
        IndicatorSpec::new("MEDIAN_AGE", "Median Age", &["AGE", "MEDIANAGE"], FormatKind::Decimal, 1)
            .with_suffix(" yrs"),
        IndicatorSpec::new("GINI", "Inequality (Gini)", &["GINI_INDEX", "INEQUALITY"], FormatKind::Percent, 1),
        IndicatorSpec::new("MORTALITY", "Mortality Rate", &["MORTALITY_RATE", "MR"], FormatKind::Decimal, 1)
            .with_suffix(" per 1k"),
        IndicatorSpec::new("DENSITY", "Population Density", &["POP_DENSITY", "POPULATION_DENSITY"], FormatKind::Integer, 0)
            .with_suffix(" /km²"),
    ]
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let output = &self.output;
        ensure!(
            output.min_zoom <= output.max_zoom,
            "output.min_zoom ({}) is greater than output.max_zoom ({})",
            output.min_zoom,
            output.max_zoom
        );
        ensure!(
            output.max_zoom <= MAX_ZOOM,
            "output.max_zoom ({}) exceeds the limit of {}",
            output.max_zoom,
            MAX_ZOOM
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [input]
            data_csv = "final_with_socio_cleaned.csv"
            geometry = "countries.geo.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.indicators.len(), 7);
        assert_eq!(config.map.default_indicator, "HDI");
        assert_eq!(config.server.port, 8080);
        assert!(config.input.color_csv.is_none());
        assert_eq!(config.input.geometry_name_property, "name");
    }

    #[test]
    fn custom_indicators_replace_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [input]
            data_csv = "data.csv"
            geometry = "world.geojson"
            color_csv = "Hex.csv"

            [[indicators]]
            key = "LEX"
            label = "Life Expectancy"
            format = "decimal"
            decimals = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.indicators.len(), 1);
        assert_eq!(config.indicators[0].format, FormatKind::Decimal);
        assert_eq!(config.indicators[0].key, "LEX");
        assert_eq!(config.indicators[0].suffix, None);
    }

    #[test]
    fn rejects_unbounded_zoom_range() {
        let base = r#"
            [input]
            data_csv = "data.csv"
            geometry = "world.geojson"
            "#;
        let err = AppConfig::from_toml(&format!("{}\n[output]\ntile_dir = \"t\"\nmin_zoom = 0\nmax_zoom = 40\n", base))
            .unwrap_err();
        assert!(err.to_string().contains("max_zoom"));

        let err = AppConfig::from_toml(&format!("{}\n[output]\ntile_dir = \"t\"\nmin_zoom = 5\nmax_zoom = 2\n", base))
            .unwrap_err();
        assert!(err.to_string().contains("min_zoom"));

        assert!(AppConfig::from_toml(base).is_ok());
    }
}
