use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result, bail};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub columns: ColumnConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub location_file: PathBuf,
    pub location_sheet: Option<String>,
    pub financial_file: PathBuf,
    pub financial_sheet: Option<String>, // None = first sheet
    pub logo_dir: PathBuf,
}

/// Source column headers. Defaults match the retailer workbooks.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ColumnConfig {
    pub location_retailer: String,
    pub financial_retailer: String,
    pub address: String,
    pub city: String,
    pub latitude: String,
    pub longitude: String,
    pub domain: String,
    pub turnover: String,
    pub employees: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            location_retailer: "Magazin".to_string(),
            financial_retailer: "Retailer Name".to_string(),
            address: "Adresa".to_string(),
            city: "Oras".to_string(),
            latitude: "Latitudine".to_string(),
            longitude: "Longitudine".to_string(),
            domain: "Domain".to_string(),
            turnover: "Turnover 2023 (mil EUR)".to_string(),
            employees: "Avg employees number".to_string(),
        }
    }
}

pub const DEFAULT_PALETTE: [&str; 10] = [
    "red", "blue", "green", "orange", "purple",
    "cadetblue", "darkred", "darkgreen", "darkpurple", "lightgray",
];

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub default_center: [f64; 2], // [lat, lon]
    pub zoom_start: u8,
    pub width: u32,
    pub height: u32,
    pub logo_width: u32,
    pub palette: Vec<String>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_center: [45.9432, 24.9668],
            zoom_start: 6,
            width: 900,
            height: 600,
            logo_width: 100,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8501 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        if config.map.palette.is_empty() {
            bail!("map.palette must contain at least one color");
        }

        // Relative inputs are relative to the config file, not the cwd.
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.input.location_file = base.join(&config.input.location_file);
        config.input.financial_file = base.join(&config.input.financial_file);
        config.input.logo_dir = base.join(&config.input.logo_dir);

        Ok(config)
    }
}
