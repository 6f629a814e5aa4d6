//src/config.rs
use comfy_table::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_CONFIG_DIR: &str = "gym-planner";
const CONFIG_ENV_VAR: &str = "GYM_PLANNER_CONFIG_DIR"; // Environment variable name

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine configuration directory.")]
    CannotDetermineConfigDir,
    #[error("I/O error accessing config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config data (TOML): {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid color name: {0}")]
    InvalidColor(String),
    #[error("Rest duration must be greater than zero seconds.")]
    InvalidRestDuration,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric, // kg
    Imperial, // lbs
}

impl Units {
    pub fn weight_abbr(&self) -> &'static str {
        match self {
            Units::Metric => "kg",
            Units::Imperial => "lbs",
        }
    }
}

// Define standard colors using strum for easy iteration/parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum StandardColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    DarkGrey,
    DarkRed,
    DarkGreen,
    DarkYellow,
    DarkBlue,
    DarkMagenta,
    DarkCyan,
    Grey,
}

// Helper to convert our enum to comfy_table::Color
impl From<StandardColor> for Color {
    fn from(value: StandardColor) -> Self {
        match value {
            StandardColor::Black => Color::Black,
            StandardColor::Red => Color::Red,
            StandardColor::Green => Color::Green,
            StandardColor::Yellow => Color::Yellow,
            StandardColor::Blue => Color::Blue,
            StandardColor::Magenta => Color::Magenta,
            StandardColor::Cyan => Color::Cyan,
            StandardColor::White => Color::White,
            StandardColor::DarkGrey => Color::DarkGrey,
            StandardColor::DarkRed => Color::DarkRed,
            StandardColor::DarkGreen => Color::DarkGreen,
            StandardColor::DarkYellow => Color::DarkYellow,
            StandardColor::DarkBlue => Color::DarkBlue,
            StandardColor::DarkMagenta => Color::DarkMagenta,
            StandardColor::DarkCyan => Color::DarkCyan,
            StandardColor::Grey => Color::Grey,
        }
    }
}

// Helper to parse a string into our StandardColor enum
pub fn parse_color(color_str: &str) -> Result<StandardColor, ConfigError> {
    for color in StandardColor::iter() {
        if format!("{:?}", color).eq_ignore_ascii_case(color_str) {
            return Ok(color);
        }
    }
    Err(ConfigError::InvalidColor(color_str.to_string()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct ThemeConfig {
    pub header_color: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        ThemeConfig {
            header_color: "Green".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Config {
    pub units: Units,
    /// Rest after a set when more sets of the same exercise remain.
    pub rest_between_sets_secs: u64,
    /// Rest after the last set of an exercise, before the next one.
    pub rest_between_exercises_secs: u64,
    /// Pre-fill set weight from the last recorded weight for that set.
    pub auto_fill_weight: bool,
    /// Pre-fill reps from the template goal.
    pub auto_fill_reps: bool,
    pub theme: ThemeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            units: Units::default(),
            rest_between_sets_secs: 30,
            rest_between_exercises_secs: 60,
            auto_fill_weight: true,
            auto_fill_reps: true,
            theme: ThemeConfig::default(),
        }
    }
}

/// Determines the path to the configuration file.
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir_override = std::env::var(CONFIG_ENV_VAR).ok();

    let config_dir_path = match config_dir_override {
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.is_dir() {
                eprintln!(
                    "Warning: Environment variable {} points to '{}', which is not a directory. Trying to create it.",
                    CONFIG_ENV_VAR,
                    path.display()
                );
                fs::create_dir_all(&path)?;
            }
            path
        }
        None => {
            let base_config_dir = dirs::config_dir().ok_or(ConfigError::CannotDetermineConfigDir)?;
            base_config_dir.join(APP_CONFIG_DIR)
        }
    };

    if !config_dir_path.exists() {
        fs::create_dir_all(&config_dir_path)?;
    }

    Ok(config_dir_path.join(CONFIG_FILE_NAME))
}

/// Loads the configuration from the TOML file at the given path, writing a
/// default file on first run.
pub fn load_config(config_path: &Path) -> Result<Config, ConfigError> {
    if !config_path.exists() {
        let default_config = Config::default();
        save_config(config_path, &default_config)?;
        Ok(default_config)
    } else {
        let config_content = fs::read_to_string(config_path)?;
        // #[serde(default)] fills in any missing fields
        let config: Config = toml::from_str(&config_content).map_err(ConfigError::TomlParse)?;
        Ok(config)
    }
}

/// Saves the configuration to the TOML file.
pub fn save_config(config_path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let config_content = toml::to_string_pretty(config).map_err(ConfigError::TomlSerialize)?;
    fs::write(config_path, config_content)?;
    Ok(())
}
