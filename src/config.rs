//! Configuration records for building a decoder.
//!
//! Files ending in `.json` are read as JSON, anything else as YAML:
//!
//! ```yaml
//! threshold: 50
//! offset: [10, 4]
//! lcd:
//!   - name: big
//!     tl: [0, 0]
//!     tr: [20, 0]
//!     br: [20, 40]
//!     bl: [0, 40]
//!     width: 4
//!     dp: [23, 40]
//! digit:
//!   - lcd: big
//!     coord: [0, 0]
//! ```

use std::fs;
use std::path::Path;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::{LcdError, Result};

pub const DEFAULT_THRESHOLD: u32 = 50;

/// One digit template. Corners are absolute; the template is normalised so
/// that `tl` becomes its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub name: String,
    pub tl: [i32; 2],
    pub tr: [i32; 2],
    pub br: [i32; 2],
    pub bl: [i32; 2],
    /// Line width of the segments in pixels.
    pub width: i32,
    /// Decimal point location, if the digit has one. An empty list also
    /// means none.
    #[serde(default, deserialize_with = "optional_point")]
    pub dp: Option<[i32; 2]>,
}

fn optional_point<'de, D>(deserializer: D) -> std::result::Result<Option<[i32; 2]>, D::Error>
where
    D: Deserializer<'de>,
{
    let coords: Option<Vec<i32>> = Option::deserialize(deserializer)?;
    match coords.as_deref() {
        None | Some([]) => Ok(None),
        Some(&[x, y]) => Ok(Some([x, y])),
        Some(other) => Err(de::Error::invalid_length(
            other.len(),
            &"an empty list or an [x, y] pair",
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitConfig {
    #[serde(alias = "lcd")]
    pub template: String,
    /// Top left corner of the digit, before the global offset is applied.
    pub coord: [i32; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LcdConfig {
    /// Percentage of the way from the off level to the on level at which a
    /// segment reads as on. 0 selects [`DEFAULT_THRESHOLD`].
    pub threshold: u32,
    /// Size of the moving average history.
    pub history: usize,
    /// Maximum number of stored calibration levels.
    pub max_levels: usize,
    /// Set for displays where lit segments are lighter than the background.
    pub inverse: bool,
    /// Added to every digit coordinate.
    pub offset: [i32; 2],
    #[serde(alias = "lcd")]
    pub templates: Vec<TemplateConfig>,
    #[serde(alias = "digit")]
    pub digits: Vec<DigitConfig>,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            history: 5,
            max_levels: 200,
            inverse: false,
            offset: [0, 0],
            templates: Vec::new(),
            digits: Vec::new(),
        }
    }
}

impl LcdConfig {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }
}

/// Parses `data` as JSON when `path` has a `.json` extension, otherwise as YAML.
pub fn parse_config<T: DeserializeOwned>(path: &Path, data: &str) -> Result<T> {
    let json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if json {
        Ok(serde_json::from_str(data)?)
    } else {
        Ok(serde_yaml::from_str(data)?)
    }
}

pub fn load_config(path: &Path) -> Result<LcdConfig> {
    let data = fs::read_to_string(path).map_err(|e| LcdError::io(path, e))?;
    let config: LcdConfig = parse_config(path, &data)?;
    log::debug!(
        "Loaded {} templates and {} digits from {}",
        config.templates.len(),
        config.digits.len(),
        path.display()
    );
    Ok(config)
}
