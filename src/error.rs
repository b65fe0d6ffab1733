use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = LcdError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LcdError {
    #[error("duplicate template entry: {0}")]
    DuplicateTemplate(String),
    #[error("unknown template {0}")]
    UnknownTemplate(String),
    #[error("no LCD templates defined")]
    NoTemplates,
    #[error("no digits defined")]
    NoDigits,
    #[error("threshold {0} is outside 0-100")]
    InvalidThreshold(u32),
    #[error("template {name}: {reason}")]
    DegenerateTemplate { name: String, reason: String },
    #[error("template {template}: {region} region encloses no points")]
    EmptyRegion { template: String, region: String },
    #[error("expected {expected} digits, calibration string has {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("no segment pattern for character {0:?}")]
    UnknownCharacter(char),
    #[error("digit {digit} lies outside the {width}x{height} image")]
    OutOfBounds { digit: usize, width: u32, height: u32 },
    #[error("no calibration levels available")]
    NoLevels,
    #[error("levels are for {found} digits, decoder has {expected}")]
    LevelsMismatch { expected: usize, found: usize },
    #[error("invalid config entry (index {index}): {source}")]
    Config {
        index: usize,
        #[source]
        source: Box<LcdError>,
    },
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl LcdError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
