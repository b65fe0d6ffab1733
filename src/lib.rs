//! Reads 7-segment LCD/LED digits from still images.
//!
//! Digits are described by templates (four corners and a line width) placed at
//! known positions. [`LcdDecoder::preset`] calibrates on/off levels against an
//! image showing a known string; [`LcdDecoder::decode`] then reads the digits.
//!
//! A decoder is not meant for concurrent use: run one calibration or decode
//! at a time per instance. Independent instances share no state.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::instrument;

mod calibrate;
pub mod charset;
pub mod config;
mod decode;
mod error;
pub mod levels;
mod mark;
pub mod mavg;
pub mod point;
mod result;
pub mod sample;
pub mod template;

pub use calibrate::DEFAULT_JITTER;
pub use charset::{digits_to_segments, INVALID_CHAR};
pub use config::{
    load_config, parse_config, DigitConfig, LcdConfig, TemplateConfig, DEFAULT_THRESHOLD,
};
pub use error::{LcdError, Result};
pub use levels::{LevelHistory, Levels};
pub use point::{BBox, PList, Point};
pub use result::*;
pub use sample::PixelSource;
pub use template::{Digit, Segment, Template};

pub struct LcdDecoderBuilder {
    threshold: u32,
    history: usize,
    max_levels: usize,
    inverse: bool,
    jitter: u32,
    rng: Option<StdRng>,
}

impl LcdDecoderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentage of the way from the off level to the on level at which a
    /// segment reads as on.
    pub fn threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Size of the moving average history for each level.
    pub fn history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    pub fn max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = max_levels;
        self
    }

    /// Lit segments are lighter than the background (LED rather than LCD).
    pub fn inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    /// Largest random offset, as a percentage of the gap between on and off
    /// samples, applied to levels that calibration has to infer. 0 disables it.
    pub fn jitter(mut self, jitter: u32) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn build(self) -> Result<LcdDecoder> {
        if self.threshold > 100 {
            return Err(LcdError::InvalidThreshold(self.threshold));
        }
        let history = self.history.max(1);
        Ok(LcdDecoder {
            threshold: self.threshold,
            history,
            inverse: self.inverse,
            jitter: self.jitter,
            digits: Vec::new(),
            templates: HashMap::new(),
            levels: LevelHistory::new(self.max_levels),
            current: None,
            rng: self.rng.unwrap_or_else(StdRng::from_entropy),
            summary: CalibrationSummary::default(),
        })
    }
}

impl Default for LcdDecoderBuilder {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            history: 5,
            max_levels: 200,
            inverse: false,
            jitter: DEFAULT_JITTER,
            rng: None,
        }
    }
}

pub struct LcdDecoder {
    threshold: u32,
    history: usize,
    inverse: bool,
    jitter: u32,
    digits: Vec<Digit>,
    templates: HashMap<String, Arc<Template>>,
    levels: LevelHistory,
    current: Option<Levels>,
    rng: StdRng,
    summary: CalibrationSummary,
}

impl LcdDecoder {
    /// Builds a decoder with its templates and digits from a configuration record.
    #[instrument(skip(conf))]
    pub fn from_config(conf: &LcdConfig) -> Result<LcdDecoder> {
        if conf.templates.is_empty() {
            return Err(LcdError::NoTemplates);
        }
        if conf.digits.is_empty() {
            return Err(LcdError::NoDigits);
        }
        let mut decoder = LcdDecoderBuilder::new()
            .threshold(if conf.threshold == 0 {
                DEFAULT_THRESHOLD
            } else {
                conf.threshold
            })
            .history(conf.history)
            .max_levels(conf.max_levels)
            .inverse(conf.inverse)
            .build()?;
        for (index, template) in conf.templates.iter().enumerate() {
            decoder
                .add_template(template)
                .map_err(|e| LcdError::Config {
                    index,
                    source: Box::new(e),
                })?;
        }
        let [dx, dy] = conf.offset;
        for (index, digit) in conf.digits.iter().enumerate() {
            let origin = Point::from(digit.coord).offset(dx, dy);
            decoder
                .add_digit(&digit.template, origin)
                .map_err(|e| LcdError::Config {
                    index,
                    source: Box::new(e),
                })?;
        }
        Ok(decoder)
    }

    pub fn add_template(&mut self, conf: &TemplateConfig) -> Result<()> {
        if self.templates.contains_key(&conf.name) {
            return Err(LcdError::DuplicateTemplate(conf.name.clone()));
        }
        let template = Template::build(conf)?;
        self.templates
            .insert(conf.name.clone(), Arc::new(template));
        Ok(())
    }

    /// Places a digit using the named template, with its top left at `origin`.
    /// Digits decode in the order they are added.
    pub fn add_digit(&mut self, template: &str, origin: Point) -> Result<&Digit> {
        let template = self
            .templates
            .get(template)
            .ok_or_else(|| LcdError::UnknownTemplate(template.to_string()))?
            .clone();
        let index = self.digits.len();
        self.digits.push(Digit::place(index, template, origin));
        let count = self.digits.len();
        if let Some(current) = self.current.as_mut() {
            current.resize(count, self.history);
        }
        self.levels.resize(count, self.history);
        Ok(&self.digits[index])
    }

    pub fn digits(&self) -> &[Digit] {
        &self.digits
    }

    pub fn template(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: u32) -> Result<()> {
        if threshold > 100 {
            return Err(LcdError::InvalidThreshold(threshold));
        }
        self.threshold = threshold;
        Ok(())
    }

    pub fn inverse(&self) -> bool {
        self.inverse
    }

    pub fn summary(&self) -> &CalibrationSummary {
        &self.summary
    }

    /// The levels currently used for decoding.
    pub fn current_levels(&self) -> Option<&Levels> {
        self.current.as_ref()
    }

    pub fn level_history(&self) -> &LevelHistory {
        &self.levels
    }

    /// Writes the current levels to `path` as JSON.
    pub fn save_levels(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let levels = self.current.as_ref().ok_or(LcdError::NoLevels)?;
        let file = File::create(path).map_err(|e| LcdError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, levels)?;
        writer.flush().map_err(|e| LcdError::io(path, e))?;
        log::debug!("Saved levels (quality {}) to {}", levels.quality, path.display());
        Ok(())
    }

    /// Loads levels saved by [`save_levels`](Self::save_levels) and makes them current.
    #[instrument(skip(self, path))]
    pub fn restore_levels(&mut self, path: impl AsRef<Path>) -> Result<&Levels> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LcdError::io(path, e))?;
        let levels: Levels = serde_json::from_reader(BufReader::new(file))?;
        if levels.digits.len() != self.digits.len() {
            return Err(LcdError::LevelsMismatch {
                expected: self.digits.len(),
                found: levels.digits.len(),
            });
        }
        log::debug!("Restored levels (quality {}) from {}", levels.quality, path.display());
        self.levels.insert(levels.clone());
        Ok(self.current.insert(levels))
    }
}
