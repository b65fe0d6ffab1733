use rand::Rng;
use tracing::instrument;

use crate::charset::char_to_mask;
use crate::error::{LcdError, Result};
use crate::levels::{DigitLevel, Levels};
use crate::result::Scan;
use crate::sample::{self, PixelSource};
use crate::template::SEGMENTS;
use crate::LcdDecoder;

/// Default jitter, as a percentage of the on/off gap.
pub const DEFAULT_JITTER: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Expected {
    mask: u8,
    dp: bool,
}

/// Parses a calibration string. A `.` marks the decimal point of the
/// preceding digit as lit.
fn parse_expected(digits: &str) -> Result<Vec<Expected>> {
    let mut expected: Vec<Expected> = Vec::with_capacity(digits.len());
    for c in digits.chars() {
        if c == '.' {
            match expected.last_mut() {
                Some(last) if !last.dp => last.dp = true,
                _ => return Err(LcdError::UnknownCharacter(c)),
            }
        } else {
            let mask = char_to_mask(c).ok_or(LcdError::UnknownCharacter(c))?;
            expected.push(Expected { mask, dp: false });
        }
    }
    Ok(expected)
}

/// How cleanly one digit's lit samples separate from its unlit ones.
#[derive(Debug, Clone, Copy)]
struct Separation {
    mean_on: i32,
    gap: i32,
    margin: u32,
}

fn lit_samples(scan: &Scan, mask: u8) -> impl Iterator<Item = i32> + '_ {
    scan.segments
        .iter()
        .enumerate()
        .filter(move |(i, _)| mask & (1 << i) != 0)
        .map(|(_, v)| *v)
}

fn mean(values: impl Iterator<Item = i32>) -> Option<i32> {
    let (total, count) = values.fold((0i64, 0i64), |(t, c), v| (t + v as i64, c + 1));
    (count > 0).then(|| (total / count) as i32)
}

impl LcdDecoder {
    /// Calibrates the on/off levels from an image showing `expected`.
    ///
    /// Digits whose lit and unlit samples overlap are counted as bad and keep
    /// their previous levels. The resulting snapshot is ranked into the level
    /// history and the best stored snapshot becomes current. Returns the
    /// quality (0-100) of this calibration.
    #[instrument(skip(self, img), level = "debug")]
    pub fn preset<S: PixelSource + ?Sized>(&mut self, img: &S, expected: &str) -> Result<u32> {
        if self.digits.is_empty() {
            return Err(LcdError::NoDigits);
        }
        let expected = parse_expected(expected)?;
        if expected.len() != self.digits.len() {
            return Err(LcdError::LengthMismatch {
                expected: self.digits.len(),
                found: expected.len(),
            });
        }
        let scans = self
            .digits
            .iter()
            .map(|digit| sample::scan(digit, img))
            .collect::<Result<Vec<_>>>()?;
        // Reference for digits with no lit segments, e.g. a blank.
        let global_on = mean(
            scans
                .iter()
                .zip(&expected)
                .flat_map(|(scan, exp)| lit_samples(scan, exp.mask)),
        );

        let mut levels = self
            .current
            .clone()
            .unwrap_or_else(|| Levels::new(self.digits.len(), self.history));
        levels.resize(self.digits.len(), self.history);
        let (mut good, mut bad, mut score) = (0, 0, 0);
        for (i, (scan, exp)) in scans.iter().zip(&expected).enumerate() {
            let Some(sep) = self.separate(scan, exp.mask, global_on) else {
                log::warn!("Digit {i}: lit and unlit samples overlap, levels unchanged");
                bad += 1;
                continue;
            };
            let level = &mut levels.digits[i];
            self.update_level(level, scan, *exp, sep);
            let (mask, _) = level.decode(scan, self.threshold);
            if mask == exp.mask {
                good += 1;
                score += sep.margin;
            } else {
                log::debug!(
                    "Digit {i}: decoded mask {mask:#04x}, expected {:#04x}",
                    exp.mask
                );
                bad += 1;
            }
        }
        let quality = score / self.digits.len() as u32;
        levels.quality = quality;
        levels.good = good;
        levels.bad = bad;
        self.summary.record(quality, good, bad);
        log::debug!(
            "Calibration quality {quality} ({good} good, {bad} bad), best {} worst {}",
            self.summary.best,
            self.summary.worst
        );

        if let Some(evicted) = self.levels.insert(levels) {
            log::trace!("Dropped stored levels of quality {}", evicted.quality);
        }
        self.current = self.levels.best().cloned();
        Ok(quality)
    }

    /// +1 when unlit samples are lighter than lit ones, -1 for inverse displays.
    pub(crate) fn polarity(&self) -> i32 {
        if self.inverse {
            -1
        } else {
            1
        }
    }

    /// Every lit sample must lie strictly on the lit side of every unlit
    /// sample, background included.
    fn separate(&self, scan: &Scan, mask: u8, global_on: Option<i32>) -> Option<Separation> {
        let dir = self.polarity();
        let mut lit: Vec<i32> = lit_samples(scan, mask).collect();
        if lit.is_empty() {
            lit.push(global_on?);
        }
        let unlit = scan
            .segments
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) == 0)
            .map(|(_, v)| *v)
            .chain([scan.background]);

        let lit_hi = lit.iter().map(|v| v * dir).max()?;
        let lit_lo = lit.iter().map(|v| v * dir).min()?;
        let (unlit_lo, unlit_hi) = unlit
            .map(|v| v * dir)
            .fold((i32::MAX, i32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let gap = unlit_lo - lit_hi;
        if gap <= 0 {
            return None;
        }
        let range = unlit_hi - lit_lo;
        Some(Separation {
            mean_on: mean(lit.iter().copied())?,
            gap,
            margin: (gap as i64 * 100 / range as i64) as u32,
        })
    }

    /// Feeds this scan's references into a digit's moving averages.
    ///
    /// A segment's own sample is used for the state it is expected to be in.
    /// The other state is inferred (the digit's mean lit sample, or the
    /// background) and nudged a random amount into the gap.
    fn update_level(&mut self, level: &mut DigitLevel, scan: &Scan, exp: Expected, sep: Separation) {
        let dir = self.polarity();
        let max_jitter = sep.gap * self.jitter.min(100) as i32 / 100;
        for i in 0..SEGMENTS {
            let sample = scan.segments[i];
            let nudge = dir * self.rng.gen_range(0..=max_jitter);
            if exp.mask & (1 << i) != 0 {
                level.segments[i].update(sample, scan.background - nudge);
            } else {
                level.segments[i].update(sep.mean_on + nudge, sample);
            }
        }
        if let Some(sample) = scan.dp {
            let nudge = dir * self.rng.gen_range(0..=max_jitter);
            if exp.dp {
                level.dp.update(sample, scan.background - nudge);
            } else {
                level.dp.update(sep.mean_on + nudge, sample);
            }
        }
        level.record_background(scan.background);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_points() {
        let exp = parse_expected("1.2 ").unwrap();
        assert_eq!(
            exp,
            vec![
                Expected { mask: 0x0C, dp: true },
                Expected { mask: 0x76, dp: false },
                Expected { mask: 0x00, dp: false },
            ]
        );
        assert!(parse_expected(".1").is_err());
        assert!(parse_expected("1..").is_err());
        assert!(matches!(
            parse_expected("1q"),
            Err(LcdError::UnknownCharacter('q'))
        ));
    }

    #[test]
    fn mean_truncates() {
        assert_eq!(mean([1, 2].into_iter()), Some(1));
        assert_eq!(mean(std::iter::empty()), None);
    }
}
