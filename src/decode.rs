use tracing::instrument;

use crate::charset::{mask_to_char, INVALID_CHAR};
use crate::error::Result;
use crate::levels::segment_on;
use crate::result::{DecodeResult, DecodedDigit, Scan};
use crate::sample::{self, PixelSource};
use crate::LcdDecoder;

impl LcdDecoder {
    /// Reads every digit in the image.
    ///
    /// Digits without calibrated levels fall back to their own background as
    /// the off level. A mask matching no character marks that digit invalid.
    #[instrument(skip(self, img), level = "debug")]
    pub fn decode<S: PixelSource + ?Sized>(&self, img: &S) -> Result<DecodeResult> {
        let mut text = String::with_capacity(self.digits.len() * 2);
        let mut digits = Vec::with_capacity(self.digits.len());
        let mut scans = Vec::with_capacity(self.digits.len());
        for digit in &self.digits {
            let scan = sample::scan(digit, img)?;
            let level = self
                .current
                .as_ref()
                .and_then(|levels| levels.digits.get(digit.index()))
                .filter(|level| level.is_calibrated());
            let (mask, dp) = match level {
                Some(level) => level.decode(&scan, self.threshold),
                None => self.decode_uncalibrated(&scan),
            };
            let character = mask_to_char(mask);
            if character.is_none() {
                log::debug!("Digit {}: no character for mask {mask:#04x}", digit.index());
            }
            text.push(character.unwrap_or(INVALID_CHAR));
            if dp {
                text.push('.');
            }
            digits.push(DecodedDigit {
                character,
                valid: character.is_some(),
                mask,
                dp,
            });
            scans.push(scan);
        }
        log::debug!("Decoded {text:?}");
        Ok(DecodeResult {
            text,
            digits,
            scans,
        })
    }

    /// The background is the off level, the segment furthest from it on the
    /// lit side is the on level.
    fn decode_uncalibrated(&self, scan: &Scan) -> (u8, bool) {
        let off = scan.background;
        let samples = scan.segments.iter().copied();
        let extreme = if self.inverse {
            samples.max()
        } else {
            samples.min()
        }
        .unwrap_or(off);
        let on = if (off - extreme) * self.polarity() > 0 {
            extreme
        } else {
            off
        };
        let mask = scan
            .segments
            .iter()
            .enumerate()
            .filter(|(_, v)| segment_on(**v, on, off, self.threshold))
            .fold(0u8, |mask, (i, _)| mask | 1 << i);
        let dp = scan
            .dp
            .is_some_and(|v| segment_on(v, on, off, self.threshold));
        (mask, dp)
    }
}
