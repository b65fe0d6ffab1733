use serde::Serialize;

use crate::template::SEGMENTS;

#[derive(Debug, Clone, Serialize)]
pub struct DecodeResult {
    /// Decoded characters, with `.` after any digit whose decimal point is lit
    /// and `INVALID_CHAR` in place of digits that did not decode.
    pub text: String,
    pub digits: Vec<DecodedDigit>,
    pub scans: Vec<Scan>,
}

impl DecodeResult {
    pub fn is_valid(&self) -> bool {
        self.digits.iter().all(|d| d.valid)
    }

    pub fn invalid_count(&self) -> usize {
        self.digits.iter().filter(|d| !d.valid).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedDigit {
    pub character: Option<char>,
    pub valid: bool,
    pub mask: u8,
    pub dp: bool,
}

/// Raw samples taken from one digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scan {
    pub background: i32,
    pub segments: [i32; SEGMENTS],
    pub dp: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CalibrationSummary {
    pub best: u32,
    pub worst: u32,
    pub last_quality: u32,
    pub last_good: usize,
    pub last_bad: usize,
    pub count: u32,
    pub total: u32,
}

impl CalibrationSummary {
    /// Mean quality over every calibration so far.
    pub fn average(&self) -> u32 {
        if self.count == 0 {
            0
        } else {
            self.total / self.count
        }
    }

    pub(crate) fn record(&mut self, quality: u32, good: usize, bad: usize) {
        if self.count == 0 {
            self.best = quality;
            self.worst = quality;
        } else {
            self.best = self.best.max(quality);
            self.worst = self.worst.min(quality);
        }
        self.last_quality = quality;
        self.last_good = good;
        self.last_bad = bad;
        self.count += 1;
        self.total += quality;
    }
}
