//! Calibration levels and their quality-ranked history.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::mavg::Avg;
use crate::result::Scan;
use crate::template::SEGMENTS;

/// Whether `sample` reads as on, given the on and off reference levels.
///
/// The boundary sits `threshold` percent of the way from `off` to `on`.
/// Works for either polarity. A threshold of 0 reads everything as on, 100
/// reads everything as off, and equal references read as off.
pub fn segment_on(sample: i32, on: i32, off: i32, threshold: u32) -> bool {
    match threshold {
        0 => true,
        t if t >= 100 => false,
        t => {
            let range = (off - on) as i64;
            if range == 0 {
                return false;
            }
            (off - sample) as i64 * 100 / range >= t as i64
        }
    }
}

/// On and off reference levels for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLevel {
    pub on: Avg,
    pub off: Avg,
}

impl SegmentLevel {
    pub fn new(history: usize) -> Self {
        Self {
            on: Avg::new(history),
            off: Avg::new(history),
        }
    }

    pub fn update(&mut self, on: i32, off: i32) {
        feed(&mut self.on, on);
        feed(&mut self.off, off);
    }

    fn is_on(&self, sample: i32, shift: i32, threshold: u32) -> bool {
        segment_on(
            sample,
            self.on.value() + shift,
            self.off.value() + shift,
            threshold,
        )
    }
}

fn feed(avg: &mut Avg, v: i32) {
    if avg.is_empty() {
        avg.init(v);
    } else {
        avg.add(v);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitLevel {
    /// Background (off region) level when the digit was calibrated.
    pub background: Avg,
    pub segments: [SegmentLevel; SEGMENTS],
    pub dp: SegmentLevel,
}

impl DigitLevel {
    pub fn new(history: usize) -> Self {
        Self {
            background: Avg::new(history),
            segments: std::array::from_fn(|_| SegmentLevel::new(history)),
            dp: SegmentLevel::new(history),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        !self.background.is_empty()
    }

    pub(crate) fn record_background(&mut self, background: i32) {
        feed(&mut self.background, background);
    }

    /// Segment mask and decimal point state for a scan of this digit.
    ///
    /// Both references are shifted by how far the background has drifted
    /// since calibration.
    pub fn decode(&self, scan: &Scan, threshold: u32) -> (u8, bool) {
        let shift = scan.background - self.background.value();
        let mask = self
            .segments
            .iter()
            .zip(scan.segments)
            .enumerate()
            .filter(|(_, (level, sample))| level.is_on(*sample, shift, threshold))
            .fold(0u8, |mask, (i, _)| mask | 1 << i);
        let dp = match scan.dp {
            Some(sample) if !self.dp.on.is_empty() => self.dp.is_on(sample, shift, threshold),
            _ => false,
        };
        (mask, dp)
    }
}

/// One calibration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Levels {
    pub quality: u32,
    pub good: usize,
    pub bad: usize,
    pub digits: Vec<DigitLevel>,
}

impl Levels {
    pub fn new(digits: usize, history: usize) -> Self {
        Self {
            quality: 0,
            good: 0,
            bad: 0,
            digits: (0..digits).map(|_| DigitLevel::new(history)).collect(),
        }
    }

    /// Pads with uncalibrated digit levels, or truncates, to `digits` entries.
    pub fn resize(&mut self, digits: usize, history: usize) {
        self.digits.resize_with(digits, || DigitLevel::new(history));
    }
}

/// Levels keyed by quality, each bucket in insertion order.
///
/// Holds at most `capacity` entries. On overflow the oldest entry of the
/// lowest populated bucket is dropped.
#[derive(Debug, Clone)]
pub struct LevelHistory {
    buckets: BTreeMap<u32, VecDeque<Levels>>,
    len: usize,
    capacity: usize,
}

impl LevelHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buckets: BTreeMap::new(),
            len: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stores `levels`, returning whatever was evicted to make room.
    pub fn insert(&mut self, levels: Levels) -> Option<Levels> {
        self.buckets
            .entry(levels.quality)
            .or_default()
            .push_back(levels);
        self.len += 1;
        if self.len <= self.capacity {
            return None;
        }
        let mut lowest = self.buckets.first_entry()?;
        let evicted = lowest.get_mut().pop_front();
        if lowest.get().is_empty() {
            lowest.remove();
        }
        self.len -= 1;
        evicted
    }

    /// Newest entry of the highest quality bucket.
    pub fn best(&self) -> Option<&Levels> {
        self.buckets.values().next_back()?.back()
    }

    /// Oldest entry of the lowest quality bucket.
    pub fn worst(&self) -> Option<&Levels> {
        self.buckets.values().next()?.front()
    }

    /// Entries from best to worst.
    pub fn iter(&self) -> impl Iterator<Item = &Levels> {
        self.buckets.values().rev().flat_map(|bucket| bucket.iter().rev())
    }

    /// Gives every stored entry levels for `digits` digits.
    pub(crate) fn resize(&mut self, digits: usize, history: usize) {
        for levels in self.buckets.values_mut().flatten() {
            levels.resize(digits, history);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(quality: u32, good: usize) -> Levels {
        Levels {
            quality,
            good,
            bad: 0,
            digits: Vec::new(),
        }
    }

    #[test]
    fn boundary_rule() {
        // LCD: on is dark.
        assert!(segment_on(40, 20, 200, 50));
        assert!(!segment_on(160, 20, 200, 50));
        assert!(segment_on(110, 20, 200, 50));
        // Inverse: on is light.
        assert!(segment_on(180, 220, 30, 50));
        assert!(!segment_on(60, 220, 30, 50));
    }

    #[test]
    fn degenerate_thresholds() {
        for sample in [0, 128, 255] {
            assert!(segment_on(sample, 0, 255, 0));
            assert!(!segment_on(sample, 0, 255, 100));
            assert!(segment_on(sample, 7, 7, 0));
            assert!(!segment_on(sample, 7, 7, 50));
        }
    }

    #[test]
    fn digit_level_follows_background_drift() {
        let mut level = DigitLevel::new(3);
        level.record_background(200);
        for seg in level.segments.iter_mut() {
            seg.update(40, 200);
        }
        let scan = Scan {
            background: 150,
            segments: [0, 140, 0, 140, 0, 140, 0],
            dp: None,
        };
        assert_eq!(level.decode(&scan, 50), (0b101_0101, false));
    }

    #[test]
    fn history_is_bounded_and_evicts_lowest_oldest() {
        let mut history = LevelHistory::new(3);
        assert!(history.insert(levels(50, 1)).is_none());
        assert!(history.insert(levels(50, 2)).is_none());
        assert!(history.insert(levels(90, 3)).is_none());
        let evicted = history.insert(levels(70, 4)).unwrap();
        assert_eq!(evicted.good, 1);
        let evicted = history.insert(levels(95, 5)).unwrap();
        assert_eq!(evicted.good, 2);
        assert_eq!(history.len(), 3);
        let order: Vec<_> = history.iter().map(|l| l.good).collect();
        assert_eq!(order, vec![5, 3, 4]);
        assert_eq!(history.best().unwrap().good, 5);
        assert_eq!(history.worst().unwrap().good, 4);
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn resize_reaches_every_stored_entry() {
        let mut history = LevelHistory::new(4);
        history.insert(Levels::new(1, 2));
        history.insert(Levels::new(1, 2));
        history.insert(levels(60, 0));
        history.resize(3, 2);
        assert_eq!(history.len(), 3);
        for entry in history.iter() {
            assert_eq!(entry.digits.len(), 3);
            assert!(!entry.digits[2].is_calibrated());
        }
    }

    #[test]
    fn newest_entry_in_lowest_bucket_can_be_evicted() {
        let mut history = LevelHistory::new(1);
        history.insert(levels(80, 1));
        let evicted = history.insert(levels(10, 2)).unwrap();
        assert_eq!(evicted.good, 2);
        assert_eq!(history.best().unwrap().good, 1);
    }
}
