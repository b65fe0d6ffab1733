use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Moving average over a fixed number of trailing values.
///
/// The average is recalculated with truncating integer division on every
/// [`add`](Avg::add). Cloning deep-copies the history, so each segment
/// threshold owns an independent instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SavedAvg")]
pub struct Avg {
    size: usize,
    value: i32,
    total: i64,
    history: VecDeque<i32>,
}

/// Serialized form of [`Avg`]. The stored value is recomputed from the history.
#[derive(Deserialize)]
struct SavedAvg {
    size: usize,
    total: i64,
    history: VecDeque<i32>,
}

impl TryFrom<SavedAvg> for Avg {
    type Error = String;

    fn try_from(saved: SavedAvg) -> Result<Self, Self::Error> {
        if saved.size == 0 {
            return Err("moving average size must be at least 1".to_string());
        }
        if saved.history.len() > saved.size {
            return Err(format!(
                "moving average holds {} values, size is {}",
                saved.history.len(),
                saved.size
            ));
        }
        let sum: i64 = saved.history.iter().map(|v| *v as i64).sum();
        if sum != saved.total {
            return Err(format!(
                "moving average total {} does not match its history ({sum})",
                saved.total
            ));
        }
        let value = if saved.history.is_empty() {
            0
        } else {
            (sum / saved.history.len() as i64) as i32
        };
        Ok(Self {
            size: saved.size,
            value,
            total: sum,
            history: saved.history,
        })
    }
}

impl Avg {
    /// Creates an empty average keeping `size` historical values.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            value: 0,
            total: 0,
            history: VecDeque::with_capacity(size + 1),
        }
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn capacity(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn history(&self) -> impl Iterator<Item = i32> + '_ {
        self.history.iter().copied()
    }

    /// Fills the whole window with `v`.
    pub fn init(&mut self, v: i32) {
        for _ in 0..self.size {
            self.add(v);
        }
    }

    /// Seeds the window with `v` unless it already holds values.
    pub fn set_default(&mut self, v: i32) {
        if self.history.is_empty() {
            self.init(v);
        }
    }

    pub fn add(&mut self, v: i32) {
        self.history.push_back(v);
        self.total += v as i64;
        if self.history.len() > self.size {
            if let Some(oldest) = self.history.pop_front() {
                self.total -= oldest as i64;
            }
        }
        self.value = (self.total / self.history.len() as i64) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_repeated_value() {
        let mut avg = Avg::new(5);
        for v in [10, 200, 37, 1, 99] {
            avg.add(v);
        }
        for _ in 0..5 {
            avg.add(42);
        }
        assert_eq!(avg.value(), 42);
        assert_eq!(avg.len(), 5);
    }

    #[test]
    fn truncates_like_integer_division() {
        let mut avg = Avg::new(4);
        avg.add(1);
        avg.add(2);
        assert_eq!(avg.value(), 1);
        avg.add(2);
        assert_eq!(avg.value(), 1);
        avg.add(-9);
        assert_eq!(avg.value(), -1);
        avg.add(10);
        // Window is now 2, 2, -9, 10.
        assert_eq!(avg.value(), 1);
    }

    #[test]
    fn set_default_only_seeds_once() {
        let mut avg = Avg::new(3);
        avg.set_default(7);
        assert_eq!(avg.value(), 7);
        assert_eq!(avg.len(), 3);
        avg.add(1);
        avg.set_default(100);
        assert_eq!(avg.value(), 5);
    }

    #[test]
    fn clone_does_not_alias_history() {
        let mut a = Avg::new(2);
        a.init(10);
        let mut b = a.clone();
        b.add(20);
        assert_eq!(a.value(), 10);
        assert_eq!(b.value(), 15);
        assert_eq!(a.history().collect::<Vec<_>>(), vec![10, 10]);
    }

    #[test]
    fn saved_average_round_trips() {
        let mut avg = Avg::new(3);
        avg.add(4);
        avg.add(9);
        let json = serde_json::to_string(&avg).unwrap();
        let restored: Avg = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, avg);
        assert_eq!(restored.capacity(), 3);
        assert_eq!(restored.value(), 6);
    }

    #[test]
    fn inconsistent_saved_average_is_rejected() {
        for json in [
            r#"{"size":0,"value":100,"total":100,"history":[100]}"#,
            r#"{"size":1,"value":5,"total":10,"history":[5,5]}"#,
            r#"{"size":2,"value":5,"total":11,"history":[5,5]}"#,
        ] {
            assert!(serde_json::from_str::<Avg>(json).is_err(), "{json}");
        }
    }
}
