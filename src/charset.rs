//! Segment patterns for the characters a 7-segment display can show.
//!
//! Bit layout: 0 top left, 1 top middle, 2 top right, 3 bottom right,
//! 4 bottom middle, 5 bottom left, 6 middle.

use crate::error::{LcdError, Result};

/// Character shown for a digit whose segment mask matches no pattern.
pub const INVALID_CHAR: char = 'X';

// Where a character has more than one rendering, the first entry is the one
// used for calibration.
const PATTERNS: &[(char, u8)] = &[
    ('0', 0x3F),
    ('1', 0x0C),
    ('2', 0x76),
    ('3', 0x5E),
    ('4', 0x4D),
    ('5', 0x5B),
    ('6', 0x7B),
    ('7', 0x0E),
    ('7', 0x0F),
    ('8', 0x7F),
    ('9', 0x5F),
    ('9', 0x4F),
    (' ', 0x00),
    ('-', 0x40),
    ('A', 0x6F),
    ('b', 0x79),
    ('C', 0x33),
    ('c', 0x70),
    ('d', 0x7C),
    ('E', 0x73),
    ('F', 0x63),
    ('H', 0x6D),
    ('h', 0x69),
    ('L', 0x31),
    ('n', 0x68),
    ('o', 0x78),
    ('P', 0x67),
    ('r', 0x60),
    ('t', 0x71),
    ('U', 0x3D),
    ('u', 0x38),
];

pub fn char_to_mask(c: char) -> Option<u8> {
    PATTERNS.iter().find(|(ch, _)| *ch == c).map(|(_, m)| *m)
}

pub fn mask_to_char(mask: u8) -> Option<char> {
    PATTERNS.iter().find(|(_, m)| *m == mask).map(|(ch, _)| *ch)
}

/// Converts a string of display characters into segment masks.
/// Decimal points are skipped.
pub fn digits_to_segments(digits: &str) -> Result<Vec<u8>> {
    digits
        .chars()
        .filter(|c| *c != '.')
        .map(|c| char_to_mask(c).ok_or(LcdError::UnknownCharacter(c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_decode_unambiguously() {
        for (i, (_, mask)) in PATTERNS.iter().enumerate() {
            assert!(*mask < 0x80);
            assert!(
                PATTERNS[i + 1..].iter().all(|(_, m)| m != mask),
                "mask {mask:#04x} appears twice"
            );
        }
    }

    #[test]
    fn every_character_round_trips_through_its_first_mask() {
        for (c, _) in PATTERNS {
            let mask = char_to_mask(*c).unwrap();
            assert_eq!(mask_to_char(mask), Some(*c));
        }
        assert_eq!(mask_to_char(0x0F), Some('7'));
        assert_eq!(mask_to_char(0x7E), None);
    }

    #[test]
    fn digits_to_segments_skips_decimal_points() {
        assert_eq!(digits_to_segments("1.8").unwrap(), vec![0x0C, 0x7F]);
        assert!(matches!(
            digits_to_segments("12Z"),
            Err(LcdError::UnknownCharacter('Z'))
        ));
    }
}
