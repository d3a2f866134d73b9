//! Day-of-week bitmask and its 7-character wire form

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Letters used on the wire, Sunday first
pub const DAY_LETTERS: [char; 7] = ['S', 'M', 'T', 'W', 'T', 'F', 'S'];

/// Weekday set, bit 0 = Sunday .. bit 6 = Saturday
///
/// The wire form is always 7 characters, a day's letter when set and `-`
/// when unset: `"SM-W-F-"` is Sunday, Monday, Wednesday and Friday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DaysMask(u8);

impl DaysMask {
    pub const SUNDAY: Self = Self(1 << 0);
    pub const MONDAY: Self = Self(1 << 1);
    pub const TUESDAY: Self = Self(1 << 2);
    pub const WEDNESDAY: Self = Self(1 << 3);
    pub const THURSDAY: Self = Self(1 << 4);
    pub const FRIDAY: Self = Self(1 << 5);
    pub const SATURDAY: Self = Self(1 << 6);
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b0111_1111);

    /// Build from raw bits; bit 7 is dropped
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// `day` is 0 for Sunday through 6 for Saturday
    pub fn contains_day(self, day: usize) -> bool {
        day < 7 && self.0 & (1 << day) != 0
    }

    pub fn toggle_day(&mut self, day: usize) {
        if day < 7 {
            self.0 ^= 1 << day;
        }
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Decode the textual form.
    ///
    /// Only the first 7 characters are looked at. A position counts as set
    /// when it holds any uppercase day letter (`S`, `M`, `T`, `W`, `F`),
    /// whichever slot it is in; `-` and anything else count as unset, so
    /// newer firmware can extend the format without breaking older
    /// clients. Never fails.
    pub fn parse_lenient(s: &str) -> Self {
        let mut bits = 0u8;
        for (i, c) in s.chars().take(7).enumerate() {
            if is_day_letter(c) {
                bits |= 1 << i;
            }
        }
        Self(bits)
    }
}

fn is_day_letter(c: char) -> bool {
    matches!(c, 'S' | 'M' | 'T' | 'W' | 'F')
}

impl fmt::Display for DaysMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, letter) in DAY_LETTERS.iter().enumerate() {
            let c = if self.contains_day(i) { *letter } else { '-' };
            fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

impl FromStr for DaysMask {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl From<u8> for DaysMask {
    fn from(bits: u8) -> Self {
        Self::from_bits(bits)
    }
}

impl std::ops::BitOr for DaysMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl Serialize for DaysMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DaysMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::DaysMask;

    #[test]
    fn every_mask_survives_text_form() {
        for bits in 0u8..128 {
            let mask = DaysMask::from_bits(bits);
            let text = mask.to_string();
            assert_eq!(text.chars().count(), 7);
            assert_eq!(DaysMask::parse_lenient(&text), mask, "mask {bits:#09b} as {text}");
        }
    }

    #[test]
    fn documented_example() {
        let mask = DaysMask::SUNDAY | DaysMask::MONDAY | DaysMask::WEDNESDAY | DaysMask::FRIDAY;
        assert_eq!(mask.to_string(), "SM-W-F-");
        assert_eq!(DaysMask::parse_lenient("SM-W-F-"), mask);
    }

    #[test]
    fn unknown_characters_are_unset() {
        assert_eq!(DaysMask::parse_lenient("S?T*xF!"), DaysMask::from_bits(0b0010_0101));
        assert_eq!(DaysMask::parse_lenient("#######"), DaysMask::NONE);
        // any day letter sets its position, not only the slot's own
        assert_eq!(DaysMask::parse_lenient("MSSSSSS"), DaysMask::ALL);
        assert_eq!(DaysMask::parse_lenient("FFFFFFF"), DaysMask::ALL);
    }

    #[test]
    fn lowercase_is_not_a_day() {
        assert_eq!(DaysMask::parse_lenient("sm-----"), DaysMask::NONE);
        assert_eq!(DaysMask::parse_lenient("smtwtfs"), DaysMask::NONE);
        assert_eq!(
            DaysMask::parse_lenient("Sm-W-f-"),
            DaysMask::SUNDAY | DaysMask::WEDNESDAY
        );
    }

    #[test]
    fn only_first_seven_characters_count() {
        assert_eq!(DaysMask::parse_lenient("SMTWTFSSMTW"), DaysMask::ALL);
        assert_eq!(DaysMask::parse_lenient("SM"), DaysMask::SUNDAY | DaysMask::MONDAY);
        assert_eq!(DaysMask::parse_lenient(""), DaysMask::NONE);
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&DaysMask::ALL).unwrap();
        assert_eq!(json, "\"SMTWTFS\"");
        let back: DaysMask = serde_json::from_str("\"-M-W-F-\"").unwrap();
        assert_eq!(back.bits(), 0b0010_1010);
    }

    #[test]
    fn high_bit_is_dropped() {
        assert_eq!(DaysMask::from_bits(0xff), DaysMask::ALL);
    }
}
