//! Timecode handling for vendor play-timing feeds.
//!
//! Feed timestamps come as `HH:MM:SS:ff` (tens of milliseconds) or
//! `HH:MM:SS:fff` (true milliseconds) depending on which recording the feed
//! was authored against. [`PlayTime`] normalizes both forms to true
//! milliseconds at parse time; everything downstream works in one unit.

use std::cmp::Ordering;
use std::fmt;

use crate::error::AppError;

/// Unit of the fractional timecode field, decided by its digit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimecodeDialect {
    /// 2-digit fractional field, tens of milliseconds.
    TensOfMillis,
    /// 3-digit fractional field, true milliseconds.
    Millis,
}

impl TimecodeDialect {
    /// Classify a fractional field by width. Other widths are malformed.
    pub fn classify(fraction_field: &str) -> Option<Self> {
        match fraction_field.len() {
            2 => Some(Self::TensOfMillis),
            3 => Some(Self::Millis),
            _ => None,
        }
    }

    fn to_millis(self, raw: u32) -> u32 {
        match self {
            Self::TensOfMillis => raw * 10,
            Self::Millis => raw,
        }
    }
}

/// A moment within a recording's timeline, millisecond precision.
#[derive(Debug, Clone, Copy)]
pub struct PlayTime {
    hh: u32,
    mm: u32,
    ss: u32,
    millis: u32,
}

impl PlayTime {
    /// Parse a feed timecode. The colon-split must yield exactly four
    /// integer components and the fractional field must be 2 or 3 digits.
    pub fn parse(text: &str) -> Result<Self, AppError> {
        let malformed = || AppError::MalformedTimecode(text.to_string());
        let parts: Vec<&str> = text.trim().split(':').collect();
        if parts.len() != 4 {
            return Err(malformed());
        }
        let dialect = TimecodeDialect::classify(parts[3]).ok_or_else(malformed)?;
        let mut fields = [0u32; 4];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| malformed())?;
        }
        let [hh, mm, ss, fraction] = fields;
        Ok(Self {
            hh,
            mm,
            ss,
            millis: dialect.to_millis(fraction),
        })
    }

    /// Construct from a non-negative fractional second count. Values below
    /// zero clamp to zero.
    pub fn from_seconds(seconds: f64) -> Self {
        let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
        let millis = (total_millis % 1000) as u32;
        let total_secs = total_millis / 1000;
        Self {
            hh: (total_secs / 3600) as u32,
            mm: (total_secs % 3600 / 60) as u32,
            ss: (total_secs % 60) as u32,
            millis,
        }
    }

    fn total_millis(&self) -> u64 {
        (u64::from(self.hh) * 3600 + u64::from(self.mm) * 60 + u64::from(self.ss)) * 1000
            + u64::from(self.millis)
    }

    /// This time point as fractional seconds.
    pub fn fractional(&self) -> f64 {
        self.total_millis() as f64 / 1000.0
    }

    /// A new time point `seconds` (possibly negative) away from this one.
    pub fn add_seconds(&self, seconds: f64) -> Self {
        Self::from_seconds(self.fractional() + seconds)
    }

    /// This time point rounded to the nearest whole second, half up.
    pub fn whole_seconds(&self) -> u64 {
        let base = self.total_millis() / 1000;
        if self.millis >= 500 { base + 1 } else { base }
    }

    /// Difference in whole seconds against an earlier time point. `earlier`
    /// must not be chronologically after `self`.
    pub fn minus(&self, earlier: &Self) -> Result<i64, AppError> {
        if earlier > self {
            return Err(AppError::OutOfOrderTimecode {
                earlier: earlier.to_string(),
                later: self.to_string(),
            });
        }
        Ok((self.fractional() - earlier.fractional()).round() as i64)
    }

    /// Timestamp in the `HH:MM:SS.mmm` form the external tools accept.
    pub fn ffmpeg_timestamp(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            self.hh, self.mm, self.ss, self.millis
        )
    }
}

impl fmt::Display for PlayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:03}",
            self.hh, self.mm, self.ss, self.millis
        )
    }
}

// Equality and ordering follow the fractional value, not the raw fields:
// parsing does not reject denormal components like a 90-second field.
impl PartialEq for PlayTime {
    fn eq(&self, other: &Self) -> bool {
        self.total_millis() == other.total_millis()
    }
}

impl Eq for PlayTime {}

impl PartialOrd for PlayTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlayTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_millis().cmp(&other.total_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_classification_is_by_field_width() {
        assert_eq!(
            TimecodeDialect::classify("55"),
            Some(TimecodeDialect::TensOfMillis)
        );
        assert_eq!(TimecodeDialect::classify("055"), Some(TimecodeDialect::Millis));
        assert_eq!(TimecodeDialect::classify("5"), None);
        assert_eq!(TimecodeDialect::classify("0555"), None);
    }

    #[test]
    fn two_digit_fraction_is_tens_of_millis() {
        let t = PlayTime::parse("00:10:30:55").unwrap();
        assert_eq!(t.fractional(), 630.55);
        assert_eq!(t.to_string(), "00:10:30:550");
    }

    #[test]
    fn three_digit_fraction_is_true_millis() {
        let t = PlayTime::parse("00:10:30:055").unwrap();
        assert_eq!(t.fractional(), 630.055);
        assert_eq!(t.to_string(), "00:10:30:055");
    }

    #[test]
    fn rejects_wrong_part_count() {
        assert!(matches!(
            PlayTime::parse("00:10:30"),
            Err(AppError::MalformedTimecode(_))
        ));
        assert!(matches!(
            PlayTime::parse("00:10:30:055:1"),
            Err(AppError::MalformedTimecode(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_and_odd_fraction_widths() {
        assert!(PlayTime::parse("00:xx:30:055").is_err());
        assert!(PlayTime::parse("00:10:30:5").is_err());
        assert!(PlayTime::parse("00:10:30:5555").is_err());
    }

    #[test]
    fn from_seconds_round_trips_fractional() {
        for secs in [0.0, 0.001, 59.999, 630.55, 7199.5] {
            let t = PlayTime::from_seconds(secs);
            assert!((t.fractional() - secs).abs() < 0.001, "secs={secs}");
        }
    }

    #[test]
    fn from_seconds_matches_parse_canonical_form() {
        let parsed = PlayTime::parse("01:02:03:450").unwrap();
        let built = PlayTime::from_seconds(3723.45);
        assert_eq!(parsed, built);
        assert_eq!(parsed.to_string(), built.to_string());
    }

    #[test]
    fn add_seconds_composes_like_plain_addition() {
        let t = PlayTime::parse("00:10:00:000").unwrap();
        let split = t.add_seconds(12.3).add_seconds(7.7);
        let joined = t.add_seconds(20.0);
        assert!((split.fractional() - joined.fractional()).abs() < 0.001);
    }

    #[test]
    fn add_seconds_clamps_below_zero() {
        let t = PlayTime::parse("00:00:05:000").unwrap();
        assert_eq!(t.add_seconds(-10.0).fractional(), 0.0);
    }

    #[test]
    fn whole_seconds_rounds_half_up() {
        assert_eq!(PlayTime::parse("00:00:09:499").unwrap().whole_seconds(), 9);
        assert_eq!(PlayTime::parse("00:00:09:500").unwrap().whole_seconds(), 10);
    }

    #[test]
    fn minus_rounds_to_nearest_second() {
        let a = PlayTime::parse("00:10:20:600").unwrap();
        let b = PlayTime::parse("00:10:00:000").unwrap();
        assert_eq!(a.minus(&b).unwrap(), 21);
    }

    #[test]
    fn minus_rejects_out_of_order_operands() {
        let a = PlayTime::parse("00:10:00:000").unwrap();
        let b = PlayTime::parse("00:10:20:000").unwrap();
        assert!(matches!(
            a.minus(&b),
            Err(AppError::OutOfOrderTimecode { .. })
        ));
    }

    #[test]
    fn ordering_follows_fractional_value() {
        let early = PlayTime::parse("00:59:59:999").unwrap();
        let late = PlayTime::parse("01:00:00:000").unwrap();
        assert!(early < late);
        // 2-digit "50" normalizes to the same instant as 3-digit "500".
        let a = PlayTime::parse("00:00:01:50").unwrap();
        let b = PlayTime::parse("00:00:01:500").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ffmpeg_timestamp_uses_dot_separator() {
        let t = PlayTime::parse("01:02:03:045").unwrap();
        assert_eq!(t.ffmpeg_timestamp(), "01:02:03.045");
    }
}
