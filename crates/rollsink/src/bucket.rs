// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time buckets and checkpoint arithmetic.
//!
//! A bucket is a fixed-length time window (day, hour or half-hour) that
//! determines which rotated file a record belongs to. Bucket values render
//! as fixed-width digit runs so that file names sort lexicographically in
//! chronological order.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Granularity of file rotation.
///
/// Each kind carries a placeholder token recognized in path patterns, a
/// fixed-width numeric render format and a fixed bucket length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BucketKind {
    /// One file per calendar day (`{Date}`, 8 digits).
    #[default]
    Day,
    /// One file per hour (`{Hour}`, 10 digits).
    Hour,
    /// One file per half hour (`{HalfHour}`, 12 digits).
    HalfHour,
}

impl BucketKind {
    /// All recognized kinds, in token-scan order.
    pub const ALL: [BucketKind; 3] = [BucketKind::Day, BucketKind::Hour, BucketKind::HalfHour];

    /// Placeholder token a path pattern uses to mark the bucket position.
    pub const fn token(self) -> &'static str {
        match self {
            BucketKind::Day => "{Date}",
            BucketKind::Hour => "{Hour}",
            BucketKind::HalfHour => "{HalfHour}",
        }
    }

    /// Number of digits in a rendered bucket value.
    pub const fn digits(self) -> usize {
        match self {
            BucketKind::Day => 8,
            BucketKind::Hour => 10,
            BucketKind::HalfHour => 12,
        }
    }

    const fn chrono_format(self) -> &'static str {
        match self {
            BucketKind::Day => "%Y%m%d",
            BucketKind::Hour => "%Y%m%d%H",
            BucketKind::HalfHour => "%Y%m%d%H%M",
        }
    }

    /// Length of one bucket.
    pub fn length(self) -> Duration {
        match self {
            BucketKind::Day => Duration::days(1),
            BucketKind::Hour => Duration::hours(1),
            BucketKind::HalfHour => Duration::minutes(30),
        }
    }

    /// Start of the bucket containing `t` (midnight, top of hour, :00/:30).
    pub fn bucket_start(self, t: NaiveDateTime) -> NaiveDateTime {
        let midnight = NaiveDateTime::new(t.date(), NaiveTime::MIN);
        match self {
            BucketKind::Day => midnight,
            BucketKind::Hour => midnight + Duration::hours(i64::from(t.hour())),
            BucketKind::HalfHour => {
                midnight
                    + Duration::hours(i64::from(t.hour()))
                    + Duration::minutes(i64::from(t.minute() / 30 * 30))
            }
        }
    }

    /// First instant of the bucket after the one containing `t`.
    pub fn next_bucket_start(self, t: NaiveDateTime) -> NaiveDateTime {
        self.bucket_start(t) + self.length()
    }

    /// Render the bucket value of `t` as a fixed-width digit run.
    pub fn render(self, t: NaiveDateTime) -> String {
        self.bucket_start(t).format(self.chrono_format()).to_string()
    }

    /// Strict parse of a rendered bucket value back to its start instant.
    ///
    /// Returns `None` unless `digits` is exactly the expected width and
    /// denotes a valid calendar date and time.
    pub fn parse(self, digits: &str) -> Option<NaiveDateTime> {
        if digits.len() != self.digits() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let year: i32 = digits[0..4].parse().ok()?;
        let month: u32 = digits[4..6].parse().ok()?;
        let day: u32 = digits[6..8].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;

        let (hour, minute) = match self {
            BucketKind::Day => (0, 0),
            BucketKind::Hour => (digits[8..10].parse().ok()?, 0),
            BucketKind::HalfHour => (digits[8..10].parse().ok()?, digits[10..12].parse().ok()?),
        };
        let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

        Some(NaiveDateTime::new(date, time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_day_truncates_to_midnight() {
        let start = BucketKind::Day.bucket_start(dt(2023, 6, 15, 23, 59, 59));
        assert_eq!(start, dt(2023, 6, 15, 0, 0, 0));
    }

    #[test]
    fn test_hour_truncates_to_top_of_hour() {
        let start = BucketKind::Hour.bucket_start(dt(2023, 6, 15, 14, 45, 30));
        assert_eq!(start, dt(2023, 6, 15, 14, 0, 0));
    }

    #[test]
    fn test_half_hour_truncates_to_nearest_half() {
        assert_eq!(
            BucketKind::HalfHour.bucket_start(dt(2023, 6, 15, 14, 29, 59)),
            dt(2023, 6, 15, 14, 0, 0)
        );
        assert_eq!(
            BucketKind::HalfHour.bucket_start(dt(2023, 6, 15, 14, 30, 0)),
            dt(2023, 6, 15, 14, 30, 0)
        );
        assert_eq!(
            BucketKind::HalfHour.bucket_start(dt(2023, 6, 15, 14, 31, 0)),
            dt(2023, 6, 15, 14, 30, 0)
        );
    }

    #[test]
    fn test_next_crosses_month_and_year_boundaries() {
        assert_eq!(
            BucketKind::Day.next_bucket_start(dt(2023, 1, 31, 12, 0, 0)),
            dt(2023, 2, 1, 0, 0, 0)
        );
        assert_eq!(
            BucketKind::Day.next_bucket_start(dt(2023, 12, 31, 23, 59, 59)),
            dt(2024, 1, 1, 0, 0, 0)
        );
        assert_eq!(
            BucketKind::Hour.next_bucket_start(dt(2023, 2, 28, 23, 15, 0)),
            dt(2023, 3, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_bucket_invariants() {
        let instants = [
            dt(2023, 1, 1, 0, 0, 0),
            dt(2023, 6, 15, 14, 29, 59),
            dt(2023, 6, 15, 14, 30, 0),
            dt(2024, 2, 29, 23, 59, 59),
        ];
        for kind in BucketKind::ALL {
            for t in instants {
                let start = kind.bucket_start(t);
                let next = kind.next_bucket_start(t);
                assert!(start <= t, "{kind:?} start after instant");
                assert!(t < next, "{kind:?} instant not before next");
                assert_eq!(next - start, kind.length());
            }
        }
    }

    #[test]
    fn test_render_widths_match_digit_counts() {
        let t = dt(2023, 1, 2, 3, 30, 45);
        for kind in BucketKind::ALL {
            assert_eq!(kind.render(t).len(), kind.digits());
        }
        assert_eq!(BucketKind::Day.render(t), "20230102");
        assert_eq!(BucketKind::Hour.render(t), "2023010203");
        assert_eq!(BucketKind::HalfHour.render(t), "202301020330");
    }

    #[test]
    fn test_parse_round_trip() {
        let t = dt(2023, 7, 9, 17, 30, 0);
        for kind in BucketKind::ALL {
            let rendered = kind.render(t);
            assert_eq!(kind.parse(&rendered), Some(kind.bucket_start(t)));
        }
    }

    #[test]
    fn test_parse_rejects_invalid_input() {
        assert_eq!(BucketKind::Day.parse("20231301"), None); // month 13
        assert_eq!(BucketKind::Day.parse("20230230"), None); // Feb 30
        assert_eq!(BucketKind::Day.parse("2023010"), None); // too short
        assert_eq!(BucketKind::Day.parse("202301011"), None); // too long
        assert_eq!(BucketKind::Day.parse("2023010a"), None); // non-digit
        assert_eq!(BucketKind::Hour.parse("2023010125"), None); // hour 25
        assert_eq!(BucketKind::HalfHour.parse("202301012360"), None); // minute 60
    }
}
