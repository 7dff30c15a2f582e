//! GPS week/millisecond time conversion.
//!
//! TAG files carry time as a GPS week number plus milliseconds into that week. The conversion
//! to UTC uses the GPS origin directly and applies no leap-second correction.

use chrono::{DateTime, Duration, TimeZone, Utc};

pub const MILLISECONDS_PER_WEEK: u64 = 7 * 24 * 60 * 60 * 1000;

/// 1980-01-06T00:00:00Z
pub fn gps_origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1980, 1, 6, 0, 0, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert a GPS week and millisecond-of-week pair to UTC. `None` when the result falls outside
/// the representable date range.
pub fn gps_to_utc(week: u32, milliseconds: u64) -> Option<DateTime<Utc>> {
    let total = u64::from(week).checked_mul(MILLISECONDS_PER_WEEK)?.checked_add(milliseconds)?;
    let offset = Duration::try_milliseconds(i64::try_from(total).ok()?)?;
    gps_origin().checked_add_signed(offset)
}

/// Inverse of [`gps_to_utc`]. Times before the origin clamp to week 0, millisecond 0.
pub fn utc_to_gps(time: DateTime<Utc>) -> (u32, u64) {
    let elapsed = (time - gps_origin()).num_milliseconds().max(0) as u64;
    ((elapsed / MILLISECONDS_PER_WEEK) as u32, elapsed % MILLISECONDS_PER_WEEK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_week_zero_is_origin() {
        assert_eq!(gps_to_utc(0, 0), Some(gps_origin()));
    }

    #[test]
    fn test_out_of_range_week_does_not_resolve() {
        assert!(gps_to_utc(50_000_000, 0).is_none());
        assert!(gps_to_utc(u32::MAX, u64::MAX).is_none());
        assert!(gps_to_utc(2200, 0).is_some());
    }

    #[test]
    fn test_known_date() {
        // GPS week 2000 began on 2018-05-06
        let time = gps_to_utc(2000, 3_600_000).unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2018, 5, 6, 1, 0, 0).unwrap());
        assert_eq!(utc_to_gps(time), (2000, 3_600_000));
    }
}
