//! Day-window resolution for quota accounting.
//!
//! Maps an instant to a calendar day in the configured time zone and computes
//! how long the current day still has to run. The rollover gap is used as the
//! counter key's TTL so a forgotten counter self-resets at local midnight
//! without any scheduled cleanup job.
//!
//! All functions take an explicit `DateTime<Utc>` instant so tests can pin
//! the clock.

use chrono::{DateTime, Duration, LocalResult, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Zone used when the configured zone name does not parse.
const FALLBACK_TZ: Tz = Tz::UTC;

/// Resolve an IANA zone name, falling back to UTC on an invalid name.
///
/// A bad `QUOTA_TIMEZONE` value must not take the whole bot down — quota
/// windows just run on UTC days instead.
pub fn resolve_tz(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(zone = %name, "unknown time zone, falling back to UTC");
            FALLBACK_TZ
        }
    }
}

/// Calendar-day bucket for `now` in `tz`, formatted `YYYY-MM-DD`.
///
/// Two instants share a day key iff they fall in the same local calendar day.
pub fn day_key(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format("%Y-%m-%d").to_string()
}

/// Seconds from `now` until the next local midnight in `tz`, clamped to >= 1.
///
/// Around a DST transition local midnight can be ambiguous or nonexistent;
/// the earliest valid interpretation is used, and a midnight skipped by a
/// forward jump degrades to a plain 24-hour window. Being off by an hour once
/// a year only shifts when a stale counter expires, never what it counts.
pub fn seconds_until_rollover(now: DateTime<Utc>, tz: Tz) -> i64 {
    let local = now.with_timezone(&tz);
    let next_midnight = local
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| match tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => Some(t),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => None,
        })
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| now + Duration::days(1));

    (next_midnight - now).num_seconds().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tz_valid() {
        assert_eq!(resolve_tz("Europe/Moscow"), chrono_tz::Europe::Moscow);
    }

    #[test]
    fn test_resolve_tz_invalid_falls_back_to_utc() {
        assert_eq!(resolve_tz("Mars/Olympus_Mons"), Tz::UTC);
        assert_eq!(resolve_tz(""), Tz::UTC);
    }

    #[test]
    fn test_day_key_utc() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(day_key(now, Tz::UTC), "2026-03-01");
    }

    #[test]
    fn test_day_key_zone_shifts_the_day() {
        // 23:30 UTC on March 1st is already March 2nd in Moscow (UTC+3).
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 23, 30, 0).unwrap();
        assert_eq!(day_key(now, chrono_tz::Europe::Moscow), "2026-03-02");
        assert_eq!(day_key(now, Tz::UTC), "2026-03-01");
    }

    #[test]
    fn test_same_local_day_same_key() {
        let tz = chrono_tz::America::New_York;
        let morning = Utc.with_ymd_and_hms(2026, 6, 10, 11, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2026, 6, 11, 2, 0, 0).unwrap();
        // Both are June 10th local time (UTC-4 in June).
        assert_eq!(day_key(morning, tz), day_key(evening, tz));
    }

    #[test]
    fn test_seconds_until_rollover_utc() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 30).unwrap();
        assert_eq!(seconds_until_rollover(now, Tz::UTC), 30);
    }

    #[test]
    fn test_seconds_until_rollover_at_midnight_is_full_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(seconds_until_rollover(now, Tz::UTC), 86_400);
    }

    #[test]
    fn test_seconds_until_rollover_never_below_one() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).unwrap();
        assert!(seconds_until_rollover(now, Tz::UTC) >= 1);
    }

    #[test]
    fn test_seconds_until_rollover_respects_zone() {
        // 21:00 UTC = midnight Moscow, so Moscow's rollover is 3h closer.
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap();
        let utc_gap = seconds_until_rollover(now, Tz::UTC);
        let msk_gap = seconds_until_rollover(now, chrono_tz::Europe::Moscow);
        assert_eq!(utc_gap - msk_gap, 3 * 3600);
    }
}
