//! Time utilities: local-calendar-day boundaries and deadline parsing.
//!
//! Every "day" in the engines is a local wall-clock day, never a rolling
//! 24-hour window. All boundary math lives here so the recurrence and
//! deferral passes agree on where a day starts and ends.

use anyhow::Result;
use chrono::{
    DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc,
};
use chrono_tz::Tz;

/// Bounds of one local calendar day, expressed in UTC: `start` is inclusive,
/// `next_start` (the following local midnight) is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub start: DateTime<Utc>,
    pub next_start: DateTime<Utc>,
}

impl DayBounds {
    /// Bounds of the local day that contains `at`.
    pub fn containing<Z: TimeZone>(at: DateTime<Utc>, tz: &Z) -> Self {
        Self::of_date(at.with_timezone(tz).date_naive(), tz)
    }

    /// Bounds of a given local calendar date.
    pub fn of_date<Z: TimeZone>(date: NaiveDate, tz: &Z) -> Self {
        let start = resolve_local(tz, date.and_time(NaiveTime::MIN));
        let next_start = date
            .succ_opt()
            .map(|d| resolve_local(tz, d.and_time(NaiveTime::MIN)))
            .unwrap_or(start + Duration::days(1));
        Self { start, next_start }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.next_start
    }
}

/// Start (local midnight) of the day containing `at`.
pub fn start_of_day<Z: TimeZone>(at: DateTime<Utc>, tz: &Z) -> DateTime<Utc> {
    DayBounds::containing(at, tz).start
}

/// Whole days elapsed from `from` to `to`, truncating toward zero.
///
/// Deliberately not calendar-aware: 47h59m is one day, and a negative span
/// is never a full positive day.
pub fn whole_days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds() / 86_400_000
}

/// Local weekday of `at`, 0 = Sunday .. 6 = Saturday.
pub fn local_weekday_from_sunday<Z: TimeZone>(at: DateTime<Utc>, tz: &Z) -> u8 {
    at.with_timezone(tz).weekday().num_days_from_sunday() as u8
}

/// Local day-of-month of `at`, 1..=31.
pub fn local_day_of_month<Z: TimeZone>(at: DateTime<Utc>, tz: &Z) -> u32 {
    at.with_timezone(tz).day()
}

/// Move `at` forward by `days` local calendar days, keeping the wall-clock time.
pub fn add_local_days<Z: TimeZone>(at: DateTime<Utc>, days: u64, tz: &Z) -> Option<DateTime<Utc>> {
    let local = at.with_timezone(tz).naive_local();
    local
        .checked_add_days(Days::new(days))
        .map(|ndt| resolve_local(tz, ndt))
}

/// Move `at` forward by `months` local calendar months.
///
/// A day that does not exist in the target month is clamped to its last day
/// (Jan 31 + 1 month = Feb 28/29).
pub fn add_local_months<Z: TimeZone>(
    at: DateTime<Utc>,
    months: u32,
    tz: &Z,
) -> Option<DateTime<Utc>> {
    let local = at.with_timezone(tz).naive_local();
    local
        .checked_add_months(Months::new(months))
        .map(|ndt| resolve_local(tz, ndt))
}

// Gaps (DST spring-forward) resolve one hour later; overlaps take the earlier instant.
fn resolve_local<Z: TimeZone>(tz: &Z, ndt: NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(&ndt)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(ndt + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&ndt))
}

/// Parse an IANA timezone name like "America/Chicago".
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {name}"))
}

/// Parse a deadline like "2026-02-20 23:59" (or a bare "2026-02-20", read as
/// local midnight) in an IANA tz like "America/Chicago", returning UTC.
pub fn parse_local_deadline_to_utc(local: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz = parse_timezone(tz)?;

    let ndt = match NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M") {
        Ok(ndt) => ndt,
        Err(e) => NaiveDate::parse_from_str(local, "%Y-%m-%d")
            .map(|d| d.and_time(NaiveTime::MIN))
            .map_err(|_| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?,
    };

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}
