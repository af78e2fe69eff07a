//! Calendar period keys for acquisition timestamps.
//!
//! Both the L2 indexer and the L3 indexer derive keys through
//! [`PeriodKeyResolver`], so a product and the synthesis built from it always
//! land on the same `YYYYMM` key.
use chrono::{Datelike, NaiveDate};

use crate::core::naming::timestamp_token;
use crate::error::{Error, Result};
use crate::types::{Calendar, PeriodKey};

/// Day of the target-calendar month used as the default synthesis date.
pub const ANCHOR_DAY: u32 = 15;

const GREGORIAN_DAYS_BEFORE_MONTH: [i64; 12] =
    [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodKeyResolver {
    calendar: Calendar,
}

impl PeriodKeyResolver {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }

    /// Resolve a Gregorian `YYYYMMDD` token to its target-calendar period.
    pub fn resolve(&self, token: &str) -> Result<PeriodKey> {
        if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::malformed(token, "expected YYYYMMDD"));
        }
        let date =
            NaiveDate::parse_from_str(token, "%Y%m%d").map_err(|e| Error::malformed(token, e))?;
        self.resolve_date(date)
            .ok_or_else(|| Error::malformed(token, "date outside the supported range"))
    }

    /// Resolve the timestamp embedded in a product file or directory name.
    pub fn resolve_name(&self, name: &str) -> Result<PeriodKey> {
        let token = timestamp_token(name)?;
        self.resolve(token).map_err(|e| match e {
            Error::MalformedTimestamp { reason, .. } => Error::malformed(name, reason),
            other => other,
        })
    }

    pub fn resolve_date(&self, date: NaiveDate) -> Option<PeriodKey> {
        match self.calendar {
            Calendar::Gregorian => PeriodKey::new(date.year(), date.month()),
            Calendar::Persian => {
                let (year, month, _) = gregorian_to_persian(date);
                PeriodKey::new(year, month)
            }
        }
    }

    /// Gregorian date of `day` within `period`, or `None` if that day does not exist.
    pub fn anchor_date(&self, period: PeriodKey, day: u32) -> Option<NaiveDate> {
        match self.calendar {
            Calendar::Gregorian => NaiveDate::from_ymd_opt(period.year, period.month, day),
            Calendar::Persian => persian_to_gregorian(period.year, period.month, day),
        }
    }
}

/// Convert a Gregorian date to a Solar Hijri `(year, month, day)`.
pub fn gregorian_to_persian(date: NaiveDate) -> (i32, u32, u32) {
    let gy = date.year() as i64;
    let gm = date.month() as usize;
    let gd = date.day() as i64;

    let gy2 = if gm > 2 { gy + 1 } else { gy };
    let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100 + (gy2 + 399) / 400
        + gd
        + GREGORIAN_DAYS_BEFORE_MONTH[gm - 1];

    let mut jy = -1595 + 33 * (days / 12_053);
    days %= 12_053;
    jy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }
    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };
    (jy as i32, jm as u32, jd as u32)
}

/// Convert a Solar Hijri date to Gregorian; `None` for days that do not exist.
pub fn persian_to_gregorian(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || year < 1 {
        return None;
    }
    let jy = year as i64 + 1595;
    let jm = month as i64;
    let month_offset = if jm < 7 {
        (jm - 1) * 31
    } else {
        (jm - 7) * 30 + 186
    };
    let mut days =
        -355_668 + 365 * jy + (jy / 33) * 8 + ((jy % 33) + 3) / 4 + day as i64 + month_offset;

    let mut gy = 400 * (days / 146_097);
    days %= 146_097;
    if days > 36_524 {
        days -= 1;
        gy += 100 * (days / 36_524);
        days %= 36_524;
        if days >= 365 {
            days += 1;
        }
    }
    gy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        gy += (days - 1) / 365;
        days = (days - 1) % 365;
    }
    let date = NaiveDate::from_yo_opt(gy as i32, days as u32 + 1)?;

    // Days past the end of a month roll into the next one; reject them.
    if gregorian_to_persian(date) == (year, month, day) {
        Some(date)
    } else {
        None
    }
}
