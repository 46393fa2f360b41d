use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::json;

use crate::error::{AppError, AppResult};

pub const DAY_FORMAT: &str = "%Y-%m-%d";

pub fn parse_day(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DAY_FORMAT).map_err(|err| {
        AppError::validation_with_details(
            "无效的日期格式",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            AppError::validation_with_details(
                "无效的时间格式",
                json!({"value": value, "error": err.to_string()}),
            )
        })
}

pub fn parse_time_zone(value: &str) -> AppResult<Tz> {
    value.parse::<Tz>().map_err(|_| {
        AppError::validation_with_details("无效的时区名称", json!({"value": value}))
    })
}

/// The calendar day a wall-clock instant falls on in `tz`. This is computed
/// once when an event is appended and frozen into the row.
pub fn local_day(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    tz.from_utc_datetime(&instant.naive_utc()).date_naive()
}

/// UTC calendar day of an RFC 3339 timestamp string, for membership
/// intervals and other non-habit-scoped day math.
pub fn utc_day_of(timestamp: &str) -> AppResult<NaiveDate> {
    Ok(parse_timestamp(timestamp)?.date_naive())
}
