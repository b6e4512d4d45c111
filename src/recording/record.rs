// src/recording/record.rs
//! Call records
//!
//! One `CallRecord` is built per successfully completed instrumented call.
//! Every field is persisted as text, so timestamps and durations carry
//! their own string codecs.

use chrono::{Duration, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timestamp layout used in records and notifications
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Record of one instrumented call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Wall-clock time the call started
    #[serde(rename = "start time", with = "timestamp_text")]
    pub start_time: NaiveDateTime,

    /// Wall-clock time the call returned
    #[serde(rename = "end time", with = "timestamp_text")]
    pub end_time: NaiveDateTime,

    /// `end_time - start_time`
    #[serde(rename = "elapsed time", with = "duration_text")]
    pub elapsed: Duration,

    /// Rendered arguments
    #[serde(rename = "input values")]
    pub input_values: String,

    /// Captured stdout lines (absent when output was not collected)
    #[serde(rename = "prints")]
    pub prints: Option<Vec<String>>,

    /// Captured file lines by logical name (absent when files were not collected)
    #[serde(rename = "log files outputs")]
    pub files: Option<BTreeMap<String, Vec<String>>>,

    /// Rendered return value
    #[serde(rename = "return values")]
    pub return_value: String,
}

impl CallRecord {
    pub fn new(
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        input_values: String,
        prints: Option<Vec<String>>,
        files: Option<BTreeMap<String, Vec<String>>>,
        return_value: String,
    ) -> Self {
        let elapsed = (end_time - start_time).max(Duration::zero());
        Self {
            start_time,
            end_time,
            elapsed,
            input_values,
            prints,
            files,
            return_value,
        }
    }

    pub fn start_time_text(&self) -> String {
        format_timestamp(&self.start_time)
    }

    pub fn end_time_text(&self) -> String {
        format_timestamp(&self.end_time)
    }

    pub fn elapsed_text(&self) -> String {
        format_elapsed(&self.elapsed)
    }
}

/// Current local time truncated to the precision records keep
pub fn now_micros() -> NaiveDateTime {
    let now = Local::now().naive_local();
    let micros = now.nanosecond() / 1_000 * 1_000;
    now.with_nanosecond(micros).unwrap_or(now)
}

/// Render arguments the way records store them
pub fn render_args<A: std::fmt::Debug>(args: &A) -> String {
    format!("args: {:?}", args)
}

/// Render a return value the way records store it
pub fn render_value<T: std::fmt::Debug>(value: &T) -> String {
    format!("{:?}", value)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()
}

/// Render a duration as `[N day(s), ]H:MM:SS.ffffff`
pub fn format_elapsed(elapsed: &Duration) -> String {
    let total_us = elapsed.num_microseconds().unwrap_or(i64::MAX).max(0);
    let micros = total_us % 1_000_000;
    let total_secs = total_us / 1_000_000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let clock = format!("{}:{:02}:{:02}.{:06}", hours, minutes, seconds, micros);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Parse the output of `format_elapsed`
pub fn parse_elapsed(text: &str) -> Option<Duration> {
    let (days, clock) = match text.split_once(", ") {
        Some((prefix, clock)) => {
            let count = prefix
                .strip_suffix(" days")
                .or_else(|| prefix.strip_suffix(" day"))?;
            (count.trim().parse::<i64>().ok()?, clock)
        }
        None => (0, text),
    };

    let mut parts = clock.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (seconds, micros) = match seconds_part.split_once('.') {
        Some((s, frac)) => {
            let padded = format!("{:0<6}", frac);
            (s.parse::<i64>().ok()?, padded.get(..6)?.parse::<i64>().ok()?)
        }
        None => (seconds_part.parse::<i64>().ok()?, 0),
    };

    Some(
        Duration::days(days)
            + Duration::hours(hours)
            + Duration::minutes(minutes)
            + Duration::seconds(seconds)
            + Duration::microseconds(micros),
    )
}

mod timestamp_text {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(d)?;
        parse_timestamp(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", text)))
    }
}

mod duration_text {
    use super::{format_elapsed, parse_elapsed};
    use chrono::Duration;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_elapsed(elapsed))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        parse_elapsed(&text).ok_or_else(|| de::Error::custom(format!("invalid duration: {}", text)))
    }
}
