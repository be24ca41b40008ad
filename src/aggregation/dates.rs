//! Date math and date coercion
//!
//! Expressions are an anchor followed by operations:
//! - anchor: `now`, or `<date>||`
//! - `+N<unit>` / `-N<unit>` add or subtract
//! - `/<unit>` rounds down (or up to the last millisecond of the unit when
//!   rounding up)
//!
//! Units: `y` year, `M` month, `w` week, `d` day, `h`/`H` hour, `m` minute,
//! `s` second. Rounding happens in the parser's time zone, which is either a
//! fixed offset or an IANA zone with its daylight saving rules.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, Offset,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde_json::Value;

use super::errors::DateMathError;
use crate::observability::{Logger, Severity};

/// Calendar unit used by date math and date histograms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl DateUnit {
    /// Parses a date math unit character
    pub fn from_math_char(c: char) -> Option<Self> {
        match c {
            'y' => Some(DateUnit::Year),
            'M' => Some(DateUnit::Month),
            'w' => Some(DateUnit::Week),
            'd' => Some(DateUnit::Day),
            'h' | 'H' => Some(DateUnit::Hour),
            'm' => Some(DateUnit::Minute),
            's' => Some(DateUnit::Second),
            _ => None,
        }
    }

    /// Date math unit character, the inverse of [`DateUnit::from_math_char`]
    pub fn math_char(self) -> char {
        match self {
            DateUnit::Year => 'y',
            DateUnit::Month => 'M',
            DateUnit::Week => 'w',
            DateUnit::Day => 'd',
            DateUnit::Hour => 'h',
            DateUnit::Minute => 'm',
            DateUnit::Second => 's',
        }
    }

    /// Parses a date histogram interval name
    pub fn from_interval(name: &str) -> Option<Self> {
        match name {
            "year" | "1y" => Some(DateUnit::Year),
            "month" | "1M" => Some(DateUnit::Month),
            "week" | "1w" => Some(DateUnit::Week),
            "day" | "1d" => Some(DateUnit::Day),
            "hour" | "1h" => Some(DateUnit::Hour),
            "minute" | "1m" => Some(DateUnit::Minute),
            "second" | "1s" => Some(DateUnit::Second),
            _ => None,
        }
    }

    /// Truncating label pattern of a date histogram bucket
    pub fn label_format(self) -> &'static str {
        match self {
            DateUnit::Year => "%Y-01-01 00:00:00",
            DateUnit::Month => "%Y-%m-01 00:00:00",
            DateUnit::Week | DateUnit::Day => "%Y-%m-%d 00:00:00",
            DateUnit::Hour => "%Y-%m-%d %H:00:00",
            DateUnit::Minute => "%Y-%m-%d %H:%M:00",
            DateUnit::Second => "%Y-%m-%d %H:%M:%S",
        }
    }

    fn fixed_duration(self) -> Option<Duration> {
        match self {
            DateUnit::Year | DateUnit::Month => None,
            DateUnit::Week => Some(Duration::weeks(1)),
            DateUnit::Day => Some(Duration::days(1)),
            DateUnit::Hour => Some(Duration::hours(1)),
            DateUnit::Minute => Some(Duration::minutes(1)),
            DateUnit::Second => Some(Duration::seconds(1)),
        }
    }
}

/// Naive formats tried for local date-times, most specific first
const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Formats only the generic fallback accepts
const FALLBACK_FORMATS: [&str; 3] = ["%Y/%m/%d %H:%M:%S", "%m/%d/%Y %H:%M:%S", "%d.%m.%Y %H:%M:%S"];
const FALLBACK_DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%m/%d/%Y"];

type DateParse = fn(&DateMathParser, &Value, DateTime<Utc>) -> Option<DateTime<Utc>>;

/// A resolved time zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

/// Parses dates and date math in one time zone
#[derive(Debug, Clone)]
pub struct DateMathParser {
    zone_id: String,
    zone: Zone,
}

impl DateMathParser {
    pub fn new(zone_id: impl Into<String>, zone: Zone) -> Self {
        Self {
            zone_id: zone_id.into(),
            zone,
        }
    }

    pub fn utc() -> Self {
        Self::new("UTC", Zone::Fixed(Utc.fix()))
    }

    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Parses a date or a date math expression relative to `now`
    pub fn parse(
        &self,
        text: &str,
        now: DateTime<Utc>,
        round_up: bool,
    ) -> Result<DateTime<Utc>, DateMathError> {
        let text = text.trim();
        if let Some(math) = text.strip_prefix("now") {
            return self.apply_math(text, now, math, round_up);
        }
        match text.split_once("||") {
            Some((anchor, math)) => {
                let anchor = self.parse_date(anchor)?;
                self.apply_math(text, anchor, math, round_up)
            }
            None => self.parse_date(text),
        }
    }

    /// Parses a plain date: RFC 3339, local date-time, date, year or epoch millis
    pub fn parse_date(&self, text: &str) -> Result<DateTime<Utc>, DateMathError> {
        let text = text.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Ok(parsed.with_timezone(&Utc));
        }

        let digits = text.strip_prefix('-').unwrap_or(text);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if text.len() == 4 {
                if let Some(date) = text.parse().ok().and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)) {
                    return self.local_date(date, text);
                }
            }
            return text
                .parse::<i64>()
                .ok()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                .ok_or_else(|| DateMathError::Unparseable(text.to_string()));
        }

        for format in LOCAL_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return self.local(naive, text);
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return self.local_date(date, text);
        }
        Err(DateMathError::Unparseable(text.to_string()))
    }

    /// Resolves a range bound. Numbers are epoch millis, strings are date math.
    pub fn resolve_bound(
        &self,
        bound: &Value,
        now: DateTime<Utc>,
        round_up: bool,
    ) -> Result<DateTime<Utc>, DateMathError> {
        match bound {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                .ok_or_else(|| DateMathError::Unparseable(n.to_string())),
            Value::String(s) => self.parse(s, now, round_up),
            other => Err(DateMathError::Unparseable(other.to_string())),
        }
    }

    /// Coerces a document value into an instant.
    ///
    /// Parsers are tried in order: epoch millis, date math, then the generic
    /// formats. A value no parser accepts is treated as missing.
    pub fn coerce(&self, value: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        const CHAIN: [(&str, DateParse); 3] = [
            ("epoch_millis", DateMathParser::coerce_epoch),
            ("date_math", DateMathParser::coerce_math),
            ("generic", DateMathParser::coerce_generic),
        ];

        for (name, parse) in CHAIN {
            if let Some(instant) = parse(self, value, now) {
                if name == "generic" && Logger::enabled(Severity::Trace) {
                    Logger::trace(
                        "DATE_PARSE_FALLBACK",
                        &[("parser", name), ("value", &value.to_string())],
                    );
                }
                return Some(instant);
            }
        }
        Logger::info(
            "DATE_PARSE_FALLBACK",
            &[("outcome", "missing"), ("value", &value.to_string())],
        );
        None
    }

    fn coerce_epoch(&self, value: &Value, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        }
    }

    fn coerce_math(&self, value: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => self.parse(s, now, false).ok(),
            _ => None,
        }
    }

    fn coerce_generic(&self, value: &Value, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let Value::String(text) = value else {
            return None;
        };
        let text = text.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
            return Some(parsed.with_timezone(&Utc));
        }
        for format in FALLBACK_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return self.local(naive, text).ok();
            }
        }
        for format in FALLBACK_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                return self.local_date(date, text).ok();
            }
        }
        None
    }

    /// Rounds an instant down to the start of `unit` in this time zone.
    ///
    /// The result carries the offset in effect at the start of the unit.
    pub fn truncate(
        &self,
        instant: DateTime<Utc>,
        unit: DateUnit,
    ) -> Option<DateTime<FixedOffset>> {
        match self.zone {
            Zone::Fixed(offset) => floor(instant.with_timezone(&offset), unit),
            Zone::Named(tz) => floor(instant.with_timezone(&tz), unit).map(|t| t.fixed_offset()),
        }
    }

    fn apply_math(
        &self,
        expr: &str,
        anchor: DateTime<Utc>,
        math: &str,
        round_up: bool,
    ) -> Result<DateTime<Utc>, DateMathError> {
        match self.zone {
            Zone::Fixed(offset) => apply_ops(expr, anchor.with_timezone(&offset), math, round_up),
            Zone::Named(tz) => apply_ops(expr, anchor.with_timezone(&tz), math, round_up),
        }
    }

    fn local(&self, naive: NaiveDateTime, text: &str) -> Result<DateTime<Utc>, DateMathError> {
        let instant = match self.zone {
            Zone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            Zone::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        };
        instant.ok_or_else(|| DateMathError::Unparseable(text.to_string()))
    }

    fn local_date(&self, date: NaiveDate, text: &str) -> Result<DateTime<Utc>, DateMathError> {
        match date.and_hms_opt(0, 0, 0) {
            Some(naive) => self.local(naive, text),
            None => Err(DateMathError::Unparseable(text.to_string())),
        }
    }
}

fn apply_ops<Z: TimeZone>(
    expr: &str,
    mut time: DateTime<Z>,
    math: &str,
    round_up: bool,
) -> Result<DateTime<Utc>, DateMathError> {
    let invalid = |reason: &str| DateMathError::InvalidMath {
        expr: expr.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = math.chars().peekable();
    while let Some(op) = chars.next() {
        match op {
            '/' => {
                let unit = chars
                    .next()
                    .and_then(DateUnit::from_math_char)
                    .ok_or_else(|| invalid("missing rounding unit"))?;
                let rounded = if round_up {
                    floor(time, unit)
                        .and_then(|start| add(start, 1, unit))
                        .map(|end| end - Duration::milliseconds(1))
                } else {
                    floor(time, unit)
                };
                time = rounded.ok_or_else(|| invalid("date out of range"))?;
            }
            '+' | '-' => {
                let mut amount = String::new();
                while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
                    amount.push(c);
                    chars.next();
                }
                let amount: i64 = if amount.is_empty() {
                    1
                } else {
                    amount.parse().map_err(|_| invalid("amount out of range"))?
                };
                let unit = chars
                    .next()
                    .and_then(DateUnit::from_math_char)
                    .ok_or_else(|| invalid("missing unit"))?;
                let signed = if op == '-' { -amount } else { amount };
                time = add(time, signed, unit).ok_or_else(|| invalid("date out of range"))?;
            }
            other => return Err(invalid(&format!("unexpected character '{}'", other))),
        }
    }
    Ok(time.with_timezone(&Utc))
}

fn floor<Z: TimeZone>(time: DateTime<Z>, unit: DateUnit) -> Option<DateTime<Z>> {
    let date = time.date_naive();
    let naive = match unit {
        DateUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
        DateUnit::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)?,
        DateUnit::Week => {
            let back = i64::from(date.weekday().num_days_from_monday());
            (date - Duration::days(back)).and_hms_opt(0, 0, 0)?
        }
        DateUnit::Day => date.and_hms_opt(0, 0, 0)?,
        DateUnit::Hour => date.and_hms_opt(time.hour(), 0, 0)?,
        DateUnit::Minute => date.and_hms_opt(time.hour(), time.minute(), 0)?,
        DateUnit::Second => date.and_hms_opt(time.hour(), time.minute(), time.second())?,
    };
    time.timezone().from_local_datetime(&naive).earliest()
}

fn add<Z: TimeZone>(time: DateTime<Z>, amount: i64, unit: DateUnit) -> Option<DateTime<Z>> {
    let months = match unit {
        DateUnit::Year => amount.checked_mul(12)?,
        DateUnit::Month => amount,
        _ => {
            let step = unit.fixed_duration()?;
            let delta = step.checked_mul(i32::try_from(amount).ok()?)?;
            return time.checked_add_signed(delta);
        }
    };
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        time.checked_add_months(magnitude)
    } else {
        time.checked_sub_months(magnitude)
    }
}

/// Parses a signed fixed-length offset such as `+6h`, `-1d` or `30m`
pub fn parse_offset(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let unit = DateUnit::from_math_char(rest.chars().last()?)?;
    let amount: i32 = rest[..rest.len() - 1].parse().ok()?;
    unit.fixed_duration()?.checked_mul(sign * amount)
}

/// Parses a time zone id: an IANA name such as `America/Los_Angeles`, or a
/// fixed offset (`UTC`, `Z`, `GMT`, `+HH:MM`, `-HHMM`, `+HH`, optionally
/// prefixed by `UTC` or `GMT`)
pub fn parse_time_zone(id: &str) -> Option<Zone> {
    match parse_fixed_offset(id) {
        Some(offset) => Some(Zone::Fixed(offset)),
        None => id.trim().parse::<Tz>().ok().map(Zone::Named),
    }
}

fn parse_fixed_offset(id: &str) -> Option<FixedOffset> {
    let id = id.trim();
    if matches!(
        id.to_ascii_uppercase().as_str(),
        "UTC" | "Z" | "GMT" | "ETC/UTC" | "ETC/GMT"
    ) {
        return FixedOffset::east_opt(0);
    }
    let rest = id
        .strip_prefix("UTC")
        .or_else(|| id.strip_prefix("GMT"))
        .unwrap_or(id);
    let (sign, digits) = match rest.chars().next()? {
        '+' => (1, &rest[1..]),
        '-' => (-1, &rest[1..]),
        _ => return None,
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some(parts) => parts,
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 18 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Per-time-zone cache of date math parsers, safe for concurrent use
#[derive(Debug)]
pub struct DateParsers {
    default_zone: String,
    cache: RwLock<HashMap<String, Arc<DateMathParser>>>,
}

impl Default for DateParsers {
    fn default() -> Self {
        Self::new("UTC")
    }
}

impl DateParsers {
    pub fn new(default_zone: impl Into<String>) -> Self {
        Self {
            default_zone: default_zone.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the parser for `zone`, or for the default zone
    pub fn get(&self, zone: Option<&str>) -> Result<Arc<DateMathParser>, DateMathError> {
        let id = zone.unwrap_or(&self.default_zone);
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(parser) = cache.get(id) {
                return Ok(Arc::clone(parser));
            }
        }

        let Some(resolved) = parse_time_zone(id) else {
            Logger::warn("TIMEZONE_UNKNOWN", &[("zone", id)]);
            return Err(DateMathError::UnknownTimeZone(id.to_string()));
        };
        let parser = DateMathParser::new(id, resolved);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            cache.entry(id.to_string()).or_insert_with(|| Arc::new(parser)),
        ))
    }

    /// Number of cached parsers
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
