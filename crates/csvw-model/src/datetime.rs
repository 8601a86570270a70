//! Date/time pattern compiler.
//!
//! CSVW date/time formats use a compact pattern language (`yyyy-MM-dd`,
//! `HH:mm:ss.SSS`, trailing `x`/`X` timezone markers). A pattern is
//! compiled once into a head-anchored regex with named capture groups plus
//! an ordered list of format tokens; parsing and formatting both work off
//! the compiled artifacts.
//!
//! The set of recognized date and time sub-patterns is closed: anything
//! outside the allow-lists below is a configuration error.

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;

use crate::error::DatatypeError;
use crate::value::{DateTimeValue, IsoDuration};

/// Valid date sub-patterns.
const DATE_PATTERNS: &[&str] = &[
    "yyyy-MM-dd", // e.g., 2015-03-22
    "yyyyMMdd",   // e.g., 20150322
    "dd-MM-yyyy", // e.g., 22-03-2015
    "d-M-yyyy",   // e.g., 22-3-2015
    "MM-dd-yyyy", // e.g., 03-22-2015
    "M-d-yyyy",   // e.g., 3-22-2015
    "dd/MM/yyyy", // e.g., 22/03/2015
    "d/M/yyyy",   // e.g., 22/3/2015
    "MM/dd/yyyy", // e.g., 03/22/2015
    "M/d/yyyy",   // e.g., 3/22/2015
    "dd.MM.yyyy", // e.g., 22.03.2015
    "d.M.yyyy",   // e.g., 22.3.2015
    "MM.dd.yyyy", // e.g., 03.22.2015
    "M.d.yyyy",   // e.g., 3.22.2015
];

/// Valid time sub-patterns.
const TIME_PATTERNS: &[&str] = &["HH:mm:ss", "HHmmss", "HH:mm", "HHmm"];

/// A trailing timezone marker (`x`, `XX`, ` XXX`, ...).
///
/// The width controls rendering: a colon between hours and minutes only for
/// width 3, and minutes suppressed for width 1 when they are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TzMarker {
    /// The marker was preceded by a single space in the pattern.
    pub leading_space: bool,
    /// Number of marker letters (1..=3).
    pub width: u8,
}

/// One element of the compiled format template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmtToken {
    Literal(char),
    Year,
    Month2,
    Month1,
    Day2,
    Day1,
    Hour2,
    Minute2,
    Second2,
    /// `.` followed by the first `n` digits of the microseconds.
    Fraction(u8),
}

/// A compiled date/time format.
#[derive(Debug, Clone)]
pub struct DateTimeFormat {
    /// Head-anchored pattern with named groups. Deliberately not anchored
    /// at the end: a timezone suffix is parsed from the unmatched tail.
    pub regex: Regex,
    pub template: Vec<FmtToken>,
    pub tz_marker: Option<TzMarker>,
}

fn component(part: &str) -> Option<(FmtToken, &'static str)> {
    match part {
        "yyyy" => Some((FmtToken::Year, "(?P<year>[0-9]{4})")),
        "MM" => Some((FmtToken::Month2, "(?P<month>[0-9]{2})")),
        "dd" => Some((FmtToken::Day2, "(?P<day>[0-9]{2})")),
        "M" => Some((FmtToken::Month1, "(?P<month>[0-9]{1,2})")),
        "d" => Some((FmtToken::Day1, "(?P<day>[0-9]{1,2})")),
        "HH" => Some((FmtToken::Hour2, "(?P<hour>[0-9]{2})")),
        "mm" => Some((FmtToken::Minute2, "(?P<minute>[0-9]{2})")),
        "ss" => Some((FmtToken::Second2, "(?P<second>[0-9]{2})")),
        _ => None,
    }
}

/// Strip an optional trailing timezone marker (` ?[xX]{1,3}`) off a
/// pattern. Mixing `x` and `X` within the marker is invalid.
fn strip_tz_marker(fmt: &str) -> Result<(Option<TzMarker>, &str), DatatypeError> {
    let run = fmt.chars().rev().take_while(|c| *c == 'x' || *c == 'X').count();
    if run == 0 {
        return Ok((None, fmt));
    }
    let take = run.min(3);
    let marker = &fmt[fmt.len() - take..];
    if marker.contains('x') && marker.contains('X') {
        return Err(DatatypeError::config(format!(
            "invalid datetime pattern: {fmt}"
        )));
    }
    let mut cut = fmt.len() - take;
    let mut leading_space = false;
    if run <= 3 && fmt[..cut].ends_with(' ') {
        leading_space = true;
        cut -= 1;
    }
    Ok((
        Some(TzMarker {
            leading_space,
            width: take as u8,
        }),
        &fmt[..cut],
    ))
}

/// Split a sub-pattern into component tokens, either on its separator or,
/// for the compact patterns (`yyyyMMdd`, `HHmm`), by greedy token scan.
fn split_components(pattern: &str, sep: Option<char>) -> Vec<String> {
    if let Some(sep) = sep {
        return pattern.split(sep).map(str::to_string).collect();
    }
    let mut parts = Vec::new();
    let mut rest = pattern;
    while !rest.is_empty() {
        let token = ["yyyy", "MM", "dd", "HH", "mm", "ss", "M", "d"]
            .iter()
            .find(|t| rest.starts_with(**t));
        match token {
            Some(t) => {
                parts.push((*t).to_string());
                rest = &rest[t.len()..];
            }
            None => {
                // Unreachable for allow-listed patterns; bail out and let
                // the component lookup report the error.
                parts.push(rest.to_string());
                break;
            }
        }
    }
    parts
}

/// Compile a date/time pattern into its regex, format template, and
/// timezone marker.
///
/// With `no_date` the whole pattern (after timezone stripping) is treated
/// as a time pattern, as required for the `time` datatype.
pub fn compile(fmt: &str, no_date: bool) -> Result<DateTimeFormat, DatatypeError> {
    let invalid = || DatatypeError::config(format!("invalid datetime pattern: {fmt}"));

    let (tz_marker, stripped) = strip_tz_marker(fmt)?;

    // Only a single space or "T" may separate the date and time patterns,
    // and neither occurs anywhere else, so detection is a plain scan.
    let dt_sep = if stripped.contains(' ') {
        Some(' ')
    } else if stripped.contains('T') {
        Some('T')
    } else {
        None
    };

    let (dfmt, tfmt) = match dt_sep.and_then(|sep| stripped.split_once(sep)) {
        Some((d, t)) => (Some(d), Some(t)),
        None if no_date => (None, Some(stripped)),
        None => (Some(stripped), None),
    };

    // Strip a fractional-seconds marker (`.S` up to `.SSSSSS`) off the
    // time pattern.
    let mut fraction: Option<usize> = None;
    let tfmt = match tfmt {
        Some(t) => match t.split_once('.') {
            Some((head, tail)) => {
                if tail.is_empty() || !tail.chars().all(|c| c == 'S') {
                    return Err(invalid());
                }
                fraction = Some(tail.len());
                Some(head)
            }
            None => Some(t),
        },
        None => None,
    };

    if let Some(d) = dfmt
        && !DATE_PATTERNS.contains(&d)
    {
        return Err(invalid());
    }
    if let Some(t) = tfmt
        && !TIME_PATTERNS.contains(&t)
    {
        return Err(invalid());
    }

    let mut regex = String::from("^");
    let mut template = Vec::new();

    if let Some(d) = dfmt {
        let sep = ['.', '-', '/'].into_iter().find(|c| d.contains(*c));
        for (i, part) in split_components(d, sep).iter().enumerate() {
            if i > 0
                && let Some(sep) = sep
            {
                template.push(FmtToken::Literal(sep));
                regex.push_str(&regex::escape(&sep.to_string()));
            }
            let (token, pattern) = component(part).ok_or_else(invalid)?;
            template.push(token);
            regex.push_str(pattern);
        }
    }

    if let Some(sep) = dt_sep {
        template.push(FmtToken::Literal(sep));
        regex.push_str(&regex::escape(&sep.to_string()));
    }

    if let Some(t) = tfmt {
        let sep = t.contains(':').then_some(':');
        for (i, part) in split_components(t, sep).iter().enumerate() {
            if i > 0 && sep.is_some() {
                template.push(FmtToken::Literal(':'));
                regex.push(':');
            }
            let (token, pattern) = component(part).ok_or_else(invalid)?;
            template.push(token);
            regex.push_str(pattern);
        }
    }

    if let Some(n) = fraction {
        template.push(FmtToken::Fraction(n as u8));
        regex.push_str(&format!("\\.(?P<microsecond>[0-9]{{1,{n}}})"));
    }

    let regex = Regex::new(&regex).map_err(|e| {
        DatatypeError::config(format!("invalid datetime pattern {fmt}: {e}"))
    })?;

    Ok(DateTimeFormat {
        regex,
        template,
        tz_marker,
    })
}

/// Date and time components extracted from a lexical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DtParts {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub offset: Option<FixedOffset>,
}

/// Match a lexical value against a compiled format.
///
/// Returns `None` when the value does not match, names an impossible
/// calendar date, or carries an unparseable timezone suffix.
pub fn parse_parts(value: &str, format: &DateTimeFormat) -> Option<DtParts> {
    let caps = format.regex.captures(value)?;
    let end = caps.get(0)?.end();

    let int = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps
        .name("year")
        .and_then(|m| m.as_str().parse::<i32>().ok());
    let month = int("month");
    let day = int("day");
    let hour = int("hour");
    let minute = int("minute");
    let second = int("second");
    // Decimal fractions of seconds: chop anything beyond 6 places, then
    // right-pad to get microseconds.
    let microsecond = caps.name("microsecond").and_then(|m| {
        let mut digits: String = m.as_str().chars().take(6).collect();
        while digits.len() < 6 {
            digits.push('0');
        }
        digits.parse::<u32>().ok()
    });

    let date = match (year, month, day) {
        (Some(y), Some(m), Some(d)) => Some(NaiveDate::from_ymd_opt(y, m, d)?),
        (None, None, None) => None,
        _ => return None,
    };

    let time = if hour.is_some() || minute.is_some() || second.is_some() || microsecond.is_some() {
        Some(NaiveTime::from_hms_micro_opt(
            hour.unwrap_or(0),
            minute.unwrap_or(0),
            second.unwrap_or(0),
            microsecond.unwrap_or(0),
        )?)
    } else {
        None
    };

    let offset = if format.tz_marker.is_some() {
        let suffix = value[end..].trim_start();
        if suffix.is_empty() {
            None
        } else {
            Some(parse_tz_offset(suffix)?)
        }
    } else {
        None
    };

    Some(DtParts { date, time, offset })
}

/// Render date/time components through a compiled format.
pub fn format_parts(
    format: &DateTimeFormat,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    offset: Option<FixedOffset>,
) -> String {
    let (y, mo, d) = date
        .map(|d| (d.year(), d.month(), d.day()))
        .unwrap_or((0, 1, 1));
    let (h, mi, s, micro) = time
        .map(|t| (t.hour(), t.minute(), t.second(), t.nanosecond() / 1_000))
        .unwrap_or((0, 0, 0, 0));

    let mut out = String::new();
    for token in &format.template {
        match token {
            FmtToken::Literal(c) => out.push(*c),
            FmtToken::Year => out.push_str(&format!("{y:04}")),
            FmtToken::Month2 => out.push_str(&format!("{mo:02}")),
            FmtToken::Month1 => out.push_str(&format!("{mo}")),
            FmtToken::Day2 => out.push_str(&format!("{d:02}")),
            FmtToken::Day1 => out.push_str(&format!("{d}")),
            FmtToken::Hour2 => out.push_str(&format!("{h:02}")),
            FmtToken::Minute2 => out.push_str(&format!("{mi:02}")),
            FmtToken::Second2 => out.push_str(&format!("{s:02}")),
            FmtToken::Fraction(n) => {
                let digits = format!("{micro:06}");
                out.push('.');
                out.push_str(&digits[..(*n as usize).min(6)]);
            }
        }
    }

    if let (Some(marker), Some(offset)) = (&format.tz_marker, offset) {
        out.push_str(&render_tz_suffix(offset, marker));
    }
    out
}

/// Render a UTC offset according to the timezone-marker policy: optional
/// leading space, colon only for the three-letter marker, minutes omitted
/// for the one-letter marker when they are zero.
pub fn render_tz_suffix(offset: FixedOffset, marker: &TzMarker) -> String {
    let total = offset.local_minus_utc();
    let sign = if total < 0 { '-' } else { '+' };
    let abs = total.abs();
    let hours = abs / 3600;
    let minutes = (abs % 3600) / 60;

    let mut out = String::new();
    if marker.leading_space {
        out.push(' ');
    }
    out.push(sign);
    out.push_str(&format!("{hours:02}"));
    if marker.width == 3 {
        out.push(':');
    }
    if (marker.width == 1 && minutes != 0) || marker.width > 1 {
        out.push_str(&format!("{minutes:02}"));
    }
    out
}

/// Parse a timezone suffix: `Z`, `+HH`, `+HHMM`, or `+HH:MM`.
pub fn parse_tz_offset(suffix: &str) -> Option<FixedOffset> {
    if suffix == "Z" {
        return FixedOffset::east_opt(0);
    }
    let sign = match suffix.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let rest = &suffix[1..];
    let (hours, minutes): (i32, i32) = match rest.len() {
        2 => (rest.parse().ok()?, 0),
        4 => (rest[..2].parse().ok()?, rest[2..].parse().ok()?),
        5 if rest.as_bytes()[2] == b':' => (rest[..2].parse().ok()?, rest[3..].parse().ok()?),
        _ => return None,
    };
    if !(0..=14).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse a date/time without an explicit format: RFC 3339, then the common
/// ISO 8601 shapes, then a bare date.
pub fn parse_generic(value: &str) -> Option<DateTimeValue> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(DateTimeValue {
            value: dt.naive_local(),
            offset: Some(*dt.offset()),
        });
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(DateTimeValue {
                value: dt,
                offset: None,
            });
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(DateTimeValue {
        value: date.and_hms_opt(0, 0, 0)?,
        offset: None,
    })
}

/// Parse an ISO 8601 duration (`PnYnMnDTnHnMnS` or `PnW`, optionally
/// negative). Weeks cannot be mixed with other components.
pub fn parse_duration(value: &str) -> Option<IsoDuration> {
    let (negative, rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let rest = rest.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut duration = IsoDuration {
        negative,
        ..IsoDuration::default()
    };

    if rest.contains('W') {
        let number = rest.strip_suffix('W')?;
        if number.chars().any(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        duration.weeks = Some(number.parse().ok()?);
        return Some(duration);
    }

    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    parse_duration_components(date_part, &mut duration, false)?;
    if let Some(time_part) = time_part {
        if time_part.is_empty() {
            return None;
        }
        parse_duration_components(time_part, &mut duration, true)?;
    }
    Some(duration)
}

fn parse_duration_components(
    part: &str,
    duration: &mut IsoDuration,
    time: bool,
) -> Option<()> {
    let mut number = String::new();
    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let value: f64 = number.parse().ok()?;
        number.clear();
        match (time, c) {
            (false, 'Y') => duration.years = Some(value),
            (false, 'M') => duration.months = Some(value),
            (false, 'D') => duration.days = Some(value),
            (true, 'H') => duration.hours = Some(value),
            (true, 'M') => duration.minutes = Some(value),
            (true, 'S') => duration.seconds = Some(value),
            _ => return None,
        }
    }
    // A trailing number without a designator is malformed.
    if !number.is_empty() {
        return None;
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn compile_date_pattern_and_parse() {
        let f = compile("yyyy-MM-dd", false).unwrap();
        let parts = parse_parts("2015-03-22", &f).unwrap();
        assert_eq!(parts.date, Some(date(2015, 3, 22)));
        assert_eq!(parts.time, None);
        assert_eq!(format_parts(&f, parts.date, None, None), "2015-03-22");
    }

    #[test]
    fn compile_rejects_unknown_patterns() {
        assert!(compile("yyyy/MM/dd", false).is_err());
        assert!(compile("HH:mm:ss", false).is_err()); // date position
        assert!(compile("junk", false).is_err());
    }

    #[test]
    fn compile_datetime_with_fraction() {
        let f = compile("yyyy-MM-dd HH:mm:ss.SSS", false).unwrap();
        let parts = parse_parts("2015-03-22 22:05:01.5", &f).unwrap();
        assert_eq!(parts.date, Some(date(2015, 3, 22)));
        // `.5` is half a second: 500000 microseconds.
        assert_eq!(
            parts.time,
            NaiveTime::from_hms_micro_opt(22, 5, 1, 500_000)
        );
        assert_eq!(
            format_parts(&f, parts.date, parts.time, None),
            "2015-03-22 22:05:01.500"
        );
    }

    #[test]
    fn compact_time_pattern() {
        let f = compile("HHmm", true).unwrap();
        let parts = parse_parts("2205", &f).unwrap();
        assert_eq!(parts.time, Some(time(22, 5, 0)));
        assert_eq!(format_parts(&f, None, parts.time, None), "2205");
    }

    #[test]
    fn mixed_case_marker_is_invalid() {
        assert!(compile("yyyy-MM-dd xX", false).is_err());
    }

    #[test]
    fn marker_minute_suppression() {
        let one = TzMarker {
            leading_space: false,
            width: 1,
        };
        let three = TzMarker {
            leading_space: false,
            width: 3,
        };
        let plus3 = FixedOffset::east_opt(3 * 3600).unwrap();
        let plus330 = FixedOffset::east_opt(3 * 3600 + 30 * 60).unwrap();
        assert_eq!(render_tz_suffix(plus3, &one), "+03");
        assert_eq!(render_tz_suffix(plus330, &one), "+0330");
        assert_eq!(render_tz_suffix(plus3, &three), "+03:00");
        assert_eq!(render_tz_suffix(plus330, &three), "+03:30");
    }

    #[test]
    fn marker_with_leading_space() {
        let f = compile("d.M.yyyy HH:mm X", false).unwrap();
        let marker = f.tz_marker.unwrap();
        assert!(marker.leading_space);
        assert_eq!(marker.width, 1);

        let parts = parse_parts("22.3.2015 22:05 +03:00", &f).unwrap();
        assert_eq!(parts.offset, FixedOffset::east_opt(3 * 3600));
        assert_eq!(
            format_parts(&f, parts.date, parts.time, parts.offset),
            "22.3.2015 22:05 +03"
        );
    }

    #[test]
    fn tz_offset_shapes() {
        assert_eq!(parse_tz_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_tz_offset("+03"), FixedOffset::east_opt(3 * 3600));
        assert_eq!(
            parse_tz_offset("-0830"),
            FixedOffset::east_opt(-(8 * 3600 + 30 * 60))
        );
        assert_eq!(
            parse_tz_offset("+05:30"),
            FixedOffset::east_opt(5 * 3600 + 30 * 60)
        );
        assert_eq!(parse_tz_offset("+99"), None);
        assert_eq!(parse_tz_offset("0300"), None);
    }

    #[test]
    fn duration_parsing() {
        let dur = parse_duration("P2Y3M14D").unwrap();
        assert_eq!(dur.years, Some(2.0));
        assert_eq!(dur.months, Some(3.0));
        assert_eq!(dur.days, Some(14.0));

        let dur = parse_duration("PT4H30M").unwrap();
        assert_eq!(dur.hours, Some(4.0));
        assert_eq!(dur.minutes, Some(30.0));

        let dur = parse_duration("-P1D").unwrap();
        assert!(dur.negative);

        assert!(parse_duration("P4.5W").is_some());
        assert!(parse_duration("P1W2D").is_none());
        assert!(parse_duration("P1").is_none());
        assert!(parse_duration("1D").is_none());
    }

    #[test]
    fn invalid_calendar_date_rejected() {
        let f = compile("yyyy-MM-dd", false).unwrap();
        assert!(parse_parts("2015-13-22", &f).is_none());
        assert!(parse_parts("2015-02-30", &f).is_none());
        assert!(parse_parts("not a date", &f).is_none());
    }
}
