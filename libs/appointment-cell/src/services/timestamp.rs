use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use tracing::debug;

use crate::models::TimeOfDay;

/// One way of reading `(hour, minute)` out of a raw appointment timestamp.
/// Returning `None` hands the value to the next strategy.
#[derive(Debug, Clone, Copy)]
pub struct ParseStrategy {
    pub name: &'static str,
    pub parse: fn(&str) -> Option<(u32, u32)>,
}

static ISO_TIME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"T(\d{2}):(\d{2})").ok());

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%b %d %Y %H:%M:%S",
    "%b %d %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// `2024-03-15T14:30:00`, `...T14:30Z`, `...T14:30:00+02:00`: the digits after `T`.
pub fn iso_t_separated(raw: &str) -> Option<(u32, u32)> {
    let captures = ISO_TIME.as_ref()?.captures(raw)?;
    let hour = captures.get(1)?.as_str().parse().ok()?;
    let minute = captures.get(2)?.as_str().parse().ok()?;
    Some((hour, minute))
}

/// `2024-03-15 14:30:00`: the second whitespace-separated token, read as `H:MM`.
pub fn space_separated(raw: &str) -> Option<(u32, u32)> {
    let time = raw.split_whitespace().nth(1)?;
    let mut parts = time.split(':');
    let hour = parts.next()?.trim().parse().ok()?;
    let minute = parts.next()?.get(..2)?.parse().ok()?;
    Some((hour, minute))
}

/// Anything else chrono can read as a datetime (RFC 3339, RFC 2822, common
/// naive layouts) or as a bare time. Offsets are ignored; the wall clock as
/// written is what the receptionist booked.
pub fn generic_datetime(raw: &str) -> Option<(u32, u32)> {
    let raw = raw.trim();

    let time = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.time())
        .or_else(|_| DateTime::parse_from_rfc2822(raw).map(|dt| dt.time()))
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.time())
        })
        .or_else(|| {
            TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
        })?;

    Some((time.hour(), time.minute()))
}

/// Ordered chain of strategies; the first one that yields a valid
/// wall-clock time wins.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    strategies: Vec<ParseStrategy>,
}

impl Default for TimestampParser {
    fn default() -> Self {
        Self {
            strategies: vec![
                ParseStrategy { name: "iso_t_separated", parse: iso_t_separated },
                ParseStrategy { name: "space_separated", parse: space_separated },
                ParseStrategy { name: "generic_datetime", parse: generic_datetime },
            ],
        }
    }
}

impl TimestampParser {
    pub fn new(strategies: Vec<ParseStrategy>) -> Self {
        Self { strategies }
    }

    /// Appends a strategy tried after the existing ones.
    pub fn with_strategy(mut self, strategy: ParseStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name).collect()
    }

    pub fn parse(&self, raw: &str) -> Option<TimeOfDay> {
        self.strategies.iter().find_map(|strategy| {
            let (hour, minute) = (strategy.parse)(raw)?;
            match TimeOfDay::from_hm(hour, minute) {
                Some(time) => {
                    debug!("Parsed '{}' as {} via {}", raw, time, strategy.name);
                    Some(time)
                }
                None => {
                    debug!(
                        "Strategy {} read out-of-range time {}:{} from '{}'",
                        strategy.name, hour, minute, raw
                    );
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(raw: &str) -> Option<String> {
        TimestampParser::default().parse(raw).map(|t| t.to_string())
    }

    #[test]
    fn iso_strategy_reads_digits_after_t() {
        assert_eq!(iso_t_separated("2023-09-15T14:30:00"), Some((14, 30)));
        assert_eq!(iso_t_separated("2023-09-15T09:05:00.000Z"), Some((9, 5)));
        assert_eq!(iso_t_separated("2023-09-15 14:30:00"), None);
        assert_eq!(iso_t_separated("2023-09-15T9:30"), None);
    }

    #[test]
    fn space_strategy_reads_second_token() {
        assert_eq!(space_separated("2023-09-15 14:30:00"), Some((14, 30)));
        assert_eq!(space_separated("2023-09-15 9:45"), Some((9, 45)));
        assert_eq!(space_separated("2023-09-15"), None);
        assert_eq!(space_separated("15 Mar 2024 10:00"), None);
    }

    #[test]
    fn generic_strategy_handles_other_layouts() {
        assert_eq!(generic_datetime("Fri, 15 Mar 2024 11:15:00 +0000"), Some((11, 15)));
        assert_eq!(generic_datetime("2024/03/15 13:00"), Some((13, 0)));
        assert_eq!(generic_datetime("15:45"), Some((15, 45)));
        assert_eq!(generic_datetime("not a date"), None);
    }

    #[test]
    fn chain_prefers_earlier_strategies() {
        assert_eq!(hm("2024-03-15T10:30:00"), Some("10:30".to_string()));
        assert_eq!(hm("2024-03-15 16:00:00"), Some("16:00".to_string()));
        assert_eq!(hm("Fri, 15 Mar 2024 11:15:00 +0000"), Some("11:15".to_string()));
    }

    #[test]
    fn offsets_do_not_shift_wall_clock() {
        assert_eq!(hm("2024-03-15T10:30:00+05:00"), Some("10:30".to_string()));
    }

    #[test]
    fn out_of_range_times_are_rejected() {
        assert_eq!(hm("2024-03-15T25:00:00"), None);
        assert_eq!(hm("2024-03-15 10:75"), None);
        assert_eq!(hm("garbage"), None);
        assert_eq!(hm(""), None);
    }

    #[test]
    fn extra_strategies_run_last() {
        fn noon(_: &str) -> Option<(u32, u32)> {
            Some((12, 0))
        }

        let parser = TimestampParser::default()
            .with_strategy(ParseStrategy { name: "noon", parse: noon });

        assert_eq!(parser.strategy_names().last(), Some(&"noon"));
        assert_eq!(parser.parse("garbage").map(|t| t.to_string()), Some("12:00".to_string()));
        assert_eq!(parser.parse("2024-03-15T09:00").map(|t| t.to_string()), Some("09:00".to_string()));
    }
}
