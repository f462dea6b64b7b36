use crate::time::error::Error;
use core::str::FromStr;
use lazy_static::*;
use regex::Regex;
use std::time::Duration;

lazy_static! {
    static ref DURATION_REGEX: Regex =
        Regex::new(r"^\s*(?P<value>\d+)\s*(?P<unit>[a-z]+)\s*$").expect("Regex compilation error");
}

/// A duration written the way operators type it: `500ms`, `30s`, `2 minutes`.
#[derive(Debug, PartialEq)]
pub struct DurationUnit {
    value: u64,
    unit: TimeUnit,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum TimeUnit {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
}

impl TimeUnit {
    fn nanos(self) -> u64 {
        match self {
            TimeUnit::Nanosecond => 1,
            TimeUnit::Microsecond => 1_000,
            TimeUnit::Millisecond => 1_000_000,
            TimeUnit::Second => 1_000_000_000,
            TimeUnit::Minute => 60 * 1_000_000_000,
            TimeUnit::Hour => 60 * 60 * 1_000_000_000,
        }
    }
}

impl DurationUnit {
    pub fn to_duration(&self) -> Result<Duration, Error> {
        self.value
            .checked_mul(self.unit.nanos())
            .map(Duration::from_nanos)
            .ok_or_else(|| Error::Overflow(format!("{}{:?}", self.value, self.unit)))
    }
}

impl FromStr for DurationUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = DURATION_REGEX
            .captures(s)
            .ok_or_else(|| Error::Syntax(s.to_owned()))?;
        let value = caps["value"]
            .parse::<u64>()
            .map_err(|_| Error::Overflow(s.to_owned()))?;
        let unit = caps["unit"].parse::<TimeUnit>()?;
        Ok(Self { value, unit })
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" | "nanos" | "nanosecond" | "nanoseconds" => Ok(TimeUnit::Nanosecond),
            "us" | "micros" | "microsecond" | "microseconds" => Ok(TimeUnit::Microsecond),
            "ms" | "millis" | "millisecond" | "milliseconds" => Ok(TimeUnit::Millisecond),
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(TimeUnit::Second),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(TimeUnit::Minute),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hour),
            _ => Err(Error::UnitNotSupported(s.to_owned())),
        }
    }
}

/// Parser used by the command line for `--timeout`.
pub fn parse_duration(s: &str) -> Result<Duration, Error> {
    s.parse::<DurationUnit>()?.to_duration()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_building_time_unit_from_string() {
        let cases = vec![
            ("ns", TimeUnit::Nanosecond),
            ("us", TimeUnit::Microsecond),
            ("ms", TimeUnit::Millisecond),
            ("s", TimeUnit::Second),
            ("minutes", TimeUnit::Minute),
            ("h", TimeUnit::Hour),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<TimeUnit>(), Ok(expected), "unit {}", input);
        }
    }

    #[test]
    fn test_conversion_duration_unit_to_duration() {
        assert_eq!(parse_duration("200ms"), Ok(Duration::from_millis(200)));
        assert_eq!(parse_duration(" 30 s "), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    }

    #[test]
    fn test_rejects_malformed_durations() {
        assert_eq!(
            parse_duration("fast"),
            Err(Error::Syntax("fast".to_owned()))
        );
        assert_eq!(
            parse_duration("10d"),
            Err(Error::UnitNotSupported("d".to_owned()))
        );
        assert!(matches!(
            parse_duration("99999999999999h"),
            Err(Error::Overflow(_))
        ));
    }
}
