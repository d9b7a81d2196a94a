use std::ops::Deref;

use serde::Deserialize;

/// A duration written in a human friendly format like `"90s"`, `"1m"` or
/// `"1h 30m"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration(pub std::time::Duration);

impl From<Duration> for std::time::Duration {
    fn from(value: Duration) -> Self {
        value.0
    }
}

impl Deref for Duration {
    type Target = std::time::Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::str::FromStr for Duration {
    type Err = InvalidDuration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_whitespace()
            .try_fold(std::time::Duration::ZERO, |acc, part| {
                let split = part
                    .find(|c: char| !c.is_ascii_digit())
                    .ok_or(InvalidDuration)?;
                let (value, unit) = part.split_at(split);
                let value = value.parse::<u64>().map_err(|_| InvalidDuration)?;
                let seconds_per_unit = match unit {
                    "ms" => {
                        return acc
                            .checked_add(std::time::Duration::from_millis(value))
                            .ok_or(InvalidDuration)
                    }
                    "s" => 1,
                    "m" => 60,
                    "h" => 60 * 60,
                    "d" => 24 * 60 * 60,
                    _ => return Err(InvalidDuration),
                };
                let seconds = value.checked_mul(seconds_per_unit).ok_or(InvalidDuration)?;
                acc.checked_add(std::time::Duration::from_secs(seconds))
                    .ok_or(InvalidDuration)
            })
            .map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDuration;

impl std::fmt::Display for InvalidDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Invalid duration")
    }
}

impl std::error::Error for InvalidDuration {}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}
