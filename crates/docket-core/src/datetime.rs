use std::fmt::Write as _;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::format::{
  Item,
  StrftimeItems
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  Local,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

const TIMEZONE_ENV_VAR: &str =
  "DOCKET_TIMEZONE";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

fn relative_date_regex()
-> anyhow::Result<&'static Regex> {
  static RELATIVE: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  RELATIVE
    .get_or_init(|| {
      Regex::new(
        r"^\+?(?P<num>\d{1,4})(?P<unit>[dw])$"
      )
    })
    .as_ref()
    .map_err(|e| {
      anyhow!(
        "internal regex compile \
         failure: {e}"
      )
    })
}

/// Zone used to turn instants into
/// calendar dates for display and for
/// relative due-date parsing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayZone {
  Local,
  Named(Tz)
}

impl DisplayZone {
  #[must_use]
  pub fn date_of(
    &self,
    dt: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | DisplayZone::Local => dt
        .with_timezone(&Local)
        .date_naive(),
      | DisplayZone::Named(tz) => {
        dt.with_timezone(tz).date_naive()
      }
    }
  }
}

/// Picks the configured zone, then the
/// environment, then the machine's
/// local zone.
#[tracing::instrument]
pub fn resolve_display_zone(
  configured: Option<&str>
) -> DisplayZone {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "timezone")
  {
    return DisplayZone::Named(tz);
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return DisplayZone::Named(tz);
  }

  DisplayZone::Local
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => Some(tz),
    | Err(err) => {
      tracing::warn!(
        source,
        value = trimmed,
        error = %err,
        "ignoring invalid timezone"
      );
      None
    }
  }
}

/// Parses a due date typed by the
/// user relative to `today`.
pub fn parse_due_expr(
  raw: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let input =
    raw.trim().to_ascii_lowercase();
  if input.is_empty() {
    return Err(anyhow!(
      "due date cannot be empty"
    ));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      &input, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  match input.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return add_days(today, 1);
    }
    | _ => {}
  }

  let relative_re = relative_date_regex()?;

  if let Some(caps) =
    relative_re.captures(&input)
  {
    let amount: u64 = caps["num"]
      .parse()
      .map_err(|_| {
        anyhow!(
          "invalid relative date: \
           {raw}"
        )
      })?;
    let days = match &caps["unit"] {
      | "w" => amount * 7,
      | _ => amount
    };
    return add_days(today, days);
  }

  if let Some(weekday) =
    parse_weekday_name(&input)
  {
    return next_weekday_date(
      today, weekday
    );
  }

  Err(anyhow!(
    "unrecognized due date: {raw}"
  ))
}

fn add_days(
  date: NaiveDate,
  days: u64
) -> anyhow::Result<NaiveDate> {
  date
    .checked_add_days(Days::new(days))
    .ok_or_else(|| {
      anyhow!("due date out of range")
    })
}

const WEEKDAY_NAMES: [(
  Weekday,
  &[&str]
); 7] = [
  (Weekday::Mon, &["monday", "mon"]),
  (
    Weekday::Tue,
    &["tuesday", "tue", "tues"]
  ),
  (
    Weekday::Wed,
    &["wednesday", "wed"]
  ),
  (
    Weekday::Thu,
    &[
      "thursday", "thu", "thur",
      "thurs"
    ]
  ),
  (Weekday::Fri, &["friday", "fri"]),
  (
    Weekday::Sat,
    &["saturday", "sat"]
  ),
  (Weekday::Sun, &["sunday", "sun"])
];

fn parse_weekday_name(
  input: &str
) -> Option<Weekday> {
  WEEKDAY_NAMES
    .iter()
    .find(|(_, names)| {
      names.contains(&input)
    })
    .map(|(day, _)| *day)
}

/// Next occurrence strictly after
/// `today`.
fn next_weekday_date(
  today: NaiveDate,
  target: Weekday
) -> anyhow::Result<NaiveDate> {
  let gap = (target.num_days_from_monday()
    + 7
    - today
      .weekday()
      .num_days_from_monday())
    % 7;
  let ahead = if gap == 0 { 7 } else { gap };
  add_days(today, u64::from(ahead))
}

/// False when `pattern` holds a
/// specifier chrono cannot render.
#[must_use]
pub fn is_valid_date_format(
  pattern: &str
) -> bool {
  !StrftimeItems::new(pattern)
    .any(|item| item == Item::Error)
}

/// Renders `date` with `pattern`,
/// falling back to `YYYY-MM-DD` when
/// the pattern cannot be rendered.
#[must_use]
pub fn format_date(
  date: NaiveDate,
  pattern: &str
) -> String {
  let mut out = String::new();
  if write!(out, "{}", date.format(pattern))
    .is_err()
  {
    tracing::warn!(
      pattern,
      "unrenderable date format; \
       using ISO"
    );
    return date
      .format(ISO_DATE_FORMAT)
      .to_string();
  }
  out
}

/// Truncates to the precision the
/// persisted form keeps.
#[must_use]
pub fn to_millis_precision(
  dt: DateTime<Utc>
) -> DateTime<Utc> {
  DateTime::from_timestamp_millis(
    dt.timestamp_millis()
  )
  .unwrap_or(dt)
}

/// Due dates are written as
/// `YYYY-MM-DD`; full ISO timestamps
/// are accepted on read and reduced to
/// their UTC calendar date.
pub mod due_date_serde {
  use chrono::{
    DateTime,
    NaiveDate
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    date: &Option<NaiveDate>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match date {
      | Some(value) => serializer
        .serialize_str(
          &value
            .format(super::ISO_DATE_FORMAT)
            .to_string()
        ),
      | None => serializer.serialize_none()
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<Option<NaiveDate>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = Option::<String>::deserialize(
      deserializer
    )?;
    let Some(raw) = raw else {
      return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return Ok(None);
    }

    if let Ok(date) =
      NaiveDate::parse_from_str(
        trimmed, "%Y-%m-%d"
      )
    {
      return Ok(Some(date));
    }

    DateTime::parse_from_rfc3339(trimmed)
      .map(|dt| {
        Some(dt.naive_utc().date())
      })
      .map_err(serde::de::Error::custom)
  }
}

pub mod created_at_serde {
  use chrono::{
    DateTime,
    SecondsFormat,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.to_rfc3339_opts(
        SecondsFormat::Millis,
        true
      )
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw =
      String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(
      raw.trim()
    )
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    format_date,
    is_valid_date_format,
    parse_due_expr
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_date() {
    let today = day(2026, 10, 19);
    assert_eq!(
      parse_due_expr(
        "2026-12-01",
        today
      )
      .expect("parse iso"),
      day(2026, 12, 1)
    );
  }

  #[test]
  fn parses_relative_days_and_weeks()
  {
    let today = day(2026, 10, 19);
    assert_eq!(
      parse_due_expr("tomorrow", today)
        .expect("tomorrow"),
      day(2026, 10, 20)
    );
    assert_eq!(
      parse_due_expr("+3d", today)
        .expect("+3d"),
      day(2026, 10, 22)
    );
    assert_eq!(
      parse_due_expr("2w", today)
        .expect("2w"),
      day(2026, 11, 2)
    );
  }

  #[test]
  fn weekday_name_is_strictly_ahead() {
    // 2026-10-19 is a Monday.
    let today = day(2026, 10, 19);
    assert_eq!(
      parse_due_expr("monday", today)
        .expect("monday"),
      day(2026, 10, 26)
    );
    assert_eq!(
      parse_due_expr("wed", today)
        .expect("wed"),
      day(2026, 10, 21)
    );
  }

  #[test]
  fn rejects_garbage() {
    let today = day(2026, 10, 19);
    assert!(
      parse_due_expr("soonish", today)
        .is_err()
    );
    assert!(
      parse_due_expr("   ", today)
        .is_err()
    );
  }

  #[test]
  fn bad_date_format_falls_back_to_iso()
  {
    let date = day(2026, 11, 2);
    assert!(!is_valid_date_format("%Q"));
    assert!(is_valid_date_format(
      "%d.%m.%Y"
    ));
    assert_eq!(
      format_date(date, "%Q"),
      "2026-11-02"
    );
    assert_eq!(
      format_date(date, "%d.%m.%Y"),
      "02.11.2026"
    );
  }
}
