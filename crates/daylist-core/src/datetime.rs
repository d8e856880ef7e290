use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const TIMEZONE_ENV_VAR: &str =
  "DAYLIST_TIMEZONE";

pub const CALENDAR_DATE_FORMAT: &str =
  "%Y-%m-%d";

/// Picks the timezone used to decide
/// which calendar day "today" is.
///
/// Order: the `timezone` config value,
/// then `$DAYLIST_TIMEZONE`, then UTC.
/// Unparseable values are logged and
/// skipped.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn local_date(
  now: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  now.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date
    .format(CALENDAR_DATE_FORMAT)
    .to_string()
}

/// Years outside 0000..=9999 format
/// with a sign and five digits.
#[must_use]
pub fn has_calendar_form(
  date: NaiveDate
) -> bool {
  (0..=9999).contains(&date.year())
}

/// Strict `YYYY-MM-DD`.
pub fn parse_calendar_date(
  raw: &str
) -> Option<NaiveDate> {
  let trimmed = raw.trim();
  if trimmed.len() != 10 {
    return None;
  }
  NaiveDate::parse_from_str(
    trimmed,
    CALENDAR_DATE_FORMAT
  )
  .ok()
}

#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_schedule_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift_days(today, 1);
    }
    | "yesterday" => {
      return shift_days(today, -1);
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  if let Some(days) =
    parse_offset_days(&lower)?
  {
    return shift_days(today, days);
  }

  if let Some(date) =
    parse_calendar_date(token)
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unsupported date expression \
     '{token}'; expected today, \
     tomorrow, yesterday, a weekday \
     name (e.g. monday), +Nd/-Nd, \
     +Nw/-Nw or YYYY-MM-DD"
  ))
}

fn shift_days(
  from: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  from
    .checked_add_signed(Duration::days(
      days
    ))
    .filter(|date| {
      has_calendar_form(*date)
    })
    .ok_or_else(|| {
      anyhow!(
        "date offset of {days} days \
         is out of range"
      )
    })
}

fn parse_offset_days(
  token: &str
) -> anyhow::Result<Option<i64>> {
  let offset_re = Regex::new(
    r"^(?P<sign>[+-])?(?P<count>\d{1,5})(?P<unit>[dw])$"
  )?;
  let Some(captures) =
    offset_re.captures(token)
  else {
    return Ok(None);
  };

  let count: i64 = captures
    .name("count")
    .map(|m| m.as_str())
    .unwrap_or_default()
    .parse()?;
  let unit = match captures
    .name("unit")
    .map(|m| m.as_str())
  {
    | Some("w") => 7,
    | _ => 1
  };
  let sign = match captures
    .name("sign")
    .map(|m| m.as_str())
  {
    | Some("-") => -1,
    | _ => 1
  };

  Ok(Some(sign * count * unit))
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    has_calendar_form,
    local_date,
    parse_calendar_date,
    parse_schedule_expr
  };

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_keywords() {
    let today = date(2026, 2, 17);
    assert_eq!(
      parse_schedule_expr(
        "Today", today
      )
      .expect("today"),
      today
    );
    assert_eq!(
      parse_schedule_expr(
        "tomorrow", today
      )
      .expect("tomorrow"),
      date(2026, 2, 18)
    );
    assert_eq!(
      parse_schedule_expr(
        "yesterday", today
      )
      .expect("yesterday"),
      date(2026, 2, 16)
    );
  }

  #[test]
  fn parses_weekday_name() {
    // 2026-02-17 is a Tuesday.
    let today = date(2026, 2, 17);
    assert_eq!(
      parse_schedule_expr(
        "wednesday",
        today
      )
      .expect("parse weekday"),
      date(2026, 2, 18)
    );
    assert_eq!(
      parse_schedule_expr("tue", today)
        .expect("same weekday"),
      date(2026, 2, 24)
    );
  }

  #[test]
  fn offsets_stay_within_four_digit_years()
  {
    let last = date(9999, 12, 30);
    assert_eq!(
      parse_schedule_expr("+1d", last)
        .expect("last day"),
      date(9999, 12, 31)
    );
    assert!(
      parse_schedule_expr("+2d", last)
        .is_err()
    );
    assert!(
      parse_schedule_expr(
        "-1d",
        date(0, 1, 1)
      )
      .is_err()
    );
    assert!(!has_calendar_form(date(
      10000, 1, 1
    )));
  }

  #[test]
  fn parses_offsets() {
    let today = date(2026, 2, 27);
    assert_eq!(
      parse_schedule_expr("+3d", today)
        .expect("plus days"),
      date(2026, 3, 2)
    );
    assert_eq!(
      parse_schedule_expr("-1W", today)
        .expect("minus week"),
      date(2026, 2, 20)
    );
    assert_eq!(
      parse_schedule_expr("2d", today)
        .expect("unsigned days"),
      date(2026, 3, 1)
    );
  }

  #[test]
  fn parses_canonical_date_and_rejects_garbage()
  {
    let today = date(2026, 2, 17);
    assert_eq!(
      parse_schedule_expr(
        "2026-12-31",
        today
      )
      .expect("canonical"),
      date(2026, 12, 31)
    );
    assert!(
      parse_schedule_expr(
        "someday", today
      )
      .is_err()
    );
    assert!(
      parse_calendar_date("2026-2-1")
        .is_none()
    );
    assert!(
      parse_calendar_date("2026-02-30")
        .is_none()
    );
  }

  #[test]
  fn local_date_follows_timezone() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 3, 0, 0
      )
      .single()
      .expect("valid now");
    let tz: chrono_tz::Tz =
      "America/Mexico_City"
        .parse()
        .expect("valid tz");
    assert_eq!(
      local_date(now, &tz),
      date(2026, 2, 16)
    );
    assert_eq!(
      local_date(now, &chrono_tz::UTC),
      date(2026, 2, 17)
    );
  }
}

/// Millisecond-precision UTC timestamps
/// (`2026-02-17T09:30:00.000Z`); any
/// RFC 3339 timestamp is accepted on
/// read.
pub mod iso_timestamp_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub const FORMAT: &str =
    "%Y-%m-%dT%H:%M:%S%.3fZ";

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.format(FORMAT).to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    parse(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub fn parse(
    raw: &str
  ) -> Result<DateTime<Utc>, chrono::ParseError>
  {
    DateTime::parse_from_rfc3339(
      raw.trim()
    )
    .map(|dt| dt.with_timezone(&Utc))
  }
}
