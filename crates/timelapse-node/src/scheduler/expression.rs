//! Five-field cron expressions on top of the `cron` crate.
//!
//! The `cron` crate wants a leading seconds field and numbers days of the
//! week 1-7 starting on Sunday. Standard expressions use five fields with
//! Sunday as 0 (or 7), so they are rewritten before parsing.
//!
//! When both day of month and day of week are restricted, standard cron fires
//! on days matching either field, while the `cron` crate requires both. Such
//! expressions are split into two schedules and the earlier tick wins.

use chrono::{DateTime, TimeZone};
use cron::Schedule;
use std::iter;
use std::str::FromStr;

use crate::error::ScheduleError;

fn invalid(expression: &str, reason: impl Into<String>) -> ScheduleError {
  ScheduleError::Expression {
    expression: expression.to_string(),
    reason: reason.into(),
  }
}

fn map_weekday(expression: &str, value: &str) -> Result<u32, ScheduleError> {
  match value.parse::<u32>() {
    Ok(day @ 0..=7) => Ok(day % 7 + 1),
    Ok(day) => Err(invalid(expression, format!("day of week {} out of range", day))),
    Err(_) => Err(invalid(expression, format!("invalid day of week '{}'", value))),
  }
}

/// Rewrite one day-of-week list item. Names (`MON-FRI`) and `*` pass through.
fn map_weekday_item(expression: &str, item: &str) -> Result<String, ScheduleError> {
  let (base, step) = match item.split_once('/') {
    Some((base, step)) => (base, Some(step)),
    None => (item, None),
  };

  if base == "*" || !base.starts_with(|c: char| c.is_ascii_digit()) {
    return Ok(item.to_string());
  }

  let mapped = match base.split_once('-') {
    None => map_weekday(expression, base)?.to_string(),
    // A range ending on 7 runs through Saturday and wraps to Sunday.
    Some((start, "7")) => match map_weekday(expression, start)? {
      1 => "1-7".to_string(),
      start if step.is_none() => format!("{}-7,1", start),
      _ => return Err(invalid(expression, format!("unsupported day of week range '{}'", item))),
    },
    Some((start, end)) => {
      let (start, end) = (map_weekday(expression, start)?, map_weekday(expression, end)?);
      if end < start {
        return Err(invalid(expression, format!("day of week range '{}' is reversed", item)));
      }
      format!("{}-{}", start, end)
    }
  };

  Ok(match step {
    Some(step) => format!("{}/{}", mapped, step),
    None => mapped,
  })
}

/// Convert an expression into the form the `cron` crate parses.
///
/// Five-field expressions get a zero seconds field and standard weekday
/// numbering. Six and seven field expressions and `@` shorthands are passed
/// through unchanged.
pub fn normalize_expression(expression: &str) -> Result<String, ScheduleError> {
  let trimmed = expression.trim();
  if trimmed.starts_with('@') {
    return Ok(trimmed.to_string());
  }

  let fields: Vec<&str> = trimmed.split_whitespace().collect();
  match fields.len() {
    5 => {
      let weekdays = fields[4]
        .split(',')
        .map(|item| map_weekday_item(expression, item))
        .collect::<Result<Vec<_>, _>>()?
        .join(",");
      Ok(format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], weekdays
      ))
    }
    6 | 7 => Ok(fields.join(" ")),
    n => Err(invalid(expression, format!("expected 5 fields, found {}", n))),
  }
}

/// A parsed expression: one `cron` schedule, or two when day of month and day
/// of week are both restricted.
#[derive(Debug, Clone)]
pub struct CronSchedule {
  primary: Schedule,
  alternate: Option<Schedule>,
}

impl CronSchedule {
  /// First tick strictly after `after`.
  pub fn next_after<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Z>> {
    let primary = self.primary.after(after).next();
    let alternate = self.alternate.as_ref().and_then(|s| s.after(after).next());
    match (primary, alternate) {
      (Some(a), Some(b)) => Some(if b < a { b } else { a }),
      (a, b) => a.or(b),
    }
  }

  /// Upcoming ticks after `after`, in order.
  pub fn after<'a, Z: TimeZone + 'a>(
    &'a self,
    after: &DateTime<Z>,
  ) -> impl Iterator<Item = DateTime<Z>> + 'a {
    iter::successors(self.next_after(after), move |tick| self.next_after(tick))
  }

  pub fn is_split(&self) -> bool {
    self.alternate.is_some()
  }
}

fn restricts(field: &str) -> bool {
  !(field.starts_with('*') || field == "?")
}

pub fn parse_schedule(expression: &str) -> Result<CronSchedule, ScheduleError> {
  let normalized = normalize_expression(expression)?;
  let parse = |text: &str| Schedule::from_str(text).map_err(|e| invalid(expression, e.to_string()));

  let fields: Vec<&str> = normalized.split_whitespace().collect();
  if fields.len() < 6 || !(restricts(fields[3]) && restricts(fields[5])) {
    return Ok(CronSchedule {
      primary: parse(&normalized)?,
      alternate: None,
    });
  }

  let mut by_month_day = fields.clone();
  by_month_day[5] = "*";
  let mut by_weekday = fields;
  by_weekday[3] = "*";

  Ok(CronSchedule {
    primary: parse(&by_month_day.join(" "))?,
    alternate: Some(parse(&by_weekday.join(" "))?),
  })
}
