//! Cron schedule for the refresh trigger

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{InsightError, Result};

/// Parsed trigger schedule, evaluated in UTC
#[derive(Clone)]
pub struct RefreshSchedule {
    expression: String,
    schedule: Schedule,
}

impl fmt::Debug for RefreshSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshSchedule")
            .field("expression", &self.expression)
            .finish()
    }
}

/// Widen a 5-field Unix expression to the 7-field form of the `cron` crate
/// (seconds first, year last). 6 and 7 field expressions pass through.
///
/// Unix numbers weekdays 0-7 from Sunday (0 and 7 both Sunday) while the
/// `cron` crate uses 1-7 from Sunday, so numeric weekdays are renumbered.
fn to_cron_crate_format(expression: &str) -> std::result::Result<String, String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Ok(expression.trim().to_string());
    }

    let day_of_week = unix_day_of_week(fields[4])?;
    Ok(format!(
        "0 {} {} {} {} {} *",
        fields[0], fields[1], fields[2], fields[3], day_of_week
    ))
}

/// Renumber a Unix day-of-week field for the `cron` crate.
///
/// Named days pass through unchanged; numeric items (single days, ranges,
/// steps) are expanded into an explicit list.
fn unix_day_of_week(field: &str) -> std::result::Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = BTreeSet::new();
    let mut named = Vec::new();

    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) {
            named.push(item.to_string());
            continue;
        }

        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid weekday step '{}'", step))?;
                if step == 0 {
                    return Err("weekday step must be greater than 0".to_string());
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = match range {
            "*" => (0, 6),
            _ => match range.split_once('-') {
                Some((start, end)) => (parse_unix_weekday(start)?, parse_unix_weekday(end)?),
                None => {
                    let day = parse_unix_weekday(range)?;
                    (day, if step.is_some() { 6 } else { day })
                }
            },
        };
        if start > end {
            return Err(format!("invalid weekday range '{}'", range));
        }

        for day in (start..=end).step_by(step.unwrap_or(1) as usize) {
            days.insert(day % 7 + 1);
        }
    }

    let mut items: Vec<String> = days.into_iter().map(|d| d.to_string()).collect();
    items.extend(named);
    Ok(items.join(","))
}

fn parse_unix_weekday(value: &str) -> std::result::Result<u32, String> {
    match value.parse::<u32>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(format!("invalid weekday '{}', expected 0-7", value)),
    }
}

impl RefreshSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let widened = to_cron_crate_format(expression)
            .map_err(|e| InsightError::Schedule(format!("{}: {}", expression, e)))?;
        let schedule = Schedule::from_str(&widened)
            .map_err(|e| InsightError::Schedule(format!("{}: {}", expression, e)))?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}
