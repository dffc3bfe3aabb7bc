//! Industry insight record types
//!
//! `InsightPayload` is both the shape the generator is asked to return and
//! the set of columns replaced on every refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounds applied to the generated growth rate (percent)
const GROWTH_RATE_MIN: f64 = -100.0;
const GROWTH_RATE_MAX: f64 = 1000.0;

/// Demand level for an industry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandLevel {
    High,
    Medium,
    Low,
}

impl DemandLevel {
    /// Database representation
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DemandLevel::High => "HIGH",
            DemandLevel::Medium => "MEDIUM",
            DemandLevel::Low => "LOW",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" => Some(DemandLevel::High),
            "MEDIUM" => Some(DemandLevel::Medium),
            "LOW" => Some(DemandLevel::Low),
            _ => None,
        }
    }
}

/// Market outlook for an industry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketOutlook {
    Positive,
    Neutral,
    Negative,
}

impl MarketOutlook {
    /// Database representation
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MarketOutlook::Positive => "POSITIVE",
            MarketOutlook::Neutral => "NEUTRAL",
            MarketOutlook::Negative => "NEGATIVE",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "POSITIVE" => Some(MarketOutlook::Positive),
            "NEUTRAL" => Some(MarketOutlook::Neutral),
            "NEGATIVE" => Some(MarketOutlook::Negative),
            _ => None,
        }
    }
}

/// Salary band for one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub role: String,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub location: String,
}

/// Generated insight content, replaced wholesale on every refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightPayload {
    pub salary_ranges: Vec<SalaryRange>,
    /// Percentage
    pub growth_rate: f64,
    pub demand_level: DemandLevel,
    pub top_skills: Vec<String>,
    pub market_outlook: MarketOutlook,
    pub key_trends: Vec<String>,
    pub recommended_skills: Vec<String>,
}

impl InsightPayload {
    /// Check field presence and numeric ranges.
    ///
    /// Enum membership is already enforced by deserialization. Returns the
    /// first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.salary_ranges.is_empty() {
            return Err("salaryRanges must not be empty".to_string());
        }

        for range in &self.salary_ranges {
            if range.role.trim().is_empty() {
                return Err("salaryRanges entry has an empty role".to_string());
            }
            if range.location.trim().is_empty() {
                return Err(format!("salary range for {} has an empty location", range.role));
            }
            if ![range.min, range.median, range.max]
                .iter()
                .all(|v| v.is_finite())
            {
                return Err(format!("salary range for {} is not finite", range.role));
            }
            if range.min < 0.0 || range.min > range.median || range.median > range.max {
                return Err(format!(
                    "salary range for {} must satisfy 0 <= min <= median <= max (got {}/{}/{})",
                    range.role, range.min, range.median, range.max
                ));
            }
        }

        if !self.growth_rate.is_finite()
            || !(GROWTH_RATE_MIN..=GROWTH_RATE_MAX).contains(&self.growth_rate)
        {
            return Err(format!(
                "growthRate {} outside [{}, {}]",
                self.growth_rate, GROWTH_RATE_MIN, GROWTH_RATE_MAX
            ));
        }

        check_list("topSkills", &self.top_skills)?;
        check_list("keyTrends", &self.key_trends)?;
        check_list("recommendedSkills", &self.recommended_skills)?;

        Ok(())
    }
}

fn check_list(field: &str, values: &[String]) -> Result<(), String> {
    if values.is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(format!("{} contains an empty entry", field));
    }
    Ok(())
}

/// Full insight row
#[derive(Debug, Clone, PartialEq)]
pub struct InsightRecord {
    /// Industry name, primary key
    pub key: String,
    pub payload: InsightPayload,
    pub last_refreshed_at: DateTime<Utc>,
    pub next_refresh_due: DateTime<Utc>,
}

/// Row shape returned by the staleness query
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DueInsight {
    #[sqlx(rename = "industry")]
    pub key: String,
    #[sqlx(rename = "last_updated")]
    pub last_refreshed_at: DateTime<Utc>,
    #[sqlx(rename = "next_update")]
    pub next_refresh_due: DateTime<Utc>,
}

impl From<&InsightRecord> for DueInsight {
    fn from(record: &InsightRecord) -> Self {
        Self {
            key: record.key.clone(),
            last_refreshed_at: record.last_refreshed_at,
            next_refresh_due: record.next_refresh_due,
        }
    }
}
