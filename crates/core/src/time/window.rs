use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOOKBACK_YEARS: u32 = 5;

/// Inclusive calendar-date range of daily bars to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl LookbackWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Resolves the lookback window ending at `end_arg` (YYYY-MM-DD) or, when
/// absent, at the most recent weekday in UTC.
pub fn resolve_window(
    end_arg: Option<&str>,
    now_utc: DateTime<Utc>,
    years: u32,
) -> anyhow::Result<LookbackWindow> {
    anyhow::ensure!(years > 0, "lookback years must be positive");

    let end = match end_arg {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid end date '{s}', expected YYYY-MM-DD"))?,
        None => {
            let mut date = now_utc.date_naive();
            while is_weekend(date) {
                date = date - Duration::days(1);
            }
            date
        }
    };

    // Feb 29 clamps to Feb 28 in non-leap years.
    let start = end
        .checked_sub_months(Months::new(12 * years))
        .with_context(|| format!("lookback of {years} years from {end} is out of range"))?;

    Ok(LookbackWindow { start, end })
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}
