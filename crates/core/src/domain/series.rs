use anyhow::ensure;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily bars for one ticker, chronologically ascending.
///
/// Construction validates the ordering and price invariants once, so the
/// analytics can index closes without re-checking them.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn try_new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> anyhow::Result<Self> {
        let ticker = ticker.into();
        ensure!(!bars.is_empty(), "price series for {ticker} is empty");

        for bar in &bars {
            ensure!(
                bar.close.is_finite() && bar.close > 0.0,
                "close must be positive (ticker={ticker}, date={}, close={})",
                bar.date,
                bar.close
            );
        }

        for pair in bars.windows(2) {
            ensure!(
                pair[0].date < pair[1].date,
                "dates must be strictly increasing (ticker={ticker}, {} then {})",
                pair[0].date,
                pair[1].date
            );
        }

        Ok(Self { ticker, bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Builds a series of consecutive calendar days starting 2024-01-01.
    pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000.0,
            })
            .collect();
        PriceSeries::try_new("TEST", bars).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, close: f64) -> PriceBar {
        PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn rejects_empty_series() {
        assert!(PriceSeries::try_new("AAPL", vec![]).is_err());
    }

    #[test]
    fn rejects_non_increasing_dates() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let bars = vec![bar(d, 10.0), bar(d, 11.0)];
        assert!(PriceSeries::try_new("AAPL", bars).is_err());
    }

    #[test]
    fn rejects_non_positive_close() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let bars = vec![bar(d, 10.0), bar(d.succ_opt().unwrap(), 0.0)];
        assert!(PriceSeries::try_new("AAPL", bars).is_err());
    }

    #[test]
    fn exposes_date_range() {
        let series = test_support::series_from_closes(&[1.0, 2.0, 3.0]);
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.first_date(),
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert_eq!(
            series.last_date(),
            Some(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())
        );
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
    }
}
