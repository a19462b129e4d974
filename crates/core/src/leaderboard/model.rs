use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One manager's row on the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub name: String,
    pub symbol: String,
    pub current_price: Option<Decimal>,
    /// Year-to-date change against the baseline, in percent.
    pub change_percent: Option<Decimal>,
    #[serde(rename = "change1d")]
    pub change_1d: Option<Decimal>,
    #[serde(rename = "change1m")]
    pub change_1m: Option<Decimal>,
    #[serde(rename = "change3m")]
    pub change_3m: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

/// One line of the year-to-date chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesLine {
    pub name: String,
    pub symbol: String,
    /// Percent change from baseline at each timestamp.
    pub data: Vec<Decimal>,
    /// Epoch milliseconds, ascending.
    pub timestamps: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub months: Vec<String>,
    pub data: Vec<SeriesLine>,
}

impl ChartSeries {
    pub fn has_points(&self) -> bool {
        self.data.iter().any(|line| !line.data.is_empty())
    }
}

/// Benchmark index row. Unresolved values stay `null` so the front end can
/// render a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRecord {
    pub symbol: String,
    pub name: String,
    pub current_price: Option<Decimal>,
    pub change_percent: Option<Decimal>,
    #[serde(rename = "change1d")]
    pub change_1d: Option<Decimal>,
}

impl BenchmarkRecord {
    pub fn placeholder(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            current_price: None,
            change_percent: None,
            change_1d: None,
        }
    }

    pub fn has_price(&self) -> bool {
        self.current_price.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerAnalysis {
    pub stock_symbol: String,
    pub analysis: String,
}

/// Result of the scheduled refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RefreshSummary {
    /// Market closed; nothing to do.
    Skipped,
    Refreshed { records: usize },
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_record_wire_names() {
        let record = PerformanceRecord {
            name: "Ada".to_string(),
            symbol: "NVDA".to_string(),
            current_price: Some(dec!(200)),
            change_percent: Some(dec!(7.24)),
            change_1d: None,
            change_1m: None,
            change_3m: None,
            analysis: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["currentPrice"], json!(200.0));
        assert_eq!(value["changePercent"], json!(7.24));
        assert!(value["change1d"].is_null());
        assert!(value.get("analysis").is_none());
    }

    #[test]
    fn test_refresh_summary_is_tagged() {
        let value = serde_json::to_value(RefreshSummary::Refreshed { records: 3 }).unwrap();
        assert_eq!(value, json!({"status": "refreshed", "records": 3}));
        let value = serde_json::to_value(RefreshSummary::Skipped).unwrap();
        assert_eq!(value, json!({"status": "skipped"}));
    }
}
