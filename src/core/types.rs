//! Wire types shared by the rates API, the cache and the views

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// A single currency's USD rate summarised across upstream sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRate {
    pub currency: String,
    pub average_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub last_updated: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// One observation in a trend series.
///
/// On the wire each point is an object with exactly one `date: rate` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct TrendPoint {
    pub date: String,
    pub rate: f64,
}

impl TryFrom<BTreeMap<String, f64>> for TrendPoint {
    type Error = String;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!(
                "trend point must have exactly one entry, found {}",
                map.len()
            ));
        }
        let (date, rate) = map
            .into_iter()
            .next()
            .ok_or_else(|| "empty trend point".to_string())?;
        Ok(TrendPoint { date, rate })
    }
}

impl From<TrendPoint> for BTreeMap<String, f64> {
    fn from(point: TrendPoint) -> Self {
        BTreeMap::from([(point.date, point.rate)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendData {
    pub currency: String,
    pub timeframe: String,
    #[serde(default)]
    pub data_points: Vec<TrendPoint>,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
        }
    }

    /// Tab caption, e.g. "Daily".
    pub fn title(&self) -> &'static str {
        match self {
            Timeframe::Daily => "Daily",
            Timeframe::Weekly => "Weekly",
            Timeframe::Monthly => "Monthly",
        }
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Timeframe::Daily),
            "weekly" => Ok(Timeframe::Weekly),
            "monthly" => Ok(Timeframe::Monthly),
            _ => Err(anyhow!("Invalid timeframe: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregated_rate_deserialization() {
        let json = r#"[
            {
                "currency": "EUR",
                "average_rate": 0.85,
                "min_rate": 0.84,
                "max_rate": 0.86,
                "last_updated": "2025-06-18T10:00:00+00:00",
                "sources": ["currency-api.pages.dev", "cdn.jsdelivr.net"]
            }
        ]"#;

        let rates: Vec<AggregatedRate> = serde_json::from_str(json).unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].currency, "EUR");
        assert_eq!(rates[0].average_rate, 0.85);
        assert_eq!(rates[0].sources.len(), 2);
    }

    #[test]
    fn test_trend_data_keeps_point_order() {
        let json = r#"{
            "currency": "EUR",
            "timeframe": "daily",
            "data_points": [
                {"2025-06-18T00:00:00+00:00": 0.86},
                {"2025-06-16T00:00:00+00:00": 0.84},
                {"2025-06-17T00:00:00+00:00": 0.85}
            ],
            "start_date": "2025-06-16T00:00:00+00:00",
            "end_date": "2025-06-18T00:00:00+00:00"
        }"#;

        let trend: TrendData = serde_json::from_str(json).unwrap();
        let dates: Vec<&str> = trend.data_points.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(
            dates,
            vec![
                "2025-06-18T00:00:00+00:00",
                "2025-06-16T00:00:00+00:00",
                "2025-06-17T00:00:00+00:00"
            ]
        );
        assert_eq!(trend.data_points[1].rate, 0.84);
    }

    #[test]
    fn test_trend_point_rejects_multiple_entries() {
        let json = r#"{"2025-06-17": 0.85, "2025-06-18": 0.86}"#;
        let result: Result<TrendPoint, _> = serde_json::from_str(json);
        assert!(result.is_err());

        let result: Result<TrendPoint, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn test_trend_point_serializes_as_single_entry_object() {
        let point = TrendPoint {
            date: "2025-06-18".to_string(),
            rate: 0.5,
        };
        assert_eq!(
            serde_json::to_string(&point).unwrap(),
            r#"{"2025-06-18":0.5}"#
        );
    }

    #[test]
    fn test_timeframe_parsing() {
        assert_eq!("daily".parse::<Timeframe>().unwrap(), Timeframe::Daily);
        assert_eq!("Weekly".parse::<Timeframe>().unwrap(), Timeframe::Weekly);
        assert_eq!("MONTHLY".parse::<Timeframe>().unwrap(), Timeframe::Monthly);
        assert!("yearly".parse::<Timeframe>().is_err());
        assert_eq!(Timeframe::Weekly.to_string(), "weekly");
    }
}
