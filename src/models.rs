use chrono::TimeZone;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::{deserialize_number_from_string, deserialize_string_from_number};

use crate::get_timezone;

/// Account details returned from the account JSON endpoint. Only used
/// fields are stored. Immutable once fetched; replaced wholesale on
/// re-authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "evpSlid", deserialize_with = "deserialize_string_from_number")]
    pub slid: String,
    #[serde(rename = "evpAccount", deserialize_with = "deserialize_string_from_number")]
    pub account: String,
    #[serde(rename = "evpAccountId", deserialize_with = "deserialize_string_from_number")]
    pub account_id: String,
    #[serde(rename = "evpProfileId", deserialize_with = "deserialize_string_from_number")]
    pub profile_id: String,
    #[serde(rename = "evpRateGroup")]
    pub rate_group: String,
    #[serde(rename = "evpBillingStart")]
    pub billing_start: String,
    #[serde(rename = "evpBillingEnd")]
    pub billing_end: String,
    #[serde(rename = "evpConsToDate", deserialize_with = "deserialize_number_from_string")]
    pub consumption_to_date: f64,
    #[serde(rename = "evpCostToDate", deserialize_with = "deserialize_number_from_string")]
    pub cost_to_date: f64,
    #[serde(rename = "yesterdayPercentage", deserialize_with = "deserialize_number_from_string")]
    pub yesterday_percentage: f64,
    #[serde(rename = "evpEstConsCurPeriod", deserialize_with = "deserialize_number_from_string")]
    pub estimated_consumption: f64,
    #[serde(rename = "evpEstCostCurPeriod", deserialize_with = "deserialize_number_from_string")]
    pub estimated_cost: f64,
    #[serde(rename = "evpCurrentDateTime")]
    pub current_date_time: String,
}

impl Account {
    pub fn get_billing_start_utc(&self) -> Option<DateTime<Utc>> {
        parse_portal_timestamp(&self.billing_start)
    }

    pub fn get_billing_end_utc(&self) -> Option<DateTime<Utc>> {
        parse_portal_timestamp(&self.billing_end)
    }
}

/// One reading window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: String,
    pub end: String,
}

impl Interval {
    pub fn get_start_utc(&self) -> Option<DateTime<Utc>> {
        parse_portal_timestamp(&self.start)
    }

    pub fn get_end_utc(&self) -> Option<DateTime<Utc>> {
        parse_portal_timestamp(&self.end)
    }
}

/// One consumption reading. Values are carried exactly as the portal
/// provides them; numeric coercion is a caller concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricityPoint {
    pub point_type: String,
    pub quality: String,
    pub consumption: String,
    pub cost: String,
    pub interval: Interval,
}

impl ElectricityPoint {
    pub fn is_actual(&self) -> bool {
        self.quality == "ACTUAL"
    }
}

/// Aggregate billing-period figures from the consumption response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub days_since_billing: String,
    pub consumption_to_date: String,
    pub cost_to_date: String,
    pub estimated_consumption: String,
    pub estimated_cost: String,
}

/// One successful refresh: the ACTUAL-quality points in document order plus
/// the rates and the account snapshot they were fetched against. Replaced
/// wholesale, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    pub electricity: Vec<ElectricityPoint>,
    pub rates: Rates,
    pub account: Account,
}

impl DailyUsage {
    /// The last ACTUAL-quality point in document order, or `None` if the
    /// usage list holds no ACTUAL points.
    pub fn latest_point(&self) -> Option<&ElectricityPoint> {
        self.electricity.iter().filter(|point| point.is_actual()).last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Hourly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Hourly => "hourly",
        }
    }
}

/// Strips the trailing UTC offset (eg. `-07:00`) that the portal appends to
/// billing timestamps, leaving a naive local timestamp.
pub fn strip_utc_offset(timestamp: &str) -> &str {
    let bytes = timestamp.as_bytes();
    if bytes.len() > 6 {
        let tail = &bytes[bytes.len() - 6..];
        // All-ASCII suffix, so the cut lands on a char boundary.
        if (tail[0] == b'-' || tail[0] == b'+')
            && tail[1].is_ascii_digit()
            && tail[2].is_ascii_digit()
            && tail[3] == b':'
            && tail[4].is_ascii_digit()
            && tail[5].is_ascii_digit()
        {
            return &timestamp[..timestamp.len() - 6];
        }
    }
    timestamp
}

// Portal timestamps are either naive local time (consumption XML) or local
// time with an explicit offset (account JSON).
fn parse_portal_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }

    let naive_time =
        NaiveDateTime::parse_from_str(strip_utc_offset(value), "%Y-%m-%dT%H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(
        &get_timezone()
            .from_local_datetime(&naive_time)
            .single()?
            .naive_utc(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actual_point(consumption: &str) -> ElectricityPoint {
        ElectricityPoint {
            point_type: "USAGE".to_string(),
            quality: "ACTUAL".to_string(),
            consumption: consumption.to_string(),
            cost: "1.00".to_string(),
            interval: Interval {
                start: "2024-09-01T00:00:00".to_string(),
                end: "2024-09-02T00:00:00".to_string(),
            },
        }
    }

    fn test_usage(electricity: Vec<ElectricityPoint>) -> DailyUsage {
        DailyUsage {
            electricity,
            rates: Rates {
                days_since_billing: "12".to_string(),
                consumption_to_date: "345".to_string(),
                cost_to_date: "45.67".to_string(),
                estimated_consumption: "800".to_string(),
                estimated_cost: "95.00".to_string(),
            },
            account: test_account(),
        }
    }

    fn test_account() -> Account {
        serde_json::from_str(ACCOUNT_JSON).unwrap()
    }

    const ACCOUNT_JSON: &str = r#"
    {
        "evpSlid": 1234567,
        "evpAccount": "000012345678",
        "evpAccountId": "12345678",
        "evpProfileId": 987654,
        "evpRateGroup": "RES1",
        "evpBillingStart": "2024-08-21T00:00:00-07:00",
        "evpBillingEnd": "2024-10-21T00:00:00-07:00",
        "evpConsToDate": "351",
        "evpCostToDate": 42.18,
        "yesterdayPercentage": "3.2",
        "evpEstConsCurPeriod": 702,
        "evpEstCostCurPeriod": "84.50",
        "evpCurrentDateTime": "2024-09-20T08:15:00-07:00"
    }"#;

    #[test]
    fn test_account_json_mapping() {
        let account = test_account();
        assert_eq!(account.slid, "1234567");
        assert_eq!(account.account, "000012345678");
        assert_eq!(account.profile_id, "987654");
        assert_eq!(account.rate_group, "RES1");
        assert_eq!(account.consumption_to_date, 351.0);
        assert_eq!(account.cost_to_date, 42.18);
        assert_eq!(account.estimated_consumption, 702.0);
        assert_eq!(account.estimated_cost, 84.5);
    }

    #[test]
    fn test_billing_window_parses_with_offset() {
        let account = test_account();
        let start = account.get_billing_start_utc().unwrap();
        assert_eq!(start.to_rfc3339(), "2024-08-21T07:00:00+00:00");
        assert!(account.get_billing_end_utc().unwrap() > start);
    }

    #[test]
    fn test_interval_naive_timestamps_use_local_timezone() {
        let interval = Interval {
            start: "2024-09-01T00:00:00".to_string(),
            end: "2024-09-02T00:00:00".to_string(),
        };
        // America/Vancouver is UTC-7 in September
        assert_eq!(
            interval.get_start_utc().unwrap().to_rfc3339(),
            "2024-09-01T07:00:00+00:00"
        );
    }

    #[test]
    fn test_strip_utc_offset() {
        assert_eq!(
            strip_utc_offset("2024-09-01T00:00:00-07:00"),
            "2024-09-01T00:00:00"
        );
        assert_eq!(
            strip_utc_offset("2024-09-01T00:00:00"),
            "2024-09-01T00:00:00"
        );
        assert_eq!(strip_utc_offset("2024-09-01"), "2024-09-01");
    }

    #[test]
    fn test_strip_utc_offset_leaves_multibyte_input_intact() {
        // U+2212 minus instead of an ASCII hyphen; must not panic or strip
        let timestamp = "2024-09-01T00:00:00\u{2212}07:00";
        assert_eq!(strip_utc_offset(timestamp), timestamp);
        assert_eq!(strip_utc_offset("énergie"), "énergie");
    }

    #[test]
    fn test_malformed_offset_falls_back_to_local_parse() {
        // Not valid RFC 3339 (offset minutes out of range), so the offset is
        // stripped and the rest read as local time.
        let interval = Interval {
            start: "2024-09-01T00:00:00-07:60".to_string(),
            end: "2024-09-02T00:00:00-07:60".to_string(),
        };
        assert_eq!(
            interval.get_start_utc().unwrap().to_rfc3339(),
            "2024-09-01T07:00:00+00:00"
        );
    }

    #[test]
    fn test_latest_point_is_last_actual() {
        let mut estimated = actual_point("9.9");
        estimated.quality = "ESTIMATED".to_string();

        let usage = test_usage(vec![actual_point("1.1"), actual_point("2.2"), estimated]);
        assert_eq!(usage.latest_point().unwrap().consumption, "2.2");
    }

    #[test]
    fn test_latest_point_empty_when_no_actual() {
        let usage = test_usage(vec![]);
        assert!(usage.latest_point().is_none());
    }

    #[test]
    fn test_granularity_form_values() {
        assert_eq!(Granularity::Daily.as_str(), "daily");
        assert_eq!(Granularity::Hourly.as_str(), "hourly");
    }
}
