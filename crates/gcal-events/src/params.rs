//! Query parameters for the events endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

/// Who gets notified about an insert, update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendUpdates {
    All,
    ExternalOnly,
    None,
}

impl SendUpdates {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ExternalOnly => "externalOnly",
            Self::None => "none",
        }
    }

    pub(crate) fn query(send_updates: Option<Self>) -> Vec<(&'static str, &'static str)> {
        send_updates
            .map(|s| vec![("sendUpdates", s.as_str())])
            .unwrap_or_default()
    }
}

/// Sort order of a list response. `StartTime` requires `single_events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    StartTime,
    Updated,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartTime => "startTime",
            Self::Updated => "updated",
        }
    }
}

/// Filters for listing events.
///
/// Only options that carry a value are sent: `None`, empty strings and a
/// zero `max_results` are left out of the query.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub max_results: Option<u32>,
    pub order_by: Option<OrderBy>,
    /// Free text search
    pub q: Option<String>,
    /// Expand recurring events into instances
    pub single_events: Option<bool>,
    pub sync_token: Option<String>,
    pub page_token: Option<String>,
    pub time_max: Option<DateTime<Utc>>,
    pub time_min: Option<DateTime<Utc>>,
    pub updated_min: Option<DateTime<Utc>>,
    /// Any other query parameter of the list endpoint, by its wire name
    pub extra: BTreeMap<String, String>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Self {
        Self {
            time_min: Some(time_min),
            time_max: Some(time_max),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Query pairs for the request. Named options override `extra` entries
    /// with the same key, and `timeZone` is always `timezone`.
    pub fn to_query(&self, timezone: &str) -> Vec<(String, String)> {
        let mut query: BTreeMap<String, String> = self
            .extra
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                query.insert(key.to_string(), value);
            }
        };

        set(
            "maxResults",
            self.max_results.filter(|n| *n > 0).map(|n| n.to_string()),
        );
        set("orderBy", self.order_by.map(|o| o.as_str().to_string()));
        set("q", self.q.clone());
        set("singleEvents", self.single_events.map(|b| b.to_string()));
        set("syncToken", self.sync_token.clone());
        set("pageToken", self.page_token.clone());
        set("timeMax", self.time_max.map(rfc3339));
        set("timeMin", self.time_min.map(rfc3339));
        set("updatedMin", self.updated_min.map(rfc3339));
        set("timeZone", Some(timezone.to_string()));

        query.into_iter().collect()
    }
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn lookup<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
        query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_default_params_only_send_time_zone() {
        let query = ListParams::new().to_query("Europe/London");
        assert_eq!(
            query,
            vec![("timeZone".to_string(), "Europe/London".to_string())]
        );
    }

    #[test]
    fn test_named_params() {
        let time_min = DateTime::parse_from_rfc3339("2024-02-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let time_max = DateTime::parse_from_rfc3339("2024-02-29T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        let params = ListParams {
            max_results: Some(25),
            order_by: Some(OrderBy::StartTime),
            single_events: Some(true),
            q: Some("standup".into()),
            ..ListParams::between(time_min, time_max)
        };

        let query = params.to_query("UTC");
        assert_eq!(lookup(&query, "maxResults"), Some("25"));
        assert_eq!(lookup(&query, "orderBy"), Some("startTime"));
        assert_eq!(lookup(&query, "singleEvents"), Some("true"));
        assert_eq!(lookup(&query, "q"), Some("standup"));
        assert_eq!(lookup(&query, "timeMin"), Some("2024-02-01T00:00:00Z"));
        assert_eq!(lookup(&query, "timeMax"), Some("2024-02-29T23:59:59Z"));
        assert_eq!(lookup(&query, "timeZone"), Some("UTC"));
        assert_eq!(lookup(&query, "syncToken"), None);
    }

    #[test]
    fn test_falsy_values_are_omitted() {
        let params = ListParams {
            max_results: Some(0),
            q: Some(String::new()),
            sync_token: Some(String::new()),
            ..ListParams::default()
        }
        .with_param("showDeleted", "");

        let query = params.to_query("UTC");
        assert_eq!(query.len(), 1);
        assert_eq!(lookup(&query, "timeZone"), Some("UTC"));
    }

    #[test]
    fn test_single_events_false_is_sent() {
        let params = ListParams {
            single_events: Some(false),
            ..ListParams::default()
        };
        assert_eq!(
            lookup(&params.to_query("UTC"), "singleEvents"),
            Some("false")
        );
    }

    #[test]
    fn test_extra_params_and_precedence() {
        let params = ListParams {
            q: Some("named".into()),
            ..ListParams::default()
        }
        .with_param("showDeleted", "true")
        .with_param("q", "extra")
        .with_param("timeZone", "America/New_York");

        let query = params.to_query("Asia/Tokyo");
        assert_eq!(lookup(&query, "showDeleted"), Some("true"));
        assert_eq!(lookup(&query, "q"), Some("named"));
        assert_eq!(lookup(&query, "timeZone"), Some("Asia/Tokyo"));
    }

    #[test]
    fn test_send_updates_query() {
        assert!(SendUpdates::query(None).is_empty());
        assert_eq!(
            SendUpdates::query(Some(SendUpdates::ExternalOnly)),
            vec![("sendUpdates", "externalOnly")]
        );
    }
}
