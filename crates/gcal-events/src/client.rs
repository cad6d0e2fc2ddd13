//! Google Calendar events client.

use gcal_auth::SharedCredentials;
use gcal_core::config::{DEFAULT_API_VERSION, DEFAULT_BASE_URL, DEFAULT_CALENDAR_ID};
use gcal_core::CalendarConfig;
use tracing::instrument;

use crate::error::CalendarError;
use crate::params::{ListParams, SendUpdates};
use crate::types::{Event, EventList};

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Events of one calendar, accessed with shared OAuth credentials.
///
/// Cloning is cheap: clones share the HTTP client and the credentials, so a
/// refresh done by one clone is seen by all of them.
#[derive(Debug, Clone)]
pub struct EventsManager {
    client: reqwest::Client,
    credentials: SharedCredentials,
    timezone: String,
    calendar_id: String,
    version: String,
    base_url: String,
}

impl EventsManager {
    /// `timezone` is an IANA name such as `Europe/London`; it is sent with
    /// list and get requests.
    pub fn new(credentials: SharedCredentials, timezone: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            timezone: timezone.into(),
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn from_config(config: &CalendarConfig, credentials: SharedCredentials) -> Self {
        Self::new(credentials, config.timezone.clone())
            .with_calendar_id(config.calendar_id.clone())
            .with_version(config.api_version.clone())
            .with_base_url(config.base_url.clone())
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    /// API version segment. Changing it is not recommended.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Use an existing HTTP client (connection pool, proxy, timeouts).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn credentials(&self) -> &SharedCredentials {
        &self.credentials
    }

    /// Collection URL of the calendar's events.
    pub fn api_url(&self) -> String {
        format!(
            "{}/calendar/{}/calendars/{}/events",
            self.base_url,
            self.version,
            urlencoding::encode(&self.calendar_id),
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.api_url(), urlencoding::encode(event_id))
    }

    /// Authorization header value, refreshing the access token first if it
    /// is stale. The credentials lock is held across the refresh so
    /// concurrent callers wait for it instead of refreshing again.
    async fn auth_header(&self) -> Result<String, CalendarError> {
        let mut creds = self.credentials.lock().await;
        if !creds.is_fresh() {
            tracing::debug!("Access token stale, refreshing before request");
            creds.refresh(&self.client).await?;
        }
        Ok(creds.authorization_header())
    }

    /// List events. Returns the items of a single page.
    #[instrument(skip(self, params), fields(calendar_id = %self.calendar_id), level = "info")]
    pub async fn list(&self, params: &ListParams) -> Result<Vec<Event>, CalendarError> {
        Ok(self.list_page(params).await?.items)
    }

    /// List events, keeping the page and sync tokens of the response.
    #[instrument(skip(self, params), fields(calendar_id = %self.calendar_id), level = "info")]
    pub async fn list_page(&self, params: &ListParams) -> Result<EventList, CalendarError> {
        let auth = self.auth_header().await?;

        let response = self
            .client
            .get(self.api_url())
            .header("Authorization", auth)
            .query(&params.to_query(&self.timezone))
            .send()
            .await?;

        let list: EventList = Self::handle_response(response).await?;
        tracing::debug!("Listed {} events", list.items.len());
        Ok(list)
    }

    /// Create an event.
    #[instrument(skip(self, event), fields(calendar_id = %self.calendar_id), level = "info")]
    pub async fn insert(
        &self,
        event: &Event,
        send_updates: Option<SendUpdates>,
    ) -> Result<Event, CalendarError> {
        let auth = self.auth_header().await?;

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", auth)
            .query(&SendUpdates::query(send_updates))
            .json(event)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Replace an event. The event must carry its id.
    #[instrument(
        skip(self, event),
        fields(calendar_id = %self.calendar_id, event_id = ?event.id),
        level = "info"
    )]
    pub async fn update(
        &self,
        event: &Event,
        send_updates: Option<SendUpdates>,
    ) -> Result<Event, CalendarError> {
        let event_id = event
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(CalendarError::MissingEventId)?;
        let url = self.event_url(event_id);
        let auth = self.auth_header().await?;

        let response = self
            .client
            .put(url)
            .header("Authorization", auth)
            .query(&SendUpdates::query(send_updates))
            .json(event)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Delete an event.
    #[instrument(skip(self), fields(calendar_id = %self.calendar_id), level = "info")]
    pub async fn delete(
        &self,
        event_id: &str,
        send_updates: Option<SendUpdates>,
    ) -> Result<(), CalendarError> {
        if event_id.is_empty() {
            return Err(CalendarError::MissingEventId);
        }
        let auth = self.auth_header().await?;

        let response = self
            .client
            .delete(self.event_url(event_id))
            .header("Authorization", auth)
            .query(&SendUpdates::query(send_updates))
            .send()
            .await?;

        // Delete returns 204 No Content on success
        Self::check_status(response).await?;
        Ok(())
    }

    /// Fetch one event. Times are rendered in `timezone`, or the manager's
    /// time zone when `None`.
    #[instrument(skip(self), fields(calendar_id = %self.calendar_id), level = "info")]
    pub async fn get(&self, event_id: &str, timezone: Option<&str>) -> Result<Event, CalendarError> {
        if event_id.is_empty() {
            return Err(CalendarError::MissingEventId);
        }
        let auth = self.auth_header().await?;
        let timezone = timezone.unwrap_or(&self.timezone);

        let response = self
            .client
            .get(self.event_url(event_id))
            .header("Authorization", auth)
            .query(&[("timeZone", timezone)])
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Decode a successful response, or map the failure.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CalendarError> {
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| CalendarError::Decode(e.to_string()))
    }

    /// Pass 2xx responses through; turn anything else into a `CalendarError`.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        tracing::warn!("Calendar API returned {}", status);

        let err = match status.as_u16() {
            401 => CalendarError::TokenExpired,
            403 => CalendarError::Forbidden(response.text().await.unwrap_or_default()),
            404 => CalendarError::NotFound(response.text().await.unwrap_or_default()),
            409 | 412 => CalendarError::Conflict,
            410 => CalendarError::Gone(response.text().await.unwrap_or_default()),
            429 => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                CalendarError::RateLimited(retry_after)
            }
            code => CalendarError::Api {
                status: code,
                body: response.text().await.unwrap_or_default(),
            },
        };
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::{Duration, Utc};
    use gcal_auth::Credentials;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EVENTS_PATH: &str = "/calendar/v3/calendars/primary/events";

    fn fresh_credentials() -> SharedCredentials {
        Credentials::new(
            "test_token",
            Some("refresh".to_string()),
            Utc::now() + Duration::hours(1),
            "client-id",
            "client-secret",
        )
        .into_shared()
    }

    fn manager(base_url: &str) -> EventsManager {
        EventsManager::new(fresh_credentials(), "Europe/London").with_base_url(base_url)
    }

    #[test]
    fn test_api_url() {
        let m = EventsManager::new(fresh_credentials(), "UTC");
        assert_eq!(
            m.api_url(),
            "https://www.googleapis.com/calendar/v3/calendars/primary/events"
        );

        let m = m
            .with_calendar_id("team@group.calendar.google.com")
            .with_version("v4")
            .with_base_url("http://localhost:9000/");
        assert_eq!(
            m.api_url(),
            "http://localhost:9000/calendar/v4/calendars/team%40group.calendar.google.com/events"
        );
        assert_eq!(
            m.event_url("abc/def"),
            "http://localhost:9000/calendar/v4/calendars/team%40group.calendar.google.com/events/abc%2Fdef"
        );
    }

    #[test]
    fn test_from_config() {
        let config = CalendarConfig {
            calendar_id: "work".to_string(),
            timezone: "Asia/Tokyo".to_string(),
            api_version: "v3".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
        };
        let m = EventsManager::from_config(&config, fresh_credentials());
        assert_eq!(m.calendar_id(), "work");
        assert_eq!(m.timezone(), "Asia/Tokyo");
        assert_eq!(
            m.api_url(),
            "http://127.0.0.1:1/calendar/v3/calendars/work/events"
        );
    }

    #[tokio::test]
    async fn test_list_events() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(header("Authorization", "Bearer test_token"))
            .and(query_param("timeZone", "Europe/London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {
                        "id": "event1",
                        "summary": "Meeting",
                        "start": {"dateTime": "2024-02-01T10:00:00Z"},
                        "end": {"dateTime": "2024-02-01T11:00:00Z"}
                    }
                ]
            })))
            .mount(&mock_server)
            .await;

        let events = manager(&mock_server.uri())
            .list(&ListParams::default())
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary.as_deref(), Some("Meeting"));
    }

    #[tokio::test]
    async fn test_get_event() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/event123", EVENTS_PATH)))
            .and(query_param("timeZone", "Europe/London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "event123",
                "summary": "Team Sync",
                "start": {"dateTime": "2024-02-01T14:00:00Z"},
                "end": {"dateTime": "2024-02-01T15:00:00Z"},
                "status": "confirmed"
            })))
            .mount(&mock_server)
            .await;

        let event = manager(&mock_server.uri())
            .get("event123", None)
            .await
            .unwrap();

        assert_eq!(event.id.as_deref(), Some("event123"));
        assert_eq!(event.summary.as_deref(), Some("Team Sync"));
    }

    #[tokio::test]
    async fn test_token_expired() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let result = manager(&mock_server.uri()).list(&ListParams::default()).await;

        assert!(matches!(result, Err(CalendarError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "30"))
            .mount(&mock_server)
            .await;

        let result = manager(&mock_server.uri()).list(&ListParams::default()).await;

        assert!(matches!(result, Err(CalendarError::RateLimited(30))));
    }

    #[tokio::test]
    async fn test_rate_limited_without_retry_after() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let err = manager(&mock_server.uri())
            .list(&ListParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CalendarError::RateLimited(DEFAULT_RETRY_AFTER_SECS)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_forbidden_keeps_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(format!("{}/event123", EVENTS_PATH)))
            .respond_with(ResponseTemplate::new(403).set_body_string("insufficientPermissions"))
            .mount(&mock_server)
            .await;

        let err = manager(&mock_server.uri())
            .delete("event123", None)
            .await
            .unwrap_err();

        assert!(matches!(err, CalendarError::Forbidden(ref body) if body == "insufficientPermissions"));
        assert_eq!(err.status(), Some(403));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_conflict_statuses() {
        for code in [409u16, 412] {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path(EVENTS_PATH))
                .respond_with(ResponseTemplate::new(code))
                .expect(1)
                .mount(&mock_server)
                .await;

            let err = manager(&mock_server.uri())
                .insert(&Event::default(), None)
                .await
                .unwrap_err();

            assert!(
                matches!(err, CalendarError::Conflict),
                "status {code} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Nothing listens on the discard port
        let err = manager("http://127.0.0.1:9")
            .list(&ListParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CalendarError::Network(_)), "got {err:?}");
        assert!(err.is_retryable());
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_server_error_keeps_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/event123", EVENTS_PATH)))
            .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
            .mount(&mock_server)
            .await;

        let err = manager(&mock_server.uri())
            .get("event123", None)
            .await
            .unwrap_err();

        match err {
            CalendarError::Api { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "backend unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/event123", EVENTS_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let err = manager(&mock_server.uri())
            .get("event123", None)
            .await
            .unwrap_err();

        assert!(matches!(err, CalendarError::Decode(_)));
    }

    #[tokio::test]
    async fn test_delete_event() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(format!("{}/event123", EVENTS_PATH)))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let result = manager(&mock_server.uri()).delete("event123", None).await;

        assert!(result.is_ok());
    }
}
