use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use gcal_auth::CredentialStore;
use gcal_core::Config;
use gcal_events::{Event, EventsManager, ListParams, OrderBy};

const UPCOMING_DAYS: i64 = 7;

#[tokio::main]
async fn main() -> Result<()> {
    gcal_core::init()?;

    let (config, _) = Config::load_validated(&Config::config_path()?)?;

    let store = CredentialStore::new(config.credentials_path()?);
    let mut credentials = store
        .load()
        .with_context(|| format!("No usable credentials at {}", store.path().display()))?;

    // Client identity from the config wins over whatever the token file recorded
    if let Ok(google) = config.require_google() {
        credentials.client_id = google.client_id.clone();
        credentials.client_secret = google.client_secret.clone();
        credentials.token_uri = google.token_uri.clone();
    }

    let manager = EventsManager::from_config(&config.calendar, credentials.into_shared());

    let now = Utc::now();
    let params = ListParams {
        single_events: Some(true),
        order_by: Some(OrderBy::StartTime),
        ..ListParams::between(now, now + Duration::days(UPCOMING_DAYS))
    };

    let events = list_and_persist(&manager, &store, &params).await?;

    println!(
        "{} event(s) in the next {} days on {}:",
        events.len(),
        UPCOMING_DAYS,
        manager.calendar_id()
    );
    for event in events.iter().filter(|e| !e.is_cancelled()) {
        let when = event
            .start
            .as_ref()
            .and_then(|s| s.as_utc())
            .map(|t| t.format("%a %d %b %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  {}  {}",
            when,
            event.summary.as_deref().unwrap_or("(no title)")
        );
    }

    Ok(())
}

/// List events, then save the credentials whatever the outcome, so a token
/// refreshed before a failed request is not lost.
async fn list_and_persist(
    manager: &EventsManager,
    store: &CredentialStore,
    params: &ListParams,
) -> Result<Vec<Event>> {
    let result = manager.list(params).await;

    store.save(&*manager.credentials().lock().await)?;

    result.map_err(|e| {
        tracing::error!("Listing events failed: {}", e);
        anyhow::anyhow!(e.user_message())
    })
}
