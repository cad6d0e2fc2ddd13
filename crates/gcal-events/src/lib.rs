//! Google Calendar events client.
//!
//! `EventsManager` wraps the events resource of one calendar: list, insert,
//! update, delete and get. Each call makes sure the shared OAuth credentials
//! are fresh before sending its single request.

pub mod client;
pub mod error;
pub mod params;
pub mod types;

pub use client::EventsManager;
pub use error::CalendarError;
pub use params::{ListParams, OrderBy, SendUpdates};
pub use types::{
    Attendee, Event, EventDateTime, EventList, EventStatus, Person, ReminderOverride, Reminders,
    ResponseStatus,
};
