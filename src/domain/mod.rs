use chrono::{Local, NaiveDate};
use std::sync::Arc;

pub mod admin;
pub mod notification;
pub mod session;
pub mod task_feed;
pub mod todo;
pub mod user;

#[cfg(test)]
pub mod test_util;

/// Source of the current calendar date. Deadlines have no time component, so this is
/// all the time information the domain needs.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Reads the date from the server's local time zone
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

impl<K: Clock> Clock for Arc<K> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

/// Case-insensitive prefix match used by every search box in the app. Both sides are
/// lower-cased, so "al" and "Al" both match "Alpha".
pub fn matches_search_prefix(candidate: &str, query: &str) -> bool {
    candidate
        .to_lowercase()
        .starts_with(query.to_lowercase().as_str())
}
