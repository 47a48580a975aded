//! Timeline filters.
//!
//! Filters are pure predicates over a [`Store`] and are recomputed on every
//! call; nothing is cached between filter changes.

use std::fmt;
use std::str::FromStr;

use crate::models::Event;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    /// Events whose category matches, case-insensitively.
    Category(String),
    /// Events named by at least one contradiction.
    ConflictsOnly,
}

impl FromStr for EventFilter {
    type Err = String;

    /// Parses `all`, `conflicts`, or `category:<tag>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "" | "all" => return Ok(EventFilter::All),
            "conflicts" | "conflicts-only" => return Ok(EventFilter::ConflictsOnly),
            _ => {}
        }
        match s.split_once(':') {
            Some((prefix, tag)) if prefix.eq_ignore_ascii_case("category") && !tag.trim().is_empty() => {
                Ok(EventFilter::Category(tag.trim().to_string()))
            }
            _ => Err(format!(
                "invalid filter '{}': expected all, conflicts, or category:<tag>",
                s
            )),
        }
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFilter::All => f.write_str("all"),
            EventFilter::Category(tag) => write!(f, "category:{}", tag),
            EventFilter::ConflictsOnly => f.write_str("conflicts"),
        }
    }
}

/// Events matching `filter`, in display order.
pub fn filter_events<'a>(store: &'a Store, filter: &EventFilter) -> Vec<&'a Event> {
    match filter {
        EventFilter::All => store.events().iter().collect(),
        EventFilter::Category(tag) => store
            .events()
            .iter()
            .filter(|e| {
                e.category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(tag))
            })
            .collect(),
        EventFilter::ConflictsOnly => {
            let conflicted = store.conflicted_event_ids();
            store
                .events()
                .iter()
                .filter(|e| conflicted.contains(&e.id))
                .collect()
        }
    }
}
