//! The normalized in-memory view of one completed job.
//!
//! A [`Store`] is built wholesale by [`crate::reconcile`] and never patched.
//! The session holds it behind a [`StoreHandle`], which swaps the whole
//! `Arc<Store>` in one step: readers holding an older snapshot keep a valid,
//! fully built store until they drop it.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use crate::models::{Contradiction, Event, EventId, Fact, FactId};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Store {
    document_name: Option<String>,
    total_pages: Option<u32>,
    facts: BTreeMap<FactId, Fact>,
    events: Vec<Event>,
    contradictions: Vec<Contradiction>,
}

impl Store {
    /// Assemble a store, enforcing its invariants.
    ///
    /// Facts are keyed by id with the first occurrence winning. Events are
    /// stable-sorted ascending by date, so equal dates keep input order.
    pub fn from_parts(
        document_name: Option<String>,
        total_pages: Option<u32>,
        facts: Vec<Fact>,
        mut events: Vec<Event>,
        contradictions: Vec<Contradiction>,
    ) -> Self {
        let mut map = BTreeMap::new();
        for fact in facts {
            map.entry(fact.id.clone()).or_insert(fact);
        }
        events.sort_by(|a, b| a.date.cmp(&b.date));

        Self {
            document_name,
            total_pages,
            facts: map,
            events,
            contradictions,
        }
    }

    pub fn document_name(&self) -> Option<&str> {
        self.document_name.as_deref()
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.events.is_empty() && self.contradictions.is_empty()
    }

    pub fn fact(&self, id: &FactId) -> Option<&Fact> {
        self.facts.get(id)
    }

    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.facts.values()
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Events in display order (ascending date).
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event(&self, id: &EventId) -> Option<&Event> {
        self.events.iter().find(|e| &e.id == id)
    }

    pub fn contradictions(&self) -> &[Contradiction] {
        &self.contradictions
    }

    /// The event's source facts that resolve, in source order. Dangling ids
    /// are skipped.
    pub fn source_facts<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = &'a Fact> + 'a {
        event
            .source_fact_ids
            .iter()
            .filter_map(move |id| self.facts.get(id))
    }

    pub fn contradictions_for<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> impl Iterator<Item = &'a Contradiction> + 'a {
        self.contradictions
            .iter()
            .filter(move |c| c.involves(event_id))
    }

    /// Every event id named by any contradiction, whether or not the event
    /// exists. Computed on each call.
    pub fn conflicted_event_ids(&self) -> BTreeSet<&EventId> {
        self.contradictions
            .iter()
            .flat_map(|c| [&c.event1_id, &c.event2_id])
            .collect()
    }

    /// Distinct event categories, lower-cased.
    pub fn categories(&self) -> BTreeSet<String> {
        self.events
            .iter()
            .filter_map(|e| e.category.as_deref())
            .map(str::to_ascii_lowercase)
            .collect()
    }

    /// SHA-256 over the canonical JSON form. Equal stores have equal
    /// fingerprints.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}

/// The session's single authoritative reference to the current [`Store`].
#[derive(Debug, Default)]
pub struct StoreHandle {
    current: RwLock<Arc<Store>>,
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A consistent snapshot. Later swaps do not affect it.
    pub fn snapshot(&self) -> Arc<Store> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the current store, returning the previous one.
    pub fn replace(&self, store: Store) -> Arc<Store> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(store))
    }

    /// Drop back to an empty store.
    pub fn clear(&self) -> Arc<Store> {
        self.replace(Store::default())
    }
}
