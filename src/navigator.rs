//! Click-to-anchor navigation between the timeline and the document view.
//!
//! Anchoring resolves a fact (or an event's source fact) to its page, asks
//! the [`ViewRenderer`] to show that page, then asks for a highlight pulse on
//! the fact. Lookups are synchronous against an already built [`Store`]; no
//! network round-trip happens on anchor.

use std::time::{Duration, Instant};

use crate::models::{Event, EventId, Fact, FactId};
use crate::store::Store;

/// Result of an anchor request. Misses are values, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorOutcome {
    Navigated { page: u32 },
    FactNotFound,
    EventNotFound,
}

/// The side-effecting view surface the navigator drives.
pub trait ViewRenderer {
    /// Display `page`. Only called when the page actually changes.
    fn show_page(&mut self, page: u32);

    /// Highlight the visual element bound to `fact`. Returns `false` when the
    /// view has no element for it, which is tolerated.
    fn pulse(&mut self, fact: &Fact) -> bool;

    /// Bring the event's timeline entry into focus.
    fn focus_event(&mut self, _event: &Event) {}
}

pub struct AnchorNavigator {
    current_page: Option<u32>,
    budget: Duration,
}

impl AnchorNavigator {
    pub fn new(budget: Duration) -> Self {
        Self {
            current_page: None,
            budget,
        }
    }

    /// Start from a page that is already on screen (e.g. restored state).
    pub fn with_page(budget: Duration, page: u32) -> Self {
        Self {
            current_page: Some(page.max(1)),
            budget,
        }
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current_page
    }

    pub fn anchor_to_fact(
        &mut self,
        store: &Store,
        renderer: &mut dyn ViewRenderer,
        fact_id: &FactId,
    ) -> AnchorOutcome {
        let started = Instant::now();
        let outcome = match store.fact(fact_id) {
            Some(fact) => self.navigate_to_fact(renderer, fact),
            None => {
                tracing::debug!(fact_id = %fact_id, "anchor target fact not found");
                AnchorOutcome::FactNotFound
            }
        };
        self.check_budget(started, "fact", fact_id.as_str());
        outcome
    }

    /// Anchor to the first source fact of the event that resolves, falling
    /// back to the event's page hint and then page 1.
    pub fn anchor_to_event(
        &mut self,
        store: &Store,
        renderer: &mut dyn ViewRenderer,
        event_id: &EventId,
    ) -> AnchorOutcome {
        let started = Instant::now();
        let Some(event) = store.event(event_id) else {
            tracing::debug!(event_id = %event_id, "anchor target event not found");
            return AnchorOutcome::EventNotFound;
        };

        renderer.focus_event(event);
        let outcome = match store.source_facts(event).next() {
            Some(fact) => self.navigate_to_fact(renderer, fact),
            None => {
                if !event.source_fact_ids.is_empty() {
                    tracing::debug!(event_id = %event_id, "all source facts dangling, using page hint");
                }
                let page = event.page_hint.unwrap_or(1);
                self.go_to_page(renderer, page);
                AnchorOutcome::Navigated { page }
            }
        };
        self.check_budget(started, "event", event_id.as_str());
        outcome
    }

    fn navigate_to_fact(&mut self, renderer: &mut dyn ViewRenderer, fact: &Fact) -> AnchorOutcome {
        self.go_to_page(renderer, fact.page);
        if !renderer.pulse(fact) {
            tracing::debug!(fact_id = %fact.id, page = fact.page, "no visual binding for fact");
        }
        AnchorOutcome::Navigated { page: fact.page }
    }

    fn go_to_page(&mut self, renderer: &mut dyn ViewRenderer, page: u32) {
        if self.current_page != Some(page) {
            renderer.show_page(page);
            self.current_page = Some(page);
        }
    }

    fn check_budget(&self, started: Instant, target: &str, id: &str) {
        let elapsed = started.elapsed();
        if elapsed > self.budget {
            tracing::warn!(
                target_kind = target,
                id,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.budget.as_millis() as u64,
                "anchor exceeded time budget"
            );
        }
    }
}

/// Renders navigation to stdout for the CLI.
pub struct TerminalRenderer;

impl ViewRenderer for TerminalRenderer {
    fn show_page(&mut self, page: u32) {
        println!("page      {}", page);
    }

    fn pulse(&mut self, fact: &Fact) -> bool {
        let context = fact.context.as_deref().unwrap_or("");
        println!("highlight {} [{}] {}  {}", fact.id, fact.kind, fact.value, context);
        if let Some(bb) = &fact.bounding_box {
            println!(
                "region    x={:.1} y={:.1} w={:.1} h={:.1}",
                bb.x, bb.y, bb.width, bb.height
            );
        }
        true
    }

    fn focus_event(&mut self, event: &Event) {
        println!("event     {} {}", event.date.format("%Y-%m-%d"), event.description);
    }
}
