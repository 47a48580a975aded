//! Turn a raw result payload into a [`Store`].
//!
//! Reconciliation is a pure function of the payload: the same payload always
//! yields an equal store. Problems with individual records never abort the
//! run. The record is either defaulted (a fact without a page lands on page
//! 1) or dropped, and a [`Diagnostic`] explains what happened.
//!
//! # Pipeline
//!
//! ```text
//! payload.facts ──▶ RawFact ──▶ Fact (page default, dedup)  ─┐
//! payload.events ─▶ RawEvent ─▶ Event (date parse)          ─┼─▶ Store::from_parts
//! payload.contradictions ─────▶ Contradiction (severity)    ─┘     (stable date sort)
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::HashSet;

use crate::api::{RawContradiction, RawEvent, RawFact, ResultPayload};
use crate::models::{
    BoundingBox, Contradiction, ContradictionId, Event, EventId, Fact, FactId, Severity,
};
use crate::store::Store;

/// A recoverable problem found while reconciling a payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Diagnostic {
    #[error("dropped malformed {collection} record #{index}: {reason}")]
    MalformedRecord {
        collection: &'static str,
        index: usize,
        reason: String,
    },

    #[error("ignored {collection} list: expected an array, got {found}")]
    MalformedCollection {
        collection: &'static str,
        found: &'static str,
    },

    #[error("dropped event {event_id}: unparsable date '{value}'")]
    UnparsableDate { event_id: EventId, value: String },

    #[error("dropped duplicate fact {fact_id}")]
    DuplicateFact { fact_id: FactId },

    #[error("fact {fact_id} has no page, defaulted to page 1")]
    MissingPage { fact_id: FactId },

    #[error("contradiction {contradiction_id} has unknown severity '{value}', using medium")]
    UnknownSeverity {
        contradiction_id: ContradictionId,
        value: String,
    },

    #[error("dropped contradiction {contradiction_id}: both sides are event {event_id}")]
    SelfContradiction {
        contradiction_id: ContradictionId,
        event_id: EventId,
    },
}

/// The outcome of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub store: Store,
    pub diagnostics: Vec<Diagnostic>,
}

/// Build a [`Store`] from a completed job's result payload.
pub fn reconcile(payload: &ResultPayload) -> Reconciliation {
    let mut diagnostics = Vec::new();

    let facts = reconcile_facts(
        records(&payload.facts, "fact", &mut diagnostics),
        &mut diagnostics,
    );
    let events = reconcile_events(
        records(&payload.events, "event", &mut diagnostics),
        &mut diagnostics,
    );
    let contradictions = reconcile_contradictions(
        records(&payload.contradictions, "contradiction", &mut diagnostics),
        &mut diagnostics,
    );

    let document_name = payload
        .document_name
        .as_str()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let store = Store::from_parts(
        document_name,
        parse_page(&payload.total_pages),
        facts,
        events,
        contradictions,
    );

    Reconciliation { store, diagnostics }
}

/// The records of one collection. `null` or absent means none; any other
/// non-array is reported and treated as empty.
fn records<'a>(
    value: &'a Value,
    collection: &'static str,
    diagnostics: &mut Vec<Diagnostic>,
) -> &'a [Value] {
    let found = match value {
        Value::Array(items) => return items,
        Value::Null => return &[],
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Object(_) => "an object",
    };
    diagnostics.push(Diagnostic::MalformedCollection { collection, found });
    &[]
}

fn reconcile_facts(records: &[Value], diagnostics: &mut Vec<Diagnostic>) -> Vec<Fact> {
    let mut seen = HashSet::new();
    let mut facts = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let raw: RawFact = match serde_json::from_value(record.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                diagnostics.push(Diagnostic::MalformedRecord {
                    collection: "fact",
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let id = FactId::new(raw.id.into_string());
        if !seen.insert(id.clone()) {
            diagnostics.push(Diagnostic::DuplicateFact { fact_id: id });
            continue;
        }

        let page = match parse_page(&raw.page) {
            Some(page) => page,
            None => {
                diagnostics.push(Diagnostic::MissingPage {
                    fact_id: id.clone(),
                });
                1
            }
        };

        facts.push(Fact {
            id,
            kind: raw.kind.unwrap_or_else(|| "unknown".to_string()),
            value: value_text(&raw.value),
            page,
            bounding_box: parse_bounding_box(&raw.bounding_box),
            confidence: parse_unit_interval(&raw.confidence),
            context: raw.context.filter(|c| !c.is_empty()),
        });
    }

    facts
}

fn reconcile_events(records: &[Value], diagnostics: &mut Vec<Diagnostic>) -> Vec<Event> {
    let mut events = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let raw: RawEvent = match serde_json::from_value(record.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                diagnostics.push(Diagnostic::MalformedRecord {
                    collection: "event",
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let source_fact_ids = raw.fact_ids().into_iter().map(FactId::new).collect();
        let id = EventId::new(raw.id.into_string());

        let Some(date) = parse_event_date(&raw.date) else {
            diagnostics.push(Diagnostic::UnparsableDate {
                event_id: id,
                value: raw.date,
            });
            continue;
        };

        events.push(Event {
            id,
            description: raw.description,
            date,
            category: raw.category.filter(|c| !c.is_empty()),
            confidence_score: parse_unit_interval(&raw.confidence_score),
            source_fact_ids,
            page_hint: parse_page(&raw.page),
        });
    }

    events
}

fn reconcile_contradictions(
    records: &[Value],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Contradiction> {
    let mut contradictions = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let raw: RawContradiction = match serde_json::from_value(record.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                diagnostics.push(Diagnostic::MalformedRecord {
                    collection: "contradiction",
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let id = ContradictionId::new(raw.id.into_string());
        let event1_id = EventId::new(raw.event1_id.into_string());
        let event2_id = EventId::new(raw.event2_id.into_string());

        if event1_id == event2_id {
            diagnostics.push(Diagnostic::SelfContradiction {
                contradiction_id: id,
                event_id: event1_id,
            });
            continue;
        }

        let severity = match raw.severity.as_deref() {
            None => Severity::Medium,
            Some(text) => text.parse::<Severity>().unwrap_or_else(|_| {
                diagnostics.push(Diagnostic::UnknownSeverity {
                    contradiction_id: id.clone(),
                    value: text.to_string(),
                });
                Severity::Medium
            }),
        };

        contradictions.push(Contradiction {
            id,
            event1_id,
            event2_id,
            severity,
            explanation: raw.explanation,
            kind: raw.kind.filter(|k| !k.is_empty()),
            confidence: parse_unit_interval(&raw.confidence),
        });
    }

    contradictions
}

/// Parse an event date.
///
/// Accepts RFC 3339, naive ISO timestamps, `YYYY-MM-DD`, and `MM/DD/YYYY`.
/// Date-only values land at midnight. Offsets are dropped after converting
/// to the stated local wall-clock time.
pub fn parse_event_date(input: &str) -> Option<NaiveDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// A positive page number from an integer or a numeric string.
fn parse_page(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|&p| p >= 1)
}

/// A real in `[0, 1]` from a number or a numeric string; out of range is dropped.
fn parse_unit_interval(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (0.0..=1.0).contains(&x).then_some(x)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Accepts `[x0, y0, x1, y1]` corner arrays and `{x, y, width, height}` objects.
fn parse_bounding_box(value: &Value) -> Option<BoundingBox> {
    match value {
        Value::Array(items) if items.len() == 4 => {
            let c: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
            if c.len() != 4 {
                return None;
            }
            Some(BoundingBox {
                x: c[0],
                y: c[1],
                width: c[2] - c[0],
                height: c[3] - c[1],
            })
        }
        Value::Object(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}
