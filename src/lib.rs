//! # CaseFolio
//!
//! Client for the CaseFolio document-analysis service.
//!
//! A document is submitted to the backend, which processes it asynchronously
//! (parse, extract facts, synthesize events, find contradictions). This crate
//! polls the job, reconciles the result into a normalized in-memory store,
//! and drives click-to-anchor navigation between the timeline and the
//! document pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────┐   ┌─────────┐
//! │ Backend  │──▶│ JobPoller  │──▶│  reconcile  │──▶│  Store  │
//! │  (HTTP)  │   │ (1 active) │   │ (pure fn)   │   │ (Arc)   │
//! └──────────┘   └───────────┘   └─────────────┘   └────┬────┘
//!                                                       │
//!                          ┌────────────────┬───────────┤
//!                          ▼                ▼           ▼
//!                    ┌──────────┐    ┌──────────┐ ┌──────────┐
//!                    │ Navigator│    │  filter  │ │  export  │
//!                    └──────────┘    └──────────┘ └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! casefolio health
//! casefolio process notes.txt --case-id demo-001
//! casefolio timeline <job_id> --filter conflicts
//! casefolio anchor <job_id> --event 12
//! casefolio export <job_id> --output timeline.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`api`] | Backend wire schemas |
//! | [`client`] | Backend trait and HTTP client |
//! | [`store`] | Normalized store and atomic handle |
//! | [`reconcile`] | Result payload → store |
//! | [`poller`] | Job polling state machine |
//! | [`navigator`] | Click-to-anchor navigation |
//! | [`filter`] | Timeline filters |
//! | [`export`] | Timeline export |
//! | [`resume`] | Resume bookkeeping |
//! | [`progress`] | Progress reporting |
//! | [`session`] | Session wiring |
//! | [`job_cmd`] | CLI command implementations |

pub mod api;
pub mod client;
pub mod config;
pub mod export;
pub mod filter;
pub mod job_cmd;
pub mod models;
pub mod navigator;
pub mod poller;
pub mod progress;
pub mod reconcile;
pub mod resume;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;
