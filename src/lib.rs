//! # Postline
//!
//! Turns a freeform document into quality-checked social posts and delivers
//! them with tracked, backed-off retries.
//!
//! A document is split into candidate posts, each chunk runs through the
//! deterministic quality pipeline from [`postline_core`] (detect artifacts,
//! auto-repair, re-flow, re-validate, score), accepted posts are handed to
//! the publishing API, and failed deliveries are retried by a background
//! worker until they succeed or exhaust the backoff table.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────┐
//! │  Document   │──▶│ Chunk + QA   │──▶│ Publisher │──▶│  SQLite  │
//! │ file/url/txt│   │  pipeline    │   │  (HTTP)   │   │ ops/posts│
//! └─────────────┘   └──────────────┘   └─────▲─────┘   └────┬─────┘
//!                                            │              │
//!                                      ┌─────┴──────┐       │
//!                                      │Retry worker│◀──────┘
//!                                      └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! postline init
//! postline client add "Acme" --credential "$ACME_TOKEN"
//! postline preview notes.md
//! postline import --file notes.md --client <client-id>
//! postline retry worker
//! postline serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the store |
//! | [`source`] | Document acquisition (file, URL, inline) |
//! | [`publisher`] | HTTP publishing client |
//! | [`delivery`] | Deliver one post and record the outcome |
//! | [`context`] | Shared collaborators |
//! | [`import`] | Import orchestration and preview |
//! | [`worker`] | Retry worker service |
//! | [`status`] | Queue and health overview |
//! | [`clients`] | Client registration commands |
//! | [`server`] | JSON HTTP server |

pub mod clients;
pub mod config;
pub mod context;
pub mod db;
pub mod delivery;
pub mod import;
pub mod migrate;
pub mod publisher;
pub mod server;
pub mod source;
pub mod sqlite_store;
pub mod status;
pub mod worker;
