//! # Readiness Feed
//!
//! Ingests a folder of roster/readiness flat-file exports into a
//! cell-limited chunk table and serves the reassembled payload, through a
//! TTL cache, to the dashboard.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌────────────┐
//! │  Export  │──▶│ Classify + Chunk │──▶│ Chunk table│
//! │  folder  │   │  (rule table)    │   │  (SQLite)  │
//! └──────────┘   └──────────────────┘   └─────┬──────┘
//!                                             │ reassemble
//!                   ┌──────────┐        ┌─────▼──────┐
//!                   │ CLI/HTTP │◀───────│ TTL cache  │
//!                   └──────────┘        └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! feed init                 # create database
//! feed ingest               # replace the chunk table from the export folder
//! feed fetch                # print the payload JSON
//! feed serve                # GET /payload over HTTP
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`rules`] | Static classification table |
//! | [`classify`] | Filename classification |
//! | [`chunk`] | Fixed-width chunking |
//! | [`source`] | Export folder scanning |
//! | [`store`] | Chunk table backends |
//! | [`writer`] | Atomic bulk replace |
//! | [`reassemble`] | Payload reconstruction |
//! | [`cache`] | Versioned TTL cache |
//! | [`access_log`] | Bounded invocation log |
//! | [`ingest`] | Ingest entry point |
//! | [`fetch`] | FetchPayload entry point |
//! | [`server`] | HTTP server |

pub mod access_log;
pub mod backends;
pub mod cache;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod reassemble;
pub mod rules;
pub mod server;
pub mod source;
pub mod status;
pub mod store;
pub mod writer;
