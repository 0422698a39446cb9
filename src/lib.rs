//! # Sanctions Watch
//!
//! A sanctions-list ingestion and entity-resolution pipeline.
//!
//! Sanctions Watch fetches the major public sanctions lists (OFAC SDN,
//! UN consolidated, EU consolidated, UK OFSI), normalizes their records
//! into one canonical shape, links listings that denote the same
//! real-world entity across lists, and serves the merged profiles
//! through a queryable registry and JSON/CSV exports.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐
//! │  Adapters  │──▶│ Normalizer │──▶│  Matcher │──▶│ Registry │
//! │ XML / CSV  │   │ pure, per  │   │ block +  │   │ lookups, │
//! │ per source │   │ record     │   │ score +  │   │ exports  │
//! └────────────┘   └────────────┘   │ union    │   └──────────┘
//!       ▲                           └──────────┘
//!       │
//! ┌────────────┐
//! │   Fetch    │  bounded concurrency, retry/backoff,
//! │ orchestror │  per-source rate limits, run deadline
//! └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sw --config watch.toml sources               # list configured sources
//! sw --config watch.toml crawl                 # run the full pipeline
//! sw --config watch.toml crawl --source ofac --mock-dir fixtures/
//! sw --config watch.toml validate              # fetch+parse+match, report only
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`transport`] | HTTP and mock-file payload transports |
//! | [`adapter`] | Source adapter trait and resolution |
//! | [`adapter_ofac`] | OFAC SDN XML adapter |
//! | [`adapter_un`] | UN consolidated XML adapter |
//! | [`adapter_eu`] | EU consolidated XML adapter |
//! | [`adapter_uk`] | UK OFSI CSV adapter |
//! | [`fetch`] | Fetch orchestrator |
//! | [`normalize`] | Name/address/date/identifier normalization |
//! | [`matcher`] | Cross-source blocking, scoring, merging |
//! | [`registry`] | Profile registry and lookups |
//! | [`pipeline`] | End-to-end run |
//! | [`export`] | JSON/CSV exporters |

pub mod adapter;
pub mod adapter_eu;
pub mod adapter_ofac;
pub mod adapter_uk;
pub mod adapter_un;
pub mod config;
pub mod dsu;
pub mod error;
pub mod export;
pub mod fetch;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod sources;
pub mod transport;
pub mod xml;
