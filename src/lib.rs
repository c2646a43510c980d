//! # Bibliotech Ingest
//!
//! Catalog ingestion and classification pipeline for the Bibliotech digital
//! library.
//!
//! Pulls bibliographic records from external catalogs (Project Gutenberg's
//! bulk dump, the Wikibooks API), filters out administrative pages, assigns
//! every book a stable `source://identifier` URI and a 3-digit subject code,
//! links it to a matching curator, and writes it idempotently to the store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌─────────┐
//! │  Catalog    │──▶│  Filter  │──▶│ Identity │──▶│ Classifier + │──▶│ Upsert  │
//! │ Gutenberg / │   │          │   │ resolver │   │ Curator match│   │ engine  │
//! │ Wikibooks   │   └──────────┘   └──────────┘   └──────────────┘   └────┬────┘
//! └─────────────┘                                                          ▼
//!                                                          REST / SQLite / memory
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! biblio init                          # create the local SQLite schema
//! biblio ingest gutenberg 100          # first 100 Gutenberg books
//! biblio ingest wikibooks all          # every Wikibooks page
//! biblio reclassify --prefix 000 --dry-run
//! biblio link-curators all
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overlay |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`http`] | Paced HTTP client with JSON sniffing |
//! | [`traits`] | `CatalogSource` trait |
//! | [`connector_gutenberg`] | Project Gutenberg bulk catalog |
//! | [`connector_wikibooks`] | Wikibooks paginated API |
//! | [`filter`] | Administrative-page filter |
//! | [`identity`] | URI resolution |
//! | [`classify`] | Classifier trait and keyword classifier |
//! | [`classify_llm`] | Remote text-generation classifier |
//! | [`curator`] | Curator matching |
//! | [`normalize`] | Field defaults and truncation |
//! | [`store`] | `BookStore` trait, in-memory and REST backends |
//! | [`sqlite_store`] | SQLite backend |
//! | [`upsert`] | Idempotent writes |
//! | [`ingest`] | Batch orchestration |
//! | [`reclassify`] | Re-run classification over stored books |
//! | [`link_curators`] | Backfill curator links |
//! | [`progress`] | Progress reporting |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod classify;
pub mod classify_llm;
pub mod config;
pub mod connector_gutenberg;
pub mod connector_wikibooks;
pub mod curator;
pub mod db;
pub mod error;
pub mod filter;
pub mod http;
pub mod identity;
pub mod ingest;
pub mod link_curators;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod reclassify;
pub mod sources;
pub mod sqlite_store;
pub mod store;
pub mod traits;
pub mod upsert;
