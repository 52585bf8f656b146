//! # nutrilens
//!
//! Reads food labels. Given an ingredient-list photo and a nutrition-facts
//! photo, nutrilens OCRs both, strips boilerplate from the text, asks a
//! chat-completion model for a fixed JSON schema per label, merges the two
//! results and upserts one record per product name.
//!
//! ## Architecture
//!
//! ```text
//!                ┌────────────── JoinSet ──────────────┐
//! ingredient URL │ OCR ─▶ clean ─▶ LLM (ingredient)    │
//!                │                                     ├─▶ merge ─▶ SQLite upsert
//! nutrition URL  │ OCR ─▶ clean ─▶ LLM (nutrition)     │
//!                └─────────────────────────────────────┘
//!                         ▲                    ▲
//!                    ┌──────────┐        ┌──────────┐
//!                    │   CLI    │        │   HTTP   │
//!                    └──────────┘        └──────────┘
//! ```
//!
//! Text cleaning, the response schema, merging and the store trait live in
//! the `nutrilens-core` crate; this crate adds the HTTP providers, SQLite,
//! the server and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`ocr`] | Text extraction client |
//! | [`llm`] | Structured-analysis client |
//! | [`pipeline`] | Concurrent streams, merge, upsert |
//! | [`sqlite_store`] | SQLite analysis store |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`analyze`], [`products`] | CLI commands |

pub mod analyze;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod migrate;
pub mod ocr;
pub mod pipeline;
pub mod products;
pub mod server;
pub mod sqlite_store;
