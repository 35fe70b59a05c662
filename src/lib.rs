//! # docvault
//!
//! Recovery and decryption engine for documents pinned to content-addressed
//! storage.
//!
//! Documents were encrypted client-side with a passphrase and pinned to a
//! public content-addressed network; only their content references and keys
//! survived in the relational store. docvault fetches each blob back through
//! redundant HTTP gateways, decrypts the salted AES envelope, pulls out the
//! embedded thumbnail and document images, and writes them back idempotently.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌──────────────────────┐   ┌───────────┐
//! │  Worklist  │──▶│ Gateways │──▶│ classify → decrypt → │──▶│  SQLite   │
//! │ (records)  │   │  (HTTP)  │   │ classify → extract   │   │ artifacts │
//! └────────────┘   └──────────┘   └──────────────────────┘   └─────┬─────┘
//!                                                                   │
//!                                      ┌────────────────────────────┤
//!                                      ▼                            ▼
//!                                 ┌──────────┐                ┌──────────┐
//!                                 │   CLI    │                │   HTTP   │
//!                                 │(docvault)│                │ /decrypt │
//!                                 └──────────┘                └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docvault init                          # create database
//! docvault import worklist.json          # load source records
//! docvault recover --progress human      # fetch, decrypt, store
//! docvault status                        # totals
//! docvault decrypt --ref Qm... --key ... # inspect one blob
//! docvault serve                         # start HTTP adapter
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Per-record error taxonomy |
//! | [`gateway`] | Multi-gateway blob fetching |
//! | [`classify`] | Payload shape detection |
//! | [`cipher`] | Salted AES-256-CBC envelope decryption |
//! | [`pipeline`] | Classify, decrypt, reclassify |
//! | [`extract`] | Artifact extraction from plaintext payloads |
//! | [`store`] | Artifact and status persistence |
//! | [`recover`] | Batch recovery orchestration |
//! | [`decrypt`] | Interactive decrypt entry point |
//! | [`server`] | HTTP adapter |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cipher;
pub mod classify;
pub mod config;
pub mod db;
pub mod decrypt;
pub mod error;
pub mod export;
pub mod extract;
pub mod gateway;
pub mod import;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod recover;
pub mod server;
pub mod shutdown;
pub mod status;
pub mod store;
