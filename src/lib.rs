//! # Repo Insight
//!
//! Knowledge-risk analysis for hosted source repositories.
//!
//! Repo Insight reads a repository's commit history from the GitHub REST
//! API, aggregates per-contributor and per-file statistics, derives stale
//! files, hot spots and bus-factor estimates, and asks a generative-text
//! model (Gemini) to narrate expertise and codebase health. Narrative
//! failures fall back to deterministic heuristics.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Collector  │──▶│ Aggregation │──▶│ Risk + Narr. │──▶│ ResultStore │
//! │ (GitHub)   │   │   (core)    │   │ (core+Gemini)│   │  (memory)   │
//! └────────────┘   └─────────────┘   └──────────────┘   └──────┬──────┘
//!                                                              │
//!                                  ┌───────────────────────────┤
//!                                  ▼                           ▼
//!                             ┌──────────┐               ┌──────────┐
//!                             │   CLI    │               │   HTTP   │
//!                             └──────────┘               └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`error`] | Typed collaborator and pipeline errors |
//! | [`collector`] | Source-control trait and GitHub client |
//! | [`generator`] | Generative-text trait, Gemini client, retry policy |
//! | [`narrative`] | Narrative calls with heuristic fallback |
//! | [`progress`] | Stage tracking and progress reporters |
//! | [`pipeline`] | One end-to-end analysis run |
//! | [`jobs`] | Background submission, polling, sync runs |
//! | [`server`] | Axum HTTP API |

pub mod collector;
pub mod config;
pub mod error;
pub mod generator;
pub mod jobs;
pub mod narrative;
pub mod pipeline;
pub mod progress;
pub mod server;
