//! Filter model and derived-view pipeline for benchmark result tables.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Catalog    │────►│ Filter Model │◄───►│  URL Codec   │
//! │ (immutable)  │     │ (predicates) │     │ (debounced)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐     ┌──────────────┐
//!                      │  Evaluator   │────►│ Quantile /   │
//!                      │  (pure fn)   │     │ Scatter plot │
//!                      └──────────────┘     └──────────────┘
//! ```
//!
//! The row catalog never mutates. Filters, axes and plot modes are replaced
//! wholesale on every interaction and every derived view is recomputed.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod filter;
pub mod location;
pub mod logging;
pub mod plot;
pub mod stats;
pub mod view;
