//! Incremental catalogue walker
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │        Crawler          │
//!                     │  - state machine        │
//!                     │  - sessions per worker  │
//!                     └───────────┬─────────────┘
//!                                 │ &CrawlContext
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │  list     │             │  list     │             │  list     │
//! │  classify │             │  classify │             │  classify │
//! │  record   │             │  record   │             │  record   │
//! └───────────┘             └───────────┘             └───────────┘
//! ```
//!
//! For each listed directory every child is classified: files are
//! recorded, directories are descended into unless excluded or older than
//! the product's resume boundary.

pub mod cancel;
pub mod context;
pub mod crawler;
pub mod stats;

pub use cancel::CancelToken;
pub use context::{ChildAction, CrawlContext, DirWork};
pub use crawler::{CrawlReport, CrawlState, Crawler};
pub use stats::{AbandonedSubtree, CrawlProgress, CrawlStats};
