//! LLM telemetry trace ingestion core.
//!
//! Takes flat spans emitted by LLM instrumentation, translates their vendor
//! attribute conventions into one canonical namespace, normalizes them into
//! typed span trees with cost and token rollups, and buffers them for
//! batched persistence through a pluggable repository.
//!
//! The main entry points are [`domain::SpanService`] for ingestion and
//! queries, [`domain::SpanBuffer`] plus [`domain::FlushWorker`] for the
//! buffered write path, and [`data::SpanRepository`] for storage backends.

pub mod core;
pub mod data;
pub mod domain;
pub mod utils;

pub use crate::core::Config;
pub use data::{DataError, InMemorySpanStore, SpanRepository};
pub use domain::{FlushWorker, PricingService, SpanBuffer, SpanService};
