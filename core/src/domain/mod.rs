//! Domain layer: attribute canonicalization, ingestion, buffering, pricing

pub mod attributes;
pub mod buffer;
pub mod ingest;
pub mod pricing;

pub use buffer::{FlushWorker, SpanBuffer};
pub use ingest::SpanService;
pub use pricing::PricingService;
