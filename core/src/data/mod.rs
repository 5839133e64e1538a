//! Data layer: storage traits, types and the in-memory backend

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::DataError;
pub use memory::InMemorySpanStore;
pub use traits::SpanRepository;
