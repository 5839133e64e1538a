//! Shared utility functions

pub mod string;
pub mod time;
