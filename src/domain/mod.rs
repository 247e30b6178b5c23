//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod lazy;
pub mod logic;
pub mod types;
