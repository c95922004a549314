//! bunq Types - Wire-level types shared by the bunq client crates
//!
//! This crate contains the foundational types with zero dependencies on other
//! bunq crates:
//!
//! - Response envelope decoding (`{"Response": [...]}`) by key or key prefix
//! - Pagination descriptors and list options
//! - Monetary amount helpers
//! - Decode errors
//!
//! # Envelope Shape
//!
//! ```text
//! {"Response": [ {"<TypeKey>": { ...fields... }}, ... ], "Pagination": {...}}
//! ```
//!
//! Every payload sits one level below a type key. Anchor objects (for example
//! `MonetaryAccountBank` returned from a `MonetaryAccount` listing) carry a
//! variant suffix, so keys are matched exactly first and by prefix second.

pub mod amount;
pub mod envelope;
pub mod error;
pub mod pagination;

pub use amount::*;
pub use envelope::*;
pub use error::*;
pub use pagination::*;
