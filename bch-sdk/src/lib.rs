#![deny(missing_docs)]

//! BCH Blockchain SDK - Complete SDK.
//!
//! Re-exports all BCH SDK components for convenient single-crate usage.

pub use bch_primitives as primitives;
pub use bch_script as script;
pub use bch_transaction as transaction;
