//!
//! # gdstree Internal Utilities Crate
//!
//! Shared helpers for the `gdstree` crates:
//! serde-file formats, error-construction helpers, and dependency ordering.
//!

pub mod ser;
pub use ser::*;

pub mod error;
pub use error::*;

pub mod dep_order;
pub use dep_order::*;
