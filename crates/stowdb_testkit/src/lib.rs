//! # StowDB Testkit
//!
//! Test utilities for StowDB.
//!
//! This crate provides:
//! - Sample record types covering every index data type
//! - Test fixtures and store helpers
//! - Property-based test generators using proptest
//! - An index consistency harness for integration tests
//! - Index key test vectors
//!
//! ## Usage
//!
//! ```rust
//! use stowdb_testkit::prelude::*;
//!
//! let mut harness = IndexHarness::new();
//! harness.put_widget(Widget::new("W-1", "Sprocket", 2.5)).unwrap();
//! harness.verify_all();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod models;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::models::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use models::*;
pub use vectors::*;
