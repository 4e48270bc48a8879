//! Core types for Hillbloom.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod key;
pub mod price;

pub use id::*;
pub use key::ItemKey;
pub use price::{CurrencyCode, UnitPrice};
