//! Hillbloom Core - shared cart types library.
//!
//! This crate provides the data model shared by all Hillbloom components:
//! - `cart` - The cart state synchronization engine
//! - `integration-tests` - End-to-end scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! network clients, no async runtime. This keeps it lightweight and allows
//! it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, item keys, and prices
//! - [`cart`] - The in-memory cart data model and item validation
//! - [`document`] - The remote cart document wire shape and conversions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod document;
pub mod types;

pub use cart::*;
pub use document::*;
pub use types::*;
