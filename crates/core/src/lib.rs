//! Ubuntu Lend Core - Shared domain types.
//!
//! This crate provides the types used across all Ubuntu Lend components:
//! - `server` - The HTTP API (customer, auth and admin endpoints)
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, phone numbers, statuses, pagination
//!   and loan repayment math

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
