//! Domain model for member records.
//!
//! # Responsibility
//! - Define the canonical record shape shared by every repository variant.

pub mod member;
