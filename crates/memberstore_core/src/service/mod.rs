//! Service layer for member use-cases.
//!
//! # Responsibility
//! - Orchestrate repository calls that span more than one operation.
//! - Keep storage details behind the repository contract.

pub mod member_service;
