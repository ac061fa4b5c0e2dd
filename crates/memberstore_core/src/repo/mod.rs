//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the member data access contract.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   classified store faults.

pub mod member_repo;
pub mod sql_repo;
pub mod template_repo;
