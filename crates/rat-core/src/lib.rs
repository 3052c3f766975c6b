//! # rat-core — Foundational Types for the RAT Registry
//!
//! Defines the type-system primitives shared by every other crate in the
//! workspace: the processing-activity [`Record`] that the persistence chain
//! moves between stores, its locally-held counterpart
//! [`PendingLocalRecord`], and the identifiers and timestamps they carry.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `TenantId` and `RecordId` are
//!    distinct types. A `TenantId` cannot be empty: construction and
//!    deserialization both reject it, so "tenant must be set before any
//!    write" holds by construction.
//!
//! 2. **Typed records.** A `Record` is a schema with required and optional
//!    fields. Free-form wizard answers live in `details`, never in the
//!    invariant fields.
//!
//! 3. **Explicit context.** Tenant and credentials travel as a
//!    [`TenantContext`] argument. Nothing in the workspace reads a global
//!    "current tenant".
//!
//! 4. **UTC-only timestamps.** [`Timestamp`] normalizes every input to UTC
//!    with millisecond precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `rat-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod audit;
pub mod context;
pub mod error;
pub mod identity;
pub mod record;
pub mod strategy;
pub mod temporal;

pub use audit::{AuditAction, AuditEntry};
pub use context::TenantContext;
pub use error::CoreError;
pub use identity::{RecordId, TenantId};
pub use record::{LegalBasis, PendingLocalRecord, Record, RecordStatus};
pub use strategy::StrategyKind;
pub use temporal::Timestamp;
