//! Resource envelope model shared by every registered resource type.
//!
//! # Responsibility
//! - Define the wire shape of typed objects (`apiVersion`, `kind`, `metadata`, `spec`).
//! - Define group/version/resource addressing for collections.
//!
//! # Invariants
//! - `group`, `version` and `kind` are fixed per collection, never per object.
//! - `metadata.resourceVersion` is assigned by stores only.

pub mod object;
