// src/resolve/mod.rs
//! Resolvers drive one `Session` each: `identity` against the bibliographic
//! registry, `attributes` against the demographic registry. They return
//! outcomes; status and persistence are the pipeline's business.

pub mod attributes;
pub mod identity;

pub use attributes::{AttributeHit, AttributeResolver, SearchOutcome};
pub use identity::{Identity, IdentityOutcome, IdentityResolver};
