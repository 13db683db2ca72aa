// src/specs/mod.rs
//! # Page specs
//!
//! Each spec knows where the ground truth lives on one registry view and how
//! to read it robustly. Specs are pure: they take a fetched `Document` and
//! return typed values or `None`.
//!
//! ## What lives here
//! - `article`: the bibliographic detail view (first author link, the link's
//!   author id and record id override, the title for logs).
//! - `profile`: the bibliographic author profile (hidden cross-registry id
//!   with fallbacks, heading name).
//! - `search`: the demographic result grid (data presence probe, attribute
//!   read-out, researcher-name column).
//!
//! ## What does **not** live here
//! - Navigation, retries and dialogs. Those belong to the resolvers driving a
//!   `Session`.
//! - Persistence or merge rules (`store`, `record`).
//!
//! ## Conventions
//! - Case-insensitive tag scanning through `core::html`; no full-document regexes.
//! - Missing markup is `None`, never an error. Registries omit things legitimately.
//! - Specs are tested offline against captured fragments.

pub mod article;
pub mod profile;
pub mod search;
