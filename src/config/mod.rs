// src/config/mod.rs

pub mod consts;
pub mod fields;
pub mod options;

pub use fields::field_specs;
pub use options::{AppOptions, TableShape};
