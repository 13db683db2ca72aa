// src/lib.rs

#[macro_use]
pub mod macros;
#[macro_use]
pub mod log;

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod extract;
pub mod progress;
pub mod record;
pub mod resolve;
pub mod runner;
pub mod session;
pub mod specs;
pub mod store;
