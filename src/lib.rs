//! `demand-planner` library crate.
//!
//! The binary (`dplan`) is a thin wrapper around this library so that:
//!
//! - the normalizer, models and overlay are testable without spawning processes
//! - the plan pipeline is reusable from other front ends
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod strategy;
