//! Input/output helpers.
//!
//! - CSV ingest, normalization and integrity checks (`ingest`)
//! - companion-table joins (`companion`)
//! - layered TOML configuration (`config`)
//! - plan CSV / summary JSON exports (`export`)

pub mod companion;
pub mod config;
pub mod export;
pub mod ingest;

pub use companion::*;
pub use config::*;
pub use export::*;
pub use ingest::*;
