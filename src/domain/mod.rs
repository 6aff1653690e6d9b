//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - normalized sales observations (`SalesRecord`, `CleanedSeries`)
//! - model and plan outputs (`ForecastPoint`, `PlanRow`, `PlanSummary`)
//! - run configuration (`StrategyConfig`, `ModelParams`, `BusinessProfile`)
//! - calendar features and the festival calendar

pub mod calendar;
pub mod types;

pub use calendar::*;
pub use types::*;
