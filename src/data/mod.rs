//! Data sources that do not come from user uploads.

pub mod sample;
