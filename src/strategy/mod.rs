//! Business strategy overlay: festival lift, surge, marketing, returns, buffer.

pub mod overlay;

pub use overlay::*;
