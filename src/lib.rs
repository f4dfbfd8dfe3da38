//! Traffic Grid Simulation Library
//!
//! A deterministic signal-controlled grid traffic simulation that runs
//! headless and exposes snapshots for external renderers.

pub mod simulation;
