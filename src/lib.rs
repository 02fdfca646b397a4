//! dualpack: one extension source tree, two host-specific bundles.
//!
//! A [`core::orchestrator::BuildOrchestrator`] turns the fixed set of target
//! profiles into independent build jobs. Each job resolves, compiles, links
//! and optionally optimizes its own module graph, then writes one artifact
//! directory.

pub mod cli;
pub mod core;
pub mod infrastructure;
pub mod utils;
