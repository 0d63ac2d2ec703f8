// fnpack - packaging-time optimizer for deployed functions
// Bundles a function's dependency graph, optionally minifies it, and
// assembles the final set of archive entries for the deploy pipeline.

pub mod cli;
pub mod core;
pub mod hook;
pub mod infrastructure;
pub mod utils;
