pub mod config;
pub mod logging;

// Probing core and its collaborators.
pub mod admission;
pub mod aggregator;
pub mod probe;
pub mod resolver;
pub mod snapshot;
pub mod store;
pub mod tracker;
pub mod writer;
