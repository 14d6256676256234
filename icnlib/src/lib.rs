//! # IcnLib
//!
//! IcnLib evaluates caching and routing strategies for information-centric networks by replaying
//! a stream of content requests over a fixed topology
//!
//! Each strategy decides, per request, which node serves the content and where copies are left
//! on the way back. All strategies share one contract, [`strategy::Strategy::process_event`], and
//! one mutable substrate, the [`network::Network`] view and controller
//!
//! A reference substrate is included: a petgraph topology, per-node caches parameterised by a
//! replacement policy, and a collector which turns the generated traffic into a run summary

/// Contains the implementation of the node caches, and a utility enum for the existing cache types
pub mod cache;

/// Contains definitions for the JSON input format: topology, strategy and cache policy
pub mod config;

/// Contains the replacement policies of the node caches, with a trait for implementing custom
/// replacement policies
pub mod replacement_policies;

pub mod artifacts;
pub mod collector;
pub mod error;
pub mod io;
pub mod network;
pub mod popularity;
pub mod topology;
pub mod trace;

/// Contains every caching and routing strategy and the registry building them from configuration
pub mod strategy;

/// Contains the simulator replaying a request trace through a configured strategy
pub mod simulator;

#[cfg(test)]
mod test;

/// Identifier of a topology node
pub type NodeId = u32;

/// Identifier of a content object. Ids are positive and double as popularity ranks
pub type ContentId = u64;

/// Simulated time of a request
pub type Time = f64;
