//! Archlens server library
//!
//! Reconstructs the runtime architecture of a distributed application from
//! telemetry spans, detects structural and performance issues against the
//! dependency graph, and synthesizes remediation workflows with scored
//! tradeoffs.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
