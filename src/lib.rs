//! Autonomous multi-agent task orchestration core.
//!
//! A `Workspace` holds one autonomous swarm pursuing a `Goal` by dispatching
//! `Task`s to `Agent`s, recovering from failure, and aggregating
//! `Deliverable`s — summarized end to end in `SPEC_FULL.md`.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod services;
pub mod telemetry;
