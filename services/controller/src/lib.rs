//! Fleet controller library.
//!
//! The crate ships the `fleet-controller` binary; the library surface exists
//! so the orchestration engine can be driven from integration tests with a
//! mock host agent.

pub mod agent;
pub mod allocator;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod events;
pub mod hosts;
pub mod orchestrator;
pub mod scheduler;
pub mod state;
pub mod store;
