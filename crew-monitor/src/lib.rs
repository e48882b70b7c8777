//! Fleet dashboard client for a crew of configuration-managed miners.
//!
//! The crate polls a crew backend for miner status, sorts every miner
//! into a cluster describing how far its configuration has converged,
//! and lets an operator inspect or update a single miner. Rendering and
//! transport are behind the [`render::Renderer`] and
//! [`api_client::Backend`] traits so the state machine can be driven
//! without a terminal or a live backend.

pub mod api_client;
pub mod classify;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod poller;
pub mod render;
pub mod selection;
pub mod store;
pub mod tracing;

#[cfg(test)]
pub(crate) mod testing;
