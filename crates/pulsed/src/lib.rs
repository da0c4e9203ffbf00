//! Pulse daemon library - exposes modules for testing.

pub mod aggregator;
pub mod analyzers;
pub mod broadcaster;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod event_store;
pub mod fixture;
pub mod live;
pub mod metrics;
pub mod middleware;
pub mod provider;
pub mod responder;
pub mod router;
#[cfg(test)]
pub mod router_tests;
pub mod routes;
pub mod scheduler;
pub mod server;
pub mod setup;
pub mod webhook;
