//! Capacity agent internals: configuration, the reload loop and the HTTP API

pub mod api;
pub mod config;
pub mod poller;
