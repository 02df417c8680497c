//! TokenDesk Library
//!
//! Unified multi-source token market data: fetch, merge, cache, rank,
//! diff, broadcast.

pub mod api;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod rank;
pub mod scheduler;
pub mod service;
pub mod sources;
pub mod types;
