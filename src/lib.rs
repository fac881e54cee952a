//! FARMWISE: crop-planning advisory engines
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod data;
pub mod model;
pub mod engine;
pub mod strategy;
pub mod storage;
