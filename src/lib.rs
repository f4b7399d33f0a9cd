//! Forecast Desk
//!
//! Per-question forecasting toolkit: Monte Carlo ensembles, news and value
//! monitoring, and forecast/event tracking for tournament questions.

pub mod classify;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod monitor;
pub mod simulation;
pub mod sources;
pub mod state;
pub mod stats;
pub mod storage;
pub mod tracker;
pub mod types;

#[cfg(test)]
mod error_tests;
