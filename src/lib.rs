//! Personal time tracking from the terminal. Clock in and out of projects, correct entries, and
//! review per-day, per-week and per-month totals. Data is kept per user in a local journal-backed
//! document store.
//!

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod identity;
pub mod model;
pub mod session;
pub mod store;
pub mod tracking;
pub mod utils;
